use rocket::request::{self, FromRequest, Outcome};

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_lock::RwLock;
use log::warn;

/// Fixed-window limiter shared by every client of this process.
#[derive(Clone)]
pub struct RateLimiter {
    requests: Arc<AtomicU32>,
    reset_time: Arc<RwLock<Instant>>,
    interval: Duration,
    max_requests: u32,
}

impl RateLimiter {
    /// Allow `max_requests` per `interval`
    pub fn new(interval: Duration, max_requests: u32) -> Self {
        RateLimiter {
            requests: Arc::new(AtomicU32::new(0)),
            reset_time: Arc::new(RwLock::new(Instant::now())),
            interval,
            max_requests,
        }
    }

    async fn should_limit(&self) -> bool {
        let mut reset_time = self.reset_time.write().await;
        let requests = self.requests.load(Ordering::Relaxed);

        if reset_time.elapsed() < self.interval {
            if requests < self.max_requests {
                self.requests.fetch_add(1, Ordering::Relaxed);
                false
            } else {
                true
            }
        } else {
            *reset_time = Instant::now();
            self.requests.store(1, Ordering::Relaxed);
            false
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for RateLimiter {
    type Error = ();

    async fn from_request(request: &'r rocket::Request<'_>) -> request::Outcome<Self, ()> {
        let rate_limiter = match request.rocket().state::<RateLimiter>() {
            Some(rate_limiter) => rate_limiter,
            None => return Outcome::Error((rocket::http::Status::InternalServerError, ())),
        };

        if rate_limiter.should_limit().await {
            warn!("Rate limit hit on {}", request.uri());
            Outcome::Error((rocket::http::Status::TooManyRequests, ()))
        } else {
            Outcome::Success(rate_limiter.clone())
        }
    }
}
