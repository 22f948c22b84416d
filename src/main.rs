#[macro_use]
extern crate rocket;

mod models;
mod utils;

use std::sync::Arc;

use log::{error, info};
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::{Build, Rocket, State};

use utils::clips::{ClipError, ClipStore, Created};
use utils::config::{Config, StoreBackend};
use utils::id::IdGenerator;
use utils::log::setup_logger;
use utils::memory::MemoryStore;
use utils::rate_limit::RateLimiter;
use utils::redis::RedisStore;
use utils::store::KvStore;
use utils::structs::{
    APIResponse, AdminListResponse, CreateRequest, FeedResponse, Version, MAX_TEXT_LENGTH,
};

mod build_info {
    include!(concat!(env!("OUT_DIR"), "/git_commit.rs"));
}

type APIResult = Result<Json<APIResponse>, Custom<Json<APIResponse>>>;

fn failure(status: Status, message: &str) -> Custom<Json<APIResponse>> {
    Custom(status, Json(APIResponse::error(message)))
}

/// Map a core error to a response, logging anything that is not the caller's fault.
fn clip_failure(e: ClipError) -> Custom<Json<APIResponse>> {
    match e {
        ClipError::NotFound => Custom(Status::NotFound, Json(APIResponse::default())),
        ClipError::IdSpaceExhausted { .. } => {
            error!("{}", e);
            failure(Status::ServiceUnavailable, "No free clip ids, try again later")
        }
        ClipError::Store(_) | ClipError::Serialization(_) => {
            error!("{}", e);
            failure(
                Status::InternalServerError,
                "A problem with the database has occurred",
            )
        }
    }
}

#[get("/status")]
async fn status(clips: &State<ClipStore>) -> APIResult {
    match clips.health_check().await {
        Ok(_) => Ok(Json(APIResponse::success())),
        Err(e) => Err(clip_failure(e)),
    }
}

#[post("/create", format = "json", data = "<request>")]
async fn create_clip(
    request: Json<CreateRequest>,
    clips: &State<ClipStore>,
    _rate_limiter: RateLimiter,
) -> APIResult {
    let request = request.into_inner();
    if request.text.is_empty() {
        return Err(failure(Status::BadRequest, "No text provided"));
    }
    if request.text.chars().count() > MAX_TEXT_LENGTH {
        return Err(failure(
            Status::BadRequest,
            &format!("Clips are limited to {} characters", MAX_TEXT_LENGTH),
        ));
    }

    match clips
        .create(&request.text, request.is_public, request.expiration)
        .await
    {
        Ok(Created::Public) => Ok(Json(APIResponse::success())),
        Ok(Created::Private { phrase_id }) => Ok(Json(APIResponse {
            phrase_id: Some(phrase_id),
            ..APIResponse::success()
        })),
        Err(e) => Err(clip_failure(e)),
    }
}

#[get("/feed")]
async fn feed(
    clips: &State<ClipStore>,
) -> Result<Json<FeedResponse>, Custom<Json<APIResponse>>> {
    match clips.list_feed().await {
        Ok(clips) => Ok(Json(FeedResponse { clips })),
        Err(e) => Err(clip_failure(e)),
    }
}

#[post("/copy/<id>")]
async fn copy_clip(id: &str, clips: &State<ClipStore>, _rate_limiter: RateLimiter) -> APIResult {
    match clips.copy(id).await {
        Ok(text) => Ok(Json(APIResponse::with_text(text))),
        Err(e) => Err(clip_failure(e)),
    }
}

#[get("/view/<id>")]
async fn view_clip_json(
    id: &str,
    clips: &State<ClipStore>,
    _rate_limiter: RateLimiter,
) -> APIResult {
    match clips.view(id).await {
        Ok(text) => Ok(Json(APIResponse::with_text(text))),
        Err(e) => Err(clip_failure(e)),
    }
}

#[get("/<id>")]
async fn view_clip(
    id: &str,
    clips: &State<ClipStore>,
    _rate_limiter: RateLimiter,
) -> Result<String, Custom<String>> {
    match clips.view(id).await {
        Ok(text) => Ok(text),
        Err(ClipError::NotFound) => Err(Custom(
            Status::NotFound,
            "This clip may have expired or never existed.".to_string(),
        )),
        Err(e) => {
            error!("{}", e);
            Err(Custom(
                Status::InternalServerError,
                "A problem with the database has occurred".to_string(),
            ))
        }
    }
}

#[post("/delete/<id>")]
async fn delete_clip(id: &str, clips: &State<ClipStore>) -> APIResult {
    match clips.admin_delete(id).await {
        Ok(_) => Ok(Json(APIResponse::success())),
        Err(e) => Err(clip_failure(e)),
    }
}

#[get("/admin/list")]
async fn admin_list(
    clips: &State<ClipStore>,
) -> Result<Json<AdminListResponse>, Custom<Json<APIResponse>>> {
    match clips.admin_list().await {
        Ok(clips) => Ok(Json(AdminListResponse { clips })),
        Err(e) => Err(clip_failure(e)),
    }
}

#[get("/version")]
fn version() -> Json<Version> {
    let commit = Some(build_info::GIT_COMMIT)
        .filter(|hash| !hash.is_empty())
        .map(str::to_string);

    Json(Version { commit })
}

#[catch(400)]
fn bad_request() -> Json<APIResponse> {
    Json(APIResponse::error("Bad request"))
}

#[catch(404)]
fn not_found() -> Json<APIResponse> {
    Json(APIResponse::error("Endpoint not found"))
}

#[catch(422)]
fn unprocessable() -> Json<APIResponse> {
    Json(APIResponse::error("Malformed request body"))
}

#[catch(429)]
fn too_many_requests() -> Json<APIResponse> {
    Json(APIResponse::error("Too many requests"))
}

#[catch(500)]
fn internal_error() -> Json<APIResponse> {
    Json(APIResponse::error("Internal server error"))
}

fn build(config: &Config, clips: ClipStore) -> Rocket<Build> {
    rocket::build()
        .mount(
            "/api",
            routes![
                status,
                create_clip,
                feed,
                copy_clip,
                view_clip_json,
                delete_clip,
                admin_list,
                version
            ],
        )
        .mount("/", routes![view_clip])
        .register(
            "/",
            catchers![
                bad_request,
                not_found,
                unprocessable,
                too_many_requests,
                internal_error
            ],
        )
        .manage(clips)
        .manage(RateLimiter::new(
            config.rate_limit_window,
            config.rate_limit_max_requests,
        ))
}

fn open_store(config: &Config) -> Result<Arc<dyn KvStore>, utils::store::StoreError> {
    match config.store {
        StoreBackend::Redis => Ok(Arc::new(RedisStore::open(
            &config.redis_url,
            config.key_prefix.clone(),
        )?)),
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
    }
}

#[launch]
fn rocket() -> _ {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => panic!("Error whilst reading configuration: {}", e),
    };
    match setup_logger(&config) {
        Ok(path) => {
            println!("Logger setup at {}", path);
        }
        Err(e) => {
            println!("Error whilst setting up logger: {}", e);
        }
    };
    let kv = match open_store(&config) {
        Ok(kv) => kv,
        Err(e) => panic!("Error whilst setting up clip store: {}", e),
    };
    info!("Using {:?} clip store", config.store);

    let clips = ClipStore::new(kv)
        .with_id_generator(IdGenerator::from_entropy())
        .with_max_id_attempts(config.max_id_attempts);
    build(&config, clips)
}
