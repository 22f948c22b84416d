use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use dotenv::dotenv;
use log::LevelFilter;
use thiserror::Error;

use super::clips::DEFAULT_MAX_ID_ATTEMPTS;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Redis,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreBackend,
    pub redis_url: String,
    pub key_prefix: String,
    pub log_level: LevelFilter,
    pub log_file: PathBuf,
    pub rate_limit_window: Duration,
    pub rate_limit_max_requests: u32,
    pub max_id_attempts: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            store: StoreBackend::Redis,
            redis_url: "redis://localhost/".to_string(),
            key_prefix: "clipshare:".to_string(),
            log_level: LevelFilter::Debug,
            log_file: env::temp_dir().join("clipshare.log"),
            rate_limit_window: Duration::from_secs(10),
            rate_limit_max_requests: 15,
            max_id_attempts: DEFAULT_MAX_ID_ATTEMPTS,
        }
    }
}

fn parsed<T: FromStr>(name: &'static str, value: Option<String>) -> Result<Option<T>, ConfigError> {
    match value {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        None => Ok(None),
    }
}

impl Config {
    /// Load `.env`, then read settings from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build a config from any name -> value source. Unset names keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(store) = lookup("CLIP_STORE") {
            config.store = match store.trim().to_ascii_lowercase().as_str() {
                "redis" => StoreBackend::Redis,
                "memory" => StoreBackend::Memory,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        name: "CLIP_STORE",
                        value: store,
                    })
                }
            };
        }
        if let Some(url) = lookup("REDIS_URL") {
            config.redis_url = url;
        }
        if let Some(prefix) = lookup("KEY_PREFIX") {
            config.key_prefix = prefix;
        }
        if let Some(level) = parsed::<LevelFilter>("LOG_LEVEL", lookup("LOG_LEVEL"))? {
            config.log_level = level;
        }
        if let Some(path) = lookup("LOG_FILE") {
            config.log_file = PathBuf::from(path);
        }
        if let Some(secs) = parsed::<u64>("RATE_LIMIT_WINDOW_SECS", lookup("RATE_LIMIT_WINDOW_SECS"))? {
            config.rate_limit_window = Duration::from_secs(secs);
        }
        if let Some(max) = parsed::<u32>("RATE_LIMIT_MAX_REQUESTS", lookup("RATE_LIMIT_MAX_REQUESTS"))? {
            config.rate_limit_max_requests = max;
        }
        if let Some(attempts) = parsed::<usize>("MAX_ID_ATTEMPTS", lookup("MAX_ID_ATTEMPTS"))? {
            if attempts == 0 {
                return Err(ConfigError::InvalidValue {
                    name: "MAX_ID_ATTEMPTS",
                    value: attempts.to_string(),
                });
            }
            config.max_id_attempts = attempts;
        }

        Ok(config)
    }
}
