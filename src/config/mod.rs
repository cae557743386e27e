//! Configuration module for the configuration service.
//!
//! All settings are loaded from environment variables with sensible defaults.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Service settings loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the remote configuration API
    pub api_base_url: String,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Upper bound for a single remote fetch
    pub fetch_timeout: Duration,
    /// Outer deadline for the whole bootstrap sequence
    pub startup_deadline: Duration,
    /// Cached documents older than this are not considered valid
    pub cache_max_age: Duration,
    /// How often the background task checks for staleness
    pub sync_check_interval: Duration,
    /// `host:port` used to probe connectivity
    pub connectivity_probe: String,
    /// Version of the running client, checked against the document
    pub app_version: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let api_base_url = env::var("NEWSAPP_API_BASE_URL")
            .unwrap_or_else(|_| "https://apiv2.grandprixgroup.com".to_string());

        let db_path = env::var("NEWSAPP_DB_PATH")
            .unwrap_or_else(|_| "./data/app.sqlite".to_string())
            .into();

        let connectivity_probe = env::var("NEWSAPP_CONNECTIVITY_PROBE")
            .unwrap_or_else(|_| "apiv2.grandprixgroup.com:443".to_string());

        let app_version = env::var("NEWSAPP_APP_VERSION")
            .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());

        let log_level = env::var("NEWSAPP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Self {
            api_base_url,
            db_path,
            fetch_timeout: secs_from_env("NEWSAPP_FETCH_TIMEOUT_SECS", 30),
            startup_deadline: secs_from_env("NEWSAPP_STARTUP_DEADLINE_SECS", 15),
            cache_max_age: secs_from_env("NEWSAPP_CACHE_MAX_AGE_SECS", 24 * 60 * 60),
            sync_check_interval: secs_from_env("NEWSAPP_SYNC_CHECK_INTERVAL_SECS", 60),
            connectivity_probe,
            app_version,
            log_level,
        }
    }
}

fn secs_from_env(key: &str, default: u64) -> Duration {
    let secs = match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid {} value {:?}, using {}", key, raw, default);
            default
        }),
        Err(_) => default,
    };
    Duration::from_secs(secs)
}
