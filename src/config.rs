use std::str::FromStr;

use crate::error::{AppError, Result};

/// Maximum number of detections kept in the challenge ring log.
pub const CHALLENGE_LOG_CAPACITY: usize = 100;

/// Only this many leading characters of body text are scanned for challenge phrases.
pub const CHALLENGE_BODY_SCAN_CHARS: usize = 5_000;

/// A detection is positive at or above this confidence.
pub const CHALLENGE_CONFIDENCE_THRESHOLD: u8 = 30;

/// Price changes at or below this magnitude are treated as no change.
pub const PRICE_CHANGE_EPSILON: f64 = 0.01;

/// Store-markup descriptions are cut to this many characters.
pub const DESCRIPTION_MAX_CHARS: usize = 500;

/// Ceiling on an orchestrated page body; larger bodies are truncated and marked partial.
pub const MAX_PAGE_BYTES: usize = 8 * 1024 * 1024;

pub const DEFAULT_CHECK_INTERVAL_MINUTES: u32 = 360;
pub const DEFAULT_SCRAPE_DELAY_MS: u64 = 2_000;
pub const DEFAULT_MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub from: String,
    pub username: String,
    pub password: String,
}

/// Exponential backoff parameters for fetch retries.
#[derive(Debug, Clone, Copy)]
pub struct BackoffConfig {
    pub base_ms: u64,
    pub max_ms: u64,
    pub max_jitter_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_ms: 1_000,
            max_ms: 30_000,
            max_jitter_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    /// Comma-separated proxies (PROXY_LIST): `host:port`, `host:port:user:pass` or a full URL.
    pub proxy_list: String,
    /// Scheduler cadence (TRACKER_INTERVAL_SECS)
    pub tracker_interval_secs: u64,
    /// Owners processed in parallel within one pass (TRACKER_OWNER_CONCURRENCY)
    pub tracker_owner_concurrency: usize,
    /// Hard cap for a single product check (TRACKER_PRODUCT_TIMEOUT_SECS)
    pub tracker_product_timeout_secs: u64,
    /// Default attempt budget for one fetch (FETCH_MAX_ATTEMPTS)
    pub fetch_max_attempts: u32,
    /// Per-attempt navigation bound (FETCH_NAVIGATION_TIMEOUT_SECS)
    pub fetch_navigation_timeout_secs: u64,
    pub backoff: BackoffConfig,
    /// How long a loaded dynamic allow-list stays fresh (ALLOWLIST_TTL_SECS)
    pub allowlist_ttl_secs: u64,
    /// None when SMTP_USER/SMTP_PASS are missing; emails are then only logged.
    pub smtp: Option<SmtpConfig>,
    /// Base URL of the dashboard, used in email links (APP_BASE_URL)
    pub app_base_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "sentinel.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            proxy_list: std::env::var("PROXY_LIST").unwrap_or_default(),
            tracker_interval_secs: env_or("TRACKER_INTERVAL_SECS", 60),
            tracker_owner_concurrency: env_or::<usize>("TRACKER_OWNER_CONCURRENCY", 4).max(1),
            tracker_product_timeout_secs: env_or("TRACKER_PRODUCT_TIMEOUT_SECS", 180),
            fetch_max_attempts: env_or::<u32>("FETCH_MAX_ATTEMPTS", DEFAULT_MAX_RETRIES).max(1),
            fetch_navigation_timeout_secs: env_or("FETCH_NAVIGATION_TIMEOUT_SECS", 30),
            backoff: BackoffConfig {
                base_ms: env_or("FETCH_BACKOFF_BASE_MS", 1_000),
                max_ms: env_or("FETCH_BACKOFF_MAX_MS", 30_000),
                max_jitter_ms: env_or("FETCH_BACKOFF_JITTER_MS", 1_000),
            },
            allowlist_ttl_secs: env_or("ALLOWLIST_TTL_SECS", 300),
            smtp: smtp_from_env(),
            app_base_url: std::env::var("APP_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
        })
    }
}

/// Parse an env var, falling back to `default` when unset or malformed.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn smtp_from_env() -> Option<SmtpConfig> {
    let username = std::env::var("SMTP_USER").ok().filter(|u| !u.trim().is_empty())?;
    let password = std::env::var("SMTP_PASS").ok().filter(|p| !p.is_empty())?;
    Some(SmtpConfig {
        host: std::env::var("SMTP_HOST").unwrap_or_else(|_| "smtp.gmail.com".to_string()),
        port: env_or("SMTP_PORT", 587),
        from: std::env::var("SMTP_FROM")
            .unwrap_or_else(|_| "PriceSentinel <noreply@price-sentinel.local>".to_string()),
        username,
        password,
    })
}
