//! Typed configuration loaded from environment variables.
//!
//! Mirrors the recognized options in spec §6.4. Kept as plain `env::var`
//! parsing rather than pulling in a config-file crate, the way the teacher
//! backend reads its chain endpoint straight from a literal rather than a
//! layered config system.

use std::env;
use std::time::Duration;

use crate::error::AppError;

/// Seeds that are never acceptable as the HMAC secret, even if long enough.
const WEAK_SECRET_BLACKLIST: &[&str] = &[
    "00000000000000000000000000000000",
    "changemechangemechangemechangeme",
    "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
];

#[derive(Clone)]
pub struct Config {
    pub hmac_secret: Vec<u8>,
    pub hmac_freshness: Duration,
    pub rate_limit_per_minute: u32,
    pub token_private_key_path: String,
    pub token_public_key_path: String,
    pub token_key_id: String,
    pub token_expiration: Duration,
    pub token_issuer: String,
    pub email_enabled: bool,
    pub email_from: String,
    pub dispatch_max_attempts: u32,
    pub dispatch_backoff_base: Duration,
    pub circuit_window: usize,
    pub circuit_failure_rate_pct: u8,
    pub circuit_cool_off: Duration,
    pub db_url: String,
    pub kv_url: String,
    pub kv_password: Option<String>,
    pub bind_addr: String,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let hmac_secret = read_secret("HMAC_SECRET")?;
        if hmac_secret.len() < 32 {
            return Err(AppError::Config(
                "hmac.secret must be at least 32 bytes".into(),
            ));
        }
        if let Ok(as_str) = String::from_utf8(hmac_secret.clone()) {
            if WEAK_SECRET_BLACKLIST.contains(&as_str.as_str()) {
                return Err(AppError::Config("hmac.secret matches a known weak default".into()));
            }
        }

        Ok(Self {
            hmac_secret,
            hmac_freshness: Duration::from_secs(env_u64("HMAC_FRESHNESS_SECONDS", 300)),
            rate_limit_per_minute: env_u64("RATE_LIMIT_REQUESTS_PER_MINUTE", 100) as u32,
            token_private_key_path: env_string("TOKEN_PRIVATE_KEY_PATH", "keys/private.pem"),
            token_public_key_path: env_string("TOKEN_PUBLIC_KEY_PATH", "keys/public.pem"),
            token_key_id: env_string("TOKEN_KEY_ID", "default"),
            token_expiration: Duration::from_secs(env_u64("TOKEN_EXPIRATION_SECONDS", 900)),
            token_issuer: env_string("TOKEN_ISSUER", "chainwatch"),
            email_enabled: env::var("NOTIFICATIONS_EMAIL_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            email_from: env_string("NOTIFICATIONS_EMAIL_FROM", "alerts@chainwatch.local"),
            dispatch_max_attempts: env_u64("DISPATCH_MAX_ATTEMPTS", 3) as u32,
            dispatch_backoff_base: Duration::from_millis(env_u64("DISPATCH_BACKOFF_BASE_MS", 1000)),
            circuit_window: env_u64("CIRCUIT_WINDOW", 10) as usize,
            circuit_failure_rate_pct: env_u64("CIRCUIT_FAILURE_RATE_PCT", 50) as u8,
            circuit_cool_off: Duration::from_secs(env_u64("CIRCUIT_COOL_OFF_SECONDS", 30)),
            db_url: env::var("DB_URL")
                .map_err(|_| AppError::Config("db.url is required".into()))?,
            kv_url: env::var("KV_URL")
                .map_err(|_| AppError::Config("kv.url is required".into()))?,
            kv_password: env::var("KV_PASSWORD").ok(),
            bind_addr: env_string("BIND_ADDR", "0.0.0.0:8080"),
        })
    }
}

fn read_secret(key: &str) -> Result<Vec<u8>, AppError> {
    env::var(key)
        .map(|v| v.into_bytes())
        .map_err(|_| AppError::Config(format!("{key} is required")))
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
