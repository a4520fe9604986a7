use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: Option<String>,
    pub s3_region: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub jwt_secret: String,
    pub jwt_issuer: Option<String>,
    pub jwt_audience: Option<String>,
    pub port: u16,
    pub rust_log: String,
    pub request_timeout: Duration,
    pub presign_expiry: Duration,
    pub cleanup_interval: Duration,
    pub orphan_threshold: Duration,
    pub cleanup_budget: Duration,
    pub stats_ttl: Duration,
    /// Empty means any origin.
    pub cors_origins: Vec<String>,
    pub limits: Limits,
}

/// Per-user resource caps.
#[derive(Debug, Clone, PartialEq)]
pub struct Limits {
    pub max_plants_per_user: usize,
    pub max_uploads_per_user: usize,
    pub max_upload_bytes: i64,
    pub allowed_content_types: Vec<String>,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_plants_per_user: 100,
            max_uploads_per_user: 20,
            max_upload_bytes: 2 * 1024 * 1024,
            allowed_content_types: ["image/jpeg", "image/png", "image/webp", "image/gif"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl Limits {
    pub fn allows_content_type(&self, content_type: &str) -> bool {
        self.allowed_content_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(content_type.trim()))
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: optional_env("S3_ENDPOINT"),
            s3_region: optional_env("S3_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            jwt_secret: require_env("AUTH_JWT_SECRET")?,
            jwt_issuer: optional_env("AUTH_JWT_ISSUER"),
            jwt_audience: optional_env("AUTH_JWT_AUDIENCE"),
            port: parse_env("PORT", 8080).context("PORT must be a valid port number")?,
            rust_log: optional_env("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            request_timeout: secs_env("REQUEST_TIMEOUT_SECS", 30)?,
            presign_expiry: secs_env("PRESIGN_EXPIRY_SECS", 3600)?,
            cleanup_interval: secs_env("CLEANUP_INTERVAL_SECS", 30 * 60)?,
            orphan_threshold: secs_env("ORPHAN_THRESHOLD_SECS", 60 * 60)?,
            cleanup_budget: secs_env("CLEANUP_BUDGET_SECS", 5 * 60)?,
            stats_ttl: secs_env("STATS_TTL_SECS", 5 * 60)?,
            cors_origins: optional_env("CORS_ORIGINS")
                .map(|raw| split_list(&raw))
                .unwrap_or_default(),
            limits: Limits::default(),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value")),
        None => Ok(default),
    }
}

fn secs_env(key: &str, default: u64) -> Result<Duration> {
    parse_env(key, default).map(Duration::from_secs)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
