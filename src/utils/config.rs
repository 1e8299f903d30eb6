use anyhow::{Context, Result};
use std::env;

/// Runtime settings read from the environment (and `.env` when present).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub upload_dir: String,
    pub cors_allowed_origin: String,
    pub max_request_body_mb: usize,
    pub bind_addr: String,
    pub app_base_url: String,
    pub mail_concurrency: usize,
    pub mail_queue_capacity: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            jwt_ttl_hours: parse_or("JWT_TTL_HOURS", 24),
            upload_dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| "./storage/uploads".to_string()),
            cors_allowed_origin: env::var("CORS_ALLOWED_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            max_request_body_mb: parse_or("MAX_REQUEST_BODY_MB", 500),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string()),
            app_base_url: env::var("APP_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            mail_concurrency: parse_or("MAIL_CONCURRENCY", 4).max(1),
            mail_queue_capacity: parse_or("MAIL_QUEUE_CAPACITY", 256).max(1),
        })
    }

    pub fn max_request_body_bytes(&self) -> usize {
        self.max_request_body_mb * 1024 * 1024
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid value for {}: {}", key, raw);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Self {
            database_url: "postgres://localhost/elearning_test".to_string(),
            jwt_secret: "test-secret".to_string(),
            jwt_ttl_hours: 24,
            upload_dir: std::env::temp_dir()
                .join("elearning-backend-tests")
                .to_string_lossy()
                .into_owned(),
            cors_allowed_origin: "*".to_string(),
            max_request_body_mb: 1,
            bind_addr: "127.0.0.1:0".to_string(),
            app_base_url: "http://localhost:3000".to_string(),
            mail_concurrency: 2,
            mail_queue_capacity: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_or_falls_back_on_garbage() {
        env::set_var("ELEARNING_TEST_PARSE_OR", "not-a-number");
        assert_eq!(parse_or("ELEARNING_TEST_PARSE_OR", 7usize), 7);

        env::set_var("ELEARNING_TEST_PARSE_OR", " 12 ");
        assert_eq!(parse_or("ELEARNING_TEST_PARSE_OR", 7usize), 12);

        env::remove_var("ELEARNING_TEST_PARSE_OR");
        assert_eq!(parse_or("ELEARNING_TEST_PARSE_OR", 7usize), 7);
    }

    #[test]
    fn test_body_limit_in_bytes() {
        let config = Config::for_tests();
        assert_eq!(config.max_request_body_bytes(), 1024 * 1024);
    }
}
