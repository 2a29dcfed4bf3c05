/**
 * Configuration
 * Service settings loaded from the environment (and `.env` via dotenvy)
 */
use std::{path::PathBuf, str::FromStr, time::Duration};

use crate::carousel::CarouselConfig;
use crate::db::models::ContentKind;

/// Secret used when `JWT_SECRET` is missing. Refused in production.
pub const DEFAULT_JWT_SECRET: &str = "default-jwt-secret-change-in-production";

/// Admin e-mail used when `ADMIN_EMAIL` is missing.
pub const DEFAULT_ADMIN_EMAIL: &str = "admin@example.com";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub admin_email: String,
    /// Pre-hashed bcrypt password (`ADMIN_HASH_PASSWORD`).
    pub admin_password_hash: Option<String>,
    /// Plain password (`ADMIN_PASSWORD`), hashed at startup when no hash is given.
    pub admin_password: Option<String>,
    pub upload_dir: PathBuf,
    pub allowed_origins: Vec<String>,
    pub carousel_interval: Duration,
    pub carousel_limit: usize,
    /// How long a carousel view may go untouched before it is unmounted.
    pub carousel_idle: Duration,
    pub login_rate_limit: Duration,
    /// Bound on backend calls made by the carousel and the session gate.
    pub backend_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
            environment: "development".to_string(),
            database_url: None,
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            admin_email: DEFAULT_ADMIN_EMAIL.to_string(),
            admin_password_hash: None,
            admin_password: None,
            upload_dir: PathBuf::from("uploads"),
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
            carousel_interval: Duration::from_millis(5000),
            carousel_limit: 5,
            carousel_idle: Duration::from_secs(600),
            login_rate_limit: Duration::from_secs(60),
            backend_timeout: Some(Duration::from_secs(10)),
        }
    }
}

impl Config {
    /// Build the configuration from environment variables, falling back to
    /// the development defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let allowed_origins = std::env::var("ALLOWED_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|origins| !origins.is_empty())
            .or_else(|| std::env::var("FRONTEND_ORIGIN").ok().map(|o| vec![o]))
            .unwrap_or(defaults.allowed_origins);

        let backend_timeout = match parse_var::<u64>("BACKEND_TIMEOUT_SECS") {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => defaults.backend_timeout,
        };

        Self {
            host: non_empty_var("HOST").unwrap_or(defaults.host),
            port: parse_var("PORT").unwrap_or(defaults.port),
            environment: non_empty_var("ENVIRONMENT").unwrap_or(defaults.environment),
            database_url: non_empty_var("DATABASE_URL"),
            jwt_secret: non_empty_var("JWT_SECRET").unwrap_or(defaults.jwt_secret),
            admin_email: non_empty_var("ADMIN_EMAIL").unwrap_or(defaults.admin_email),
            admin_password_hash: non_empty_var("ADMIN_HASH_PASSWORD"),
            admin_password: non_empty_var("ADMIN_PASSWORD"),
            upload_dir: non_empty_var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            allowed_origins,
            carousel_interval: parse_var("CAROUSEL_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.carousel_interval),
            carousel_limit: parse_var("CAROUSEL_LIMIT").unwrap_or(defaults.carousel_limit),
            carousel_idle: parse_var::<u64>("CAROUSEL_VIEW_IDLE_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.carousel_idle),
            login_rate_limit: parse_var("LOGIN_RATE_LIMIT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.login_rate_limit),
            backend_timeout,
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Carousel settings for the homepage blog widget.
    pub fn carousel(&self) -> CarouselConfig {
        CarouselConfig {
            kind: ContentKind::Blog,
            interval: self.carousel_interval,
            limit: self.carousel_limit,
            load_timeout: self.backend_timeout,
        }
    }

    /// Checks that must hold before serving traffic in production.
    pub fn validate(&self) -> Result<(), String> {
        if self.is_production() && self.jwt_secret == DEFAULT_JWT_SECRET {
            return Err(
                "JWT_SECRET must be set to a secure, unique value in production".to_string(),
            );
        }
        Ok(())
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T: FromStr>(key: &str) -> Option<T> {
    let raw = non_empty_var(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key = %key, value = %raw, "ignoring unparsable environment value");
            None
        }
    }
}
