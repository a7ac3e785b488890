// src/config.rs

use std::env;
use dotenvy::dotenv;

/// Upper bound on how many recent submissions the learner summary returns.
pub const RECENT_ACTIVITY_LIMIT: i64 = 5;

/// Window (in days) for the learner's daily completion trend.
pub const DAILY_PROGRESS_DAYS: i64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub port: u16,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,

    /// User recorded as `graded_by` on auto-graded multiple-choice responses.
    pub system_grader_id: Option<i64>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(86400);

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3000);

        let admin_username = env::var("ADMIN_USERNAME").ok().filter(|v| !v.is_empty());
        let admin_password = env::var("ADMIN_PASSWORD").ok().filter(|v| !v.is_empty());

        let system_grader_id = match env::var("SYSTEM_GRADER_ID") {
            Ok(raw) => Some(
                raw.parse::<i64>()
                    .expect("SYSTEM_GRADER_ID must be a numeric user id"),
            ),
            Err(_) => None,
        };

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            port,
            admin_username,
            admin_password,
            system_grader_id,
        }
    }
}
