// src/state.rs

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::{config::Config, error::AppError, models::user::UserRole};

/// Shared application state: the Postgres pool, loaded configuration and the
/// verified system grader.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub system_grader: SystemGrader,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config, system_grader: SystemGrader) -> Self {
        Self {
            pool,
            config,
            system_grader,
        }
    }
}

/// The account credited with auto-graded responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemGrader(pub Option<i64>);

impl SystemGrader {
    /// Checks the configured grader id against the users table. A configured id
    /// must name an existing manager.
    pub async fn resolve(pool: &PgPool, configured: Option<i64>) -> Result<Self, AppError> {
        let Some(id) = configured else {
            return Ok(SystemGrader(None));
        };

        let role = sqlx::query_scalar::<_, UserRole>("SELECT role FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        match role {
            Some(UserRole::Manager) => Ok(SystemGrader(Some(id))),
            Some(_) => Err(AppError::BadRequest(format!(
                "SYSTEM_GRADER_ID={} is not a manager",
                id
            ))),
            None => Err(AppError::NotFound(format!(
                "SYSTEM_GRADER_ID={} does not match any user",
                id
            ))),
        }
    }
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for SystemGrader {
    fn from_ref(state: &AppState) -> Self {
        state.system_grader
    }
}
