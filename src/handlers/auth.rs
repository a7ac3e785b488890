// src/handlers/auth.rs

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    config::Config,
    error::{AppError, is_unique_violation},
    models::user::{CreateUserRequest, LoginRequest, User, UserRole},
    utils::{
        jwt::sign_jwt,
        password::{hash_password, verify_password},
    },
};

/// Inserts a new account. Shared by self-registration and manager-created users.
pub(crate) async fn insert_user(
    pool: &PgPool,
    payload: &CreateUserRequest,
    role: UserRole,
) -> Result<User, AppError> {
    let hashed_password = hash_password(&payload.password)?;

    sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (username, password, role, department)
        VALUES ($1, $2, $3, $4)
        RETURNING id, username, password, role, department, created_at
        "#,
    )
    .bind(&payload.username)
    .bind(&hashed_password)
    .bind(role)
    .bind(payload.department.trim())
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict(format!("Username '{}' already exists", payload.username))
        } else {
            tracing::error!("Failed to create user: {:?}", e);
            AppError::from(e)
        }
    })
}

/// Registers a new learner.
///
/// Hashes the password using Argon2 before storing it.
/// Returns 201 Created and the user object (excluding password).
pub async fn register(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = insert_user(&pool, &payload, UserRole::Learner).await?;
    tracing::info!(user_id = user.id, "Registered learner {}", user.username);

    Ok((StatusCode::CREATED, Json(user)))
}

/// Authenticates a user and returns a JWT token.
///
/// The token carries the user's id and role; unknown users and wrong passwords
/// get the same 401 message.
pub async fn login(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, password, role, department, created_at
        FROM users
        WHERE username = $1
        "#,
    )
    .bind(&payload.username)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Login DB error: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let invalid = || AppError::AuthError("Invalid username or password".to_string());
    let user = user.ok_or_else(invalid)?;

    if !verify_password(&payload.password, &user.password)? {
        return Err(invalid());
    }

    let token = sign_jwt(
        user.id,
        user.role,
        &config.jwt_secret,
        config.jwt_expiration,
    )?;

    Ok(Json(json!({
        "token": token,
        "type": "Bearer",
        "role": user.role,
    })))
}
