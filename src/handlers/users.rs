// src/handlers/users.rs

use axum::{
    Json,
    extract::{Extension, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    error::AppError,
    handlers::auth::insert_user,
    models::user::{ManagerCreateUserRequest, UpdateProfileRequest, User, UserListParams},
    utils::{jwt::Claims, password::hash_password},
};

const USER_COLUMNS: &str = "id, username, password, role, department, created_at";

/// Returns the caller's own profile.
pub async fn get_me(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE id = $1",
        USER_COLUMNS
    ))
    .bind(claims.user_id()?)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}

/// Updates the caller's department and/or password. The role cannot be changed here.
pub async fn update_me(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let user_id = claims.user_id()?;

    if payload.department.is_none() && payload.password.is_none() {
        return Err(AppError::BadRequest("Nothing to update".to_string()));
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE users SET ");
    let mut separated = builder.separated(", ");

    if let Some(department) = &payload.department {
        separated.push("department = ");
        separated.push_bind_unseparated(department.trim().to_string());
    }
    if let Some(password) = &payload.password {
        separated.push("password = ");
        separated.push_bind_unseparated(hash_password(password)?);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(user_id);
    builder.push(format!(" RETURNING {}", USER_COLUMNS));

    let user = builder
        .build_query_as::<User>()
        .fetch_optional(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update profile: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}

/// Lists users, optionally filtered by username substring, department and role.
/// Manager only.
pub async fn list_users(
    State(pool): State<PgPool>,
    Query(params): Query<UserListParams>,
) -> Result<impl IntoResponse, AppError> {
    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT {} FROM users WHERE 1 = 1", USER_COLUMNS));

    if let Some(search) = params.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        builder.push(" AND username ILIKE ");
        builder.push_bind(format!("%{}%", search));
    }
    if let Some(department) = params.department.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        builder.push(" AND department = ");
        builder.push_bind(department.to_string());
    }
    if let Some(role) = params.role {
        builder.push(" AND role = ");
        builder.push_bind(role);
    }
    builder.push(" ORDER BY username");

    let users = builder
        .build_query_as::<User>()
        .fetch_all(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list users: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok(Json(users))
}

/// Creates an account with an explicit role.
/// Manager only.
pub async fn create_user(
    State(pool): State<PgPool>,
    Json(payload): Json<ManagerCreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = insert_user(&pool, &payload.account, payload.role).await?;
    tracing::info!(user_id = user.id, role = ?user.role, "Manager created user {}", user.username);

    Ok((StatusCode::CREATED, Json(user)))
}
