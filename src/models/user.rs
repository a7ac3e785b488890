// src/models/user.rs

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Letters, digits, dot, dash and underscore.
static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]+$").expect("static regex"));

/// Mirrors the `user_role` Postgres enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Manager,
    Learner,
}

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,

    /// Unique username.
    pub username: String,

    /// Argon2 password hash.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password: String,

    /// Fixed once assigned.
    pub role: UserRole,

    /// Free-form department label; empty when unset.
    pub department: String,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for creating a new user (Registration).
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(
        length(
            min = 3,
            max = 50,
            message = "Username length must be between 3 and 50 characters."
        ),
        regex(path = *USERNAME_RE, message = "Username may only contain letters, digits, '.', '-' and '_'.")
    )]
    pub username: String,
    #[validate(length(
        min = 4,
        max = 128,
        message = "Password length must be between 4 and 128 characters."
    ))]
    pub password: String,
    #[validate(length(max = 100))]
    #[serde(default)]
    pub department: String,
}

/// DTO for user login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 50))]
    pub username: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// DTO for a manager creating an account with an explicit role.
#[derive(Debug, Deserialize, Validate)]
pub struct ManagerCreateUserRequest {
    #[validate(nested)]
    #[serde(flatten)]
    pub account: CreateUserRequest,
    pub role: UserRole,
}

/// DTO for updating one's own profile. Role is deliberately absent.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(max = 100))]
    pub department: Option<String>,
    #[validate(length(min = 4, max = 128))]
    pub password: Option<String>,
}

/// Query parameters for the manager's user directory.
#[derive(Debug, Deserialize)]
pub struct UserListParams {
    /// Substring match on username.
    pub search: Option<String>,
    pub department: Option<String>,
    pub role: Option<UserRole>,
}
