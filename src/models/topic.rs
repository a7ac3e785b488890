// src/models/topic.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'topics' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Topic {
    pub id: i64,
    pub program_id: i64,
    pub title: String,
    pub description: String,

    /// Display position within the program. Not unique; ties fall back to id.
    #[serde(rename = "order")]
    pub sort_order: i32,
}

/// DTO for creating a new topic.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTopicRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 20000))]
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "order")]
    pub sort_order: i32,
}

/// DTO for updating a topic. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTopicRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 20000))]
    pub description: Option<String>,
    #[serde(rename = "order")]
    pub sort_order: Option<i32>,
}
