// src/models/program.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::{
    aggregation::ProgressStatus,
    models::{lesson::LessonOutline, topic::Topic},
};

/// Represents the 'programs' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Program {
    pub id: i64,
    pub title: String,
    pub description: String,

    /// The manager who authored the program and owns its whole subtree.
    pub owner_id: i64,

    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Catalog listing row, joined with the owner's username and the caller's enrollment.
#[derive(Debug, Serialize, FromRow)]
pub struct ProgramListItem {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub owner_id: i64,
    pub owner_username: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub is_enrolled: bool,
    /// Quizzes in the program the caller has not answered yet.
    pub pending_quizzes: i64,
    /// The caller's lesson completion percentage; filled in after the query.
    #[sqlx(skip)]
    pub completion_rate: f64,
}

/// DTO for creating a new program.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateProgramRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 20000))]
    pub description: String,
}

/// DTO for updating a program. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProgramRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 20000))]
    pub description: Option<String>,
}

/// Query parameters for listing programs.
#[derive(Debug, Deserialize)]
pub struct ProgramListParams {
    /// Case-insensitive match on title, description or creator username.
    pub search: Option<String>,

    /// Restrict to programs created by this manager.
    pub creator: Option<i64>,

    /// 'newest' (default) or 'oldest'.
    pub sort: Option<String>,

    /// Learner view only: keep programs in this state for the caller.
    pub progress: Option<ProgressStatus>,
}

/// Full program outline: topics in order, each with its lessons.
#[derive(Debug, Serialize)]
pub struct ProgramDetail {
    #[serde(flatten)]
    pub program: Program,
    pub is_owner: bool,
    pub is_enrolled: bool,
    pub topics: Vec<TopicOutline>,
}

#[derive(Debug, Serialize)]
pub struct TopicOutline {
    #[serde(flatten)]
    pub topic: Topic,
    pub lessons: Vec<LessonOutline>,
}
