// src/models/progress.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'lesson_progress' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LessonProgress {
    pub id: i64,
    pub user_id: i64,
    pub lesson_id: i64,
    pub completed: bool,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}
