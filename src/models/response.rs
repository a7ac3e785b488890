// src/models/response.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Mirrors the `grading_status` Postgres enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "grading_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum GradingStatus {
    Pending,
    Graded,
}

/// Represents the 'quiz_responses' table in the database.
///
/// One row per (quiz, user). `points_earned` is NULL exactly while the
/// response is pending.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizResponse {
    pub id: i64,
    pub quiz_id: i64,
    pub user_id: i64,
    pub selected_choice_id: Option<i64>,
    pub text_response: Option<String>,
    pub points_earned: Option<i32>,
    pub grading_status: GradingStatus,
    pub grading_comment: Option<String>,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
    pub graded_at: Option<chrono::DateTime<chrono::Utc>>,
    pub graded_by: Option<i64>,
}

/// Response joined with quiz and learner info, for the owner's review lists.
#[derive(Debug, Serialize, FromRow)]
pub struct ResponseForReview {
    pub id: i64,
    pub quiz_id: i64,
    pub quiz_title: String,
    pub max_points: i32,
    pub user_id: i64,
    pub username: String,
    pub selected_choice_id: Option<i64>,
    pub text_response: Option<String>,
    pub points_earned: Option<i32>,
    pub grading_status: GradingStatus,
    pub grading_comment: Option<String>,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
    pub graded_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for submitting an answer to a quiz.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitResponseRequest {
    /// Required for multiple-choice quizzes.
    pub selected_choice_id: Option<i64>,

    /// Required for open questions.
    #[validate(length(max = 20000))]
    pub text_response: Option<String>,
}

/// DTO for grading an open response.
#[derive(Debug, Deserialize, Validate)]
pub struct GradeResponseRequest {
    #[validate(range(min = 0))]
    pub points_earned: i32,
    #[validate(length(max = 5000))]
    pub comment: Option<String>,
}
