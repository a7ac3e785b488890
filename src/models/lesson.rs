// src/models/lesson.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::{
    models::{quiz::PublicQuiz, response::QuizResponse},
    utils::content::validate_video_url,
};

/// Represents the 'lessons' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Lesson {
    pub id: i64,
    pub topic_id: i64,
    pub title: String,

    /// Sanitized HTML body.
    pub content: String,

    pub video_url: Option<String>,

    #[serde(rename = "order")]
    pub sort_order: i32,
}

/// Lesson entry inside a program outline.
#[derive(Debug, Serialize, FromRow)]
pub struct LessonOutline {
    pub id: i64,
    #[serde(skip)]
    pub topic_id: i64,
    pub title: String,
    #[serde(rename = "order")]
    pub sort_order: i32,
    pub total_quizzes: i64,
    /// Quizzes the caller has not answered; always 0 for managers.
    pub pending_quizzes: i64,
    pub completed: bool,
}

/// Reference to a neighbouring lesson for prev/next navigation.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LessonLink {
    pub id: i64,
    pub title: String,
}

/// Lesson page: the lesson, its quizzes and the caller's standing on each.
#[derive(Debug, Serialize)]
pub struct LessonDetail {
    #[serde(flatten)]
    pub lesson: Lesson,
    pub program_id: i64,
    pub is_owner: bool,
    pub completed: bool,
    pub quizzes: Vec<PublicQuiz>,
    /// Quizzes without a response from the caller.
    pub pending_quizzes: Vec<i64>,
    /// Open-question responses still waiting for a manager.
    pub waiting_for_grading: Vec<QuizResponse>,
    pub graded_responses: Vec<QuizResponse>,
    pub previous_lesson: Option<LessonLink>,
    pub next_lesson: Option<LessonLink>,
}

/// DTO for creating a new lesson.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateLessonRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 100000))]
    pub content: String,
    #[validate(length(max = 500), custom(function = validate_video_url))]
    pub video_url: Option<String>,
    #[serde(default, rename = "order")]
    pub sort_order: i32,
}

/// DTO for updating a lesson. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateLessonRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 100000))]
    pub content: Option<String>,
    #[validate(length(max = 500), custom(function = validate_video_url))]
    pub video_url: Option<String>,
    #[serde(rename = "order")]
    pub sort_order: Option<i32>,
}
