// src/models/quiz.rs

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::error::AppError;

/// Mirrors the `quiz_type` Postgres enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "quiz_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum QuizType {
    /// Multiple choice, graded automatically on submission.
    Mcq,
    /// Free-text answer, graded by the program owner.
    Open,
}

/// Represents the 'quizzes' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,
    pub lesson_id: i64,
    pub title: String,
    pub question: String,
    pub quiz_type: QuizType,

    /// Maximum points for this question. Always positive.
    pub points: i32,

    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Represents the 'quiz_choices' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizChoice {
    pub id: i64,
    pub quiz_id: i64,
    pub choice_text: String,
    pub is_correct: bool,
}

/// Choice as shown to learners (the answer key is hidden).
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PublicChoice {
    pub id: i64,
    pub choice_text: String,
}

/// Quiz as shown to learners.
#[derive(Debug, Serialize)]
pub struct PublicQuiz {
    pub id: i64,
    pub title: String,
    pub question: String,
    pub quiz_type: QuizType,
    pub points: i32,
    pub choices: Vec<PublicChoice>,
}

/// Quiz with its full answer key, for the owning manager.
#[derive(Debug, Serialize)]
pub struct QuizWithChoices {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub choices: Vec<QuizChoice>,
}

/// One choice submitted alongside a multiple-choice quiz.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ChoiceInput {
    #[validate(length(min = 1, max = 200))]
    pub choice_text: String,
    #[serde(default)]
    pub is_correct: bool,
}

/// DTO for creating a quiz; MCQ choices are persisted in the same transaction.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 5000))]
    pub question: String,
    pub quiz_type: QuizType,
    #[validate(range(min = 1, max = 1000))]
    #[serde(default = "default_points")]
    pub points: i32,
    #[validate(nested)]
    #[serde(default)]
    pub choices: Vec<ChoiceInput>,
}

fn default_points() -> i32 {
    10
}

/// DTO for updating a quiz. Type is fixed at creation.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 5000))]
    pub question: Option<String>,
    #[validate(range(min = 1, max = 1000))]
    pub points: Option<i32>,
    /// Replaces the whole choice set (MCQ only, and only before any response exists).
    #[validate(nested)]
    pub choices: Option<Vec<ChoiceInput>>,
}

/// Checks a submitted choice set against the quiz type.
///
/// MCQ: at least one choice, at least one marked correct, no repeated text.
/// Open: no choices at all.
pub fn check_choice_set(quiz_type: QuizType, choices: &[ChoiceInput]) -> Result<(), AppError> {
    match quiz_type {
        QuizType::Open => {
            if !choices.is_empty() {
                return Err(AppError::BadRequest(
                    "Open questions do not take choices".to_string(),
                ));
            }
        }
        QuizType::Mcq => {
            if choices.is_empty() {
                return Err(AppError::BadRequest(
                    "Multiple-choice quizzes need at least one choice".to_string(),
                ));
            }
            if !choices.iter().any(|c| c.is_correct) {
                return Err(AppError::BadRequest(
                    "Please mark at least one choice as correct".to_string(),
                ));
            }
            let mut seen = HashSet::new();
            for choice in choices {
                if choice.choice_text.trim().is_empty() {
                    return Err(AppError::BadRequest(
                        "Choice text cannot be blank".to_string(),
                    ));
                }
                if !seen.insert(choice.choice_text.trim()) {
                    return Err(AppError::BadRequest(format!(
                        "Duplicate choice '{}'",
                        choice.choice_text.trim()
                    )));
                }
            }
        }
    }
    Ok(())
}
