// src/grading.rs

//! Submission evaluation and manual-grading rules for quiz responses.
//!
//! Lifecycle per (quiz, user): none → pending → graded. Multiple-choice answers
//! skip `pending` entirely; open answers wait for the program owner.

use chrono::{DateTime, Utc};

use crate::{
    error::AppError,
    models::{
        quiz::{Quiz, QuizChoice, QuizType},
        response::GradingStatus,
    },
};

pub const AUTO_GRADE_CORRECT: &str = "Auto-graded: correct answer.";
pub const AUTO_GRADE_INCORRECT: &str = "Auto-graded: incorrect answer.";

/// The grading columns of a freshly submitted response.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub selected_choice_id: Option<i64>,
    pub text_response: Option<String>,
    pub points_earned: Option<i32>,
    pub grading_status: GradingStatus,
    pub grading_comment: Option<String>,
    pub graded_at: Option<DateTime<Utc>>,
    pub graded_by: Option<i64>,
}

/// Turns a learner's answer into the row to insert.
///
/// `selected` must already be resolved from `selected_choice_id`; a choice from a
/// different quiz is rejected here.
pub fn evaluate_submission(
    quiz: &Quiz,
    selected: Option<&QuizChoice>,
    text_response: Option<&str>,
    system_grader: Option<i64>,
    now: DateTime<Utc>,
) -> Result<Evaluation, AppError> {
    match quiz.quiz_type {
        QuizType::Mcq => {
            let choice = selected.ok_or_else(|| {
                AppError::BadRequest("Please select a choice".to_string())
            })?;
            if choice.quiz_id != quiz.id {
                return Err(AppError::BadRequest(
                    "Selected choice does not belong to this quiz".to_string(),
                ));
            }

            let (points, comment) = if choice.is_correct {
                (quiz.points, AUTO_GRADE_CORRECT)
            } else {
                (0, AUTO_GRADE_INCORRECT)
            };

            Ok(Evaluation {
                selected_choice_id: Some(choice.id),
                text_response: None,
                points_earned: Some(points),
                grading_status: GradingStatus::Graded,
                grading_comment: Some(comment.to_string()),
                graded_at: Some(now),
                graded_by: system_grader,
            })
        }
        QuizType::Open => {
            let text = text_response
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .ok_or_else(|| AppError::BadRequest("Answer text is required".to_string()))?;

            Ok(Evaluation {
                selected_choice_id: None,
                text_response: Some(text.to_string()),
                points_earned: None,
                grading_status: GradingStatus::Pending,
                grading_comment: None,
                graded_at: None,
                graded_by: None,
            })
        }
    }
}

/// Checks a manager's score for an open response.
pub fn validate_manual_grade(quiz: &Quiz, points_earned: i32) -> Result<(), AppError> {
    if quiz.quiz_type == QuizType::Mcq {
        return Err(AppError::BadRequest(
            "Multiple-choice responses are graded automatically".to_string(),
        ));
    }
    if points_earned < 0 {
        return Err(AppError::BadRequest("Points cannot be negative".to_string()));
    }
    if points_earned > quiz.points {
        return Err(AppError::BadRequest(format!(
            "Points cannot exceed maximum points ({})",
            quiz.points
        )));
    }
    Ok(())
}

/// A quiz's maximum may not drop below a score that has already been awarded.
pub fn validate_points_change(new_points: i32, highest_awarded: Option<i32>) -> Result<(), AppError> {
    match highest_awarded {
        Some(awarded) if awarded > new_points => Err(AppError::BadRequest(format!(
            "A response already earned {} points; maximum cannot drop to {}",
            awarded, new_points
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SYSTEM: i64 = 1;

    fn quiz(quiz_type: QuizType, points: i32) -> Quiz {
        Quiz {
            id: 7,
            lesson_id: 3,
            title: "Check".to_string(),
            question: "Pick one".to_string(),
            quiz_type,
            points,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn choice(id: i64, quiz_id: i64, is_correct: bool) -> QuizChoice {
        QuizChoice {
            id,
            quiz_id,
            choice_text: format!("choice {}", id),
            is_correct,
        }
    }

    #[test]
    fn test_correct_mcq_earns_full_points() {
        let q = quiz(QuizType::Mcq, 10);
        let right = choice(1, 7, true);
        let now = Utc::now();

        let eval = evaluate_submission(&q, Some(&right), None, Some(SYSTEM), now).unwrap();
        assert_eq!(eval.points_earned, Some(10));
        assert_eq!(eval.grading_status, GradingStatus::Graded);
        assert_eq!(eval.graded_by, Some(SYSTEM));
        assert_eq!(eval.graded_at, Some(now));
        assert_eq!(eval.grading_comment.as_deref(), Some(AUTO_GRADE_CORRECT));
    }

    #[test]
    fn test_incorrect_mcq_earns_zero_but_is_graded() {
        let q = quiz(QuizType::Mcq, 10);
        let wrong = choice(2, 7, false);

        let eval = evaluate_submission(&q, Some(&wrong), None, None, Utc::now()).unwrap();
        assert_eq!(eval.points_earned, Some(0));
        assert_eq!(eval.grading_status, GradingStatus::Graded);
        assert_eq!(eval.graded_by, None);
        assert_eq!(eval.grading_comment.as_deref(), Some(AUTO_GRADE_INCORRECT));
    }

    #[test]
    fn test_mcq_rejects_missing_or_foreign_choice() {
        let q = quiz(QuizType::Mcq, 10);
        assert!(evaluate_submission(&q, None, None, None, Utc::now()).is_err());

        let foreign = choice(9, 8, true);
        assert!(matches!(
            evaluate_submission(&q, Some(&foreign), None, None, Utc::now()),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_open_answer_stays_pending() {
        let q = quiz(QuizType::Open, 10);
        let eval =
            evaluate_submission(&q, None, Some("  Because.  "), Some(SYSTEM), Utc::now()).unwrap();

        assert_eq!(eval.grading_status, GradingStatus::Pending);
        assert_eq!(eval.points_earned, None);
        assert_eq!(eval.graded_by, None);
        assert_eq!(eval.text_response.as_deref(), Some("Because."));
    }

    #[test]
    fn test_open_answer_requires_text() {
        let q = quiz(QuizType::Open, 10);
        assert!(evaluate_submission(&q, None, Some("   "), None, Utc::now()).is_err());
        assert!(evaluate_submission(&q, None, None, None, Utc::now()).is_err());
    }

    #[test]
    fn test_manual_grade_bounds() {
        let q = quiz(QuizType::Open, 10);
        assert!(validate_manual_grade(&q, 0).is_ok());
        assert!(validate_manual_grade(&q, 10).is_ok());
        assert!(validate_manual_grade(&q, 11).is_err());
        assert!(validate_manual_grade(&q, -1).is_err());
    }

    #[test]
    fn test_manual_grade_rejects_mcq() {
        let q = quiz(QuizType::Mcq, 10);
        assert!(validate_manual_grade(&q, 5).is_err());
    }

    #[test]
    fn test_points_change() {
        assert!(validate_points_change(5, None).is_ok());
        assert!(validate_points_change(5, Some(5)).is_ok());
        assert!(validate_points_change(5, Some(6)).is_err());
    }
}
