// src/handlers/responses.rs

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::{AppError, is_foreign_key_violation, is_unique_violation},
    grading::{evaluate_submission, validate_manual_grade},
    models::{
        quiz::{Quiz, QuizChoice},
        response::{GradeResponseRequest, QuizResponse, ResponseForReview, SubmitResponseRequest},
    },
    state::SystemGrader,
    utils::{
        jwt::Claims,
        ownership::{CatalogNode, ensure_enrolled, ensure_owner, resolve},
    },
};

const DUPLICATE_RESPONSE: &str = "You have already answered this quiz";

const REVIEW_SELECT: &str = r#"
    SELECT
        r.id, r.quiz_id, q.title AS quiz_title, q.points AS max_points,
        r.user_id, u.username,
        r.selected_choice_id, r.text_response, r.points_earned,
        r.grading_status, r.grading_comment, r.submitted_at, r.graded_at
    FROM quiz_responses r
    JOIN quizzes q ON q.id = r.quiz_id
    JOIN users u ON u.id = r.user_id
"#;

/// Submits the caller's answer to a quiz.
///
/// Multiple-choice answers are graded on the spot; open answers wait for the
/// program owner. A second submission is rejected with 409, both by the
/// pre-check and, for concurrent requests, by the (quiz, user) unique key.
pub async fn submit_response(
    State(pool): State<PgPool>,
    State(SystemGrader(system_grader)): State<SystemGrader>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
    Json(payload): Json<SubmitResponseRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let user_id = claims.user_id()?;

    let ownership = resolve(&pool, CatalogNode::Quiz(quiz_id)).await?;
    ensure_enrolled(&pool, user_id, ownership.program_id).await?;

    let already_answered = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM quiz_responses WHERE quiz_id = $1 AND user_id = $2)",
    )
    .bind(quiz_id)
    .bind(user_id)
    .fetch_one(&pool)
    .await?;
    if already_answered {
        return Err(AppError::Conflict(DUPLICATE_RESPONSE.to_string()));
    }

    let mut tx = pool.begin().await?;

    // Shared lock: points and choices stay fixed until the response is stored.
    let quiz = sqlx::query_as::<_, Quiz>("SELECT * FROM quizzes WHERE id = $1 FOR SHARE")
        .bind(quiz_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("Quiz not found".to_string()))?;

    let selected = match payload.selected_choice_id {
        Some(choice_id) => Some(
            sqlx::query_as::<_, QuizChoice>("SELECT * FROM quiz_choices WHERE id = $1")
                .bind(choice_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(AppError::BadRequest("Selected choice does not exist".to_string()))?,
        ),
        None => None,
    };

    let evaluation = evaluate_submission(
        &quiz,
        selected.as_ref(),
        payload.text_response.as_deref(),
        system_grader,
        Utc::now(),
    )?;

    let response = sqlx::query_as::<_, QuizResponse>(
        r#"
        INSERT INTO quiz_responses
            (quiz_id, user_id, selected_choice_id, text_response, points_earned,
             grading_status, grading_comment, graded_at, graded_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(quiz_id)
    .bind(user_id)
    .bind(evaluation.selected_choice_id)
    .bind(evaluation.text_response)
    .bind(evaluation.points_earned)
    .bind(evaluation.grading_status)
    .bind(evaluation.grading_comment)
    .bind(evaluation.graded_at)
    .bind(evaluation.graded_by)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict(DUPLICATE_RESPONSE.to_string())
        } else if is_foreign_key_violation(&e) {
            AppError::BadRequest("Selected choice does not exist".to_string())
        } else {
            tracing::error!("Failed to save quiz response: {:?}", e);
            AppError::InternalServerError(e.to_string())
        }
    })?;

    tx.commit().await?;

    tracing::info!(
        response_id = response.id,
        quiz_id,
        user_id,
        status = ?response.grading_status,
        "Quiz response submitted"
    );
    Ok((StatusCode::CREATED, Json(response)))
}

/// Grades (or re-grades) an open response. Program owner only.
///
/// Scores above the quiz maximum are rejected and leave the response untouched.
/// The quiz row is locked with the response so a concurrent points change
/// either sees this grade or is seen by it.
pub async fn grade_response(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<GradeResponseRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    ensure_owner(&pool, CatalogNode::Response(id), &claims).await?;
    let grader_id = claims.user_id()?;

    let mut tx = pool.begin().await?;

    let quiz = sqlx::query_as::<_, Quiz>(
        r#"
        SELECT q.*
        FROM quizzes q
        JOIN quiz_responses r ON r.quiz_id = q.id
        WHERE r.id = $1
        FOR UPDATE OF r, q
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("Response not found".to_string()))?;

    validate_manual_grade(&quiz, payload.points_earned)?;

    let comment = payload
        .comment
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());

    let response = sqlx::query_as::<_, QuizResponse>(
        r#"
        UPDATE quiz_responses
        SET points_earned = $1,
            grading_status = 'graded',
            grading_comment = $2,
            graded_at = NOW(),
            graded_by = $3
        WHERE id = $4
        RETURNING *
        "#,
    )
    .bind(payload.points_earned)
    .bind(comment)
    .bind(grader_id)
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(response_id = id, grader_id, points = payload.points_earned, "Response graded");
    Ok(Json(response))
}

/// All responses to one quiz. Program owner only.
pub async fn list_quiz_responses(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    ensure_owner(&pool, CatalogNode::Quiz(quiz_id), &claims).await?;

    let responses = sqlx::query_as::<_, ResponseForReview>(&format!(
        "{} WHERE r.quiz_id = $1 ORDER BY r.submitted_at",
        REVIEW_SELECT
    ))
    .bind(quiz_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(responses))
}

/// Open responses awaiting grading across every program the caller owns.
/// Manager only.
pub async fn list_pending_responses(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let responses = sqlx::query_as::<_, ResponseForReview>(&format!(
        r#"{}
        JOIN lessons l ON l.id = q.lesson_id
        JOIN topics t ON t.id = l.topic_id
        JOIN programs p ON p.id = t.program_id
        WHERE p.owner_id = $1 AND r.grading_status = 'pending'
        ORDER BY r.submitted_at"#,
        REVIEW_SELECT
    ))
    .bind(claims.user_id()?)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list pending responses: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(responses))
}
