// src/handlers/lessons.rs

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        lesson::{CreateLessonRequest, Lesson, LessonDetail, LessonLink, UpdateLessonRequest},
        quiz::{PublicChoice, PublicQuiz, Quiz, QuizChoice},
        response::{GradingStatus, QuizResponse},
    },
    utils::{
        content::sanitize_lesson_content,
        jwt::Claims,
        ownership::{CatalogNode, ensure_enrolled, ensure_owner, resolve},
    },
};

/// Empty strings clear the video link.
fn normalize_video_url(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Adds a lesson to a topic. Program owner only; content is sanitized first.
pub async fn create_lesson(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(topic_id): Path<i64>,
    Json(payload): Json<CreateLessonRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    ensure_owner(&pool, CatalogNode::Topic(topic_id), &claims).await?;

    let lesson = sqlx::query_as::<_, Lesson>(
        r#"
        INSERT INTO lessons (topic_id, title, content, video_url, sort_order)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(topic_id)
    .bind(payload.title.trim())
    .bind(sanitize_lesson_content(&payload.content))
    .bind(normalize_video_url(payload.video_url.as_deref()))
    .bind(payload.sort_order)
    .fetch_one(&pool)
    .await?;

    Ok((StatusCode::CREATED, Json(lesson)))
}

/// Lesson page for the owner or an enrolled learner.
///
/// Includes the quizzes without their answer key, the caller's responses split
/// by grading state, and links to the neighbouring lessons of the program.
pub async fn get_lesson(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let ownership = resolve(&pool, CatalogNode::Lesson(id)).await?;
    let is_owner = ownership.owner_id == user_id;
    if !is_owner {
        ensure_enrolled(&pool, user_id, ownership.program_id).await?;
    }

    let lesson = sqlx::query_as::<_, Lesson>("SELECT * FROM lessons WHERE id = $1")
        .bind(id)
        .fetch_one(&pool)
        .await?;

    let quizzes = sqlx::query_as::<_, Quiz>("SELECT * FROM quizzes WHERE lesson_id = $1 ORDER BY id")
        .bind(id)
        .fetch_all(&pool)
        .await?;

    let choices = sqlx::query_as::<_, QuizChoice>(
        r#"
        SELECT c.*
        FROM quiz_choices c
        JOIN quizzes q ON q.id = c.quiz_id
        WHERE q.lesson_id = $1
        ORDER BY c.id
        "#,
    )
    .bind(id)
    .fetch_all(&pool)
    .await?;

    let responses = sqlx::query_as::<_, QuizResponse>(
        r#"
        SELECT r.*
        FROM quiz_responses r
        JOIN quizzes q ON q.id = r.quiz_id
        WHERE q.lesson_id = $1 AND r.user_id = $2
        ORDER BY r.submitted_at
        "#,
    )
    .bind(id)
    .bind(user_id)
    .fetch_all(&pool)
    .await?;

    let completed = sqlx::query_scalar::<_, bool>(
        "SELECT COALESCE((SELECT completed FROM lesson_progress WHERE lesson_id = $1 AND user_id = $2), FALSE)",
    )
    .bind(id)
    .bind(user_id)
    .fetch_one(&pool)
    .await?;

    // Every lesson of the program in reading order, for prev/next links.
    let sequence = sqlx::query_as::<_, LessonLink>(
        r#"
        SELECT l.id, l.title
        FROM lessons l
        JOIN topics t ON t.id = l.topic_id
        WHERE t.program_id = $1
        ORDER BY t.sort_order, t.id, l.sort_order, l.id
        "#,
    )
    .bind(ownership.program_id)
    .fetch_all(&pool)
    .await?;

    let position = sequence.iter().position(|l| l.id == id);
    let previous_lesson = position
        .and_then(|i| i.checked_sub(1))
        .and_then(|i| sequence.get(i).cloned());
    let next_lesson = position.and_then(|i| sequence.get(i + 1).cloned());

    let pending_quizzes = quizzes
        .iter()
        .filter(|q| !responses.iter().any(|r| r.quiz_id == q.id))
        .map(|q| q.id)
        .collect();

    let (waiting_for_grading, graded_responses): (Vec<_>, Vec<_>) = responses
        .into_iter()
        .partition(|r| r.grading_status == GradingStatus::Pending);

    let quizzes = quizzes
        .into_iter()
        .map(|quiz| PublicQuiz {
            choices: choices
                .iter()
                .filter(|c| c.quiz_id == quiz.id)
                .map(|c| PublicChoice {
                    id: c.id,
                    choice_text: c.choice_text.clone(),
                })
                .collect(),
            id: quiz.id,
            title: quiz.title,
            question: quiz.question,
            quiz_type: quiz.quiz_type,
            points: quiz.points,
        })
        .collect();

    Ok(Json(LessonDetail {
        lesson,
        program_id: ownership.program_id,
        is_owner,
        completed,
        quizzes,
        pending_quizzes,
        waiting_for_grading,
        graded_responses,
        previous_lesson,
        next_lesson,
    }))
}

pub async fn update_lesson(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateLessonRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    ensure_owner(&pool, CatalogNode::Lesson(id), &claims).await?;

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE lessons SET ");
    let mut separated = builder.separated(", ");
    separated.push("id = id");
    if let Some(title) = &payload.title {
        separated.push("title = ");
        separated.push_bind_unseparated(title.trim().to_string());
    }
    if let Some(content) = &payload.content {
        separated.push("content = ");
        separated.push_bind_unseparated(sanitize_lesson_content(content));
    }
    if payload.video_url.is_some() {
        separated.push("video_url = ");
        separated.push_bind_unseparated(normalize_video_url(payload.video_url.as_deref()));
    }
    if let Some(order) = payload.sort_order {
        separated.push("sort_order = ");
        separated.push_bind_unseparated(order);
    }
    builder.push(" WHERE id = ");
    builder.push_bind(id);
    builder.push(" RETURNING *");

    let lesson = builder
        .build_query_as::<Lesson>()
        .fetch_one(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update lesson: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok(Json(lesson))
}

pub async fn delete_lesson(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    ensure_owner(&pool, CatalogNode::Lesson(id), &claims).await?;

    let result = sqlx::query("DELETE FROM lessons WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Lesson not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
