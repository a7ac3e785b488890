// src/handlers/progress.rs

use axum::{
    Json,
    extract::{Extension, Path, State},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use crate::{
    aggregation::{ProgramActivity, Scope, load_activity, round1},
    error::AppError,
    models::{enrollment::EnrollmentProgress, progress::LessonProgress},
    utils::{
        jwt::Claims,
        ownership::{CatalogNode, ensure_enrolled, ensure_owner, resolve},
    },
};

#[derive(FromRow)]
struct EnrollmentRow {
    enrollment_id: i64,
    program_id: i64,
    program_title: String,
    user_id: i64,
    username: String,
    enrolled_at: DateTime<Utc>,
}

fn enrollment_progress(activity: &ProgramActivity, row: EnrollmentRow) -> EnrollmentProgress {
    EnrollmentProgress {
        completed_lessons: activity.completed_lessons(Scope::Program, row.user_id),
        total_lessons: activity.lesson_count(Scope::Program),
        progress_percentage: round1(activity.program_completion_rate(Some(row.user_id))),
        status: activity.status_for(row.user_id),
        enrollment_id: row.enrollment_id,
        program_id: row.program_id,
        program_title: row.program_title,
        user_id: row.user_id,
        username: row.username,
        enrolled_at: row.enrolled_at,
    }
}

const ENROLLMENT_SELECT: &str = r#"
    SELECT
        e.id AS enrollment_id, p.id AS program_id, p.title AS program_title,
        u.id AS user_id, u.username, e.enrolled_at
    FROM enrollments e
    JOIN programs p ON p.id = e.program_id
    JOIN users u ON u.id = e.user_id
"#;

/// Marks a lesson complete for the caller.
///
/// Repeating the call is harmless: the first completion time is kept.
pub async fn complete_lesson(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(lesson_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let ownership = resolve(&pool, CatalogNode::Lesson(lesson_id)).await?;
    ensure_enrolled(&pool, user_id, ownership.program_id).await?;

    let progress = sqlx::query_as::<_, LessonProgress>(
        r#"
        INSERT INTO lesson_progress (user_id, lesson_id, completed, completed_at)
        VALUES ($1, $2, TRUE, NOW())
        ON CONFLICT (user_id, lesson_id) DO UPDATE
        SET completed = TRUE,
            completed_at = COALESCE(lesson_progress.completed_at, EXCLUDED.completed_at)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(lesson_id)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to record lesson progress: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(progress))
}

/// The caller's progress in every program they are enrolled in.
pub async fn my_progress(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let rows = sqlx::query_as::<_, EnrollmentRow>(&format!(
        "{} WHERE e.user_id = $1 ORDER BY e.enrolled_at DESC",
        ENROLLMENT_SELECT
    ))
    .bind(claims.user_id()?)
    .fetch_all(&pool)
    .await?;

    let mut progress = Vec::with_capacity(rows.len());
    for row in rows {
        let activity = load_activity(&pool, row.program_id).await?;
        progress.push(enrollment_progress(&activity, row));
    }

    Ok(Json(progress))
}

/// Progress of every learner enrolled in a program. Program owner only.
pub async fn program_progress(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(program_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    ensure_owner(&pool, CatalogNode::Program(program_id), &claims).await?;

    let activity = load_activity(&pool, program_id).await?;
    let rows = sqlx::query_as::<_, EnrollmentRow>(&format!(
        "{} WHERE e.program_id = $1 ORDER BY u.username",
        ENROLLMENT_SELECT
    ))
    .bind(program_id)
    .fetch_all(&pool)
    .await?;

    let progress: Vec<EnrollmentProgress> = rows
        .into_iter()
        .map(|row| enrollment_progress(&activity, row))
        .collect();

    Ok(Json(progress))
}
