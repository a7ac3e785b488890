// src/handlers/enrollment.rs

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgExecutor, PgPool};
use validator::Validate;

use crate::{
    error::AppError,
    models::enrollment::{
        BulkEnrollmentRequest, BulkEnrollmentResult, EnrolledUser, Enrollment, EnrollmentAction,
    },
    utils::{
        jwt::Claims,
        ownership::{CatalogNode, ensure_owner, resolve},
    },
};

#[derive(sqlx::FromRow)]
struct EnrollOutcome {
    #[sqlx(flatten)]
    enrollment: Enrollment,
    created: bool,
}

/// Inserts the enrollment unless it already exists and returns the stored row.
///
/// The no-op update on conflict makes `RETURNING` yield the existing row too;
/// `xmax = 0` only holds for a freshly inserted tuple.
async fn enroll<'e, E>(
    executor: E,
    user_id: i64,
    program_id: i64,
    enrolled_by: i64,
) -> Result<EnrollOutcome, AppError>
where
    E: PgExecutor<'e>,
{
    let outcome = sqlx::query_as::<_, EnrollOutcome>(
        r#"
        INSERT INTO enrollments (user_id, program_id, enrolled_by)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, program_id) DO UPDATE SET user_id = EXCLUDED.user_id
        RETURNING *, (xmax = 0) AS created
        "#,
    )
    .bind(user_id)
    .bind(program_id)
    .bind(enrolled_by)
    .fetch_one(executor)
    .await?;

    Ok(outcome)
}

/// Removes the enrollment if present. A missing enrollment is not an error.
async fn unenroll<'e, E>(executor: E, user_id: i64, program_id: i64) -> Result<bool, AppError>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query("DELETE FROM enrollments WHERE user_id = $1 AND program_id = $2")
        .bind(user_id)
        .bind(program_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected() == 1)
}

/// Enrolls the caller. Idempotent: 201 when created, 200 when already enrolled.
pub async fn enroll_self(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(program_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    resolve(&pool, CatalogNode::Program(program_id)).await?;

    let EnrollOutcome { enrollment, created } = enroll(&pool, user_id, program_id, user_id).await?;

    let status = if created {
        tracing::info!(user_id, program_id, "Learner enrolled");
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(enrollment)))
}

/// Unenrolls the caller. Always 204 for an existing program.
pub async fn unenroll_self(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(program_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    resolve(&pool, CatalogNode::Program(program_id)).await?;

    if unenroll(&pool, user_id, program_id).await? {
        tracing::info!(user_id, program_id, "Learner unenrolled");
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Enrolls or unenrolls several users at once. Program owner only.
///
/// Unknown user ids are skipped, as are users already in the requested state.
pub async fn bulk_enrollment(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(program_id): Path<i64>,
    Json(payload): Json<BulkEnrollmentRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    ensure_owner(&pool, CatalogNode::Program(program_id), &claims).await?;
    let manager_id = claims.user_id()?;

    let mut user_ids = payload.user_ids.clone();
    user_ids.sort_unstable();
    user_ids.dedup();

    let affected = match payload.action {
        EnrollmentAction::Enroll => sqlx::query(
            r#"
            INSERT INTO enrollments (user_id, program_id, enrolled_by)
            SELECT u.id, $1, $2 FROM users u WHERE u.id = ANY($3)
            ON CONFLICT (user_id, program_id) DO NOTHING
            "#,
        )
        .bind(program_id)
        .bind(manager_id)
        .bind(&user_ids)
        .execute(&pool)
        .await?
        .rows_affected(),
        EnrollmentAction::Unenroll => sqlx::query(
            "DELETE FROM enrollments WHERE program_id = $1 AND user_id = ANY($2)",
        )
        .bind(program_id)
        .bind(&user_ids)
        .execute(&pool)
        .await?
        .rows_affected(),
    };

    tracing::info!(
        program_id,
        manager_id,
        action = ?payload.action,
        affected,
        "Bulk enrollment applied"
    );
    Ok(Json(BulkEnrollmentResult {
        requested: user_ids.len(),
        affected,
    }))
}

/// Enrolled learners of a program. Program owner only.
pub async fn list_enrollments(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(program_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    ensure_owner(&pool, CatalogNode::Program(program_id), &claims).await?;

    let roster = sqlx::query_as::<_, EnrolledUser>(
        r#"
        SELECT
            e.id AS enrollment_id, u.id AS user_id, u.username, u.department,
            e.enrolled_at, e.enrolled_by
        FROM enrollments e
        JOIN users u ON u.id = e.user_id
        WHERE e.program_id = $1
        ORDER BY u.username
        "#,
    )
    .bind(program_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(roster))
}
