// src/handlers/programs.rs

use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    aggregation::{ProgressStatus, load_activity},
    error::AppError,
    models::{
        lesson::LessonOutline,
        program::{
            CreateProgramRequest, Program, ProgramDetail, ProgramListItem, ProgramListParams,
            TopicOutline, UpdateProgramRequest,
        },
        topic::Topic,
    },
    utils::{
        jwt::Claims,
        ownership::{CatalogNode, ensure_owner, is_enrolled},
    },
};

/// Lists programs with search, creator and sort options.
///
/// For the caller's enrolled programs `completion_rate` is filled in; the
/// `progress` filter keeps only programs in that state for the caller.
pub async fn list_programs(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<ProgramListParams>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
        r#"
        SELECT
            p.id, p.title, p.description, p.owner_id,
            u.username AS owner_username, p.created_at,
            EXISTS(
                SELECT 1 FROM enrollments e WHERE e.program_id = p.id AND e.user_id = "#,
    );
    builder.push_bind(user_id);
    builder.push(
        r#"
            ) AS is_enrolled,
            (
                SELECT COUNT(*)
                FROM quizzes q
                JOIN lessons l ON l.id = q.lesson_id
                JOIN topics t ON t.id = l.topic_id
                WHERE t.program_id = p.id
                  AND NOT EXISTS(
                      SELECT 1 FROM quiz_responses r WHERE r.quiz_id = q.id AND r.user_id = "#,
    );
    builder.push_bind(user_id);
    builder.push(
        r#"
                  )
            ) AS pending_quizzes
        FROM programs p
        JOIN users u ON u.id = p.owner_id
        WHERE 1 = 1"#,
    );

    if let Some(search) = params.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        builder.push(" AND (p.title ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR p.description ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR u.username ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
    if let Some(creator) = params.creator {
        builder.push(" AND p.owner_id = ");
        builder.push_bind(creator);
    }
    match params.sort.as_deref() {
        Some("oldest") => builder.push(" ORDER BY p.created_at ASC, p.id ASC"),
        _ => builder.push(" ORDER BY p.created_at DESC, p.id DESC"),
    };

    let rows = builder
        .build_query_as::<ProgramListItem>()
        .fetch_all(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list programs: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    let mut programs = Vec::with_capacity(rows.len());
    for mut item in rows {
        let status = if item.is_enrolled {
            let activity = load_activity(&pool, item.id).await?;
            item.completion_rate = activity.program_completion_rate(Some(user_id));
            activity.status_for(user_id)
        } else {
            ProgressStatus::NotStarted
        };
        if claims.is_manager() {
            item.pending_quizzes = 0;
        }
        if params.progress.is_none_or(|wanted| wanted == status) {
            programs.push(item);
        }
    }

    Ok(Json(programs))
}

/// Returns the program outline: topics and lessons in display order.
pub async fn get_program(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let program = sqlx::query_as::<_, Program>("SELECT * FROM programs WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Program not found".to_string()))?;

    let topics = sqlx::query_as::<_, Topic>(
        "SELECT * FROM topics WHERE program_id = $1 ORDER BY sort_order, id",
    )
    .bind(id)
    .fetch_all(&pool)
    .await?;

    let is_owner = program.owner_id == user_id;

    let mut lessons = sqlx::query_as::<_, LessonOutline>(
        r#"
        SELECT
            l.id, l.topic_id, l.title, l.sort_order,
            (SELECT COUNT(*) FROM quizzes q WHERE q.lesson_id = l.id) AS total_quizzes,
            (
                SELECT COUNT(*) FROM quizzes q
                WHERE q.lesson_id = l.id
                  AND NOT EXISTS(
                      SELECT 1 FROM quiz_responses r WHERE r.quiz_id = q.id AND r.user_id = $2
                  )
            ) AS pending_quizzes,
            COALESCE(
                (SELECT lp.completed FROM lesson_progress lp
                 WHERE lp.lesson_id = l.id AND lp.user_id = $2),
                FALSE
            ) AS completed
        FROM lessons l
        JOIN topics t ON t.id = l.topic_id
        WHERE t.program_id = $1
        ORDER BY l.sort_order, l.id
        "#,
    )
    .bind(id)
    .bind(user_id)
    .fetch_all(&pool)
    .await?;

    if claims.is_manager() {
        lessons.iter_mut().for_each(|l| l.pending_quizzes = 0);
    }

    let mut outline: Vec<TopicOutline> = topics
        .into_iter()
        .map(|topic| TopicOutline {
            topic,
            lessons: Vec::new(),
        })
        .collect();
    for lesson in lessons {
        if let Some(entry) = outline.iter_mut().find(|t| t.topic.id == lesson.topic_id) {
            entry.lessons.push(lesson);
        }
    }

    Ok(Json(ProgramDetail {
        is_enrolled: is_enrolled(&pool, user_id, id).await?,
        is_owner,
        program,
        topics: outline,
    }))
}

/// Creates a program owned by the calling manager.
pub async fn create_program(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateProgramRequest>,
) -> Result<impl IntoResponse, AppError> {
    if !claims.is_manager() {
        return Err(AppError::Forbidden(
            "Only managers can create programs".to_string(),
        ));
    }
    payload.validate()?;

    let program = sqlx::query_as::<_, Program>(
        r#"
        INSERT INTO programs (title, description, owner_id)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(payload.title.trim())
    .bind(&payload.description)
    .bind(claims.user_id()?)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create program: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    tracing::info!(program_id = program.id, "Program created");
    Ok((StatusCode::CREATED, Json(program)))
}

/// Updates a program's title and/or description. Owner only.
pub async fn update_program(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateProgramRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    ensure_owner(&pool, CatalogNode::Program(id), &claims).await?;

    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("UPDATE programs SET updated_at = NOW()");
    if let Some(title) = &payload.title {
        builder.push(", title = ");
        builder.push_bind(title.trim().to_string());
    }
    if let Some(description) = &payload.description {
        builder.push(", description = ");
        builder.push_bind(description.clone());
    }
    builder.push(" WHERE id = ");
    builder.push_bind(id);
    builder.push(" RETURNING *");

    let program = builder
        .build_query_as::<Program>()
        .fetch_one(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update program: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok(Json(program))
}

/// Deletes a program and, through cascading keys, everything under it.
/// Owner only.
pub async fn delete_program(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    ensure_owner(&pool, CatalogNode::Program(id), &claims).await?;

    let result = sqlx::query("DELETE FROM programs WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete program: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Program not found".to_string()));
    }

    tracing::info!(program_id = id, "Program deleted");
    Ok(StatusCode::NO_CONTENT)
}
