// src/handlers/topics.rs

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
    models::topic::{CreateTopicRequest, Topic, UpdateTopicRequest},
    utils::{
        jwt::Claims,
        ownership::{CatalogNode, ensure_owner},
    },
};

/// Adds a topic to a program. Program owner only.
pub async fn create_topic(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(program_id): Path<i64>,
    Json(payload): Json<CreateTopicRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    ensure_owner(&pool, CatalogNode::Program(program_id), &claims).await?;

    let topic = sqlx::query_as::<_, Topic>(
        r#"
        INSERT INTO topics (program_id, title, description, sort_order)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(program_id)
    .bind(payload.title.trim())
    .bind(&payload.description)
    .bind(payload.sort_order)
    .fetch_one(&pool)
    .await?;

    Ok((StatusCode::CREATED, Json(topic)))
}

pub async fn update_topic(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateTopicRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    ensure_owner(&pool, CatalogNode::Topic(id), &claims).await?;

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE topics SET ");
    let mut separated = builder.separated(", ");
    // Keeps the statement valid when the body is empty.
    separated.push("id = id");
    if let Some(title) = &payload.title {
        separated.push("title = ");
        separated.push_bind_unseparated(title.trim().to_string());
    }
    if let Some(description) = &payload.description {
        separated.push("description = ");
        separated.push_bind_unseparated(description.clone());
    }
    if let Some(order) = payload.sort_order {
        separated.push("sort_order = ");
        separated.push_bind_unseparated(order);
    }
    builder.push(" WHERE id = ");
    builder.push_bind(id);
    builder.push(" RETURNING *");

    let topic = builder.build_query_as::<Topic>().fetch_one(&pool).await?;

    Ok(Json(topic))
}

/// Deletes a topic together with its lessons, quizzes and learner records.
pub async fn delete_topic(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    ensure_owner(&pool, CatalogNode::Topic(id), &claims).await?;

    let result = sqlx::query("DELETE FROM topics WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Topic not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
