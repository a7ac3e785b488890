// src/handlers/quizzes.rs

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    error::{AppError, is_unique_violation},
    grading::validate_points_change,
    models::quiz::{
        ChoiceInput, CreateQuizRequest, PublicChoice, PublicQuiz, Quiz, QuizChoice,
        QuizWithChoices, UpdateQuizRequest, check_choice_set,
    },
    utils::{
        jwt::Claims,
        ownership::{CatalogNode, ensure_enrolled, ensure_owner, resolve},
    },
};

/// Inserts a choice set inside the caller's transaction.
async fn insert_choices(
    conn: &mut PgConnection,
    quiz_id: i64,
    choices: &[ChoiceInput],
) -> Result<Vec<QuizChoice>, AppError> {
    let mut saved = Vec::with_capacity(choices.len());
    for choice in choices {
        let row = sqlx::query_as::<_, QuizChoice>(
            r#"
            INSERT INTO quiz_choices (quiz_id, choice_text, is_correct)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(quiz_id)
        .bind(choice.choice_text.trim())
        .bind(choice.is_correct)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::BadRequest(format!("Duplicate choice '{}'", choice.choice_text.trim()))
            } else {
                AppError::from(e)
            }
        })?;
        saved.push(row);
    }
    Ok(saved)
}

async fn fetch_choices(pool: &PgPool, quiz_id: i64) -> Result<Vec<QuizChoice>, AppError> {
    let choices = sqlx::query_as::<_, QuizChoice>(
        "SELECT * FROM quiz_choices WHERE quiz_id = $1 ORDER BY id",
    )
    .bind(quiz_id)
    .fetch_all(pool)
    .await?;
    Ok(choices)
}

/// Creates a quiz and, for multiple-choice, its choices in one transaction.
///
/// The choice set is validated before anything is written, so a rejected
/// request leaves neither a quiz nor stray choices behind.
pub async fn create_quiz(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(lesson_id): Path<i64>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    check_choice_set(payload.quiz_type, &payload.choices)?;
    ensure_owner(&pool, CatalogNode::Lesson(lesson_id), &claims).await?;

    let mut tx = pool.begin().await?;

    let quiz = sqlx::query_as::<_, Quiz>(
        r#"
        INSERT INTO quizzes (lesson_id, title, question, quiz_type, points)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(lesson_id)
    .bind(payload.title.trim())
    .bind(&payload.question)
    .bind(payload.quiz_type)
    .bind(payload.points)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create quiz: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let choices = insert_choices(&mut tx, quiz.id, &payload.choices).await?;

    tx.commit().await?;

    tracing::info!(quiz_id = quiz.id, lesson_id, "Quiz created");
    Ok((StatusCode::CREATED, Json(QuizWithChoices { quiz, choices })))
}

/// Returns a quiz. The owner sees the answer key; enrolled learners do not.
pub async fn get_quiz(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let ownership = resolve(&pool, CatalogNode::Quiz(id)).await?;

    let quiz = sqlx::query_as::<_, Quiz>("SELECT * FROM quizzes WHERE id = $1")
        .bind(id)
        .fetch_one(&pool)
        .await?;
    let choices = fetch_choices(&pool, id).await?;

    if ownership.owner_id == user_id {
        return Ok(Json(serde_json::to_value(QuizWithChoices { quiz, choices })?));
    }

    ensure_enrolled(&pool, user_id, ownership.program_id).await?;
    let public = PublicQuiz {
        id: quiz.id,
        title: quiz.title,
        question: quiz.question,
        quiz_type: quiz.quiz_type,
        points: quiz.points,
        choices: choices
            .into_iter()
            .map(|c| PublicChoice {
                id: c.id,
                choice_text: c.choice_text,
            })
            .collect(),
    };
    Ok(Json(serde_json::to_value(public)?))
}

/// Updates title, question, points and (MCQ only) the choice set.
///
/// Points may not drop below a score already awarded. Choices can only be
/// replaced while nobody has answered the quiz.
pub async fn update_quiz(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    ensure_owner(&pool, CatalogNode::Quiz(id), &claims).await?;

    let mut tx = pool.begin().await?;

    let current = sqlx::query_as::<_, Quiz>("SELECT * FROM quizzes WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("Quiz not found".to_string()))?;

    if let Some(points) = payload.points {
        let highest = sqlx::query_scalar::<_, Option<i32>>(
            "SELECT MAX(points_earned) FROM quiz_responses WHERE quiz_id = $1",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        validate_points_change(points, highest)?;
    }

    if let Some(choices) = &payload.choices {
        check_choice_set(current.quiz_type, choices)?;

        let responses = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM quiz_responses WHERE quiz_id = $1",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if responses > 0 {
            return Err(AppError::Conflict(
                "Choices cannot be replaced after learners have answered".to_string(),
            ));
        }

        sqlx::query("DELETE FROM quiz_choices WHERE quiz_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        insert_choices(&mut tx, id, choices).await?;
    }

    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("UPDATE quizzes SET updated_at = NOW()");
    if let Some(title) = &payload.title {
        builder.push(", title = ");
        builder.push_bind(title.trim().to_string());
    }
    if let Some(question) = &payload.question {
        builder.push(", question = ");
        builder.push_bind(question.clone());
    }
    if let Some(points) = payload.points {
        builder.push(", points = ");
        builder.push_bind(points);
    }
    builder.push(" WHERE id = ");
    builder.push_bind(id);
    builder.push(" RETURNING *");

    let quiz = builder.build_query_as::<Quiz>().fetch_one(&mut *tx).await?;

    tx.commit().await?;

    let choices = fetch_choices(&pool, id).await?;
    Ok(Json(QuizWithChoices { quiz, choices }))
}

/// Deletes a quiz with its choices and responses.
pub async fn delete_quiz(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    ensure_owner(&pool, CatalogNode::Quiz(id), &claims).await?;

    let result = sqlx::query("DELETE FROM quizzes WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Quiz not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
