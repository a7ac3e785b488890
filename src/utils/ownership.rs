// src/utils/ownership.rs

//! Access rules shared by every catalog handler.
//!
//! A program's owner controls its whole subtree, so every mutation resolves the
//! node it touches up to the owning program with one join and compares owners.

use sqlx::{FromRow, PgExecutor};

use crate::{error::AppError, utils::jwt::Claims};

/// Any node of the Program → Topic → Lesson → Quiz tree, plus responses to quizzes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogNode {
    Program(i64),
    Topic(i64),
    Lesson(i64),
    Quiz(i64),
    Response(i64),
}

/// The program a node belongs to and that program's owner.
#[derive(Debug, Clone, Copy, FromRow)]
pub struct Ownership {
    pub program_id: i64,
    pub owner_id: i64,
}

impl CatalogNode {
    fn id(self) -> i64 {
        match self {
            CatalogNode::Program(id)
            | CatalogNode::Topic(id)
            | CatalogNode::Lesson(id)
            | CatalogNode::Quiz(id)
            | CatalogNode::Response(id) => id,
        }
    }

    fn label(self) -> &'static str {
        match self {
            CatalogNode::Program(_) => "Program",
            CatalogNode::Topic(_) => "Topic",
            CatalogNode::Lesson(_) => "Lesson",
            CatalogNode::Quiz(_) => "Quiz",
            CatalogNode::Response(_) => "Response",
        }
    }

    fn owner_query(self) -> &'static str {
        match self {
            CatalogNode::Program(_) => {
                "SELECT p.id AS program_id, p.owner_id
                 FROM programs p
                 WHERE p.id = $1"
            }
            CatalogNode::Topic(_) => {
                "SELECT p.id AS program_id, p.owner_id
                 FROM topics t
                 JOIN programs p ON p.id = t.program_id
                 WHERE t.id = $1"
            }
            CatalogNode::Lesson(_) => {
                "SELECT p.id AS program_id, p.owner_id
                 FROM lessons l
                 JOIN topics t ON t.id = l.topic_id
                 JOIN programs p ON p.id = t.program_id
                 WHERE l.id = $1"
            }
            CatalogNode::Quiz(_) => {
                "SELECT p.id AS program_id, p.owner_id
                 FROM quizzes q
                 JOIN lessons l ON l.id = q.lesson_id
                 JOIN topics t ON t.id = l.topic_id
                 JOIN programs p ON p.id = t.program_id
                 WHERE q.id = $1"
            }
            CatalogNode::Response(_) => {
                "SELECT p.id AS program_id, p.owner_id
                 FROM quiz_responses r
                 JOIN quizzes q ON q.id = r.quiz_id
                 JOIN lessons l ON l.id = q.lesson_id
                 JOIN topics t ON t.id = l.topic_id
                 JOIN programs p ON p.id = t.program_id
                 WHERE r.id = $1"
            }
        }
    }
}

/// Resolves a node to its program and owner. Missing nodes are `NotFound`.
pub async fn resolve<'e, E>(executor: E, node: CatalogNode) -> Result<Ownership, AppError>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, Ownership>(node.owner_query())
        .bind(node.id())
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} not found", node.label())))
}

/// Succeeds only when the caller owns the program the node belongs to.
pub async fn ensure_owner<'e, E>(
    executor: E,
    node: CatalogNode,
    claims: &Claims,
) -> Result<Ownership, AppError>
where
    E: PgExecutor<'e>,
{
    let ownership = resolve(executor, node).await?;
    if ownership.owner_id != claims.user_id()? {
        return Err(AppError::Forbidden(format!(
            "You do not own the program this {} belongs to",
            node.label().to_lowercase()
        )));
    }
    Ok(ownership)
}

/// Whether `user_id` is enrolled in `program_id`.
pub async fn is_enrolled<'e, E>(executor: E, user_id: i64, program_id: i64) -> Result<bool, AppError>
where
    E: PgExecutor<'e>,
{
    let enrolled = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM enrollments WHERE user_id = $1 AND program_id = $2)",
    )
    .bind(user_id)
    .bind(program_id)
    .fetch_one(executor)
    .await?;

    Ok(enrolled)
}

/// Learners may only submit answers or complete lessons in programs they joined.
pub async fn ensure_enrolled<'e, E>(executor: E, user_id: i64, program_id: i64) -> Result<(), AppError>
where
    E: PgExecutor<'e>,
{
    if !is_enrolled(executor, user_id, program_id).await? {
        return Err(AppError::Forbidden(
            "You are not enrolled in this program".to_string(),
        ));
    }
    Ok(())
}
