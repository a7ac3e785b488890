// src/aggregation/load.rs

use sqlx::{FromRow, PgPool};

use crate::{
    aggregation::{
        CourseTree, LessonNode, ProgramActivity, ProgressRecord, QuizNode, ScoreRecord, TopicNode,
    },
    error::AppError,
    models::response::GradingStatus,
};

/// One row of the flattened topic/lesson/quiz outline.
#[derive(FromRow)]
struct OutlineRow {
    topic_id: i64,
    topic_title: String,
    lesson_id: Option<i64>,
    lesson_title: Option<String>,
    quiz_id: Option<i64>,
    quiz_points: Option<i32>,
}

#[derive(FromRow)]
struct ProgressRow {
    user_id: i64,
    lesson_id: i64,
    completed: bool,
}

#[derive(FromRow)]
struct ScoreRow {
    user_id: i64,
    quiz_id: i64,
    points_earned: Option<i32>,
    grading_status: GradingStatus,
}

/// Folds the ordered outline rows into a tree, preserving row order.
fn build_tree(program_id: i64, title: String, rows: Vec<OutlineRow>) -> CourseTree {
    let mut topics: Vec<TopicNode> = Vec::new();

    for row in rows {
        if topics.last().is_none_or(|t| t.id != row.topic_id) {
            topics.push(TopicNode {
                id: row.topic_id,
                title: row.topic_title,
                lessons: Vec::new(),
            });
        }
        let Some(topic) = topics.last_mut() else {
            continue;
        };

        let (Some(lesson_id), Some(lesson_title)) = (row.lesson_id, row.lesson_title) else {
            continue;
        };
        if topic.lessons.last().is_none_or(|l| l.id != lesson_id) {
            topic.lessons.push(LessonNode {
                id: lesson_id,
                title: lesson_title,
                quizzes: Vec::new(),
            });
        }

        if let (Some(quiz_id), Some(points), Some(lesson)) =
            (row.quiz_id, row.quiz_points, topic.lessons.last_mut())
        {
            lesson.quizzes.push(QuizNode { id: quiz_id, points });
        }
    }

    CourseTree {
        program_id,
        title,
        topics,
    }
}

/// Loads everything the aggregation engine needs for one program.
pub async fn load_activity(pool: &PgPool, program_id: i64) -> Result<ProgramActivity, AppError> {
    let title = sqlx::query_scalar::<_, String>("SELECT title FROM programs WHERE id = $1")
        .bind(program_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Program not found".to_string()))?;

    let outline = sqlx::query_as::<_, OutlineRow>(
        r#"
        SELECT
            t.id AS topic_id, t.title AS topic_title,
            l.id AS lesson_id, l.title AS lesson_title,
            q.id AS quiz_id, q.points AS quiz_points
        FROM topics t
        LEFT JOIN lessons l ON l.topic_id = t.id
        LEFT JOIN quizzes q ON q.lesson_id = l.id
        WHERE t.program_id = $1
        ORDER BY t.sort_order, t.id, l.sort_order, l.id, q.id
        "#,
    )
    .bind(program_id)
    .fetch_all(pool)
    .await?;

    let enrolled = sqlx::query_scalar::<_, i64>(
        "SELECT user_id FROM enrollments WHERE program_id = $1 ORDER BY enrolled_at, id",
    )
    .bind(program_id)
    .fetch_all(pool)
    .await?;

    let progress = sqlx::query_as::<_, ProgressRow>(
        r#"
        SELECT lp.user_id, lp.lesson_id, lp.completed
        FROM lesson_progress lp
        JOIN lessons l ON l.id = lp.lesson_id
        JOIN topics t ON t.id = l.topic_id
        WHERE t.program_id = $1
        "#,
    )
    .bind(program_id)
    .fetch_all(pool)
    .await?;

    let responses = sqlx::query_as::<_, ScoreRow>(
        r#"
        SELECT r.user_id, r.quiz_id, r.points_earned, r.grading_status
        FROM quiz_responses r
        JOIN quizzes q ON q.id = r.quiz_id
        JOIN lessons l ON l.id = q.lesson_id
        JOIN topics t ON t.id = l.topic_id
        WHERE t.program_id = $1
        "#,
    )
    .bind(program_id)
    .fetch_all(pool)
    .await?;

    Ok(ProgramActivity::new(
        build_tree(program_id, title, outline),
        enrolled,
        progress
            .into_iter()
            .map(|p| ProgressRecord {
                user_id: p.user_id,
                lesson_id: p.lesson_id,
                completed: p.completed,
            })
            .collect(),
        responses
            .into_iter()
            .map(|r| ScoreRecord {
                user_id: r.user_id,
                quiz_id: r.quiz_id,
                points_earned: r.points_earned,
                status: r.grading_status,
            })
            .collect(),
    ))
}
