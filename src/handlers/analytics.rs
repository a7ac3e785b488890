// src/handlers/analytics.rs

use std::collections::{HashMap, HashSet};

use axum::{
    Json,
    extract::{Extension, Query, State},
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::{
    aggregation::{ProgramActivity, Scope, load_activity, percentage, round1},
    config::{DAILY_PROGRESS_DAYS, RECENT_ACTIVITY_LIMIT},
    error::AppError,
    models::analytics::{
        AnalyticsSummary, DailyProgress, DashboardFilter, DashboardParams, DepartmentStats,
        LearnerDashboard, LearnerProgramStats, ManagerDashboard, OverallProgress, ProgramStats,
        QuizStats, RecentActivity,
    },
    utils::jwt::Claims,
};

/// Programs owned by `owner_id` that pass the dashboard filters, newest first.
async fn filtered_program_ids(
    pool: &PgPool,
    owner_id: i64,
    filter: &DashboardFilter,
) -> Result<Vec<i64>, AppError> {
    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT p.id FROM programs p WHERE p.owner_id = ");
    builder.push_bind(owner_id);

    if !filter.program_ids.is_empty() {
        builder.push(" AND p.id = ANY(");
        builder.push_bind(filter.program_ids.clone());
        builder.push(")");
    }
    if let Some(from) = filter.created_from {
        builder.push(" AND p.created_at >= ");
        builder.push_bind(from);
    }
    if let Some(until) = filter.created_until {
        builder.push(" AND p.created_at < ");
        builder.push_bind(until);
    }
    if filter.restricts_population() {
        builder.push(
            " AND EXISTS(SELECT 1 FROM enrollments e JOIN users u ON u.id = e.user_id \
             WHERE e.program_id = p.id",
        );
        push_population_conditions(&mut builder, filter);
        builder.push(")");
    }
    builder.push(" ORDER BY p.created_at DESC, p.id DESC");

    let ids = builder
        .build_query_scalar::<i64>()
        .fetch_all(pool)
        .await?;
    Ok(ids)
}

/// Appends the department/user conditions on a `users u` alias.
fn push_population_conditions(builder: &mut QueryBuilder<'_, Postgres>, filter: &DashboardFilter) {
    if !filter.departments.is_empty() {
        builder.push(" AND u.department = ANY(");
        builder.push_bind(filter.departments.clone());
        builder.push(")");
    }
    if !filter.user_ids.is_empty() {
        builder.push(" AND u.id = ANY(");
        builder.push_bind(filter.user_ids.clone());
        builder.push(")");
    }
}

/// Users allowed into the averages, or `None` when the filters do not narrow it.
async fn population(
    pool: &PgPool,
    filter: &DashboardFilter,
) -> Result<Option<HashSet<i64>>, AppError> {
    if !filter.restricts_population() {
        return Ok(None);
    }
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT u.id FROM users u WHERE 1 = 1");
    push_population_conditions(&mut builder, filter);

    let ids = builder.build_query_scalar::<i64>().fetch_all(pool).await?;
    Ok(Some(ids.into_iter().collect()))
}

async fn load_filtered(
    pool: &PgPool,
    claims: &Claims,
    params: DashboardParams,
) -> Result<Vec<ProgramActivity>, AppError> {
    let filter = params.into_filter(Utc::now())?;
    let program_ids = filtered_program_ids(pool, claims.user_id()?, &filter).await?;
    let allowed = population(pool, &filter).await?;

    let mut activities = Vec::with_capacity(program_ids.len());
    for program_id in program_ids {
        let mut activity = load_activity(pool, program_id).await?;
        if let Some(allowed) = &allowed {
            activity.restrict_population(allowed);
        }
        activities.push(activity);
    }
    Ok(activities)
}

/// Flat per-program completion and quiz-score arrays plus a per-department
/// breakdown. Manager only.
pub async fn summary(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<DashboardParams>,
) -> Result<impl IntoResponse, AppError> {
    let activities = load_filtered(&pool, &claims, params).await?;

    let mut summary = AnalyticsSummary::default();
    for activity in &activities {
        summary.push(activity);
    }

    let enrolled: Vec<i64> = activities
        .iter()
        .flat_map(|a| a.enrolled().iter().copied())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let departments: HashMap<i64, String> =
        sqlx::query_as::<_, (i64, String)>("SELECT id, department FROM users WHERE id = ANY($1)")
            .bind(&enrolled)
            .fetch_all(&pool)
            .await?
            .into_iter()
            .collect();
    summary.departments = DepartmentStats::breakdown(&activities, &departments);

    Ok(Json(summary))
}

/// Nested program → topic → lesson statistics. Manager only.
pub async fn dashboard(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<DashboardParams>,
) -> Result<impl IntoResponse, AppError> {
    let programs = load_filtered(&pool, &claims, params)
        .await?
        .iter()
        .map(ProgramStats::from)
        .collect();

    Ok(Json(ManagerDashboard::from_programs(programs)))
}

/// The caller's own learning summary across enrolled programs.
pub async fn learner_dashboard(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let program_ids = sqlx::query_scalar::<_, i64>(
        "SELECT program_id FROM enrollments WHERE user_id = $1 ORDER BY enrolled_at DESC, id DESC",
    )
    .bind(user_id)
    .fetch_all(&pool)
    .await?;

    let mut programs = Vec::with_capacity(program_ids.len());
    let mut overall = OverallProgress::default();
    let mut quiz_stats = QuizStats::default();
    let (mut earned, mut possible) = (0i64, 0i64);

    for program_id in program_ids {
        let activity = load_activity(&pool, program_id).await?;

        overall.completed_lessons += activity.completed_lessons(Scope::Program, user_id);
        overall.total_lessons += activity.lesson_count(Scope::Program);

        let total = activity.total_quizzes(Scope::Program);
        let answered = total.saturating_sub(activity.unanswered_quizzes(Scope::Program, user_id));
        let graded = activity.completed_quizzes(Scope::Program, Some(user_id));
        quiz_stats.total_quizzes += total;
        quiz_stats.completed_quizzes += answered;
        quiz_stats.pending_grading += answered.saturating_sub(graded);

        let (e, p) = activity.score_totals(Scope::Program, Some(user_id));
        earned += e;
        possible += p;

        programs.push(LearnerProgramStats::for_user(&activity, user_id));
    }

    overall.percentage = round1(percentage(
        overall.completed_lessons as f64,
        overall.total_lessons as f64,
    ));
    quiz_stats.average_score = round1(percentage(earned as f64, possible as f64));

    let recent_activities = sqlx::query_as::<_, RecentActivity>(
        r#"
        SELECT
            r.quiz_id, q.title AS quiz_title, r.points_earned, q.points AS max_points,
            r.grading_status, r.submitted_at
        FROM quiz_responses r
        JOIN quizzes q ON q.id = r.quiz_id
        WHERE r.user_id = $1
        ORDER BY r.submitted_at DESC, r.id DESC
        LIMIT $2
        "#,
    )
    .bind(user_id)
    .bind(RECENT_ACTIVITY_LIMIT)
    .fetch_all(&pool)
    .await?;

    // One row per day in the window, zero-filled.
    let daily_progress = sqlx::query_as::<_, DailyProgress>(
        r#"
        SELECT d::date AS date, COUNT(lp.id) AS lessons_completed
        FROM generate_series(
            ((NOW() AT TIME ZONE 'UTC')::date - ($2::int - 1))::timestamp,
            (NOW() AT TIME ZONE 'UTC')::date::timestamp,
            INTERVAL '1 day'
        ) AS d
        LEFT JOIN lesson_progress lp
            ON lp.user_id = $1
           AND lp.completed
           AND (lp.completed_at AT TIME ZONE 'UTC')::date = d::date
        GROUP BY d
        ORDER BY d
        "#,
    )
    .bind(user_id)
    .bind(DAILY_PROGRESS_DAYS)
    .fetch_all(&pool)
    .await?;

    Ok(Json(LearnerDashboard {
        programs,
        overall_progress: overall,
        quiz_stats,
        recent_activities,
        daily_progress,
    }))
}
