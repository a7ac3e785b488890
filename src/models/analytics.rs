// src/models/analytics.rs

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Days, NaiveDate, NaiveTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    aggregation::{ProgramActivity, ProgressStatus, Scope, percentage, round1},
    error::AppError,
    models::response::GradingStatus,
};

/// Raw query string of the manager dashboards.
///
/// List filters are comma-separated (`programs=1,2&departments=Sales,IT`); an
/// `all` entry disables that filter.
#[derive(Debug, Default, Deserialize)]
pub struct DashboardParams {
    pub programs: Option<String>,
    pub departments: Option<String>,
    pub users: Option<String>,
    /// 'all' (default), a number of days, or 'custom' with `date_from`/`date_to`.
    pub time_range: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

/// Parsed dashboard filters. Empty lists mean "no restriction".
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DashboardFilter {
    pub program_ids: Vec<i64>,
    pub departments: Vec<String>,
    pub user_ids: Vec<i64>,
    /// Inclusive lower bound on program creation time.
    pub created_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on program creation time.
    pub created_until: Option<DateTime<Utc>>,
}

impl DashboardFilter {
    /// True when the learner population should be narrowed.
    pub fn restricts_population(&self) -> bool {
        !self.departments.is_empty() || !self.user_ids.is_empty()
    }
}

fn split_list(raw: Option<&str>) -> Option<Vec<&str>> {
    let items: Vec<&str> = raw
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if items.iter().any(|s| s.eq_ignore_ascii_case("all")) {
        return None;
    }
    Some(items)
}

fn parse_ids(raw: Option<&str>, field: &str) -> Result<Vec<i64>, AppError> {
    split_list(raw)
        .unwrap_or_default()
        .into_iter()
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| AppError::BadRequest(format!("Invalid id '{}' in {}", s, field)))
        })
        .collect()
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

impl DashboardParams {
    pub fn into_filter(self, now: DateTime<Utc>) -> Result<DashboardFilter, AppError> {
        let program_ids = parse_ids(self.programs.as_deref(), "programs")?;
        let user_ids = parse_ids(self.users.as_deref(), "users")?;
        let departments = split_list(self.departments.as_deref())
            .unwrap_or_default()
            .into_iter()
            .map(str::to_string)
            .collect();

        let (created_from, created_until) = match self.time_range.as_deref().map(str::trim) {
            None | Some("") | Some("all") => (None, None),
            Some("custom") => match (self.date_from, self.date_to) {
                (Some(from), Some(to)) => {
                    if from > to {
                        return Err(AppError::BadRequest(
                            "date_from must not be after date_to".to_string(),
                        ));
                    }
                    let until = to.checked_add_days(Days::new(1)).unwrap_or(to);
                    (Some(start_of_day(from)), Some(start_of_day(until)))
                }
                _ => (None, None),
            },
            Some(days) => {
                let from = days
                    .parse::<i64>()
                    .ok()
                    .filter(|d| *d >= 0)
                    .and_then(TimeDelta::try_days)
                    .and_then(|span| now.checked_sub_signed(span))
                    .ok_or_else(|| AppError::BadRequest(format!("Invalid time_range '{}'", days)))?;
                (Some(from), None)
            }
        };

        Ok(DashboardFilter {
            program_ids,
            departments,
            user_ids,
            created_from,
            created_until,
        })
    }
}

/// Basic identification of a program in the flat summary.
#[derive(Debug, Serialize)]
pub struct ProgramSummaryEntry {
    pub id: i64,
    pub title: String,
    pub enrolled_count: usize,
}

/// Learning activity of one department across the summarized programs.
#[derive(Debug, Serialize, PartialEq)]
pub struct DepartmentStats {
    pub department: String,
    /// Distinct enrolled users of the department.
    pub user_count: usize,
    /// Mean completion over the department's enrollments.
    pub completion_rate: f64,
    pub quiz_score: f64,
}

impl DepartmentStats {
    /// Groups the enrolled population of `activities` by department.
    ///
    /// `departments` maps user id to department; enrolled users missing from it
    /// are left out. Departments come back sorted by name.
    pub fn breakdown(
        activities: &[ProgramActivity],
        departments: &HashMap<i64, String>,
    ) -> Vec<DepartmentStats> {
        let mut groups: BTreeMap<&str, HashSet<i64>> = BTreeMap::new();
        for activity in activities {
            for user_id in activity.enrolled() {
                if let Some(department) = departments.get(user_id) {
                    groups.entry(department.as_str()).or_default().insert(*user_id);
                }
            }
        }

        groups
            .into_iter()
            .map(|(department, members)| {
                let mut rates = Vec::new();
                let (mut earned, mut possible) = (0, 0);
                for activity in activities {
                    let mut scoped = activity.clone();
                    scoped.restrict_population(&members);
                    for user_id in scoped.enrolled() {
                        rates.push(scoped.program_completion_rate(Some(*user_id)));
                        let (e, p) = scoped.score_totals(Scope::Program, Some(*user_id));
                        earned += e;
                        possible += p;
                    }
                }
                let completion_rate = if rates.is_empty() {
                    0.0
                } else {
                    rates.iter().sum::<f64>() / rates.len() as f64
                };

                DepartmentStats {
                    department: department.to_string(),
                    user_count: members.len(),
                    completion_rate: round1(completion_rate),
                    quiz_score: round1(percentage(earned as f64, possible as f64)),
                }
            })
            .collect()
    }
}

/// Flat summary: `completion_rates[i]` and `quiz_scores[i]` belong to `programs[i]`.
#[derive(Debug, Default, Serialize)]
pub struct AnalyticsSummary {
    pub programs: Vec<ProgramSummaryEntry>,
    pub completion_rates: Vec<f64>,
    pub quiz_scores: Vec<f64>,
    pub departments: Vec<DepartmentStats>,
}

impl AnalyticsSummary {
    pub fn push(&mut self, activity: &ProgramActivity) {
        let tree = activity.tree();
        self.programs.push(ProgramSummaryEntry {
            id: tree.program_id,
            title: tree.title.clone(),
            enrolled_count: activity.enrolled().len(),
        });
        self.completion_rates
            .push(round1(activity.program_completion_rate(None)));
        self.quiz_scores
            .push(round1(activity.program_average_quiz_score(None)));
    }
}

#[derive(Debug, Serialize)]
pub struct LessonStats {
    pub id: i64,
    pub title: String,
    /// Share of enrolled learners who completed the lesson.
    pub completion_rate: f64,
    /// Learners (enrolled or not) who completed the lesson.
    pub completion_count: usize,
    pub quiz_average: f64,
    pub total_quizzes: usize,
    pub completed_quizzes: usize,
}

#[derive(Debug, Serialize)]
pub struct TopicStats {
    pub id: i64,
    pub title: String,
    pub completion_rate: f64,
    pub quiz_average: f64,
    pub total_quizzes: usize,
    pub completed_quizzes: usize,
    pub lessons: Vec<LessonStats>,
}

#[derive(Debug, Serialize)]
pub struct ProgramStats {
    pub id: i64,
    pub title: String,
    pub enrolled_count: usize,
    pub completion_rate: f64,
    pub avg_quiz_score: f64,
    pub quiz_completion_rate: f64,
    pub pending_grading: usize,
    pub total_quizzes: usize,
    pub completed_quizzes: usize,
    pub topics: Vec<TopicStats>,
}

impl From<&ProgramActivity> for ProgramStats {
    fn from(activity: &ProgramActivity) -> Self {
        let tree = activity.tree();
        let topics = tree
            .topics
            .iter()
            .map(|topic| TopicStats {
                id: topic.id,
                title: topic.title.clone(),
                completion_rate: round1(activity.topic_completion_rate(topic.id, None)),
                quiz_average: round1(activity.quiz_score(Scope::Topic(topic.id), None)),
                total_quizzes: activity.total_quizzes(Scope::Topic(topic.id)),
                completed_quizzes: activity.completed_quizzes(Scope::Topic(topic.id), None),
                lessons: topic
                    .lessons
                    .iter()
                    .map(|lesson| LessonStats {
                        id: lesson.id,
                        title: lesson.title.clone(),
                        completion_rate: round1(
                            activity.completion_rate(Scope::Lesson(lesson.id), None),
                        ),
                        completion_count: activity.lesson_completion_count(lesson.id),
                        quiz_average: round1(activity.lesson_quiz_average(lesson.id)),
                        total_quizzes: activity.total_quizzes(Scope::Lesson(lesson.id)),
                        completed_quizzes: activity
                            .completed_quizzes(Scope::Lesson(lesson.id), None),
                    })
                    .collect(),
            })
            .collect();

        ProgramStats {
            id: tree.program_id,
            title: tree.title.clone(),
            enrolled_count: activity.enrolled().len(),
            completion_rate: round1(activity.program_completion_rate(None)),
            avg_quiz_score: round1(activity.program_average_quiz_score(None)),
            quiz_completion_rate: round1(activity.quiz_completion_rate(Scope::Program, None)),
            pending_grading: activity.pending_grading(Scope::Program),
            total_quizzes: activity.total_quizzes(Scope::Program),
            completed_quizzes: activity.completed_quizzes(Scope::Program, None),
            topics,
        }
    }
}

/// Nested manager dashboard.
#[derive(Debug, Serialize)]
pub struct ManagerDashboard {
    pub active_programs_count: usize,
    pub total_enrollments: usize,
    pub pending_grading_count: usize,
    pub avg_completion_rate: f64,
    pub programs: Vec<ProgramStats>,
}

impl ManagerDashboard {
    pub fn from_programs(programs: Vec<ProgramStats>) -> Self {
        let count = programs.len();
        let completion_sum: f64 = programs.iter().map(|p| p.completion_rate).sum();
        ManagerDashboard {
            active_programs_count: count,
            total_enrollments: programs.iter().map(|p| p.enrolled_count).sum(),
            pending_grading_count: programs.iter().map(|p| p.pending_grading).sum(),
            avg_completion_rate: if count > 0 {
                round1(completion_sum / count as f64)
            } else {
                0.0
            },
            programs,
        }
    }
}

/// One enrolled program on the learner dashboard.
#[derive(Debug, Serialize)]
pub struct LearnerProgramStats {
    pub id: i64,
    pub title: String,
    pub completion_rate: f64,
    pub quiz_completion_rate: f64,
    pub avg_quiz_score: f64,
    pub total_quizzes: usize,
    pub completed_quizzes: usize,
    pub status: ProgressStatus,
}

impl LearnerProgramStats {
    pub fn for_user(activity: &ProgramActivity, user_id: i64) -> Self {
        let tree = activity.tree();
        LearnerProgramStats {
            id: tree.program_id,
            title: tree.title.clone(),
            completion_rate: round1(activity.program_completion_rate(Some(user_id))),
            quiz_completion_rate: round1(
                activity.quiz_completion_rate(Scope::Program, Some(user_id)),
            ),
            avg_quiz_score: round1(activity.program_average_quiz_score(Some(user_id))),
            total_quizzes: activity.total_quizzes(Scope::Program),
            completed_quizzes: activity.completed_quizzes(Scope::Program, Some(user_id)),
            status: activity.status_for(user_id),
        }
    }
}

#[derive(Debug, Default, Serialize)]
pub struct OverallProgress {
    pub completed_lessons: usize,
    pub total_lessons: usize,
    pub percentage: f64,
}

#[derive(Debug, Default, Serialize)]
pub struct QuizStats {
    pub total_quizzes: usize,
    /// Quizzes the learner has answered, graded or not.
    pub completed_quizzes: usize,
    pub pending_grading: usize,
    pub average_score: f64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct RecentActivity {
    pub quiz_id: i64,
    pub quiz_title: String,
    pub points_earned: Option<i32>,
    pub max_points: i32,
    pub grading_status: GradingStatus,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct DailyProgress {
    pub date: NaiveDate,
    pub lessons_completed: i64,
}

/// Learner dashboard.
#[derive(Debug, Serialize)]
pub struct LearnerDashboard {
    pub programs: Vec<LearnerProgramStats>,
    pub overall_progress: OverallProgress,
    pub quiz_stats: QuizStats,
    pub recent_activities: Vec<RecentActivity>,
    pub daily_progress: Vec<DailyProgress>,
}
