// src/aggregation/mod.rs

//! Completion and scoring aggregation.
//!
//! [`ProgramActivity`] is a pure function of one program's catalog tree plus the
//! raw enrollment, lesson-progress and quiz-response rows that [`load_activity`]
//! fetches for it. Nothing is cached: dashboards reload the rows and recompute
//! on every request.
//!
//! Every rate is a percentage in `0.0..=100.0` and every zero denominator yields
//! `0.0`.

mod load;

pub use load::load_activity;

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::models::response::GradingStatus;

#[derive(Debug, Clone)]
pub struct QuizNode {
    pub id: i64,
    pub points: i32,
}

#[derive(Debug, Clone)]
pub struct LessonNode {
    pub id: i64,
    pub title: String,
    pub quizzes: Vec<QuizNode>,
}

#[derive(Debug, Clone)]
pub struct TopicNode {
    pub id: i64,
    pub title: String,
    pub lessons: Vec<LessonNode>,
}

/// Program → Topic → Lesson → Quiz, already in display order.
#[derive(Debug, Clone)]
pub struct CourseTree {
    pub program_id: i64,
    pub title: String,
    pub topics: Vec<TopicNode>,
}

#[derive(Debug, Clone, Copy)]
pub struct ProgressRecord {
    pub user_id: i64,
    pub lesson_id: i64,
    pub completed: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ScoreRecord {
    pub user_id: i64,
    pub quiz_id: i64,
    pub points_earned: Option<i32>,
    pub status: GradingStatus,
}

impl ScoreRecord {
    /// Graded and carrying a score; the only rows that count towards averages.
    fn is_scored(&self) -> bool {
        self.status == GradingStatus::Graded && self.points_earned.is_some()
    }
}

/// Granularity of a computation inside one program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Program,
    Topic(i64),
    Lesson(i64),
}

#[derive(Debug, Clone, Copy)]
struct QuizLocation {
    lesson_id: i64,
    topic_id: i64,
    points: i32,
}

/// Where a learner stands in a program.
///
/// Not enrolled or 0% → not started; 100% of a non-empty program → completed;
/// anything in between → in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl ProgressStatus {
    pub fn classify(is_enrolled: bool, completed_lessons: usize, total_lessons: usize) -> Self {
        if !is_enrolled || completed_lessons == 0 || total_lessons == 0 {
            ProgressStatus::NotStarted
        } else if completed_lessons >= total_lessons {
            ProgressStatus::Completed
        } else {
            ProgressStatus::InProgress
        }
    }
}

/// `numerator / denominator × 100`, or 0 when there is nothing to divide by.
pub fn percentage(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator * 100.0
    } else {
        0.0
    }
}

/// Rounds to one decimal place for presentation.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// All rows one program's statistics are computed from.
#[derive(Debug, Clone)]
pub struct ProgramActivity {
    tree: CourseTree,
    enrolled: Vec<i64>,
    progress: Vec<ProgressRecord>,
    responses: Vec<ScoreRecord>,
    lesson_topic: HashMap<i64, i64>,
    quizzes: HashMap<i64, QuizLocation>,
}

impl ProgramActivity {
    /// Builds the lookup indexes. Progress and response rows that point outside
    /// the tree are kept but never match any scope.
    pub fn new(
        tree: CourseTree,
        enrolled: Vec<i64>,
        progress: Vec<ProgressRecord>,
        responses: Vec<ScoreRecord>,
    ) -> Self {
        let mut lesson_topic = HashMap::new();
        let mut quizzes = HashMap::new();
        for topic in &tree.topics {
            for lesson in &topic.lessons {
                lesson_topic.insert(lesson.id, topic.id);
                for quiz in &lesson.quizzes {
                    quizzes.insert(
                        quiz.id,
                        QuizLocation {
                            lesson_id: lesson.id,
                            topic_id: topic.id,
                            points: quiz.points,
                        },
                    );
                }
            }
        }

        let mut seen = HashSet::new();
        let enrolled = enrolled.into_iter().filter(|id| seen.insert(*id)).collect();

        Self {
            tree,
            enrolled,
            progress,
            responses,
            lesson_topic,
            quizzes,
        }
    }

    pub fn tree(&self) -> &CourseTree {
        &self.tree
    }

    pub fn enrolled(&self) -> &[i64] {
        &self.enrolled
    }

    pub fn is_enrolled(&self, user_id: i64) -> bool {
        self.enrolled.contains(&user_id)
    }

    /// Narrows the averaging population to the given users (dashboard filters).
    pub fn restrict_population(&mut self, allowed: &HashSet<i64>) {
        self.enrolled.retain(|id| allowed.contains(id));
    }

    fn lesson_in_scope(&self, lesson_id: i64, scope: Scope) -> bool {
        match scope {
            Scope::Program => self.lesson_topic.contains_key(&lesson_id),
            Scope::Topic(topic_id) => self.lesson_topic.get(&lesson_id) == Some(&topic_id),
            Scope::Lesson(id) => id == lesson_id && self.lesson_topic.contains_key(&lesson_id),
        }
    }

    fn quiz_in_scope(&self, quiz_id: i64, scope: Scope) -> Option<QuizLocation> {
        let location = *self.quizzes.get(&quiz_id)?;
        let matches = match scope {
            Scope::Program => true,
            Scope::Topic(topic_id) => location.topic_id == topic_id,
            Scope::Lesson(lesson_id) => location.lesson_id == lesson_id,
        };
        matches.then_some(location)
    }

    /// Number of lessons under the scope.
    pub fn lesson_count(&self, scope: Scope) -> usize {
        match scope {
            Scope::Program => self.lesson_topic.len(),
            Scope::Topic(topic_id) => self
                .lesson_topic
                .values()
                .filter(|t| **t == topic_id)
                .count(),
            Scope::Lesson(lesson_id) => usize::from(self.lesson_topic.contains_key(&lesson_id)),
        }
    }

    /// Lessons under the scope that `user_id` has marked complete.
    pub fn completed_lessons(&self, scope: Scope, user_id: i64) -> usize {
        self.progress
            .iter()
            .filter(|p| p.completed && p.user_id == user_id)
            .filter(|p| self.lesson_in_scope(p.lesson_id, scope))
            .count()
    }

    /// Completion percentage for one user, or the mean of every enrolled user's
    /// percentage when `user` is `None`.
    pub fn completion_rate(&self, scope: Scope, user: Option<i64>) -> f64 {
        let total = self.lesson_count(scope);
        if total == 0 {
            return 0.0;
        }

        match user {
            Some(user_id) => percentage(self.completed_lessons(scope, user_id) as f64, total as f64),
            None => {
                if self.enrolled.is_empty() {
                    return 0.0;
                }
                let sum: f64 = self
                    .enrolled
                    .iter()
                    .map(|user_id| {
                        percentage(self.completed_lessons(scope, *user_id) as f64, total as f64)
                    })
                    .sum();
                sum / self.enrolled.len() as f64
            }
        }
    }

    /// Users (enrolled or not) who completed the lesson.
    pub fn lesson_completion_count(&self, lesson_id: i64) -> usize {
        self.progress
            .iter()
            .filter(|p| p.lesson_id == lesson_id && p.completed)
            .count()
    }

    pub fn topic_completion_rate(&self, topic_id: i64, user: Option<i64>) -> f64 {
        self.completion_rate(Scope::Topic(topic_id), user)
    }

    pub fn program_completion_rate(&self, user: Option<i64>) -> f64 {
        self.completion_rate(Scope::Program, user)
    }

    /// `(earned, possible)` points over graded responses in the scope,
    /// optionally restricted to one user.
    pub fn score_totals(&self, scope: Scope, user: Option<i64>) -> (i64, i64) {
        self.responses
            .iter()
            .filter(|r| r.is_scored())
            .filter(|r| user.is_none_or(|u| r.user_id == u))
            .filter_map(|r| {
                self.quiz_in_scope(r.quiz_id, scope)
                    .map(|loc| (r.points_earned.unwrap_or(0) as i64, loc.points as i64))
            })
            .fold((0, 0), |(e, p), (earned, possible)| (e + earned, p + possible))
    }

    /// Earned over possible points as a percentage.
    pub fn quiz_score(&self, scope: Scope, user: Option<i64>) -> f64 {
        let (earned, possible) = self.score_totals(scope, user);
        percentage(earned as f64, possible as f64)
    }

    pub fn lesson_quiz_average(&self, lesson_id: i64) -> f64 {
        self.quiz_score(Scope::Lesson(lesson_id), None)
    }

    pub fn program_average_quiz_score(&self, user: Option<i64>) -> f64 {
        self.quiz_score(Scope::Program, user)
    }

    /// Quizzes defined under the scope.
    pub fn total_quizzes(&self, scope: Scope) -> usize {
        self.quizzes
            .keys()
            .filter(|id| self.quiz_in_scope(**id, scope).is_some())
            .count()
    }

    /// Graded responses under the scope, from one user or from all enrolled users.
    pub fn completed_quizzes(&self, scope: Scope, user: Option<i64>) -> usize {
        self.responses
            .iter()
            .filter(|r| r.status == GradingStatus::Graded)
            .filter(|r| match user {
                Some(u) => r.user_id == u,
                None => self.enrolled.contains(&r.user_id),
            })
            .filter(|r| self.quiz_in_scope(r.quiz_id, scope).is_some())
            .count()
    }

    /// Share of the quiz workload that has been graded. For the whole
    /// population the workload is quizzes × enrolled users.
    pub fn quiz_completion_rate(&self, scope: Scope, user: Option<i64>) -> f64 {
        let total = self.total_quizzes(scope);
        let workload = match user {
            Some(_) => total,
            None => total * self.enrolled.len(),
        };
        percentage(self.completed_quizzes(scope, user) as f64, workload as f64)
    }

    /// Responses under the scope that still await a manager.
    pub fn pending_grading(&self, scope: Scope) -> usize {
        self.responses
            .iter()
            .filter(|r| r.status == GradingStatus::Pending)
            .filter(|r| self.quiz_in_scope(r.quiz_id, scope).is_some())
            .count()
    }

    /// Quizzes under the scope without any response from `user_id`.
    pub fn unanswered_quizzes(&self, scope: Scope, user_id: i64) -> usize {
        let answered: HashSet<i64> = self
            .responses
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.quiz_id)
            .collect();
        self.quizzes
            .keys()
            .filter(|id| self.quiz_in_scope(**id, scope).is_some() && !answered.contains(id))
            .count()
    }

    pub fn status_for(&self, user_id: i64) -> ProgressStatus {
        ProgressStatus::classify(
            self.is_enrolled(user_id),
            self.completed_lessons(Scope::Program, user_id),
            self.lesson_count(Scope::Program),
        )
    }
}
