// src/models/enrollment.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'enrollments' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: i64,
    pub user_id: i64,
    pub program_id: i64,

    /// Who created the enrollment: the learner themselves or a manager.
    pub enrolled_by: Option<i64>,

    pub enrolled_at: chrono::DateTime<chrono::Utc>,
}

/// Enrolled learner row for the owner's roster view.
#[derive(Debug, Serialize, FromRow)]
pub struct EnrolledUser {
    pub enrollment_id: i64,
    pub user_id: i64,
    pub username: String,
    pub department: String,
    pub enrolled_at: chrono::DateTime<chrono::Utc>,
    pub enrolled_by: Option<i64>,
}

/// Bulk enrollment action chosen by a manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentAction {
    Enroll,
    Unenroll,
}

/// DTO for a manager enrolling or unenrolling several users at once.
#[derive(Debug, Deserialize, Validate)]
pub struct BulkEnrollmentRequest {
    pub action: EnrollmentAction,
    #[validate(length(min = 1, max = 1000, message = "Please select at least one user."))]
    pub user_ids: Vec<i64>,
}

/// Outcome of a bulk enrollment request.
#[derive(Debug, Serialize)]
pub struct BulkEnrollmentResult {
    pub requested: usize,
    /// Rows inserted or deleted; already-enrolled / not-enrolled users are skipped silently.
    pub affected: u64,
}

/// Per-enrollment completion figure, for the "my progress" and roster views.
#[derive(Debug, Serialize)]
pub struct EnrollmentProgress {
    pub enrollment_id: i64,
    pub program_id: i64,
    pub program_title: String,
    pub user_id: i64,
    pub username: String,
    pub enrolled_at: chrono::DateTime<chrono::Utc>,
    pub completed_lessons: usize,
    pub total_lessons: usize,
    pub progress_percentage: f64,
    pub status: crate::aggregation::ProgressStatus,
}
