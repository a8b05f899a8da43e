use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use validator::Validate;

use crate::services::grading::{effective_score, LetterGrade};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "enrollment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    Active,
    Completed,
    Withdrawn,
    Failed,
}

impl EnrollmentStatus {
    pub const ALL: [EnrollmentStatus; 4] = [
        EnrollmentStatus::Active,
        EnrollmentStatus::Completed,
        EnrollmentStatus::Withdrawn,
        EnrollmentStatus::Failed,
    ];

    /// Active can move to any other state; a withdrawal can be reversed.
    /// Completed and Failed are final.
    pub fn can_transition_to(self, target: EnrollmentStatus) -> bool {
        use EnrollmentStatus::*;
        matches!(
            (self, target),
            (Active, Completed) | (Active, Withdrawn) | (Active, Failed) | (Withdrawn, Active)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EnrollmentStatus::Active => "active",
            EnrollmentStatus::Completed => "completed",
            EnrollmentStatus::Withdrawn => "withdrawn",
            EnrollmentStatus::Failed => "failed",
        }
    }

    /// Finished courses appear on transcripts.
    pub fn is_finished(self) -> bool {
        matches!(self, EnrollmentStatus::Completed | EnrollmentStatus::Failed)
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Enrollment {
    pub id: i32,
    pub student_id: i32,
    pub course_id: i32,
    pub enrollment_date: NaiveDate,
    pub status: EnrollmentStatus,
    pub grade: Option<f64>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Enrollment joined with its student, course and optional result.
#[derive(Debug, Clone, FromRow)]
pub struct EnrollmentDetail {
    pub id: i32,
    pub student_id: i32,
    pub course_id: i32,
    pub enrollment_date: NaiveDate,
    pub status: EnrollmentStatus,
    pub grade: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub student_name: String,
    pub enrollment_number: String,
    pub course_code: String,
    pub course_title: String,
    pub credits: i32,
    pub result_score: Option<f64>,
}

impl EnrollmentDetail {
    pub fn score(&self) -> Option<f64> {
        effective_score(self.result_score, self.grade)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateEnrollmentRequest {
    pub student_id: i32,
    pub course_id: i32,
    pub enrollment_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateEnrollmentStatusRequest {
    pub status: EnrollmentStatus,
    #[validate(range(min = 0.0, max = 100.0, message = "Grade must be between 0 and 100"))]
    pub grade: Option<f64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetGradeRequest {
    #[validate(range(min = 0.0, max = 100.0, message = "Grade must be between 0 and 100"))]
    pub grade: f64,
}

#[derive(Debug, Default, Deserialize)]
pub struct EnrollmentFilter {
    pub student_id: Option<i32>,
    pub course_id: Option<i32>,
    pub status: Option<EnrollmentStatus>,
}

#[derive(Debug, Serialize)]
pub struct EnrollmentResponse {
    pub id: i32,
    pub student_id: i32,
    pub student_name: String,
    pub enrollment_number: String,
    pub course_id: i32,
    pub course_code: String,
    pub course_title: String,
    pub credits: i32,
    pub enrollment_date: NaiveDate,
    pub status: EnrollmentStatus,
    pub grade: Option<f64>,
    pub score: Option<f64>,
    pub letter_grade: Option<LetterGrade>,
    pub grade_points: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<EnrollmentDetail> for EnrollmentResponse {
    fn from(detail: EnrollmentDetail) -> Self {
        let score = detail.score();
        let letter = score.map(LetterGrade::from_score);

        Self {
            id: detail.id,
            student_id: detail.student_id,
            student_name: detail.student_name,
            enrollment_number: detail.enrollment_number,
            course_id: detail.course_id,
            course_code: detail.course_code,
            course_title: detail.course_title,
            credits: detail.credits,
            enrollment_date: detail.enrollment_date,
            status: detail.status,
            grade: detail.grade,
            score,
            letter_grade: letter,
            grade_points: letter.map(LetterGrade::points),
            created_at: detail.created_at,
            updated_at: detail.updated_at,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn detail(id: i32, status: EnrollmentStatus, credits: i32, score: Option<f64>) -> EnrollmentDetail {
        EnrollmentDetail {
            id,
            student_id: 1,
            course_id: id,
            enrollment_date: NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
            status,
            grade: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            student_name: "Ada Lovelace".to_string(),
            enrollment_number: "STU001".to_string(),
            course_code: format!("CS{}", 100 + id),
            course_title: format!("Course {}", id),
            credits,
            result_score: score,
        }
    }
}
