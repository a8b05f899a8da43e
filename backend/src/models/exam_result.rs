use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::services::grading::LetterGrade;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExamResult {
    pub id: i32,
    pub enrollment_id: i32,
    pub score: f64,
    pub grade: String,
    pub remarks: Option<String>,
    pub exam_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(default)]
    pub student_id: Option<i32>,
    #[sqlx(default)]
    pub student_name: Option<String>,
    #[sqlx(default)]
    pub course_id: Option<i32>,
    #[sqlx(default)]
    pub course_code: Option<String>,
}

/// Scores above 100 are rejected; negative scores are clamped to 0 when stored.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateResultRequest {
    pub enrollment_id: i32,
    #[validate(range(max = 100.0, message = "Score cannot exceed 100"))]
    pub score: f64,
    #[validate(length(max = 500))]
    pub remarks: Option<String>,
    pub exam_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateResultRequest {
    #[validate(range(max = 100.0, message = "Score cannot exceed 100"))]
    pub score: Option<f64>,
    #[validate(length(max = 500))]
    pub remarks: Option<String>,
    pub exam_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResultFilter {
    pub student_id: Option<i32>,
    pub course_id: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct ResultResponse {
    pub id: i32,
    pub enrollment_id: i32,
    pub student_id: Option<i32>,
    pub student_name: Option<String>,
    pub course_id: Option<i32>,
    pub course_code: Option<String>,
    pub score: f64,
    pub grade: String,
    pub grade_points: f64,
    pub remarks: Option<String>,
    pub exam_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ExamResult> for ResultResponse {
    fn from(result: ExamResult) -> Self {
        let letter = result
            .grade
            .parse::<LetterGrade>()
            .unwrap_or_else(|_| LetterGrade::from_score(result.score));

        Self {
            id: result.id,
            enrollment_id: result.enrollment_id,
            student_id: result.student_id,
            student_name: result.student_name,
            course_id: result.course_id,
            course_code: result.course_code,
            score: result.score,
            grade: letter.to_string(),
            grade_points: letter.points(),
            remarks: result.remarks,
            exam_date: result.exam_date,
            created_at: result.created_at,
            updated_at: result.updated_at,
        }
    }
}
