use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::utils::validation::{validate_course_code, validate_not_blank};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Course {
    pub id: i32,
    pub code: String,
    pub title: String,
    pub credits: i32,
    pub description: Option<String>,
    pub teacher_id: Option<i32>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Filled when the query joins `teachers`.
    #[sqlx(default)]
    pub teacher_name: Option<String>,
    #[sqlx(default)]
    pub enrollment_count: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCourseRequest {
    #[validate(custom = "validate_course_code")]
    pub code: String,
    #[validate(length(min = 1, max = 200), custom = "validate_not_blank")]
    pub title: String,
    #[validate(range(min = 1, max = 12, message = "Credits must be between 1 and 12"))]
    pub credits: i32,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub teacher_id: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCourseRequest {
    #[validate(custom = "validate_course_code")]
    pub code: Option<String>,
    #[validate(length(min = 1, max = 200), custom = "validate_not_blank")]
    pub title: Option<String>,
    #[validate(range(min = 1, max = 12, message = "Credits must be between 1 and 12"))]
    pub credits: Option<i32>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
}

/// `teacher_id: null` unassigns the current teacher.
#[derive(Debug, Deserialize)]
pub struct AssignTeacherRequest {
    pub teacher_id: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct CourseResponse {
    pub id: i32,
    pub code: String,
    pub title: String,
    pub credits: i32,
    pub description: Option<String>,
    pub teacher_id: Option<i32>,
    pub teacher_name: Option<String>,
    pub enrollment_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Course> for CourseResponse {
    fn from(course: Course) -> Self {
        Self {
            id: course.id,
            code: course.code,
            title: course.title,
            credits: course.credits,
            description: course.description,
            teacher_id: course.teacher_id,
            teacher_name: course.teacher_name,
            enrollment_count: course.enrollment_count.unwrap_or(0),
            created_at: course.created_at,
            updated_at: course.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credits_out_of_range_rejected() {
        let request = CreateCourseRequest {
            code: "CS101".into(),
            title: "Intro".into(),
            credits: 13,
            description: None,
            teacher_id: None,
        };
        assert!(request.validate().unwrap_err().field_errors().contains_key("credits"));

        let request = CreateCourseRequest { credits: 0, ..request };
        assert!(request.validate().is_err());

        let request = CreateCourseRequest { credits: 4, ..request };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn bad_code_rejected() {
        let request = UpdateCourseRequest {
            code: Some("not a code".into()),
            title: None,
            credits: None,
            description: None,
        };
        assert!(request.validate().unwrap_err().field_errors().contains_key("code"));
    }

    #[test]
    fn blank_title_rejected() {
        let request = CreateCourseRequest {
            code: "CS101".into(),
            title: "  ".into(),
            credits: 3,
            description: None,
            teacher_id: None,
        };
        assert!(request.validate().unwrap_err().field_errors().contains_key("title"));
    }
}
