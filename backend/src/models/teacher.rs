use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::utils::validation::{validate_identifier, validate_not_blank, validate_phone};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Teacher {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub employee_id: String,
    pub phone: Option<String>,
    pub department_id: Option<i32>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Filled when the query joins `departments`.
    #[sqlx(default)]
    pub department_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTeacherRequest {
    #[validate(length(min = 1, max = 100), custom = "validate_not_blank")]
    pub first_name: String,
    #[validate(length(min = 1, max = 100), custom = "validate_not_blank")]
    pub last_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(custom = "validate_identifier")]
    pub employee_id: String,
    #[validate(custom = "validate_phone")]
    pub phone: Option<String>,
    pub department_id: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTeacherRequest {
    #[validate(length(min = 1, max = 100), custom = "validate_not_blank")]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100), custom = "validate_not_blank")]
    pub last_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(custom = "validate_identifier")]
    pub employee_id: Option<String>,
    #[validate(custom = "validate_phone")]
    pub phone: Option<String>,
    pub department_id: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct TeacherResponse {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub email: String,
    pub employee_id: String,
    pub phone: Option<String>,
    pub department_id: Option<i32>,
    pub department_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Teacher> for TeacherResponse {
    fn from(teacher: Teacher) -> Self {
        Self {
            full_name: format!("{} {}", teacher.first_name, teacher.last_name),
            id: teacher.id,
            first_name: teacher.first_name,
            last_name: teacher.last_name,
            email: teacher.email,
            employee_id: teacher.employee_id,
            phone: teacher.phone,
            department_id: teacher.department_id,
            department_name: teacher.department_name,
            created_at: teacher.created_at,
            updated_at: teacher.updated_at,
        }
    }
}
