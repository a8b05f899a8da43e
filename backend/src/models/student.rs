use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::utils::validation::{validate_identifier, validate_not_blank, validate_phone};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Student {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub date_of_birth: NaiveDate,
    pub enrollment_number: String,
    pub phone: Option<String>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Student {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateStudentRequest {
    #[validate(length(min = 1, max = 100), custom = "validate_not_blank")]
    pub first_name: String,
    #[validate(length(min = 1, max = 100), custom = "validate_not_blank")]
    pub last_name: String,
    #[validate(email)]
    pub email: String,
    pub date_of_birth: NaiveDate,
    #[validate(custom = "validate_identifier")]
    pub enrollment_number: String,
    #[validate(custom = "validate_phone")]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStudentRequest {
    #[validate(length(min = 1, max = 100), custom = "validate_not_blank")]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100), custom = "validate_not_blank")]
    pub last_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    #[validate(custom = "validate_identifier")]
    pub enrollment_number: Option<String>,
    #[validate(custom = "validate_phone")]
    pub phone: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StudentResponse {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub email: String,
    pub date_of_birth: NaiveDate,
    pub enrollment_number: String,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Student> for StudentResponse {
    fn from(student: Student) -> Self {
        Self {
            full_name: student.full_name(),
            id: student.id,
            first_name: student.first_name,
            last_name: student.last_name,
            email: student.email,
            date_of_birth: student.date_of_birth,
            enrollment_number: student.enrollment_number,
            phone: student.phone,
            created_at: student.created_at,
            updated_at: student.updated_at,
        }
    }
}
