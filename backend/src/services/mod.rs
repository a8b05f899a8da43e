pub mod course;
pub mod department;
pub mod enrollment;
pub mod exam_result;
pub mod grading;
pub mod report;
pub mod student;
pub mod teacher;
pub mod user;

use thiserror::Error;

/// Failures raised by the application services, mapped to HTTP at the handler boundary.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    InvalidOperation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    Internal(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
