use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::Json,
};
use validator::Validate;

use crate::{
    middleware::auth::{AuthUser, STAFF_ROLES},
    models::{
        enrollment::EnrollmentResponse,
        report::StudentGpaResponse,
        student::{CreateStudentRequest, StudentResponse, UpdateStudentRequest},
        PageQuery, PagedResponse,
    },
    services::{enrollment::EnrollmentService, student::StudentService},
    utils::{
        errors::AppError,
        extract::{ApiJson, ApiPath, ApiQuery},
        logger::{meta, LOGGER},
    },
    AppState,
};

use super::ensure_student_access;

pub async fn list_students(
    State(state): State<AppState>,
    Extension(_auth_user): Extension<AuthUser>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<PagedResponse<StudentResponse>>, AppError> {
    let page = StudentService::new(state.db.clone()).list(&query).await?;
    Ok(Json(page.map(StudentResponse::from)))
}

pub async fn get_student(
    State(state): State<AppState>,
    Extension(_auth_user): Extension<AuthUser>,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<StudentResponse>, AppError> {
    let student = StudentService::new(state.db.clone()).get(id).await?;
    Ok(Json(StudentResponse::from(student)))
}

pub async fn create_student(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    ApiJson(payload): ApiJson<CreateStudentRequest>,
) -> Result<(StatusCode, Json<StudentResponse>), AppError> {
    auth_user.require_any(STAFF_ROLES)?;
    payload.validate()?;

    let student = StudentService::new(state.db.clone()).create(&payload).await?;

    LOGGER.log_business_event("student_created", Some(auth_user.user_id), meta("student_id", student.id));

    Ok((StatusCode::CREATED, Json(StudentResponse::from(student))))
}

pub async fn update_student(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(payload): ApiJson<UpdateStudentRequest>,
) -> Result<Json<StudentResponse>, AppError> {
    auth_user.require_any(STAFF_ROLES)?;
    payload.validate()?;

    let student = StudentService::new(state.db.clone())
        .update(id, &payload)
        .await?;

    LOGGER.log_business_event("student_updated", Some(auth_user.user_id), meta("student_id", id));

    Ok(Json(StudentResponse::from(student)))
}

pub async fn delete_student(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    ApiPath(id): ApiPath<i32>,
) -> Result<StatusCode, AppError> {
    auth_user.require_any(STAFF_ROLES)?;

    StudentService::new(state.db.clone()).delete(id).await?;

    LOGGER.log_business_event("student_deleted", Some(auth_user.user_id), meta("student_id", id));

    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_student_enrollments(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<Vec<EnrollmentResponse>>, AppError> {
    ensure_student_access(&state, &auth_user, id).await?;

    let enrollments = StudentService::new(state.db.clone())
        .enrollments(id)
        .await?;

    Ok(Json(
        enrollments.into_iter().map(EnrollmentResponse::from).collect(),
    ))
}

pub async fn get_student_gpa(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<StudentGpaResponse>, AppError> {
    ensure_student_access(&state, &auth_user, id).await?;

    let summary = EnrollmentService::new(state.db.clone())
        .student_gpa(id)
        .await?;

    Ok(Json(StudentGpaResponse {
        student_id: id,
        gpa: summary.gpa,
        total_credits: summary.total_credits,
        graded_credits: summary.graded_credits,
        graded_courses: summary.graded_courses,
    }))
}
