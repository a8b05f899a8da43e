use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::Json,
};
use validator::Validate;

use crate::{
    middleware::auth::{AuthUser, GRADING_ROLES, STAFF_ROLES},
    models::enrollment::{
        CreateEnrollmentRequest, EnrollmentFilter, EnrollmentResponse, SetGradeRequest,
        UpdateEnrollmentStatusRequest,
    },
    services::enrollment::EnrollmentService,
    utils::{
        errors::AppError,
        extract::{ApiJson, ApiPath, ApiQuery},
        logger::{meta, LOGGER},
    },
    AppState,
};

use super::{ensure_student_access, scope_student_filter};

pub async fn list_enrollments(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    ApiQuery(mut filter): ApiQuery<EnrollmentFilter>,
) -> Result<Json<Vec<EnrollmentResponse>>, AppError> {
    filter.student_id = scope_student_filter(&state, &auth_user, filter.student_id).await?;

    let enrollments = EnrollmentService::new(state.db.clone())
        .list(&filter)
        .await?;

    Ok(Json(
        enrollments.into_iter().map(EnrollmentResponse::from).collect(),
    ))
}

pub async fn get_enrollment(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<EnrollmentResponse>, AppError> {
    let enrollment = EnrollmentService::new(state.db.clone()).get(id).await?;
    ensure_student_access(&state, &auth_user, enrollment.student_id).await?;
    Ok(Json(EnrollmentResponse::from(enrollment)))
}

pub async fn create_enrollment(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    ApiJson(payload): ApiJson<CreateEnrollmentRequest>,
) -> Result<(StatusCode, Json<EnrollmentResponse>), AppError> {
    auth_user.require_any(STAFF_ROLES)?;
    payload.validate()?;

    let enrollment = EnrollmentService::new(state.db.clone())
        .create(&payload)
        .await?;

    let mut metadata = meta("enrollment_id", enrollment.id);
    metadata.insert("student_id".to_string(), enrollment.student_id.into());
    metadata.insert("course_id".to_string(), enrollment.course_id.into());
    LOGGER.log_business_event("student_enrolled", Some(auth_user.user_id), metadata);

    Ok((StatusCode::CREATED, Json(EnrollmentResponse::from(enrollment))))
}

pub async fn update_enrollment_status(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(payload): ApiJson<UpdateEnrollmentStatusRequest>,
) -> Result<Json<EnrollmentResponse>, AppError> {
    auth_user.require_any(GRADING_ROLES)?;
    payload.validate()?;

    let (enrollment, previous) = EnrollmentService::new(state.db.clone())
        .update_status(id, &payload)
        .await?;

    let mut metadata = meta("enrollment_id", id);
    metadata.insert("from".to_string(), previous.as_str().into());
    metadata.insert("to".to_string(), enrollment.status.as_str().into());
    LOGGER.log_business_event("enrollment_status_changed", Some(auth_user.user_id), metadata);

    Ok(Json(EnrollmentResponse::from(enrollment)))
}

pub async fn set_enrollment_grade(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(payload): ApiJson<SetGradeRequest>,
) -> Result<Json<EnrollmentResponse>, AppError> {
    auth_user.require_any(GRADING_ROLES)?;
    payload.validate()?;

    let enrollment = EnrollmentService::new(state.db.clone())
        .set_grade(id, payload.grade)
        .await?;

    let mut metadata = meta("enrollment_id", id);
    metadata.insert("grade".to_string(), payload.grade.into());
    LOGGER.log_business_event("enrollment_graded", Some(auth_user.user_id), metadata);

    Ok(Json(EnrollmentResponse::from(enrollment)))
}

pub async fn delete_enrollment(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    ApiPath(id): ApiPath<i32>,
) -> Result<StatusCode, AppError> {
    auth_user.require_any(STAFF_ROLES)?;

    EnrollmentService::new(state.db.clone()).delete(id).await?;

    LOGGER.log_business_event("enrollment_deleted", Some(auth_user.user_id), meta("enrollment_id", id));

    Ok(StatusCode::NO_CONTENT)
}
