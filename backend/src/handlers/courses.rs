use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::Json,
};
use validator::Validate;

use crate::{
    middleware::auth::{AuthUser, STAFF_ROLES},
    models::{
        course::{AssignTeacherRequest, CourseResponse, CreateCourseRequest, UpdateCourseRequest},
        enrollment::EnrollmentResponse,
        PageQuery, PagedResponse,
    },
    services::course::CourseService,
    utils::{
        errors::AppError,
        extract::{ApiJson, ApiPath, ApiQuery},
        logger::{meta, LOGGER},
    },
    AppState,
};

pub async fn list_courses(
    State(state): State<AppState>,
    Extension(_auth_user): Extension<AuthUser>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<PagedResponse<CourseResponse>>, AppError> {
    let page = CourseService::new(state.db.clone()).list(&query).await?;
    Ok(Json(page.map(CourseResponse::from)))
}

pub async fn get_course(
    State(state): State<AppState>,
    Extension(_auth_user): Extension<AuthUser>,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<CourseResponse>, AppError> {
    let course = CourseService::new(state.db.clone()).get(id).await?;
    Ok(Json(CourseResponse::from(course)))
}

pub async fn create_course(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    ApiJson(payload): ApiJson<CreateCourseRequest>,
) -> Result<(StatusCode, Json<CourseResponse>), AppError> {
    auth_user.require_any(STAFF_ROLES)?;
    payload.validate()?;

    let course = CourseService::new(state.db.clone()).create(&payload).await?;

    let mut metadata = meta("course_id", course.id);
    metadata.insert("code".to_string(), course.code.clone().into());
    LOGGER.log_business_event("course_created", Some(auth_user.user_id), metadata);

    Ok((StatusCode::CREATED, Json(CourseResponse::from(course))))
}

pub async fn update_course(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(payload): ApiJson<UpdateCourseRequest>,
) -> Result<Json<CourseResponse>, AppError> {
    auth_user.require_any(STAFF_ROLES)?;
    payload.validate()?;

    let course = CourseService::new(state.db.clone())
        .update(id, &payload)
        .await?;

    Ok(Json(CourseResponse::from(course)))
}

pub async fn assign_teacher(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(payload): ApiJson<AssignTeacherRequest>,
) -> Result<Json<CourseResponse>, AppError> {
    auth_user.require_any(STAFF_ROLES)?;

    let course = CourseService::new(state.db.clone())
        .assign_teacher(id, payload.teacher_id)
        .await?;

    let mut metadata = meta("course_id", id);
    metadata.insert("teacher_id".to_string(), payload.teacher_id.into());
    LOGGER.log_business_event("course_teacher_assigned", Some(auth_user.user_id), metadata);

    Ok(Json(CourseResponse::from(course)))
}

pub async fn delete_course(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    ApiPath(id): ApiPath<i32>,
) -> Result<StatusCode, AppError> {
    auth_user.require_any(STAFF_ROLES)?;

    CourseService::new(state.db.clone()).delete(id).await?;

    LOGGER.log_business_event("course_deleted", Some(auth_user.user_id), meta("course_id", id));

    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_course_enrollments(
    State(state): State<AppState>,
    Extension(_auth_user): Extension<AuthUser>,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<Vec<EnrollmentResponse>>, AppError> {
    let enrollments = CourseService::new(state.db.clone()).enrollments(id).await?;
    Ok(Json(
        enrollments.into_iter().map(EnrollmentResponse::from).collect(),
    ))
}
