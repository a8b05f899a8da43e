use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::Json,
};
use validator::Validate;

use crate::{
    middleware::auth::{AuthUser, ADMIN_ONLY},
    models::{
        course::CourseResponse,
        teacher::{CreateTeacherRequest, TeacherResponse, UpdateTeacherRequest},
        PageQuery, PagedResponse,
    },
    services::teacher::TeacherService,
    utils::{
        errors::AppError,
        extract::{ApiJson, ApiPath, ApiQuery},
        logger::{meta, LOGGER},
    },
    AppState,
};

pub async fn list_teachers(
    State(state): State<AppState>,
    Extension(_auth_user): Extension<AuthUser>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<PagedResponse<TeacherResponse>>, AppError> {
    let page = TeacherService::new(state.db.clone()).list(&query).await?;
    Ok(Json(page.map(TeacherResponse::from)))
}

pub async fn get_teacher(
    State(state): State<AppState>,
    Extension(_auth_user): Extension<AuthUser>,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<TeacherResponse>, AppError> {
    let teacher = TeacherService::new(state.db.clone()).get(id).await?;
    Ok(Json(TeacherResponse::from(teacher)))
}

pub async fn create_teacher(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    ApiJson(payload): ApiJson<CreateTeacherRequest>,
) -> Result<(StatusCode, Json<TeacherResponse>), AppError> {
    auth_user.require_any(ADMIN_ONLY)?;
    payload.validate()?;

    let teacher = TeacherService::new(state.db.clone()).create(&payload).await?;

    LOGGER.log_business_event("teacher_created", Some(auth_user.user_id), meta("teacher_id", teacher.id));

    Ok((StatusCode::CREATED, Json(TeacherResponse::from(teacher))))
}

pub async fn update_teacher(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(payload): ApiJson<UpdateTeacherRequest>,
) -> Result<Json<TeacherResponse>, AppError> {
    auth_user.require_any(ADMIN_ONLY)?;
    payload.validate()?;

    let teacher = TeacherService::new(state.db.clone())
        .update(id, &payload)
        .await?;

    Ok(Json(TeacherResponse::from(teacher)))
}

pub async fn delete_teacher(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    ApiPath(id): ApiPath<i32>,
) -> Result<StatusCode, AppError> {
    auth_user.require_any(ADMIN_ONLY)?;

    TeacherService::new(state.db.clone()).delete(id).await?;

    LOGGER.log_business_event("teacher_deleted", Some(auth_user.user_id), meta("teacher_id", id));

    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_teacher_courses(
    State(state): State<AppState>,
    Extension(_auth_user): Extension<AuthUser>,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<Vec<CourseResponse>>, AppError> {
    let courses = TeacherService::new(state.db.clone()).courses(id).await?;
    Ok(Json(courses.into_iter().map(CourseResponse::from).collect()))
}
