use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::Json,
};
use validator::Validate;

use crate::{
    middleware::auth::{AuthUser, ADMIN_ONLY},
    models::{
        department::{CreateDepartmentRequest, DepartmentResponse, UpdateDepartmentRequest},
        teacher::TeacherResponse,
    },
    services::{department::DepartmentService, teacher::TeacherService},
    utils::{
        errors::AppError,
        extract::{ApiJson, ApiPath},
        logger::{meta, LOGGER},
    },
    AppState,
};

pub async fn list_departments(
    State(state): State<AppState>,
    Extension(_auth_user): Extension<AuthUser>,
) -> Result<Json<Vec<DepartmentResponse>>, AppError> {
    let departments = DepartmentService::new(state.db.clone()).list().await?;
    Ok(Json(
        departments.into_iter().map(DepartmentResponse::from).collect(),
    ))
}

pub async fn get_department(
    State(state): State<AppState>,
    Extension(_auth_user): Extension<AuthUser>,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<DepartmentResponse>, AppError> {
    let department = DepartmentService::new(state.db.clone()).get(id).await?;
    Ok(Json(DepartmentResponse::from(department)))
}

pub async fn create_department(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    ApiJson(payload): ApiJson<CreateDepartmentRequest>,
) -> Result<(StatusCode, Json<DepartmentResponse>), AppError> {
    auth_user.require_any(ADMIN_ONLY)?;
    payload.validate()?;

    let department = DepartmentService::new(state.db.clone())
        .create(&payload)
        .await?;

    LOGGER.log_business_event(
        "department_created",
        Some(auth_user.user_id),
        meta("department_id", department.id),
    );

    Ok((StatusCode::CREATED, Json(DepartmentResponse::from(department))))
}

pub async fn update_department(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(payload): ApiJson<UpdateDepartmentRequest>,
) -> Result<Json<DepartmentResponse>, AppError> {
    auth_user.require_any(ADMIN_ONLY)?;
    payload.validate()?;

    let department = DepartmentService::new(state.db.clone())
        .update(id, &payload)
        .await?;

    Ok(Json(DepartmentResponse::from(department)))
}

pub async fn delete_department(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    ApiPath(id): ApiPath<i32>,
) -> Result<StatusCode, AppError> {
    auth_user.require_any(ADMIN_ONLY)?;

    DepartmentService::new(state.db.clone()).delete(id).await?;

    LOGGER.log_business_event("department_deleted", Some(auth_user.user_id), meta("department_id", id));

    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_department_teachers(
    State(state): State<AppState>,
    Extension(_auth_user): Extension<AuthUser>,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<Vec<TeacherResponse>>, AppError> {
    DepartmentService::new(state.db.clone()).get(id).await?;

    let teachers = TeacherService::new(state.db.clone())
        .by_department(id)
        .await?;

    Ok(Json(teachers.into_iter().map(TeacherResponse::from).collect()))
}
