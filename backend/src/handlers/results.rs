use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::Json,
};
use validator::Validate;

use crate::{
    middleware::auth::{AuthUser, GRADING_ROLES},
    models::exam_result::{
        CreateResultRequest, ExamResult, ResultFilter, ResultResponse, UpdateResultRequest,
    },
    services::exam_result::ExamResultService,
    utils::{
        errors::AppError,
        extract::{ApiJson, ApiPath, ApiQuery},
        logger::{meta, LOGGER},
    },
    AppState,
};

use super::{ensure_student_access, scope_student_filter};

async fn ensure_result_access(
    state: &AppState,
    auth_user: &AuthUser,
    result: &ExamResult,
) -> Result<(), AppError> {
    match result.student_id {
        Some(student_id) => ensure_student_access(state, auth_user, student_id).await,
        None if auth_user.is_student() => Err(AppError::Forbidden(
            "Students can only view their own academic records".to_string(),
        )),
        None => Ok(()),
    }
}

pub async fn list_results(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    ApiQuery(mut filter): ApiQuery<ResultFilter>,
) -> Result<Json<Vec<ResultResponse>>, AppError> {
    filter.student_id = scope_student_filter(&state, &auth_user, filter.student_id).await?;

    let results = ExamResultService::new(state.db.clone()).list(&filter).await?;
    Ok(Json(results.into_iter().map(ResultResponse::from).collect()))
}

pub async fn get_result(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<ResultResponse>, AppError> {
    let result = ExamResultService::new(state.db.clone()).get(id).await?;
    ensure_result_access(&state, &auth_user, &result).await?;
    Ok(Json(ResultResponse::from(result)))
}

pub async fn get_result_by_enrollment(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    ApiPath(enrollment_id): ApiPath<i32>,
) -> Result<Json<ResultResponse>, AppError> {
    let result = ExamResultService::new(state.db.clone())
        .get_by_enrollment(enrollment_id)
        .await?;
    ensure_result_access(&state, &auth_user, &result).await?;
    Ok(Json(ResultResponse::from(result)))
}

pub async fn create_result(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    ApiJson(payload): ApiJson<CreateResultRequest>,
) -> Result<(StatusCode, Json<ResultResponse>), AppError> {
    auth_user.require_any(GRADING_ROLES)?;
    payload.validate()?;

    let result = ExamResultService::new(state.db.clone())
        .create(&payload)
        .await?;

    let mut metadata = meta("result_id", result.id);
    metadata.insert("enrollment_id".to_string(), result.enrollment_id.into());
    metadata.insert("grade".to_string(), result.grade.clone().into());
    LOGGER.log_business_event("result_recorded", Some(auth_user.user_id), metadata);

    Ok((StatusCode::CREATED, Json(ResultResponse::from(result))))
}

pub async fn update_result(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(payload): ApiJson<UpdateResultRequest>,
) -> Result<Json<ResultResponse>, AppError> {
    auth_user.require_any(GRADING_ROLES)?;
    payload.validate()?;

    let result = ExamResultService::new(state.db.clone())
        .update(id, &payload)
        .await?;

    LOGGER.log_business_event("result_updated", Some(auth_user.user_id), meta("result_id", id));

    Ok(Json(ResultResponse::from(result)))
}

pub async fn delete_result(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    ApiPath(id): ApiPath<i32>,
) -> Result<StatusCode, AppError> {
    auth_user.require_any(GRADING_ROLES)?;

    ExamResultService::new(state.db.clone()).delete(id).await?;

    LOGGER.log_business_event("result_deleted", Some(auth_user.user_id), meta("result_id", id));

    Ok(StatusCode::NO_CONTENT)
}
