use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::Json,
};
use validator::Validate;

use crate::{
    middleware::auth::{AuthUser, ADMIN_ONLY},
    models::user::{ChangePasswordRequest, CreateUserRequest, UserResponse},
    services::user::UserService,
    utils::{
        errors::AppError,
        extract::{ApiJson, ApiPath},
        logger::{meta, LOGGER},
    },
    AppState,
};

pub async fn me(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<UserResponse>, AppError> {
    let user = UserService::new(state.db.clone())
        .get(auth_user.user_id)
        .await?;

    Ok(Json(UserResponse::from(user)))
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    ApiJson(payload): ApiJson<ChangePasswordRequest>,
) -> Result<StatusCode, AppError> {
    payload.validate()?;

    UserService::new(state.db.clone())
        .change_password(
            auth_user.user_id,
            &payload.current_password,
            &payload.new_password,
        )
        .await?;

    LOGGER.log_business_event(
        "password_changed",
        Some(auth_user.user_id),
        meta("username", auth_user.username.as_str()),
    );

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    auth_user.require_any(ADMIN_ONLY)?;

    let users = UserService::new(state.db.clone()).list().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

pub async fn create_user(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    ApiJson(payload): ApiJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    auth_user.require_any(ADMIN_ONLY)?;
    payload.validate()?;

    let user = UserService::new(state.db.clone()).create(&payload).await?;

    let mut metadata = meta("created_user_id", user.id);
    metadata.insert(
        "created_role".to_string(),
        serde_json::Value::String(user.role.to_string()),
    );
    LOGGER.log_business_event("user_created", Some(auth_user.user_id), metadata);

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

pub async fn deactivate_user(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    ApiPath(id): ApiPath<i32>,
) -> Result<StatusCode, AppError> {
    auth_user.require_any(ADMIN_ONLY)?;

    UserService::new(state.db.clone())
        .deactivate(id, auth_user.user_id)
        .await?;

    LOGGER.log_business_event("user_deactivated", Some(auth_user.user_id), meta("target_user_id", id));

    Ok(StatusCode::NO_CONTENT)
}
