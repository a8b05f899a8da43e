use axum::{extract::State, http::StatusCode, response::Json};
use validator::Validate;

use crate::{
    models::{
        student::StudentResponse,
        user::{LoginRequest, LoginResponse, RegisterRequest, UserResponse},
    },
    services::{user::UserService, ServiceError},
    utils::{
        errors::AppError,
        extract::ApiJson,
        jwt::create_jwt,
        logger::{meta, LOGGER},
    },
    AppState,
};

#[derive(Debug, serde::Serialize)]
pub struct RegisterResponse {
    pub user: UserResponse,
    pub student: StudentResponse,
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    payload.validate()?;

    let user = match UserService::new(state.db.clone())
        .authenticate(&payload.username, &payload.password)
        .await
    {
        Ok(user) => user,
        Err(ServiceError::Unauthorized(msg)) => {
            LOGGER.log_business_event(
                "login_failed",
                None,
                meta("username", payload.username.trim()),
            );
            return Err(AppError::Unauthorized(msg));
        }
        Err(e) => return Err(e.into()),
    };

    let token = create_jwt(
        user.id,
        &user.username,
        user.role.as_str(),
        &state.jwt_secret,
        state.jwt_expiry_hours,
    )
    .map_err(|_| AppError::InternalServerError("Failed to create token".to_string()))?;

    LOGGER.log_business_event("login_succeeded", Some(user.id), meta("role", user.role.as_str()));

    Ok(Json(LoginResponse {
        token,
        token_type: "Bearer",
        expires_in: state.jwt_expiry_hours * 3600,
        user: UserResponse::from(user),
    }))
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    payload.validate()?;

    let (user, student) = UserService::new(state.db.clone())
        .register(&payload)
        .await?;

    LOGGER.log_business_event("student_registered", Some(user.id), meta("student_id", student.id));

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: UserResponse::from(user),
            student: StudentResponse::from(student),
        }),
    ))
}
