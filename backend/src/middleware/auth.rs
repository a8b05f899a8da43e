use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::{
    models::user::UserRole,
    utils::{errors::AppError, jwt::verify_jwt, logger::LOGGER},
    AppState,
};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i32,
    pub username: String,
    pub role: UserRole,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        matches!(self.role, UserRole::Admin)
    }

    pub fn is_student(&self) -> bool {
        matches!(self.role, UserRole::Student)
    }

    pub fn role_str(&self) -> &'static str {
        self.role.as_str()
    }

    /// Fails with 403 unless the caller holds one of `roles`.
    pub fn require_any(&self, roles: &[UserRole]) -> Result<(), AppError> {
        if roles.contains(&self.role) {
            return Ok(());
        }

        LOGGER.log_business_event(
            "forbidden_access",
            Some(self.user_id),
            [(
                "role".to_string(),
                serde_json::Value::String(self.role_str().to_string()),
            )]
            .into_iter()
            .collect(),
        );
        Err(AppError::Forbidden(
            "You do not have permission to perform this action".to_string(),
        ))
    }
}

pub const STAFF_ROLES: &[UserRole] = &[UserRole::Admin, UserRole::Staff];
pub const ADMIN_ONLY: &[UserRole] = &[UserRole::Admin];
pub const GRADING_ROLES: &[UserRole] = &[UserRole::Admin, UserRole::Staff, UserRole::Teacher];

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|header| header.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;

    let claims = verify_jwt(token, &state.jwt_secret)
        .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))?;

    let role = claims
        .role
        .parse::<UserRole>()
        .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))?;

    let auth_user = AuthUser {
        user_id: claims.sub,
        username: claims.username,
        role,
    };

    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let user_id = auth_user.user_id;

    request.extensions_mut().insert(auth_user);
    let response = next.run(request).await;

    LOGGER.log_request(&method, &path, Some(user_id), response.status().as_u16());
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: UserRole) -> AuthUser {
        AuthUser {
            user_id: 3,
            username: "someone".to_string(),
            role,
        }
    }

    #[test]
    fn require_any_checks_membership() {
        assert!(user(UserRole::Staff).require_any(STAFF_ROLES).is_ok());
        assert!(user(UserRole::Teacher).require_any(GRADING_ROLES).is_ok());
        assert!(matches!(
            user(UserRole::Student).require_any(STAFF_ROLES),
            Err(AppError::Forbidden(_))
        ));
        assert!(user(UserRole::Staff).require_any(ADMIN_ONLY).is_err());
    }

    #[test]
    fn role_helpers() {
        assert!(user(UserRole::Admin).is_admin());
        assert!(user(UserRole::Student).is_student());
        assert_eq!(user(UserRole::Teacher).role_str(), "teacher");
    }
}
