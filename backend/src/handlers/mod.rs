pub mod account;
pub mod auth;
pub mod courses;
pub mod departments;
pub mod enrollments;
pub mod reports;
pub mod results;
pub mod students;
pub mod teachers;

use crate::{
    middleware::auth::AuthUser,
    services::user::UserService,
    utils::{
        errors::AppError,
        logger::{meta, LOGGER},
    },
    AppState,
};

async fn linked_student_id(state: &AppState, auth_user: &AuthUser) -> Result<Option<i32>, AppError> {
    let user = UserService::new(state.db.clone())
        .get(auth_user.user_id)
        .await?;
    Ok(user.student_id)
}

fn forbidden_student_access(auth_user: &AuthUser, student_id: Option<i32>) -> AppError {
    LOGGER.log_business_event(
        "forbidden_access",
        Some(auth_user.user_id),
        meta("student_id", student_id),
    );
    AppError::Forbidden("Students can only view their own academic records".to_string())
}

/// Students reach only their own grades; every other role passes.
pub(crate) async fn ensure_student_access(
    state: &AppState,
    auth_user: &AuthUser,
    student_id: i32,
) -> Result<(), AppError> {
    if !auth_user.is_student() {
        return Ok(());
    }

    if linked_student_id(state, auth_user).await? == Some(student_id) {
        Ok(())
    } else {
        Err(forbidden_student_access(auth_user, Some(student_id)))
    }
}

/// Narrows a `student_id` list filter to the caller's own record when the caller is a student.
pub(crate) async fn scope_student_filter(
    state: &AppState,
    auth_user: &AuthUser,
    requested: Option<i32>,
) -> Result<Option<i32>, AppError> {
    if !auth_user.is_student() {
        return Ok(requested);
    }

    match linked_student_id(state, auth_user).await? {
        Some(own) if requested.map_or(true, |id| id == own) => Ok(Some(own)),
        _ => Err(forbidden_student_access(auth_user, requested)),
    }
}
