pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use sqlx::PgPool;
use tower_http::{
    catch_panic::CatchPanicLayer, cors::CorsLayer, services::ServeDir, trace::TraceLayer,
};

use crate::{
    config::Config,
    handlers::{account, auth, courses, departments, enrollments, reports, results, students, teachers},
    middleware::auth::auth_middleware,
    utils::errors::panic_response,
};

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,
}

impl AppState {
    pub fn new(db: PgPool, config: &Config) -> Self {
        Self {
            db,
            jwt_secret: config.jwt_secret.clone(),
            jwt_expiry_hours: config.jwt_expiry_hours,
        }
    }
}

fn cors_layer(origin: &str) -> anyhow::Result<CorsLayer> {
    let allow_origin = if origin == "*" {
        HeaderValue::from_static("*")
    } else {
        origin.parse::<HeaderValue>()?
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]))
}

pub fn build_router(state: AppState, config: &Config) -> anyhow::Result<Router> {
    let protected_routes = Router::new()
        .route("/account/me", get(account::me))
        .route("/account/password", put(account::change_password))
        .route(
            "/account/users",
            get(account::list_users).post(account::create_user),
        )
        .route(
            "/account/users/:id",
            axum::routing::delete(account::deactivate_user),
        )
        .route(
            "/students",
            get(students::list_students).post(students::create_student),
        )
        .route(
            "/students/:id",
            get(students::get_student)
                .put(students::update_student)
                .delete(students::delete_student),
        )
        .route(
            "/students/:id/enrollments",
            get(students::get_student_enrollments),
        )
        .route("/students/:id/gpa", get(students::get_student_gpa))
        .route(
            "/teachers",
            get(teachers::list_teachers).post(teachers::create_teacher),
        )
        .route(
            "/teachers/:id",
            get(teachers::get_teacher)
                .put(teachers::update_teacher)
                .delete(teachers::delete_teacher),
        )
        .route("/teachers/:id/courses", get(teachers::get_teacher_courses))
        .route(
            "/departments",
            get(departments::list_departments).post(departments::create_department),
        )
        .route(
            "/departments/:id",
            get(departments::get_department)
                .put(departments::update_department)
                .delete(departments::delete_department),
        )
        .route(
            "/departments/:id/teachers",
            get(departments::get_department_teachers),
        )
        .route(
            "/courses",
            get(courses::list_courses).post(courses::create_course),
        )
        .route(
            "/courses/:id",
            get(courses::get_course)
                .put(courses::update_course)
                .delete(courses::delete_course),
        )
        .route("/courses/:id/teacher", put(courses::assign_teacher))
        .route(
            "/courses/:id/enrollments",
            get(courses::get_course_enrollments),
        )
        .route(
            "/enrollments",
            get(enrollments::list_enrollments).post(enrollments::create_enrollment),
        )
        .route(
            "/enrollments/:id",
            get(enrollments::get_enrollment).delete(enrollments::delete_enrollment),
        )
        .route(
            "/enrollments/:id/status",
            put(enrollments::update_enrollment_status),
        )
        .route(
            "/enrollments/:id/grade",
            put(enrollments::set_enrollment_grade),
        )
        .route(
            "/results",
            get(results::list_results).post(results::create_result),
        )
        .route(
            "/results/:id",
            get(results::get_result)
                .put(results::update_result)
                .delete(results::delete_result),
        )
        .route(
            "/results/enrollment/:enrollment_id",
            get(results::get_result_by_enrollment),
        )
        .route(
            "/reports/students/:id/transcript",
            get(reports::get_transcript),
        )
        .route(
            "/reports/students/:id/transcript/export",
            get(reports::export_transcript),
        )
        .route("/reports/courses/:id/grades", get(reports::get_grade_report))
        .route(
            "/reports/courses/:id/grades/export",
            get(reports::export_grade_report),
        )
        .route("/reports/summary", get(reports::get_summary))
        .layer(from_fn_with_state(state.clone(), auth_middleware));

    let api = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/register", post(auth::register))
        .merge(protected_routes);

    let mut app = Router::new()
        .route("/health", get(|| async { "OK" }))
        .nest("/api", api)
        .with_state(state);

    if let Some(dir) = &config.static_dir {
        tracing::info!("Serving static files from {}", dir);
        app = app.fallback_service(ServeDir::new(dir));
    }

    Ok(app
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(config.max_request_body_bytes()))
        .layer(cors_layer(&config.cors_allowed_origin)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cors_accepts_wildcard_and_explicit_origin() {
        assert!(cors_layer("*").is_ok());
        assert!(cors_layer("http://localhost:3000").is_ok());
    }

    #[test]
    fn cors_rejects_unparseable_origin() {
        assert!(cors_layer("bad\norigin").is_err());
    }
}
