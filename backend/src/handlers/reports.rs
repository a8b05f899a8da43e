use axum::{
    extract::{Extension, State},
    http::header,
    response::{IntoResponse, Json, Response},
};

use crate::{
    middleware::auth::{AuthUser, GRADING_ROLES},
    models::report::{ExportFormat, ExportQuery, GradeReport, SummaryReport, Transcript},
    services::report::{grade_report_csv, transcript_csv, ReportService},
    utils::{
        errors::AppError,
        extract::{ApiPath, ApiQuery},
        logger::{meta, LOGGER},
    },
    AppState,
};

use super::ensure_student_access;

fn csv_attachment(filename: String, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response()
}

fn unsupported_format(format: ExportFormat) -> AppError {
    let name = match format {
        ExportFormat::Csv => "csv",
        ExportFormat::Pdf => "pdf",
        ExportFormat::Excel => "excel",
    };
    AppError::NotImplemented(format!("Export format '{}' is not supported yet", name))
}

pub async fn get_transcript(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    ApiPath(student_id): ApiPath<i32>,
) -> Result<Json<Transcript>, AppError> {
    ensure_student_access(&state, &auth_user, student_id).await?;

    let transcript = ReportService::new(state.db.clone())
        .transcript(student_id)
        .await?;

    Ok(Json(transcript))
}

pub async fn export_transcript(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    ApiPath(student_id): ApiPath<i32>,
    ApiQuery(query): ApiQuery<ExportQuery>,
) -> Result<Response, AppError> {
    ensure_student_access(&state, &auth_user, student_id).await?;

    let format = query.format.unwrap_or(ExportFormat::Csv);
    if format != ExportFormat::Csv {
        return Err(unsupported_format(format));
    }

    let transcript = ReportService::new(state.db.clone())
        .transcript(student_id)
        .await?;

    LOGGER.log_business_event(
        "transcript_exported",
        Some(auth_user.user_id),
        meta("student_id", student_id),
    );

    Ok(csv_attachment(
        format!("transcript_{}.csv", transcript.enrollment_number),
        transcript_csv(&transcript),
    ))
}

pub async fn get_grade_report(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    ApiPath(course_id): ApiPath<i32>,
) -> Result<Json<GradeReport>, AppError> {
    auth_user.require_any(GRADING_ROLES)?;

    let report = ReportService::new(state.db.clone())
        .grade_report(course_id)
        .await?;

    Ok(Json(report))
}

pub async fn export_grade_report(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    ApiPath(course_id): ApiPath<i32>,
    ApiQuery(query): ApiQuery<ExportQuery>,
) -> Result<Response, AppError> {
    auth_user.require_any(GRADING_ROLES)?;

    let format = query.format.unwrap_or(ExportFormat::Csv);
    if format != ExportFormat::Csv {
        return Err(unsupported_format(format));
    }

    let report = ReportService::new(state.db.clone())
        .grade_report(course_id)
        .await?;

    LOGGER.log_business_event(
        "grade_report_exported",
        Some(auth_user.user_id),
        meta("course_id", course_id),
    );

    Ok(csv_attachment(
        format!("grades_{}.csv", report.course_code),
        grade_report_csv(&report),
    ))
}

pub async fn get_summary(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<SummaryReport>, AppError> {
    auth_user.require_any(GRADING_ROLES)?;

    let summary = ReportService::new(state.db.clone()).summary().await?;
    Ok(Json(summary))
}
