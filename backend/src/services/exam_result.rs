use sqlx::PgPool;

use crate::models::{
    enrollment::EnrollmentStatus,
    exam_result::{CreateResultRequest, ExamResult, ResultFilter, UpdateResultRequest},
};
use crate::services::{
    enrollment::EnrollmentService,
    grading::{clamp_score, LetterGrade},
    ServiceError, ServiceResult,
};

const RESULT_SELECT: &str = r#"
    SELECT r.*,
           e.student_id,
           s.first_name || ' ' || s.last_name AS student_name,
           e.course_id,
           c.code AS course_code
    FROM results r
    JOIN enrollments e ON e.id = r.enrollment_id
    JOIN students s ON s.id = e.student_id
    JOIN courses c ON c.id = e.course_id
"#;

#[derive(Debug)]
pub struct ExamResultService {
    pool: PgPool,
}

impl ExamResultService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, filter: &ResultFilter) -> ServiceResult<Vec<ExamResult>> {
        let sql = format!(
            r#"{}
            WHERE e.is_deleted = FALSE
              AND ($1::int IS NULL OR e.student_id = $1)
              AND ($2::int IS NULL OR e.course_id = $2)
            ORDER BY c.code, s.last_name, s.first_name"#,
            RESULT_SELECT
        );

        Ok(sqlx::query_as::<_, ExamResult>(&sql)
            .bind(filter.student_id)
            .bind(filter.course_id)
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn get(&self, id: i32) -> ServiceResult<ExamResult> {
        let sql = format!("{} WHERE r.id = $1 AND e.is_deleted = FALSE", RESULT_SELECT);

        sqlx::query_as::<_, ExamResult>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Result {} not found", id)))
    }

    pub async fn get_by_enrollment(&self, enrollment_id: i32) -> ServiceResult<ExamResult> {
        let sql = format!(
            "{} WHERE r.enrollment_id = $1 AND e.is_deleted = FALSE",
            RESULT_SELECT
        );

        sqlx::query_as::<_, ExamResult>(&sql)
            .bind(enrollment_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("No result recorded for enrollment {}", enrollment_id))
            })
    }

    pub async fn create(&self, request: &CreateResultRequest) -> ServiceResult<ExamResult> {
        let enrollment = EnrollmentService::new(self.pool.clone())
            .get(request.enrollment_id)
            .await?;

        if enrollment.status == EnrollmentStatus::Withdrawn {
            return Err(ServiceError::InvalidOperation(
                "Cannot record a result for a withdrawn enrollment".to_string(),
            ));
        }

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM results WHERE enrollment_id = $1)")
                .bind(request.enrollment_id)
                .fetch_one(&self.pool)
                .await?;

        if exists {
            return Err(ServiceError::Conflict(format!(
                "Enrollment {} already has a result",
                request.enrollment_id
            )));
        }

        let (score, letter) = scored(request.score);

        let mut tx = self.pool.begin().await?;

        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO results (enrollment_id, score, grade, remarks, exam_date)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(request.enrollment_id)
        .bind(score)
        .bind(letter.as_str())
        .bind(&request.remarks)
        .bind(request.exam_date)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE enrollments SET updated_at = NOW() WHERE id = $1")
            .bind(request.enrollment_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.get(id).await
    }

    pub async fn update(&self, id: i32, request: &UpdateResultRequest) -> ServiceResult<ExamResult> {
        let existing = self.get(id).await?;
        let (score, letter) = scored(request.score.unwrap_or(existing.score));

        sqlx::query(
            r#"
            UPDATE results
            SET score = $1,
                grade = $2,
                remarks = COALESCE($3, remarks),
                exam_date = COALESCE($4, exam_date),
                updated_at = NOW()
            WHERE id = $5
            "#,
        )
        .bind(score)
        .bind(letter.as_str())
        .bind(&request.remarks)
        .bind(request.exam_date)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.get(id).await
    }

    pub async fn delete(&self, id: i32) -> ServiceResult<()> {
        let affected = sqlx::query("DELETE FROM results WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if affected == 0 {
            return Err(ServiceError::NotFound(format!("Result {} not found", id)));
        }
        Ok(())
    }
}

/// Clamps the raw score and derives its letter.
fn scored(raw: f64) -> (f64, LetterGrade) {
    let score = clamp_score(raw);
    (score, LetterGrade::from_score(score))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scored_clamps_then_grades() {
        assert_eq!(scored(-20.0), (0.0, LetterGrade::F));
        assert_eq!(scored(95.0), (95.0, LetterGrade::A));
        assert_eq!(scored(65.0), (65.0, LetterGrade::D));
    }
}
