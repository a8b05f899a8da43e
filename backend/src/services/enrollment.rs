use chrono::Utc;
use sqlx::PgPool;

use crate::models::enrollment::{
    CreateEnrollmentRequest, EnrollmentDetail, EnrollmentFilter, EnrollmentStatus,
    UpdateEnrollmentStatusRequest,
};
use crate::services::{
    course::CourseService,
    grading::{compute_gpa, GpaSummary, GradedCredit},
    student::StudentService,
    ServiceError, ServiceResult,
};

pub(crate) const ENROLLMENT_DETAIL_SELECT: &str = r#"
    SELECT e.id, e.student_id, e.course_id, e.enrollment_date, e.status, e.grade,
           e.created_at, e.updated_at,
           s.first_name || ' ' || s.last_name AS student_name,
           s.enrollment_number,
           c.code AS course_code,
           c.title AS course_title,
           c.credits,
           r.score AS result_score
    FROM enrollments e
    JOIN students s ON s.id = e.student_id
    JOIN courses c ON c.id = e.course_id
    LEFT JOIN results r ON r.enrollment_id = e.id
"#;

#[derive(Debug)]
pub struct EnrollmentService {
    pool: PgPool,
}

impl EnrollmentService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, filter: &EnrollmentFilter) -> ServiceResult<Vec<EnrollmentDetail>> {
        let sql = format!(
            r#"{}
            WHERE e.is_deleted = FALSE
              AND ($1::int IS NULL OR e.student_id = $1)
              AND ($2::int IS NULL OR e.course_id = $2)
              AND ($3::enrollment_status IS NULL OR e.status = $3)
            ORDER BY e.enrollment_date DESC, e.id DESC"#,
            ENROLLMENT_DETAIL_SELECT
        );

        Ok(sqlx::query_as::<_, EnrollmentDetail>(&sql)
            .bind(filter.student_id)
            .bind(filter.course_id)
            .bind(filter.status)
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn get(&self, id: i32) -> ServiceResult<EnrollmentDetail> {
        let sql = format!(
            "{} WHERE e.id = $1 AND e.is_deleted = FALSE",
            ENROLLMENT_DETAIL_SELECT
        );

        sqlx::query_as::<_, EnrollmentDetail>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Enrollment {} not found", id)))
    }

    pub async fn create(&self, request: &CreateEnrollmentRequest) -> ServiceResult<EnrollmentDetail> {
        StudentService::new(self.pool.clone())
            .get(request.student_id)
            .await?;
        CourseService::new(self.pool.clone())
            .get(request.course_id)
            .await?;

        let duplicate: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM enrollments
             WHERE student_id = $1 AND course_id = $2 AND is_deleted = FALSE)",
        )
        .bind(request.student_id)
        .bind(request.course_id)
        .fetch_one(&self.pool)
        .await?;

        if duplicate {
            return Err(ServiceError::Conflict(format!(
                "Student {} is already enrolled in course {}",
                request.student_id, request.course_id
            )));
        }

        let enrollment_date = request
            .enrollment_date
            .unwrap_or_else(|| Utc::now().date_naive());

        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO enrollments (student_id, course_id, enrollment_date, status)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(request.student_id)
        .bind(request.course_id)
        .bind(enrollment_date)
        .bind(EnrollmentStatus::Active)
        .fetch_one(&self.pool)
        .await?;

        self.get(id).await
    }

    /// Returns the updated enrollment and the status it left.
    pub async fn update_status(
        &self,
        id: i32,
        request: &UpdateEnrollmentStatusRequest,
    ) -> ServiceResult<(EnrollmentDetail, EnrollmentStatus)> {
        let current = self.get(id).await?;
        validate_transition(current.status, request.status)?;

        if request.grade.is_some() && request.status == EnrollmentStatus::Withdrawn {
            return Err(ServiceError::InvalidOperation(
                "A withdrawn enrollment cannot carry a grade".to_string(),
            ));
        }

        // Guarding on the old status keeps two concurrent transitions from both applying.
        let affected = sqlx::query(
            r#"
            UPDATE enrollments
            SET status = $1,
                grade = COALESCE($2, grade),
                updated_at = NOW()
            WHERE id = $3 AND status = $4 AND is_deleted = FALSE
            "#,
        )
        .bind(request.status)
        .bind(request.grade)
        .bind(id)
        .bind(current.status)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if affected == 0 {
            return Err(ServiceError::Conflict(format!(
                "Enrollment {} was modified concurrently",
                id
            )));
        }

        Ok((self.get(id).await?, current.status))
    }

    pub async fn set_grade(&self, id: i32, grade: f64) -> ServiceResult<EnrollmentDetail> {
        let current = self.get(id).await?;

        if current.status == EnrollmentStatus::Withdrawn {
            return Err(ServiceError::InvalidOperation(
                "A withdrawn enrollment cannot be graded".to_string(),
            ));
        }

        let affected = sqlx::query(
            "UPDATE enrollments SET grade = $1, updated_at = NOW()
             WHERE id = $2 AND status <> $3 AND is_deleted = FALSE",
        )
        .bind(grade)
        .bind(id)
        .bind(EnrollmentStatus::Withdrawn)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if affected == 0 {
            return Err(ServiceError::NotFound(format!("Enrollment {} not found", id)));
        }

        self.get(id).await
    }

    pub async fn delete(&self, id: i32) -> ServiceResult<()> {
        let affected = sqlx::query(
            "UPDATE enrollments SET is_deleted = TRUE, deleted_at = NOW(), updated_at = NOW()
             WHERE id = $1 AND is_deleted = FALSE",
        )
        .bind(id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if affected == 0 {
            return Err(ServiceError::NotFound(format!("Enrollment {} not found", id)));
        }
        Ok(())
    }

    pub async fn student_gpa(&self, student_id: i32) -> ServiceResult<GpaSummary> {
        StudentService::new(self.pool.clone()).get(student_id).await?;

        let enrollments = self
            .list(&EnrollmentFilter {
                student_id: Some(student_id),
                ..Default::default()
            })
            .await?;

        Ok(gpa_for(&enrollments))
    }
}

pub fn validate_transition(from: EnrollmentStatus, to: EnrollmentStatus) -> ServiceResult<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(ServiceError::InvalidOperation(format!(
            "Cannot change enrollment status from {} to {}",
            from, to
        )))
    }
}

/// GPA over every enrollment except withdrawals.
pub fn gpa_for(enrollments: &[EnrollmentDetail]) -> GpaSummary {
    let credits: Vec<GradedCredit> = enrollments
        .iter()
        .filter(|e| e.status != EnrollmentStatus::Withdrawn)
        .map(|e| GradedCredit {
            credits: e.credits,
            score: e.score(),
        })
        .collect();

    compute_gpa(&credits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enrollment::fixtures::detail;
    use EnrollmentStatus::*;

    #[test]
    fn invalid_transition_is_invalid_operation() {
        let err = validate_transition(Completed, Active).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidOperation(_)));
        assert!(err.to_string().contains("completed to active"));

        assert!(validate_transition(Active, Completed).is_ok());
        assert!(validate_transition(Active, Active).is_err());
    }

    #[test]
    fn gpa_ignores_withdrawn_enrollments() {
        let enrollments = vec![
            detail(1, Completed, 4, Some(95.0)),
            detail(2, Failed, 2, Some(65.0)),
            detail(3, Withdrawn, 3, Some(10.0)),
            detail(4, Active, 3, None),
        ];

        let summary = gpa_for(&enrollments);
        assert_eq!(summary.gpa, 3.0);
        assert_eq!(summary.graded_credits, 6);
        assert_eq!(summary.total_credits, 9);
    }
}
