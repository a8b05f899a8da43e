use chrono::Utc;
use sqlx::PgPool;

use crate::models::{
    enrollment::{EnrollmentDetail, EnrollmentFilter},
    student::{CreateStudentRequest, Student, UpdateStudentRequest},
    PageQuery, PagedResponse,
};
use crate::services::{enrollment::EnrollmentService, ServiceError, ServiceResult};

#[derive(Debug)]
pub struct StudentService {
    pool: PgPool,
}

impl StudentService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, query: &PageQuery) -> ServiceResult<PagedResponse<Student>> {
        let pattern = query.search_pattern();

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)::bigint FROM students
            WHERE is_deleted = FALSE
              AND ($1::text IS NULL
                   OR first_name ILIKE $1 OR last_name ILIKE $1
                   OR email ILIKE $1 OR enrollment_number ILIKE $1)
            "#,
        )
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        let students = sqlx::query_as::<_, Student>(
            r#"
            SELECT * FROM students
            WHERE is_deleted = FALSE
              AND ($1::text IS NULL
                   OR first_name ILIKE $1 OR last_name ILIKE $1
                   OR email ILIKE $1 OR enrollment_number ILIKE $1)
            ORDER BY last_name, first_name, id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(&pattern)
        .bind(query.page_size())
        .bind(query.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(PagedResponse::new(students, total, query))
    }

    pub async fn get(&self, id: i32) -> ServiceResult<Student> {
        sqlx::query_as::<_, Student>("SELECT * FROM students WHERE id = $1 AND is_deleted = FALSE")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Student {} not found", id)))
    }

    pub async fn create(&self, request: &CreateStudentRequest) -> ServiceResult<Student> {
        ensure_birth_date_in_past(request.date_of_birth)?;
        self.ensure_email_free(&request.email, None).await?;
        self.ensure_enrollment_number_free(&request.enrollment_number, None)
            .await?;

        let student = sqlx::query_as::<_, Student>(
            r#"
            INSERT INTO students (first_name, last_name, email, date_of_birth, enrollment_number, phone)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(request.first_name.trim())
        .bind(request.last_name.trim())
        .bind(request.email.trim())
        .bind(request.date_of_birth)
        .bind(request.enrollment_number.trim())
        .bind(&request.phone)
        .fetch_one(&self.pool)
        .await?;

        Ok(student)
    }

    pub async fn update(&self, id: i32, request: &UpdateStudentRequest) -> ServiceResult<Student> {
        let existing = self.get(id).await?;

        if let Some(date_of_birth) = request.date_of_birth {
            ensure_birth_date_in_past(date_of_birth)?;
        }
        if let Some(email) = &request.email {
            if !email.eq_ignore_ascii_case(&existing.email) {
                self.ensure_email_free(email, Some(id)).await?;
            }
        }
        if let Some(number) = &request.enrollment_number {
            if number != &existing.enrollment_number {
                self.ensure_enrollment_number_free(number, Some(id)).await?;
            }
        }

        let student = sqlx::query_as::<_, Student>(
            r#"
            UPDATE students
            SET first_name = COALESCE($1, first_name),
                last_name = COALESCE($2, last_name),
                email = COALESCE($3, email),
                date_of_birth = COALESCE($4, date_of_birth),
                enrollment_number = COALESCE($5, enrollment_number),
                phone = COALESCE($6, phone),
                updated_at = NOW()
            WHERE id = $7 AND is_deleted = FALSE
            RETURNING *
            "#,
        )
        .bind(request.first_name.as_deref().map(str::trim))
        .bind(request.last_name.as_deref().map(str::trim))
        .bind(request.email.as_deref().map(str::trim))
        .bind(request.date_of_birth)
        .bind(request.enrollment_number.as_deref().map(str::trim))
        .bind(&request.phone)
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(student)
    }

    /// Soft-deletes the student together with the student's enrollments.
    pub async fn delete(&self, id: i32) -> ServiceResult<()> {
        let mut tx = self.pool.begin().await?;

        let affected = sqlx::query(
            "UPDATE students SET is_deleted = TRUE, deleted_at = NOW(), updated_at = NOW()
             WHERE id = $1 AND is_deleted = FALSE",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if affected == 0 {
            return Err(ServiceError::NotFound(format!("Student {} not found", id)));
        }

        sqlx::query(
            "UPDATE enrollments SET is_deleted = TRUE, deleted_at = NOW(), updated_at = NOW()
             WHERE student_id = $1 AND is_deleted = FALSE",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn enrollments(&self, id: i32) -> ServiceResult<Vec<EnrollmentDetail>> {
        self.get(id).await?;

        EnrollmentService::new(self.pool.clone())
            .list(&EnrollmentFilter {
                student_id: Some(id),
                ..Default::default()
            })
            .await
    }

    pub async fn ensure_email_free(&self, email: &str, exclude_id: Option<i32>) -> ServiceResult<()> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM students
             WHERE LOWER(email) = LOWER($1) AND is_deleted = FALSE
               AND ($2::int IS NULL OR id <> $2))",
        )
        .bind(email.trim())
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;

        if taken {
            return Err(ServiceError::Conflict(format!(
                "A student with email '{}' already exists",
                email.trim()
            )));
        }
        Ok(())
    }

    pub async fn ensure_enrollment_number_free(
        &self,
        number: &str,
        exclude_id: Option<i32>,
    ) -> ServiceResult<()> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM students
             WHERE enrollment_number = $1 AND is_deleted = FALSE
               AND ($2::int IS NULL OR id <> $2))",
        )
        .bind(number.trim())
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;

        if taken {
            return Err(ServiceError::Conflict(format!(
                "Enrollment number '{}' is already in use",
                number.trim()
            )));
        }
        Ok(())
    }
}

pub fn ensure_birth_date_in_past(date_of_birth: chrono::NaiveDate) -> ServiceResult<()> {
    if date_of_birth >= Utc::now().date_naive() {
        return Err(ServiceError::InvalidOperation(
            "Date of birth must be in the past".to_string(),
        ));
    }
    Ok(())
}
