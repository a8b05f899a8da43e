use sqlx::PgPool;

use crate::models::{
    course::{Course, CreateCourseRequest, UpdateCourseRequest},
    enrollment::{EnrollmentDetail, EnrollmentFilter},
    PageQuery, PagedResponse,
};
use crate::services::{
    enrollment::EnrollmentService, teacher::TeacherService, ServiceError, ServiceResult,
};
use crate::utils::validation::normalize_course_code;

const COURSE_SELECT: &str = r#"
    SELECT c.*,
           t.first_name || ' ' || t.last_name AS teacher_name,
           (SELECT COUNT(*)::bigint FROM enrollments e
            WHERE e.course_id = c.id AND e.is_deleted = FALSE) AS enrollment_count
    FROM courses c
    LEFT JOIN teachers t ON t.id = c.teacher_id AND t.is_deleted = FALSE
"#;

#[derive(Debug)]
pub struct CourseService {
    pool: PgPool,
}

impl CourseService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, query: &PageQuery) -> ServiceResult<PagedResponse<Course>> {
        let pattern = query.search_pattern();

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)::bigint FROM courses c
            WHERE c.is_deleted = FALSE
              AND ($1::text IS NULL OR c.code ILIKE $1 OR c.title ILIKE $1)
            "#,
        )
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        let sql = format!(
            r#"{}
            WHERE c.is_deleted = FALSE
              AND ($1::text IS NULL OR c.code ILIKE $1 OR c.title ILIKE $1)
            ORDER BY c.code
            LIMIT $2 OFFSET $3"#,
            COURSE_SELECT
        );

        let courses = sqlx::query_as::<_, Course>(&sql)
            .bind(&pattern)
            .bind(query.page_size())
            .bind(query.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(PagedResponse::new(courses, total, query))
    }

    pub async fn get(&self, id: i32) -> ServiceResult<Course> {
        let sql = format!("{} WHERE c.id = $1 AND c.is_deleted = FALSE", COURSE_SELECT);

        sqlx::query_as::<_, Course>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Course {} not found", id)))
    }

    pub async fn create(&self, request: &CreateCourseRequest) -> ServiceResult<Course> {
        let code = normalize_course_code(&request.code);
        self.ensure_code_free(&code, None).await?;

        if let Some(teacher_id) = request.teacher_id {
            TeacherService::new(self.pool.clone()).get(teacher_id).await?;
        }

        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO courses (code, title, credits, description, teacher_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&code)
        .bind(request.title.trim())
        .bind(request.credits)
        .bind(&request.description)
        .bind(request.teacher_id)
        .fetch_one(&self.pool)
        .await?;

        self.get(id).await
    }

    pub async fn update(&self, id: i32, request: &UpdateCourseRequest) -> ServiceResult<Course> {
        let existing = self.get(id).await?;

        let code = request.code.as_deref().map(normalize_course_code);
        if let Some(code) = &code {
            if code != &existing.code {
                self.ensure_code_free(code, Some(id)).await?;
            }
        }

        sqlx::query(
            r#"
            UPDATE courses
            SET code = COALESCE($1, code),
                title = COALESCE($2, title),
                credits = COALESCE($3, credits),
                description = COALESCE($4, description),
                updated_at = NOW()
            WHERE id = $5 AND is_deleted = FALSE
            "#,
        )
        .bind(&code)
        .bind(request.title.as_deref().map(str::trim))
        .bind(request.credits)
        .bind(&request.description)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.get(id).await
    }

    /// `None` unassigns the course's teacher.
    pub async fn assign_teacher(&self, id: i32, teacher_id: Option<i32>) -> ServiceResult<Course> {
        self.get(id).await?;

        if let Some(teacher_id) = teacher_id {
            TeacherService::new(self.pool.clone()).get(teacher_id).await?;
        }

        let affected = sqlx::query(
            "UPDATE courses SET teacher_id = $1, updated_at = NOW()
             WHERE id = $2 AND is_deleted = FALSE",
        )
        .bind(teacher_id)
        .bind(id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if affected == 0 {
            return Err(ServiceError::NotFound(format!("Course {} not found", id)));
        }

        self.get(id).await
    }

    /// Refused while the course has live enrollments.
    pub async fn delete(&self, id: i32) -> ServiceResult<()> {
        let course = self.get(id).await?;

        let enrollment_count = course.enrollment_count.unwrap_or(0);
        if enrollment_count > 0 {
            return Err(ServiceError::InvalidOperation(format!(
                "Course {} cannot be deleted while it has {} enrollment(s)",
                course.code, enrollment_count
            )));
        }

        sqlx::query(
            "UPDATE courses SET is_deleted = TRUE, deleted_at = NOW(), updated_at = NOW()
             WHERE id = $1 AND is_deleted = FALSE",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn enrollments(&self, id: i32) -> ServiceResult<Vec<EnrollmentDetail>> {
        self.get(id).await?;

        EnrollmentService::new(self.pool.clone())
            .list(&EnrollmentFilter {
                course_id: Some(id),
                ..Default::default()
            })
            .await
    }

    async fn ensure_code_free(&self, code: &str, exclude_id: Option<i32>) -> ServiceResult<()> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM courses
             WHERE UPPER(code) = $1 AND is_deleted = FALSE
               AND ($2::int IS NULL OR id <> $2))",
        )
        .bind(code)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;

        if taken {
            return Err(ServiceError::Conflict(format!(
                "Course code '{}' already exists",
                code
            )));
        }
        Ok(())
    }
}
