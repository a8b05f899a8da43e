use sqlx::PgPool;

use crate::models::{
    course::Course,
    teacher::{CreateTeacherRequest, Teacher, UpdateTeacherRequest},
    PageQuery, PagedResponse,
};
use crate::services::{department::DepartmentService, ServiceError, ServiceResult};

const TEACHER_SELECT: &str = r#"
    SELECT t.*, d.name AS department_name
    FROM teachers t
    LEFT JOIN departments d ON d.id = t.department_id AND d.is_deleted = FALSE
"#;

#[derive(Debug)]
pub struct TeacherService {
    pool: PgPool,
}

impl TeacherService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, query: &PageQuery) -> ServiceResult<PagedResponse<Teacher>> {
        let pattern = query.search_pattern();

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)::bigint FROM teachers t
            WHERE t.is_deleted = FALSE
              AND ($1::text IS NULL
                   OR t.first_name ILIKE $1 OR t.last_name ILIKE $1
                   OR t.email ILIKE $1 OR t.employee_id ILIKE $1)
            "#,
        )
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        let sql = format!(
            r#"{}
            WHERE t.is_deleted = FALSE
              AND ($1::text IS NULL
                   OR t.first_name ILIKE $1 OR t.last_name ILIKE $1
                   OR t.email ILIKE $1 OR t.employee_id ILIKE $1)
            ORDER BY t.last_name, t.first_name, t.id
            LIMIT $2 OFFSET $3"#,
            TEACHER_SELECT
        );

        let teachers = sqlx::query_as::<_, Teacher>(&sql)
            .bind(&pattern)
            .bind(query.page_size())
            .bind(query.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(PagedResponse::new(teachers, total, query))
    }

    pub async fn get(&self, id: i32) -> ServiceResult<Teacher> {
        let sql = format!("{} WHERE t.id = $1 AND t.is_deleted = FALSE", TEACHER_SELECT);

        sqlx::query_as::<_, Teacher>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Teacher {} not found", id)))
    }

    pub async fn by_department(&self, department_id: i32) -> ServiceResult<Vec<Teacher>> {
        let sql = format!(
            "{} WHERE t.department_id = $1 AND t.is_deleted = FALSE ORDER BY t.last_name, t.first_name",
            TEACHER_SELECT
        );

        Ok(sqlx::query_as::<_, Teacher>(&sql)
            .bind(department_id)
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn create(&self, request: &CreateTeacherRequest) -> ServiceResult<Teacher> {
        if let Some(department_id) = request.department_id {
            DepartmentService::new(self.pool.clone())
                .get(department_id)
                .await?;
        }
        self.ensure_email_free(&request.email, None).await?;
        self.ensure_employee_id_free(&request.employee_id, None).await?;

        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO teachers (first_name, last_name, email, employee_id, phone, department_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(request.first_name.trim())
        .bind(request.last_name.trim())
        .bind(request.email.trim())
        .bind(request.employee_id.trim())
        .bind(&request.phone)
        .bind(request.department_id)
        .fetch_one(&self.pool)
        .await?;

        self.get(id).await
    }

    pub async fn update(&self, id: i32, request: &UpdateTeacherRequest) -> ServiceResult<Teacher> {
        let existing = self.get(id).await?;

        if let Some(department_id) = request.department_id {
            DepartmentService::new(self.pool.clone())
                .get(department_id)
                .await?;
        }
        if let Some(email) = &request.email {
            if !email.eq_ignore_ascii_case(&existing.email) {
                self.ensure_email_free(email, Some(id)).await?;
            }
        }
        if let Some(employee_id) = &request.employee_id {
            if employee_id != &existing.employee_id {
                self.ensure_employee_id_free(employee_id, Some(id)).await?;
            }
        }

        sqlx::query(
            r#"
            UPDATE teachers
            SET first_name = COALESCE($1, first_name),
                last_name = COALESCE($2, last_name),
                email = COALESCE($3, email),
                employee_id = COALESCE($4, employee_id),
                phone = COALESCE($5, phone),
                department_id = COALESCE($6, department_id),
                updated_at = NOW()
            WHERE id = $7 AND is_deleted = FALSE
            "#,
        )
        .bind(request.first_name.as_deref().map(str::trim))
        .bind(request.last_name.as_deref().map(str::trim))
        .bind(request.email.as_deref().map(str::trim))
        .bind(request.employee_id.as_deref().map(str::trim))
        .bind(&request.phone)
        .bind(request.department_id)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.get(id).await
    }

    /// Soft-deletes the teacher and unassigns the teacher's courses.
    pub async fn delete(&self, id: i32) -> ServiceResult<()> {
        let mut tx = self.pool.begin().await?;

        let affected = sqlx::query(
            "UPDATE teachers SET is_deleted = TRUE, deleted_at = NOW(), updated_at = NOW()
             WHERE id = $1 AND is_deleted = FALSE",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if affected == 0 {
            return Err(ServiceError::NotFound(format!("Teacher {} not found", id)));
        }

        sqlx::query("UPDATE courses SET teacher_id = NULL, updated_at = NOW() WHERE teacher_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn courses(&self, id: i32) -> ServiceResult<Vec<Course>> {
        let teacher = self.get(id).await?;

        let courses = sqlx::query_as::<_, Course>(
            r#"
            SELECT c.*,
                   (SELECT COUNT(*)::bigint FROM enrollments e
                    WHERE e.course_id = c.id AND e.is_deleted = FALSE) AS enrollment_count
            FROM courses c
            WHERE c.teacher_id = $1 AND c.is_deleted = FALSE
            ORDER BY c.code
            "#,
        )
        .bind(teacher.id)
        .fetch_all(&self.pool)
        .await?;

        let teacher_name = format!("{} {}", teacher.first_name, teacher.last_name);
        Ok(courses
            .into_iter()
            .map(|course| Course {
                teacher_name: Some(teacher_name.clone()),
                ..course
            })
            .collect())
    }

    async fn ensure_email_free(&self, email: &str, exclude_id: Option<i32>) -> ServiceResult<()> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM teachers
             WHERE LOWER(email) = LOWER($1) AND is_deleted = FALSE
               AND ($2::int IS NULL OR id <> $2))",
        )
        .bind(email.trim())
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;

        if taken {
            return Err(ServiceError::Conflict(format!(
                "A teacher with email '{}' already exists",
                email.trim()
            )));
        }
        Ok(())
    }

    async fn ensure_employee_id_free(
        &self,
        employee_id: &str,
        exclude_id: Option<i32>,
    ) -> ServiceResult<()> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM teachers
             WHERE employee_id = $1 AND is_deleted = FALSE
               AND ($2::int IS NULL OR id <> $2))",
        )
        .bind(employee_id.trim())
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;

        if taken {
            return Err(ServiceError::Conflict(format!(
                "Employee id '{}' is already in use",
                employee_id.trim()
            )));
        }
        Ok(())
    }
}
