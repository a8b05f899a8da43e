use sqlx::PgPool;

use crate::models::department::{CreateDepartmentRequest, Department, UpdateDepartmentRequest};
use crate::services::{ServiceError, ServiceResult};

const DEPARTMENT_SELECT: &str = r#"
    SELECT d.*,
           (SELECT COUNT(*)::bigint FROM teachers t
            WHERE t.department_id = d.id AND t.is_deleted = FALSE) AS teacher_count
    FROM departments d
"#;

#[derive(Debug)]
pub struct DepartmentService {
    pool: PgPool,
}

impl DepartmentService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> ServiceResult<Vec<Department>> {
        let sql = format!("{} WHERE d.is_deleted = FALSE ORDER BY d.name", DEPARTMENT_SELECT);
        Ok(sqlx::query_as::<_, Department>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn get(&self, id: i32) -> ServiceResult<Department> {
        let sql = format!("{} WHERE d.id = $1 AND d.is_deleted = FALSE", DEPARTMENT_SELECT);
        sqlx::query_as::<_, Department>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Department {} not found", id)))
    }

    pub async fn create(&self, request: &CreateDepartmentRequest) -> ServiceResult<Department> {
        self.ensure_name_free(&request.name, None).await?;

        let id: i32 = sqlx::query_scalar(
            "INSERT INTO departments (name, description) VALUES ($1, $2) RETURNING id",
        )
        .bind(request.name.trim())
        .bind(&request.description)
        .fetch_one(&self.pool)
        .await?;

        self.get(id).await
    }

    pub async fn update(
        &self,
        id: i32,
        request: &UpdateDepartmentRequest,
    ) -> ServiceResult<Department> {
        let existing = self.get(id).await?;

        if let Some(name) = &request.name {
            if !name.trim().eq_ignore_ascii_case(&existing.name) {
                self.ensure_name_free(name, Some(id)).await?;
            }
        }

        sqlx::query(
            r#"
            UPDATE departments
            SET name = COALESCE($1, name),
                description = COALESCE($2, description),
                updated_at = NOW()
            WHERE id = $3 AND is_deleted = FALSE
            "#,
        )
        .bind(request.name.as_deref().map(str::trim))
        .bind(&request.description)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.get(id).await
    }

    /// Refused while live teachers still belong to the department.
    pub async fn delete(&self, id: i32) -> ServiceResult<()> {
        let department = self.get(id).await?;

        if department.teacher_count.unwrap_or(0) > 0 {
            return Err(ServiceError::InvalidOperation(format!(
                "Department '{}' still has {} teacher(s) assigned",
                department.name,
                department.teacher_count.unwrap_or(0)
            )));
        }

        sqlx::query(
            "UPDATE departments SET is_deleted = TRUE, deleted_at = NOW(), updated_at = NOW()
             WHERE id = $1 AND is_deleted = FALSE",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn ensure_name_free(&self, name: &str, exclude_id: Option<i32>) -> ServiceResult<()> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM departments
             WHERE LOWER(name) = LOWER($1) AND is_deleted = FALSE
               AND ($2::int IS NULL OR id <> $2))",
        )
        .bind(name.trim())
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;

        if taken {
            return Err(ServiceError::Conflict(format!(
                "Department '{}' already exists",
                name.trim()
            )));
        }
        Ok(())
    }
}
