use chrono::{Datelike, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{
    student::Student,
    user::{CreateUserRequest, RegisterRequest, User, UserRole},
};
use crate::services::{
    student::{ensure_birth_date_in_past, StudentService},
    teacher::TeacherService,
    ServiceError, ServiceResult,
};
use crate::utils::password::{hash_password, verify_password};

const INVALID_CREDENTIALS: &str = "Invalid username or password";

#[derive(Debug)]
pub struct UserService {
    pool: PgPool,
}

impl UserService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Unknown users, inactive users and wrong passwords are indistinguishable to the caller.
    pub async fn authenticate(&self, username: &str, password: &str) -> ServiceResult<User> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(username) = LOWER($1)")
            .bind(username.trim())
            .fetch_optional(&self.pool)
            .await?
            .filter(|user| user.is_active)
            .ok_or_else(|| ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

        if !verify_password(password, &user.password_hash)? {
            return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }

        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET last_login_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(user.id)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    /// Creates the student record and its login in one transaction.
    pub async fn register(&self, request: &RegisterRequest) -> ServiceResult<(User, Student)> {
        ensure_birth_date_in_past(request.date_of_birth)?;
        self.ensure_username_free(&request.username).await?;

        let students = StudentService::new(self.pool.clone());
        students.ensure_email_free(&request.email, None).await?;

        let enrollment_number = match &request.enrollment_number {
            Some(number) => {
                students.ensure_enrollment_number_free(number, None).await?;
                number.trim().to_string()
            }
            None => generate_enrollment_number(),
        };

        let password_hash = hash_password(&request.password)?;

        self.insert_registration(request, &enrollment_number, &password_hash)
            .await
    }

    /// Inserts the student row and its login in one transaction; either both land or neither.
    async fn insert_registration(
        &self,
        request: &RegisterRequest,
        enrollment_number: &str,
        password_hash: &str,
    ) -> ServiceResult<(User, Student)> {
        let mut tx = self.pool.begin().await?;

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
        .bind(enrollment_number)
        .bind(&request.phone)
        .fetch_one(&mut *tx)
        .await?;

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password_hash, role, student_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(request.username.trim())
        .bind(request.email.trim())
        .bind(password_hash)
        .bind(UserRole::Student)
        .bind(student.id)
        .fetch_one(&mut *tx)
        .await?;

        // Dropping the transaction on any error above rolls both inserts back.
        tx.commit().await?;

        Ok((user, student))
    }

    pub async fn get(&self, id: i32) -> ServiceResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", id)))
    }

    pub async fn list(&self) -> ServiceResult<Vec<User>> {
        Ok(
            sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY role, username")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    pub async fn create(&self, request: &CreateUserRequest) -> ServiceResult<User> {
        check_role_links(request.role, request.student_id, request.teacher_id)?;

        if let Some(student_id) = request.student_id {
            StudentService::new(self.pool.clone()).get(student_id).await?;
        }
        if let Some(teacher_id) = request.teacher_id {
            TeacherService::new(self.pool.clone()).get(teacher_id).await?;
        }
        self.ensure_username_free(&request.username).await?;

        let password_hash = hash_password(&request.password)?;

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password_hash, role, student_id, teacher_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(request.username.trim())
        .bind(request.email.as_deref().map(str::trim))
        .bind(&password_hash)
        .bind(request.role)
        .bind(request.student_id)
        .bind(request.teacher_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn change_password(
        &self,
        user_id: i32,
        current_password: &str,
        new_password: &str,
    ) -> ServiceResult<()> {
        let user = self.get(user_id).await?;

        if !verify_password(current_password, &user.password_hash)? {
            return Err(ServiceError::Unauthorized(
                "Current password is incorrect".to_string(),
            ));
        }
        if current_password == new_password {
            return Err(ServiceError::InvalidOperation(
                "New password must differ from the current password".to_string(),
            ));
        }

        let password_hash = hash_password(new_password)?;

        sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
            .bind(&password_hash)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn deactivate(&self, id: i32, acting_user_id: i32) -> ServiceResult<()> {
        if id == acting_user_id {
            return Err(ServiceError::InvalidOperation(
                "You cannot deactivate your own account".to_string(),
            ));
        }

        let affected = sqlx::query(
            "UPDATE users SET is_active = FALSE, updated_at = NOW() WHERE id = $1 AND is_active = TRUE",
        )
        .bind(id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if affected == 0 {
            return Err(ServiceError::NotFound(format!("Active user {} not found", id)));
        }
        Ok(())
    }

    /// Creates the configured admin when no active admin exists yet. Returns whether one was created.
    pub async fn ensure_admin(&self, username: &str, password: &str) -> ServiceResult<bool> {
        let has_admin: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE role = $1 AND is_active = TRUE)",
        )
        .bind(UserRole::Admin)
        .fetch_one(&self.pool)
        .await?;

        if has_admin {
            return Ok(false);
        }

        let password_hash = hash_password(password)?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO users (username, password_hash, role)
            VALUES ($1, $2, $3)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(username.trim())
        .bind(&password_hash)
        .bind(UserRole::Admin)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted == 0 {
            tracing::warn!(
                "Bootstrap admin '{}' not created: the username belongs to an existing account",
                username.trim()
            );
            return Ok(false);
        }

        Ok(true)
    }

    async fn ensure_username_free(&self, username: &str) -> ServiceResult<()> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(username) = LOWER($1))",
        )
        .bind(username.trim())
        .fetch_one(&self.pool)
        .await?;

        if taken {
            return Err(ServiceError::Conflict(format!(
                "Username '{}' is already taken",
                username.trim()
            )));
        }
        Ok(())
    }
}

/// Student links only belong on student accounts, teacher links only on teacher accounts.
pub fn check_role_links(
    role: UserRole,
    student_id: Option<i32>,
    teacher_id: Option<i32>,
) -> ServiceResult<()> {
    if student_id.is_some() && teacher_id.is_some() {
        return Err(ServiceError::InvalidOperation(
            "A user can be linked to a student or a teacher, not both".to_string(),
        ));
    }
    if student_id.is_some() && role != UserRole::Student {
        return Err(ServiceError::InvalidOperation(
            "Only student accounts can be linked to a student".to_string(),
        ));
    }
    if teacher_id.is_some() && role != UserRole::Teacher {
        return Err(ServiceError::InvalidOperation(
            "Only teacher accounts can be linked to a teacher".to_string(),
        ));
    }
    Ok(())
}

/// `STU` + year + six hex characters, e.g. `STU2025A1B2C3`.
pub fn generate_enrollment_number() -> String {
    let suffix = Uuid::new_v4().simple().to_string()[..6].to_uppercase();
    format!("STU{}{}", Utc::now().year(), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::validation::validate_identifier;

    #[test]
    fn generated_numbers_are_valid_identifiers() {
        let number = generate_enrollment_number();
        assert!(number.starts_with("STU"));
        assert_eq!(number.len(), 13);
        assert!(validate_identifier(&number).is_ok());
        assert_ne!(number, generate_enrollment_number());
    }

    #[test]
    fn role_links() {
        assert!(check_role_links(UserRole::Student, Some(1), None).is_ok());
        assert!(check_role_links(UserRole::Teacher, None, Some(1)).is_ok());
        assert!(check_role_links(UserRole::Admin, None, None).is_ok());
        assert!(check_role_links(UserRole::Staff, Some(1), None).is_err());
        assert!(check_role_links(UserRole::Student, None, Some(2)).is_err());
        assert!(check_role_links(UserRole::Student, Some(1), Some(2)).is_err());
    }

    fn registration(username: &str, email: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            password: "analytical".to_string(),
            email: email.to_string(),
            first_name: "Mary".to_string(),
            last_name: "Somerville".to_string(),
            date_of_birth: chrono::NaiveDate::from_ymd_opt(2000, 12, 26).unwrap(),
            phone: None,
            enrollment_number: None,
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn failed_login_insert_rolls_back_student_row(pool: PgPool) {
        let users = UserService::new(pool.clone());
        users
            .register(&registration("msomerville", "mary@example.edu"))
            .await
            .unwrap();

        // The username check is skipped here, so the users insert hits the unique index
        // after the student row is already written inside the transaction.
        let result = users
            .insert_registration(
                &registration("MSOMERVILLE", "other@example.edu"),
                "STU9999",
                "not-a-real-hash",
            )
            .await;
        assert!(matches!(result, Err(ServiceError::Database(_))));

        let students: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM students")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(students, 1);
    }
}
