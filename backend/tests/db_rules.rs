//! Rules enforced against a real Postgres. Run with
//! `DATABASE_URL=postgres://... cargo test -- --ignored`.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use chrono::NaiveDate;
use sqlx::PgPool;
use student_management_backend::{
    build_router,
    config::Config,
    models::{
        course::CreateCourseRequest,
        department::CreateDepartmentRequest,
        enrollment::{CreateEnrollmentRequest, EnrollmentStatus, UpdateEnrollmentStatusRequest},
        student::CreateStudentRequest,
        teacher::CreateTeacherRequest,
        user::{RegisterRequest, UserRole},
    },
    services::{
        course::CourseService, department::DepartmentService, enrollment::EnrollmentService,
        student::StudentService, teacher::TeacherService, user::UserService, ServiceError,
    },
    utils::jwt::create_jwt,
    AppState,
};
use tower::ServiceExt;

fn student_request(email: &str, number: &str) -> CreateStudentRequest {
    CreateStudentRequest {
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        email: email.to_string(),
        date_of_birth: NaiveDate::from_ymd_opt(2002, 12, 10).unwrap(),
        enrollment_number: number.to_string(),
        phone: None,
    }
}

fn course_request(code: &str) -> CreateCourseRequest {
    CreateCourseRequest {
        code: code.to_string(),
        title: "Analytical Engines".to_string(),
        credits: 3,
        description: None,
        teacher_id: None,
    }
}

fn register_request(username: &str, email: &str) -> RegisterRequest {
    RegisterRequest {
        username: username.to_string(),
        password: "difference-engine".to_string(),
        email: email.to_string(),
        first_name: "Charles".to_string(),
        last_name: "Babbage".to_string(),
        date_of_birth: NaiveDate::from_ymd_opt(2001, 12, 26).unwrap(),
        phone: None,
        enrollment_number: None,
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn duplicate_student_email_is_rejected(pool: PgPool) {
    let students = StudentService::new(pool);
    students
        .create(&student_request("ada@example.edu", "STU0001"))
        .await
        .unwrap();

    let err = students
        .create(&student_request("ADA@example.edu", "STU0002"))
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::Conflict(_)));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn email_is_reusable_after_soft_delete(pool: PgPool) {
    let students = StudentService::new(pool);
    let first = students
        .create(&student_request("ada@example.edu", "STU0001"))
        .await
        .unwrap();
    students.delete(first.id).await.unwrap();

    assert!(students
        .create(&student_request("ada@example.edu", "STU0001"))
        .await
        .is_ok());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn course_with_enrollments_cannot_be_deleted(pool: PgPool) {
    let student = StudentService::new(pool.clone())
        .create(&student_request("ada@example.edu", "STU0001"))
        .await
        .unwrap();
    let courses = CourseService::new(pool.clone());
    let course = courses.create(&course_request("cs101")).await.unwrap();
    assert_eq!(course.code, "CS101");

    EnrollmentService::new(pool)
        .create(&CreateEnrollmentRequest {
            student_id: student.id,
            course_id: course.id,
            enrollment_date: None,
        })
        .await
        .unwrap();

    let err = courses.delete(course.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidOperation(_)));
    assert!(courses.get(course.id).await.is_ok());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn duplicate_enrollment_is_rejected(pool: PgPool) {
    let student = StudentService::new(pool.clone())
        .create(&student_request("ada@example.edu", "STU0001"))
        .await
        .unwrap();
    let course = CourseService::new(pool.clone())
        .create(&course_request("CS102"))
        .await
        .unwrap();

    let enrollments = EnrollmentService::new(pool);
    let request = CreateEnrollmentRequest {
        student_id: student.id,
        course_id: course.id,
        enrollment_date: None,
    };
    let first = enrollments.create(&request).await.unwrap();
    assert_eq!(first.status, EnrollmentStatus::Active);

    let err = enrollments.create(&request).await.unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn completed_enrollment_cannot_be_reactivated(pool: PgPool) {
    let student = StudentService::new(pool.clone())
        .create(&student_request("ada@example.edu", "STU0001"))
        .await
        .unwrap();
    let course = CourseService::new(pool.clone())
        .create(&course_request("CS103"))
        .await
        .unwrap();

    let enrollments = EnrollmentService::new(pool);
    let enrollment = enrollments
        .create(&CreateEnrollmentRequest {
            student_id: student.id,
            course_id: course.id,
            enrollment_date: None,
        })
        .await
        .unwrap();

    let (completed, previous) = enrollments
        .update_status(
            enrollment.id,
            &UpdateEnrollmentStatusRequest {
                status: EnrollmentStatus::Completed,
                grade: Some(91.0),
            },
        )
        .await
        .unwrap();
    assert_eq!(previous, EnrollmentStatus::Active);
    assert_eq!(completed.status, EnrollmentStatus::Completed);

    let err = enrollments
        .update_status(
            enrollment.id,
            &UpdateEnrollmentStatusRequest {
                status: EnrollmentStatus::Active,
                grade: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidOperation(_)));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn password_change_requires_current_password(pool: PgPool) {
    let users = UserService::new(pool);
    let (user, _) = users
        .register(&register_request("cbabbage", "charles@example.edu"))
        .await
        .unwrap();

    let err = users
        .change_password(user.id, "wrong-password", "new-secret-1")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Unauthorized(_)));

    users
        .change_password(user.id, "difference-engine", "new-secret-1")
        .await
        .unwrap();
    assert!(users.authenticate("cbabbage", "new-secret-1").await.is_ok());
    assert!(users
        .authenticate("cbabbage", "difference-engine")
        .await
        .is_err());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn registration_creates_linked_student(pool: PgPool) {
    let users = UserService::new(pool.clone());
    let (user, student) = users
        .register(&register_request("cbabbage", "charles@example.edu"))
        .await
        .unwrap();

    assert_eq!(user.role, UserRole::Student);
    assert_eq!(user.student_id, Some(student.id));
    assert!(student.enrollment_number.starts_with("STU"));

    let err = users
        .register(&register_request("cbabbage", "other@example.edu"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    let student_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM students")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(student_count, 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn department_with_teachers_cannot_be_deleted(pool: PgPool) {
    let departments = DepartmentService::new(pool.clone());
    let department = departments
        .create(&CreateDepartmentRequest {
            name: "Mathematics".to_string(),
            description: None,
        })
        .await
        .unwrap();

    let teachers = TeacherService::new(pool);
    let teacher = teachers
        .create(&CreateTeacherRequest {
            first_name: "Emmy".to_string(),
            last_name: "Noether".to_string(),
            email: "emmy@example.edu".to_string(),
            employee_id: "EMP001".to_string(),
            phone: None,
            department_id: Some(department.id),
        })
        .await
        .unwrap();

    let err = departments.delete(department.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidOperation(_)));
    assert!(departments.get(department.id).await.is_ok());

    teachers.delete(teacher.id).await.unwrap();
    departments.delete(department.id).await.unwrap();
    assert!(matches!(
        departments.get(department.id).await,
        Err(ServiceError::NotFound(_))
    ));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn bootstrap_admin_not_reported_when_username_is_taken(pool: PgPool) {
    let users = UserService::new(pool.clone());
    users
        .register(&register_request("admin", "admin@example.edu"))
        .await
        .unwrap();

    let created = users.ensure_admin("admin", "bootstrap-pass").await.unwrap();
    assert!(!created);

    let admins: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'admin'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(admins, 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn bootstrap_admin_created_once(pool: PgPool) {
    let users = UserService::new(pool);
    assert!(users.ensure_admin("root", "bootstrap-pass").await.unwrap());
    assert!(!users.ensure_admin("root", "bootstrap-pass").await.unwrap());

    let admin = users.authenticate("root", "bootstrap-pass").await.unwrap();
    assert_eq!(admin.role, UserRole::Admin);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn soft_deleted_rows_are_not_updated(pool: PgPool) {
    let student = StudentService::new(pool.clone())
        .create(&student_request("ada@example.edu", "STU0001"))
        .await
        .unwrap();
    let courses = CourseService::new(pool.clone());
    let course = courses.create(&course_request("CS104")).await.unwrap();

    let enrollments = EnrollmentService::new(pool.clone());
    let enrollment = enrollments
        .create(&CreateEnrollmentRequest {
            student_id: student.id,
            course_id: course.id,
            enrollment_date: None,
        })
        .await
        .unwrap();
    enrollments.delete(enrollment.id).await.unwrap();

    let err = enrollments.set_grade(enrollment.id, 88.0).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));

    let grade: Option<f64> = sqlx::query_scalar("SELECT grade FROM enrollments WHERE id = $1")
        .bind(enrollment.id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert!(grade.is_none());

    courses.delete(course.id).await.unwrap();
    let err = courses.assign_teacher(course.id, None).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

const ROUTER_SECRET: &str = "db-router-test-secret-0123";

async fn get_status(pool: &PgPool, uri: &str, token: &str) -> StatusCode {
    let config = Config::from_lookup(|key| match key {
        "DATABASE_URL" => Some("postgres://unused".to_string()),
        "JWT_SECRET" => Some(ROUTER_SECRET.to_string()),
        _ => None,
    })
    .unwrap();
    let app = build_router(AppState::new(pool.clone(), &config), &config).unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    response.status()
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn students_only_read_their_own_grades(pool: PgPool) {
    let users = UserService::new(pool.clone());
    let (user, own) = users
        .register(&register_request("cbabbage", "charles@example.edu"))
        .await
        .unwrap();
    let (_, other) = users
        .register(&register_request("alovelace", "ada@example.edu"))
        .await
        .unwrap();

    let token = create_jwt(user.id, &user.username, "student", ROUTER_SECRET, 1).unwrap();

    let own_gpa = format!("/api/students/{}/gpa", own.id);
    assert_eq!(get_status(&pool, &own_gpa, &token).await, StatusCode::OK);

    let other_gpa = format!("/api/students/{}/gpa", other.id);
    assert_eq!(get_status(&pool, &other_gpa, &token).await, StatusCode::FORBIDDEN);

    let other_enrollments = format!("/api/enrollments?student_id={}", other.id);
    assert_eq!(
        get_status(&pool, &other_enrollments, &token).await,
        StatusCode::FORBIDDEN
    );

    let other_results = format!("/api/results?student_id={}", other.id);
    assert_eq!(get_status(&pool, &other_results, &token).await, StatusCode::FORBIDDEN);

    assert_eq!(get_status(&pool, "/api/results", &token).await, StatusCode::OK);
}
