use chrono::Utc;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::time::Instant;

use crate::models::{
    course::Course,
    enrollment::{EnrollmentDetail, EnrollmentFilter, EnrollmentStatus},
    report::{
        DepartmentSummary, GradeDistribution, GradeReport, GradeReportRow, SummaryReport,
        TopStudent, Transcript, TranscriptEntry,
    },
    student::Student,
};
use crate::services::{
    course::CourseService,
    enrollment::{gpa_for, EnrollmentService, ENROLLMENT_DETAIL_SELECT},
    grading::{academic_standing, round2, LetterGrade},
    student::StudentService,
    ServiceResult,
};
use crate::utils::logger::LOGGER;

const TOP_STUDENT_LIMIT: usize = 5;

#[derive(Debug)]
pub struct ReportService {
    pool: PgPool,
}

impl ReportService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn transcript(&self, student_id: i32) -> ServiceResult<Transcript> {
        let student = StudentService::new(self.pool.clone()).get(student_id).await?;
        let enrollments = EnrollmentService::new(self.pool.clone())
            .list(&EnrollmentFilter {
                student_id: Some(student_id),
                ..Default::default()
            })
            .await?;

        Ok(build_transcript(&student, &enrollments))
    }

    pub async fn grade_report(&self, course_id: i32) -> ServiceResult<GradeReport> {
        let course = CourseService::new(self.pool.clone()).get(course_id).await?;
        let enrollments = EnrollmentService::new(self.pool.clone())
            .list(&EnrollmentFilter {
                course_id: Some(course_id),
                ..Default::default()
            })
            .await?;

        Ok(build_grade_report(&course, &enrollments))
    }

    pub async fn summary(&self) -> ServiceResult<SummaryReport> {
        let start_time = Instant::now();

        let (counts, enrollments_by_status, departments, top_students) = tokio::try_join!(
            self.entity_counts(),
            self.enrollments_by_status(),
            self.department_summaries(),
            self.top_students(),
        )?;

        LOGGER.log_performance_metric(
            "summary_report_duration_ms",
            start_time.elapsed().as_millis() as f64,
            HashMap::new(),
        );

        let (total_students, total_teachers, total_courses, total_departments, total_enrollments) =
            counts;

        Ok(SummaryReport {
            total_students,
            total_teachers,
            total_courses,
            total_departments,
            total_enrollments,
            enrollments_by_status,
            departments,
            top_students,
            generated_at: Utc::now(),
        })
    }

    async fn entity_counts(&self) -> ServiceResult<(i64, i64, i64, i64, i64)> {
        let row = sqlx::query(
            "SELECT
                (SELECT COUNT(*)::bigint FROM students WHERE is_deleted = FALSE),
                (SELECT COUNT(*)::bigint FROM teachers WHERE is_deleted = FALSE),
                (SELECT COUNT(*)::bigint FROM courses WHERE is_deleted = FALSE),
                (SELECT COUNT(*)::bigint FROM departments WHERE is_deleted = FALSE),
                (SELECT COUNT(*)::bigint FROM enrollments WHERE is_deleted = FALSE)",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok((row.get(0), row.get(1), row.get(2), row.get(3), row.get(4)))
    }

    async fn enrollments_by_status(&self) -> ServiceResult<HashMap<String, i64>> {
        let rows = sqlx::query(
            "SELECT status, COUNT(*)::bigint
             FROM enrollments
             WHERE is_deleted = FALSE
             GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut breakdown: HashMap<String, i64> = EnrollmentStatus::ALL
            .iter()
            .map(|status| (status.to_string(), 0))
            .collect();

        for row in rows {
            let status: EnrollmentStatus = row.get(0);
            let count: i64 = row.get(1);
            breakdown.insert(status.to_string(), count);
        }

        Ok(breakdown)
    }

    async fn department_summaries(&self) -> ServiceResult<Vec<DepartmentSummary>> {
        let rows = sqlx::query(
            "SELECT d.id, d.name,
                    COUNT(DISTINCT t.id)::bigint AS teacher_count,
                    COUNT(DISTINCT c.id)::bigint AS course_count
             FROM departments d
             LEFT JOIN teachers t ON t.department_id = d.id AND t.is_deleted = FALSE
             LEFT JOIN courses c ON c.teacher_id = t.id AND c.is_deleted = FALSE
             WHERE d.is_deleted = FALSE
             GROUP BY d.id, d.name
             ORDER BY d.name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| DepartmentSummary {
                department_id: row.get(0),
                name: row.get(1),
                teacher_count: row.get(2),
                course_count: row.get(3),
            })
            .collect())
    }

    async fn top_students(&self) -> ServiceResult<Vec<TopStudent>> {
        let sql = format!(
            "{} WHERE e.is_deleted = FALSE AND s.is_deleted = FALSE",
            ENROLLMENT_DETAIL_SELECT
        );

        let start_time = Instant::now();
        let enrollments = sqlx::query_as::<_, EnrollmentDetail>(&sql)
            .fetch_all(&self.pool)
            .await?;
        LOGGER.log_database_query(
            &sql,
            start_time.elapsed().as_millis(),
            Some(enrollments.len()),
        );

        Ok(rank_students(&enrollments, TOP_STUDENT_LIMIT))
    }
}

pub fn build_transcript(student: &Student, enrollments: &[EnrollmentDetail]) -> Transcript {
    let mut courses: Vec<TranscriptEntry> = enrollments
        .iter()
        .filter(|e| e.status.is_finished())
        .map(|e| {
            let score = e.score();
            let letter = score.map(LetterGrade::from_score);
            TranscriptEntry {
                course_id: e.course_id,
                course_code: e.course_code.clone(),
                course_title: e.course_title.clone(),
                credits: e.credits,
                enrollment_date: e.enrollment_date,
                status: e.status,
                score,
                letter_grade: letter,
                grade_points: letter.map(LetterGrade::points),
            }
        })
        .collect();
    courses.sort_by(|a, b| {
        a.enrollment_date
            .cmp(&b.enrollment_date)
            .then_with(|| a.course_code.cmp(&b.course_code))
    });

    let finished: Vec<EnrollmentDetail> = enrollments
        .iter()
        .filter(|e| e.status.is_finished())
        .cloned()
        .collect();
    let gpa = gpa_for(&finished);

    let credits_attempted = courses.iter().map(|c| c.credits).sum();
    let credits_earned = courses
        .iter()
        .filter(|c| c.status == EnrollmentStatus::Completed)
        .filter(|c| matches!(c.letter_grade, Some(letter) if letter.is_passing()))
        .map(|c| c.credits)
        .sum();

    let counted = enrollments
        .iter()
        .filter(|e| e.status != EnrollmentStatus::Withdrawn)
        .count();
    let failed_courses = enrollments
        .iter()
        .filter(|e| e.status == EnrollmentStatus::Failed)
        .count();
    let failure_rate = if counted > 0 {
        round2(failed_courses as f64 / counted as f64)
    } else {
        0.0
    };

    Transcript {
        student_id: student.id,
        student_name: student.full_name(),
        enrollment_number: student.enrollment_number.clone(),
        email: student.email.clone(),
        courses,
        cumulative_gpa: gpa.gpa,
        credits_attempted,
        credits_earned,
        failed_courses,
        failure_rate,
        academic_standing: academic_standing(failed_courses, counted),
        generated_at: Utc::now(),
    }
}

pub fn build_grade_report(course: &Course, enrollments: &[EnrollmentDetail]) -> GradeReport {
    let mut distribution = GradeDistribution::default();
    let mut scores = Vec::new();

    let students: Vec<GradeReportRow> = enrollments
        .iter()
        .map(|e| {
            let score = e.score();
            let letter = score.map(LetterGrade::from_score);
            if let (Some(score), Some(letter)) = (score, letter) {
                if e.status != EnrollmentStatus::Withdrawn {
                    scores.push(score);
                    distribution.record(letter);
                }
            }
            GradeReportRow {
                enrollment_id: e.id,
                student_id: e.student_id,
                student_name: e.student_name.clone(),
                enrollment_number: e.enrollment_number.clone(),
                status: e.status,
                score,
                letter_grade: letter,
            }
        })
        .collect();

    let graded_count = scores.len();
    let (average_score, highest_score, lowest_score, pass_rate) = if graded_count > 0 {
        let sum: f64 = scores.iter().sum();
        let high = scores.iter().cloned().fold(f64::MIN, f64::max);
        let low = scores.iter().cloned().fold(f64::MAX, f64::min);
        let passed = graded_count - distribution.f;
        (
            Some(round2(sum / graded_count as f64)),
            Some(high),
            Some(low),
            Some(round2(passed as f64 / graded_count as f64 * 100.0)),
        )
    } else {
        (None, None, None, None)
    };

    GradeReport {
        course_id: course.id,
        course_code: course.code.clone(),
        course_title: course.title.clone(),
        credits: course.credits,
        teacher_name: course.teacher_name.clone(),
        enrollment_count: enrollments.len(),
        graded_count,
        average_score,
        highest_score,
        lowest_score,
        pass_rate,
        distribution,
        students,
        generated_at: Utc::now(),
    }
}

/// Highest GPA first; ties go to the student with more graded credits, then the lower id.
pub fn rank_students(enrollments: &[EnrollmentDetail], limit: usize) -> Vec<TopStudent> {
    let mut by_student: HashMap<i32, Vec<EnrollmentDetail>> = HashMap::new();
    for enrollment in enrollments {
        by_student
            .entry(enrollment.student_id)
            .or_default()
            .push(enrollment.clone());
    }

    let mut ranked: Vec<TopStudent> = by_student
        .into_iter()
        .filter_map(|(student_id, rows)| {
            let summary = gpa_for(&rows);
            if summary.graded_credits == 0 {
                return None;
            }
            let first = rows.first()?;
            Some(TopStudent {
                student_id,
                student_name: first.student_name.clone(),
                enrollment_number: first.enrollment_number.clone(),
                gpa: summary.gpa,
                graded_credits: summary.graded_credits,
            })
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.gpa
            .total_cmp(&a.gpa)
            .then_with(|| b.graded_credits.cmp(&a.graded_credits))
            .then_with(|| a.student_id.cmp(&b.student_id))
    });
    ranked.truncate(limit);
    ranked
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_opt_score(score: Option<f64>) -> String {
    score.map(|s| format!("{:.2}", s)).unwrap_or_default()
}

pub fn transcript_csv(transcript: &Transcript) -> String {
    let mut csv = String::new();
    csv.push_str("Student,Enrollment Number,Cumulative GPA,Credits Attempted,Credits Earned,Academic Standing\n");
    csv.push_str(&format!(
        "{},{},{:.2},{},{},{}\n",
        csv_field(&transcript.student_name),
        csv_field(&transcript.enrollment_number),
        transcript.cumulative_gpa,
        transcript.credits_attempted,
        transcript.credits_earned,
        transcript.academic_standing.label()
    ));
    csv.push('\n');
    csv.push_str("Course Code,Course Title,Credits,Status,Score,Grade,Grade Points\n");

    for course in &transcript.courses {
        csv.push_str(&format!(
            "{},{},{},{},{},{},{}\n",
            csv_field(&course.course_code),
            csv_field(&course.course_title),
            course.credits,
            course.status,
            csv_opt_score(course.score),
            course.letter_grade.map(|l| l.to_string()).unwrap_or_default(),
            course
                .grade_points
                .map(|p| format!("{:.1}", p))
                .unwrap_or_default()
        ));
    }

    csv
}

pub fn grade_report_csv(report: &GradeReport) -> String {
    let mut csv = String::new();
    csv.push_str("Course Code,Course Title,Enrolled,Graded,Average,Highest,Lowest,A,B,C,D,F\n");
    csv.push_str(&format!(
        "{},{},{},{},{},{},{},{},{},{},{},{}\n",
        csv_field(&report.course_code),
        csv_field(&report.course_title),
        report.enrollment_count,
        report.graded_count,
        csv_opt_score(report.average_score),
        csv_opt_score(report.highest_score),
        csv_opt_score(report.lowest_score),
        report.distribution.a,
        report.distribution.b,
        report.distribution.c,
        report.distribution.d,
        report.distribution.f
    ));
    csv.push('\n');
    csv.push_str("Enrollment Number,Student,Status,Score,Grade\n");

    for row in &report.students {
        csv.push_str(&format!(
            "{},{},{},{},{}\n",
            csv_field(&row.enrollment_number),
            csv_field(&row.student_name),
            row.status,
            csv_opt_score(row.score),
            row.letter_grade.map(|l| l.to_string()).unwrap_or_default()
        ));
    }

    csv
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enrollment::fixtures::detail;
    use crate::services::grading::AcademicStanding;
    use chrono::NaiveDate;
    use EnrollmentStatus::*;

    fn student() -> Student {
        Student {
            id: 1,
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.edu".into(),
            date_of_birth: NaiveDate::from_ymd_opt(2003, 12, 10).unwrap(),
            enrollment_number: "STU001".into(),
            phone: None,
            is_deleted: false,
            deleted_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn course() -> Course {
        Course {
            id: 10,
            code: "CS101".into(),
            title: "Programming, Part 1".into(),
            credits: 4,
            description: None,
            teacher_id: None,
            is_deleted: false,
            deleted_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            teacher_name: Some("Grace Hopper".into()),
            enrollment_count: None,
        }
    }

    fn student_row(id: i32, student_id: i32, status: EnrollmentStatus, score: Option<f64>) -> EnrollmentDetail {
        let mut row = detail(id, status, 4, score);
        row.student_id = student_id;
        row.student_name = format!("Student {}", student_id);
        row.enrollment_number = format!("STU{:03}", student_id);
        row
    }

    #[test]
    fn transcript_lists_finished_courses_only() {
        let enrollments = vec![
            detail(1, Completed, 4, Some(95.0)),
            detail(2, Failed, 2, Some(40.0)),
            detail(3, Active, 3, None),
            detail(4, Withdrawn, 3, None),
            detail(5, Completed, 3, None),
        ];

        // The ungraded completion is attempted but not earned.
        let transcript = build_transcript(&student(), &enrollments);
        assert_eq!(transcript.courses.len(), 3);
        assert_eq!(transcript.credits_attempted, 9);
        assert_eq!(transcript.credits_earned, 4);
        // (4*4 + 2*0) / 6 = 2.666..
        assert_eq!(transcript.cumulative_gpa, 2.67);
        assert_eq!(transcript.student_name, "Ada Lovelace");
    }

    #[test]
    fn transcript_standing_uses_failure_ratio() {
        let enrollments = vec![
            detail(1, Completed, 3, Some(80.0)),
            detail(2, Failed, 3, Some(30.0)),
            detail(3, Completed, 3, Some(75.0)),
            detail(4, Active, 3, None),
            detail(5, Withdrawn, 3, None),
        ];

        // 1 failed out of 4 counted enrollments
        let transcript = build_transcript(&student(), &enrollments);
        assert_eq!(transcript.failed_courses, 1);
        assert_eq!(transcript.failure_rate, 0.25);
        assert_eq!(transcript.academic_standing, AcademicStanding::AcademicWarning);
    }

    #[test]
    fn empty_transcript_is_good_standing() {
        let transcript = build_transcript(&student(), &[]);
        assert!(transcript.courses.is_empty());
        assert_eq!(transcript.cumulative_gpa, 0.0);
        assert_eq!(transcript.academic_standing, AcademicStanding::GoodStanding);
    }

    #[test]
    fn grade_report_statistics() {
        let enrollments = vec![
            student_row(1, 1, Completed, Some(95.0)),
            student_row(2, 2, Completed, Some(85.0)),
            student_row(3, 3, Failed, Some(50.0)),
            student_row(4, 4, Active, None),
            student_row(5, 5, Withdrawn, Some(20.0)),
        ];

        let report = build_grade_report(&course(), &enrollments);
        assert_eq!(report.enrollment_count, 5);
        assert_eq!(report.graded_count, 3);
        assert_eq!(report.average_score, Some(76.67));
        assert_eq!(report.highest_score, Some(95.0));
        assert_eq!(report.lowest_score, Some(50.0));
        assert_eq!(report.pass_rate, Some(66.67));
        assert_eq!(
            report.distribution,
            GradeDistribution { a: 1, b: 1, c: 0, d: 0, f: 1 }
        );
        assert_eq!(report.students.len(), 5);
    }

    #[test]
    fn grade_report_without_scores() {
        let report = build_grade_report(&course(), &[student_row(1, 1, Active, None)]);
        assert_eq!(report.graded_count, 0);
        assert!(report.average_score.is_none());
        assert_eq!(report.distribution.total(), 0);

        let json = serde_json::to_value(&report.distribution).unwrap();
        for letter in LetterGrade::ALL {
            assert_eq!(json[letter.as_str()], 0);
        }
    }

    #[test]
    fn ranking_orders_by_gpa() {
        let enrollments = vec![
            student_row(1, 1, Completed, Some(72.0)),
            student_row(2, 2, Completed, Some(98.0)),
            student_row(3, 3, Completed, Some(85.0)),
            student_row(4, 4, Active, None),
        ];

        let ranked = rank_students(&enrollments, 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].student_id, 2);
        assert_eq!(ranked[0].gpa, 4.0);
        assert_eq!(ranked[1].student_id, 3);
    }

    #[test]
    fn transcript_csv_quotes_commas() {
        let mut enrollments = vec![detail(1, Completed, 4, Some(91.0))];
        enrollments[0].course_title = "Logic, Sets and Proofs".into();

        let csv = transcript_csv(&build_transcript(&student(), &enrollments));
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[1], "Ada Lovelace,STU001,4.00,4,4,Good Standing");
        assert!(lines[4].contains("\"Logic, Sets and Proofs\""));
        assert!(lines[4].ends_with("91.00,A,4.0"));
    }

    #[test]
    fn grade_report_csv_has_summary_and_rows() {
        let enrollments = vec![
            student_row(1, 1, Completed, Some(88.0)),
            student_row(2, 2, Active, None),
        ];
        let csv = grade_report_csv(&build_grade_report(&course(), &enrollments));
        let lines: Vec<&str> = csv.lines().collect();

        assert!(lines[1].starts_with("CS101,\"Programming, Part 1\",2,1,88.00"));
        assert_eq!(lines[4], "STU001,Student 1,completed,88.00,B");
        assert_eq!(lines[5], "STU002,Student 2,active,,");
    }

    #[test]
    fn csv_field_escapes_quotes() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field("line\rbreak"), "\"line\rbreak\"");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
    }
}
