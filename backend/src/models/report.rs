use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::enrollment::EnrollmentStatus;
use crate::services::grading::{AcademicStanding, LetterGrade};

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptEntry {
    pub course_id: i32,
    pub course_code: String,
    pub course_title: String,
    pub credits: i32,
    pub enrollment_date: NaiveDate,
    pub status: EnrollmentStatus,
    pub score: Option<f64>,
    pub letter_grade: Option<LetterGrade>,
    pub grade_points: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Transcript {
    pub student_id: i32,
    pub student_name: String,
    pub enrollment_number: String,
    pub email: String,
    pub courses: Vec<TranscriptEntry>,
    pub cumulative_gpa: f64,
    pub credits_attempted: i32,
    pub credits_earned: i32,
    pub failed_courses: usize,
    pub failure_rate: f64,
    pub academic_standing: AcademicStanding,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct StudentGpaResponse {
    pub student_id: i32,
    pub gpa: f64,
    pub total_credits: i32,
    pub graded_credits: i32,
    pub graded_courses: usize,
}

/// Letter-grade histogram; every bucket is always present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GradeDistribution {
    #[serde(rename = "A")]
    pub a: usize,
    #[serde(rename = "B")]
    pub b: usize,
    #[serde(rename = "C")]
    pub c: usize,
    #[serde(rename = "D")]
    pub d: usize,
    #[serde(rename = "F")]
    pub f: usize,
}

impl GradeDistribution {
    pub fn record(&mut self, letter: LetterGrade) {
        match letter {
            LetterGrade::A => self.a += 1,
            LetterGrade::B => self.b += 1,
            LetterGrade::C => self.c += 1,
            LetterGrade::D => self.d += 1,
            LetterGrade::F => self.f += 1,
        }
    }

    pub fn count(&self, letter: LetterGrade) -> usize {
        match letter {
            LetterGrade::A => self.a,
            LetterGrade::B => self.b,
            LetterGrade::C => self.c,
            LetterGrade::D => self.d,
            LetterGrade::F => self.f,
        }
    }

    pub fn total(&self) -> usize {
        self.a + self.b + self.c + self.d + self.f
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GradeReportRow {
    pub enrollment_id: i32,
    pub student_id: i32,
    pub student_name: String,
    pub enrollment_number: String,
    pub status: EnrollmentStatus,
    pub score: Option<f64>,
    pub letter_grade: Option<LetterGrade>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GradeReport {
    pub course_id: i32,
    pub course_code: String,
    pub course_title: String,
    pub credits: i32,
    pub teacher_name: Option<String>,
    pub enrollment_count: usize,
    pub graded_count: usize,
    pub average_score: Option<f64>,
    pub highest_score: Option<f64>,
    pub lowest_score: Option<f64>,
    pub pass_rate: Option<f64>,
    pub distribution: GradeDistribution,
    pub students: Vec<GradeReportRow>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct DepartmentSummary {
    pub department_id: i32,
    pub name: String,
    pub teacher_count: i64,
    pub course_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopStudent {
    pub student_id: i32,
    pub student_name: String,
    pub enrollment_number: String,
    pub gpa: f64,
    pub graded_credits: i32,
}

#[derive(Debug, Serialize)]
pub struct SummaryReport {
    pub total_students: i64,
    pub total_teachers: i64,
    pub total_courses: i64,
    pub total_departments: i64,
    pub total_enrollments: i64,
    pub enrollments_by_status: HashMap<String, i64>,
    pub departments: Vec<DepartmentSummary>,
    pub top_students: Vec<TopStudent>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Pdf,
    Excel,
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub format: Option<ExportFormat>,
}
