//! Score → letter → grade-point arithmetic shared by enrollments, results and reports.
//!
//! Everything here is a pure function of its inputs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LetterGrade {
    A,
    B,
    C,
    D,
    F,
}

impl LetterGrade {
    pub const ALL: [LetterGrade; 5] = [
        LetterGrade::A,
        LetterGrade::B,
        LetterGrade::C,
        LetterGrade::D,
        LetterGrade::F,
    ];

    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            LetterGrade::A
        } else if score >= 80.0 {
            LetterGrade::B
        } else if score >= 70.0 {
            LetterGrade::C
        } else if score >= 60.0 {
            LetterGrade::D
        } else {
            LetterGrade::F
        }
    }

    /// Points on the 4.0 scale.
    pub fn points(self) -> f64 {
        match self {
            LetterGrade::A => 4.0,
            LetterGrade::B => 3.0,
            LetterGrade::C => 2.0,
            LetterGrade::D => 1.0,
            LetterGrade::F => 0.0,
        }
    }

    pub fn is_passing(self) -> bool {
        self != LetterGrade::F
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LetterGrade::A => "A",
            LetterGrade::B => "B",
            LetterGrade::C => "C",
            LetterGrade::D => "D",
            LetterGrade::F => "F",
        }
    }
}

impl fmt::Display for LetterGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LetterGrade {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(LetterGrade::A),
            "B" => Ok(LetterGrade::B),
            "C" => Ok(LetterGrade::C),
            "D" => Ok(LetterGrade::D),
            "F" => Ok(LetterGrade::F),
            other => Err(format!("'{}' is not a letter grade", other)),
        }
    }
}

/// Scores below zero are stored as zero.
pub fn clamp_score(score: f64) -> f64 {
    score.max(0.0)
}

/// A recorded exam result wins over the grade typed onto the enrollment.
pub fn effective_score(result_score: Option<f64>, enrollment_grade: Option<f64>) -> Option<f64> {
    result_score.or(enrollment_grade)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// One course's contribution to a GPA.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradedCredit {
    pub credits: i32,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GpaSummary {
    pub gpa: f64,
    pub total_credits: i32,
    pub graded_credits: i32,
    pub graded_courses: usize,
}

/// Credit-weighted mean of grade points over the entries that carry a score.
pub fn compute_gpa(entries: &[GradedCredit]) -> GpaSummary {
    let total_credits = entries.iter().map(|e| e.credits).sum();

    let (weighted_points, graded_credits, graded_courses) = entries
        .iter()
        .filter_map(|e| e.score.map(|s| (e.credits, LetterGrade::from_score(s).points())))
        .fold((0.0, 0, 0usize), |(points, credits, count), (c, p)| {
            (points + p * c as f64, credits + c, count + 1)
        });

    let gpa = if graded_credits > 0 {
        round2(weighted_points / graded_credits as f64)
    } else {
        0.0
    };

    GpaSummary {
        gpa,
        total_credits,
        graded_credits,
        graded_courses,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AcademicStanding {
    #[serde(rename = "Good Standing")]
    GoodStanding,
    #[serde(rename = "Academic Warning")]
    AcademicWarning,
    #[serde(rename = "Academic Probation")]
    AcademicProbation,
}

impl AcademicStanding {
    pub fn label(self) -> &'static str {
        match self {
            AcademicStanding::GoodStanding => "Good Standing",
            AcademicStanding::AcademicWarning => "Academic Warning",
            AcademicStanding::AcademicProbation => "Academic Probation",
        }
    }
}

pub const WARNING_FAILURE_RATE: f64 = 0.2;
pub const PROBATION_FAILURE_RATE: f64 = 0.4;

pub fn academic_standing(failed: usize, total: usize) -> AcademicStanding {
    if total == 0 {
        return AcademicStanding::GoodStanding;
    }

    let failure_rate = failed as f64 / total as f64;
    if failure_rate < WARNING_FAILURE_RATE {
        AcademicStanding::GoodStanding
    } else if failure_rate < PROBATION_FAILURE_RATE {
        AcademicStanding::AcademicWarning
    } else {
        AcademicStanding::AcademicProbation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letter_cutoffs() {
        let table = [
            (100.0, LetterGrade::A),
            (95.0, LetterGrade::A),
            (90.0, LetterGrade::A),
            (89.99, LetterGrade::B),
            (80.0, LetterGrade::B),
            (79.5, LetterGrade::C),
            (70.0, LetterGrade::C),
            (65.0, LetterGrade::D),
            (60.0, LetterGrade::D),
            (59.9, LetterGrade::F),
            (0.0, LetterGrade::F),
        ];
        for (score, letter) in table {
            assert_eq!(LetterGrade::from_score(score), letter, "score {score}");
        }
    }

    #[test]
    fn grade_points_for_literal_scores() {
        assert_eq!(LetterGrade::from_score(95.0).points(), 4.0);
        assert_eq!(LetterGrade::from_score(65.0).points(), 1.0);
        assert_eq!(LetterGrade::from_score(42.0).points(), 0.0);
    }

    #[test]
    fn negative_scores_clamp_to_zero() {
        assert_eq!(clamp_score(-12.5), 0.0);
        assert_eq!(clamp_score(0.0), 0.0);
        assert_eq!(clamp_score(77.0), 77.0);
    }

    #[test]
    fn letter_parses_case_insensitively() {
        assert_eq!("b".parse::<LetterGrade>().unwrap(), LetterGrade::B);
        assert_eq!(" F ".parse::<LetterGrade>().unwrap(), LetterGrade::F);
        assert!("E".parse::<LetterGrade>().is_err());
    }

    #[test]
    fn result_score_overrides_enrollment_grade() {
        assert_eq!(effective_score(Some(88.0), Some(50.0)), Some(88.0));
        assert_eq!(effective_score(None, Some(50.0)), Some(50.0));
        assert_eq!(effective_score(None, None), None);
    }

    #[test]
    fn gpa_is_credit_weighted() {
        // 4 credits of A (4.0) and 2 credits of D (1.0): (16 + 2) / 6 = 3.0
        let summary = compute_gpa(&[
            GradedCredit { credits: 4, score: Some(95.0) },
            GradedCredit { credits: 2, score: Some(65.0) },
        ]);
        assert_eq!(summary.gpa, 3.0);
        assert_eq!(summary.graded_credits, 6);
        assert_eq!(summary.graded_courses, 2);
    }

    #[test]
    fn ungraded_courses_count_toward_total_only() {
        let summary = compute_gpa(&[
            GradedCredit { credits: 3, score: Some(85.0) },
            GradedCredit { credits: 3, score: None },
        ]);
        assert_eq!(summary.gpa, 3.0);
        assert_eq!(summary.total_credits, 6);
        assert_eq!(summary.graded_credits, 3);
    }

    #[test]
    fn gpa_rounds_to_two_places() {
        // (4*3 + 3*3 + 2*1) / 7 = 23 / 7 = 3.2857...
        let summary = compute_gpa(&[
            GradedCredit { credits: 3, score: Some(91.0) },
            GradedCredit { credits: 3, score: Some(81.0) },
            GradedCredit { credits: 1, score: Some(71.0) },
        ]);
        assert_eq!(summary.gpa, 3.29);
    }

    #[test]
    fn empty_gpa_is_zero() {
        let summary = compute_gpa(&[]);
        assert_eq!(summary.gpa, 0.0);
        assert_eq!(summary.total_credits, 0);
    }

    #[test]
    fn standing_thresholds() {
        assert_eq!(academic_standing(0, 0), AcademicStanding::GoodStanding);
        assert_eq!(academic_standing(0, 10), AcademicStanding::GoodStanding);
        assert_eq!(academic_standing(1, 10), AcademicStanding::GoodStanding);
        assert_eq!(academic_standing(2, 10), AcademicStanding::AcademicWarning);
        assert_eq!(academic_standing(3, 10), AcademicStanding::AcademicWarning);
        assert_eq!(academic_standing(4, 10), AcademicStanding::AcademicProbation);
        assert_eq!(academic_standing(5, 5), AcademicStanding::AcademicProbation);
    }

    #[test]
    fn standing_serializes_as_label() {
        let json = serde_json::to_string(&AcademicStanding::AcademicWarning).unwrap();
        assert_eq!(json, "\"Academic Warning\"");
        assert_eq!(AcademicStanding::AcademicWarning.label(), "Academic Warning");
    }
}
