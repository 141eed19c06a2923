use uuid::Uuid;

use crate::grading::{grade_for_gpa, grade_for_score, grade_point_for_score, Grade, PointScale};
use crate::models::{Baseline, CourseRecord, SemesterRecord};

#[derive(Debug, Clone, PartialEq)]
pub struct CourseResult {
    pub grade: Grade,
    pub grade_point: f64,
    pub points: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SemesterTotals {
    pub semester_id: Uuid,
    pub courses: Vec<CourseResult>,
    pub total_points: f64,
    pub total_credits: u64,
    pub gpa: Option<f64>,
    pub grade: Grade,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileSummary {
    pub scale: PointScale,
    pub semesters: Vec<SemesterTotals>,
    pub previous_points: f64,
    pub previous_credits: u64,
    pub grand_points: f64,
    pub grand_credits: u64,
    pub cgpa: Option<f64>,
    pub grade: Grade,
}

impl ProfileSummary {
    pub fn cgpa_label(&self) -> String {
        match self.cgpa {
            Some(cgpa) => format!("{cgpa:.3}"),
            None => Grade::Undefined.label().to_string(),
        }
    }
}

fn weighted_average(points: f64, credits: u64) -> Option<f64> {
    if credits == 0 {
        None
    } else {
        Some(points / credits as f64)
    }
}

fn label_for(scale: PointScale, gpa: Option<f64>) -> Grade {
    gpa.map(|value| grade_for_gpa(scale, value))
        .unwrap_or(Grade::Undefined)
}

pub fn course_points(scale: PointScale, course: &CourseRecord) -> CourseResult {
    let grade_point = grade_point_for_score(scale, course.score);
    CourseResult {
        grade: grade_for_score(course.score),
        grade_point,
        points: grade_point * f64::from(course.credit_units),
    }
}

pub fn summarize_semester(scale: PointScale, semester: &SemesterRecord) -> SemesterTotals {
    let courses: Vec<CourseResult> = semester
        .courses
        .iter()
        .map(|course| course_points(scale, course))
        .collect();

    let total_points: f64 = courses.iter().map(|course| course.points).sum();
    let total_credits: u64 = semester
        .courses
        .iter()
        .map(|course| u64::from(course.credit_units))
        .sum();
    let gpa = weighted_average(total_points, total_credits);

    SemesterTotals {
        semester_id: semester.id,
        courses,
        total_points,
        total_credits,
        gpa,
        grade: label_for(scale, gpa),
    }
}

pub fn summarize_profile(
    scale: PointScale,
    semesters: &[SemesterRecord],
    baseline: &Baseline,
) -> ProfileSummary {
    let semesters: Vec<SemesterTotals> = semesters
        .iter()
        .map(|semester| summarize_semester(scale, semester))
        .collect();

    let previous_points = baseline.previous_points();
    let previous_credits = u64::from(baseline.previous_credit_units());

    let grand_points = semesters
        .iter()
        .map(|semester| semester.total_points)
        .sum::<f64>()
        + previous_points;
    let grand_credits = semesters
        .iter()
        .map(|semester| semester.total_credits)
        .sum::<u64>()
        + previous_credits;
    let cgpa = weighted_average(grand_points, grand_credits);

    ProfileSummary {
        scale,
        semesters,
        previous_points,
        previous_credits,
        grand_points,
        grand_credits,
        cgpa,
        grade: label_for(scale, cgpa),
    }
}
