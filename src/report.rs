use std::fmt::Write;

use crate::aggregate::ProfileSummary;
use crate::models::{ProfileRecord, SemesterRecord};

fn gpa_text(gpa: Option<f64>) -> String {
    gpa.map(|value| format!("{value:.3}"))
        .unwrap_or_else(|| "Undefined".to_string())
}

pub fn result_line(summary: &ProfileSummary) -> String {
    format!(
        "CGPA {} ({}) from {} credit units and {:.3} points",
        summary.cgpa_label(),
        summary.grade,
        summary.grand_credits,
        summary.grand_points
    )
}

pub fn build_report(
    profile: &ProfileRecord,
    semesters: &[SemesterRecord],
    summary: &ProfileSummary,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# GPA Report: {}", profile.name);
    let _ = writeln!(
        output,
        "Point scale {} (profile {})",
        summary.scale, profile.id
    );

    if semesters.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "No semesters recorded for this profile.");
    }

    for (number, semester) in semesters.iter().enumerate() {
        let Some(totals) = summary
            .semesters
            .iter()
            .find(|totals| totals.semester_id == semester.id)
        else {
            continue;
        };

        let _ = writeln!(output);
        let _ = writeln!(output, "## Semester {}", number + 1);

        if semester.courses.is_empty() {
            let _ = writeln!(output, "No courses recorded for this semester.");
        }

        for (course, result) in semester.courses.iter().zip(&totals.courses) {
            let name = if course.name.is_empty() {
                "(unnamed)"
            } else {
                course.name.as_str()
            };
            let _ = writeln!(
                output,
                "- {} score {:.2}, {} credit units, grade {} at {:.2} ({:.2} points)",
                name,
                course.score.value(),
                course.credit_units,
                result.grade,
                result.grade_point,
                result.points
            );
        }

        let _ = writeln!(
            output,
            "Semester GPA {} ({}) across {} credit units, {:.3} points",
            gpa_text(totals.gpa),
            totals.grade,
            totals.total_credits,
            totals.total_points
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Previous CGPA");
    let _ = writeln!(
        output,
        "{:.3} over {} credit units ({:.3} points)",
        profile.baseline.previous_cgpa(),
        summary.previous_credits,
        summary.previous_points
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Result");
    let _ = writeln!(output, "{}", result_line(summary));

    output
}
