use std::fmt::Write;

use chrono::NaiveDate;

use crate::models::Dataset;
use crate::summary::{dashboard_rows, system_stats};

pub fn build_report(data: &Dataset, on: NaiveDate) -> String {
    let stats = system_stats(&data.users, &data.schedules, &data.enrollments, on);
    let mut rows = dashboard_rows(&data.users, &data.schedules, &data.enrollments, on);
    rows.sort_by(|a, b| {
        b.summary
            .needs_attention_count
            .cmp(&a.summary.needs_attention_count)
            .then_with(|| a.name.cmp(&b.name))
    });

    let mut output = String::new();

    let _ = writeln!(output, "# Learning Progress Dashboard");
    let _ = writeln!(output, "Generated for {}", on);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overview");
    let _ = writeln!(output, "- Users: {}", stats.total_users);
    let _ = writeln!(output, "- Courses: {}", stats.total_courses);
    let _ = writeln!(output, "- Enrollments: {}", stats.total_enrollments);
    let _ = writeln!(output, "- Completed: {}", stats.completed_courses);
    let _ = writeln!(output, "- In progress: {}", stats.courses_in_progress);
    let _ = writeln!(output, "- Needing attention: {}", stats.courses_needing_attention);
    let _ = writeln!(output, "- Completion rate: {:.1}%", stats.completion_rate);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Team Members");

    if rows.is_empty() {
        let _ = writeln!(output, "No enrollments recorded.");
    } else {
        let _ = writeln!(
            output,
            "| Name | Email | Hired | Completed | In progress | Needs attention | Progress | Health |"
        );
        let _ = writeln!(output, "|---|---|---|---|---|---|---|---|");
        for row in &rows {
            let summary = &row.summary;
            let _ = writeln!(
                output,
                "| {} | {} | {} | {}/{} | {} | {} | {:.0}% | {} |",
                row.name,
                row.email,
                row.hire_date,
                summary.completed,
                summary.total_courses,
                summary.in_progress,
                summary.needs_attention_count,
                summary.progress_percentage,
                summary.severity().label()
            );
        }
    }

    output
}
