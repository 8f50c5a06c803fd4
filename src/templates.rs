use std::fmt::Write;

use crate::models::{CourseStatus, User, UserSummary};

/// One report's line in a manager summary.
#[derive(Debug, Clone)]
pub struct TeamMemberDigest {
    pub user_name: String,
    pub user_email: String,
    pub summary: UserSummary,
    pub overdue: Vec<CourseStatus>,
}

pub fn reminder_subject(user: &User) -> String {
    format!("[Action Required] Course Completion Reminder for {}", user.name)
}

pub fn reminder_body(user: &User, courses: &[CourseStatus]) -> String {
    let mut body = String::new();
    let _ = writeln!(body, "Hi {},", user.name);
    let _ = writeln!(body);
    let _ = writeln!(
        body,
        "This is a friendly reminder that you have courses that require your attention."
    );
    let _ = writeln!(
        body,
        "The following courses are overdue and need to be completed:"
    );
    let _ = writeln!(body);
    for course in courses {
        let _ = writeln!(body, "  - {}: {}", course.course_id, course.message);
    }
    let _ = writeln!(body);
    let _ = writeln!(
        body,
        "Please prioritize completing these courses to stay on track with your learning goals."
    );
    let _ = writeln!(
        body,
        "If you're experiencing any difficulties, please reach out to your manager or the L&D team."
    );
    let _ = writeln!(body);
    let _ = writeln!(body, "Best regards,");
    let _ = writeln!(body, "Learning & Development Team");
    body
}

pub fn manager_subject(team_size: usize) -> String {
    format!("Daily Learning Progress Report - {team_size} Team Members")
}

pub fn manager_body(team: &[TeamMemberDigest]) -> String {
    let mut body = String::new();
    let _ = writeln!(body, "Hello,");
    let _ = writeln!(body);
    let _ = writeln!(
        body,
        "Here's your daily learning progress report for your team:"
    );
    let _ = writeln!(body);

    for member in team {
        let tag = if member.summary.needs_reminder > 0 {
            "[NEEDS ATTENTION]"
        } else {
            "[ON TRACK]"
        };
        let _ = writeln!(
            body,
            "{} {} ({}): {} completed, {} in progress, {} needs attention",
            tag,
            member.user_name,
            member.user_email,
            member.summary.completed,
            member.summary.in_progress,
            member.summary.needs_reminder
        );
        for course in &member.overdue {
            let _ = writeln!(body, "    - {}: {}", course.course_id, course.message);
        }
    }

    let _ = writeln!(body);
    let _ = writeln!(
        body,
        "Team members with courses needing attention have been sent reminder emails."
    );
    let _ = writeln!(
        body,
        "For detailed progress information, please check the learning management dashboard."
    );
    let _ = writeln!(body);
    let _ = writeln!(body, "Best regards,");
    let _ = writeln!(body, "Learning & Development Team");
    body
}
