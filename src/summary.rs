use std::collections::HashMap;

use chrono::NaiveDate;

use crate::models::{
    CourseSchedule, CourseStatus, DashboardRow, Enrollment, ScheduleStatus, SystemStats, User,
    UserSummary,
};
use crate::status::ScheduleBook;

/// Dashboard colouring band for a user's outstanding reminders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Healthy,
    Warning,
    Critical,
}

impl Severity {
    pub fn from_attention_count(count: usize) -> Self {
        match count {
            0 => Severity::Healthy,
            1..=2 => Severity::Warning,
            _ => Severity::Critical,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Severity::Healthy => "healthy",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

pub fn summarize(statuses: &[CourseStatus]) -> UserSummary {
    let mut summary = UserSummary {
        total_courses: statuses.len(),
        completed: 0,
        in_progress: 0,
        needs_reminder: 0,
        on_track: 0,
        needs_attention_count: 0,
        progress_percentage: 0.0,
    };

    for status in statuses {
        match status.status {
            ScheduleStatus::Completed => summary.completed += 1,
            ScheduleStatus::NeedsReminder => summary.needs_reminder += 1,
            ScheduleStatus::Progressed | ScheduleStatus::Started => {
                summary.in_progress += 1;
                if status.days_overdue == 0 {
                    summary.on_track += 1;
                }
            }
        }
    }

    summary.needs_attention_count = summary.needs_reminder;
    summary.progress_percentage = percentage(summary.completed, summary.total_courses);
    summary
}

impl UserSummary {
    pub fn severity(&self) -> Severity {
        Severity::from_attention_count(self.needs_attention_count)
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

pub fn group_by_user(enrollments: &[Enrollment]) -> HashMap<&str, Vec<&Enrollment>> {
    let mut map: HashMap<&str, Vec<&Enrollment>> = HashMap::new();
    for enrollment in enrollments {
        map.entry(enrollment.user_id.as_str())
            .or_default()
            .push(enrollment);
    }
    map
}

/// One row per user with at least one enrollment, in user order.
pub fn dashboard_rows(
    users: &[User],
    schedules: &[CourseSchedule],
    enrollments: &[Enrollment],
    on: NaiveDate,
) -> Vec<DashboardRow> {
    let book = ScheduleBook::new(schedules);
    let by_user = group_by_user(enrollments);

    users
        .iter()
        .filter_map(|user| {
            let user_enrollments = by_user.get(user.user_id.as_str())?;
            let classified = book.classify_all(user_enrollments.iter().copied(), on);
            Some(DashboardRow {
                user_id: user.user_id.clone(),
                name: user.name.clone(),
                email: user.email.clone(),
                hire_date: user.hire_date,
                summary: summarize(&classified.statuses),
            })
        })
        .collect()
}

pub fn system_stats(
    users: &[User],
    schedules: &[CourseSchedule],
    enrollments: &[Enrollment],
    on: NaiveDate,
) -> SystemStats {
    let rows = dashboard_rows(users, schedules, enrollments, on);
    let completed_courses = rows.iter().map(|row| row.summary.completed).sum();
    let total_enrollments = enrollments.len();

    SystemStats {
        total_users: users.len(),
        total_enrollments,
        total_courses: schedules.len(),
        completed_courses,
        courses_needing_attention: rows.iter().map(|row| row.summary.needs_reminder).sum(),
        courses_in_progress: rows.iter().map(|row| row.summary.in_progress).sum(),
        completion_rate: percentage(completed_courses, total_enrollments),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EnrollmentStatus, Rule};
    use crate::status::classify;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn enrollment(user_id: &str, course_id: &str, status: EnrollmentStatus) -> Enrollment {
        Enrollment {
            user_id: user_id.to_string(),
            course_id: course_id.to_string(),
            status,
            enrollment_date: date(2025, 1, 1),
            start_date: None,
            completion_date: None,
        }
    }

    fn schedules() -> Vec<CourseSchedule> {
        ["COURSE_001", "COURSE_002", "COURSE_003"]
            .iter()
            .map(|id| CourseSchedule {
                course_id: id.to_string(),
                days_to_complete: 10,
                batch: 0,
            })
            .collect()
    }

    fn user(user_id: &str) -> User {
        User {
            user_id: user_id.to_string(),
            name: format!("Name {user_id}"),
            email: format!("{user_id}@example.com"),
            manager_email: "manager@example.com".to_string(),
            hire_date: date(2024, 6, 1),
        }
    }

    #[test]
    fn empty_summary_has_zero_progress() {
        let summary = summarize(&[]);
        assert_eq!(summary.total_courses, 0);
        assert_eq!(summary.progress_percentage, 0.0);
        assert_eq!(summary.severity(), Severity::Healthy);
    }

    #[test]
    fn summary_buckets_started_and_progressed_together() {
        let schedules = schedules();
        let mut done = enrollment("u1", "COURSE_001", EnrollmentStatus::Completed);
        done.completion_date = Some(date(2025, 1, 3));
        let progressing = enrollment("u1", "COURSE_002", EnrollmentStatus::InProgress);
        let waiting = enrollment("u1", "COURSE_003", EnrollmentStatus::Enrolled);

        let on = date(2025, 1, 5);
        let statuses: Vec<CourseStatus> = [&done, &progressing, &waiting]
            .iter()
            .zip(schedules.iter())
            .map(|(e, s)| classify(e, Some(s), on).unwrap())
            .collect();
        assert_eq!(statuses[2].rule, Rule::Enrolled);

        let summary = summarize(&statuses);
        assert_eq!(summary.total_courses, 3);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.in_progress, 2);
        assert_eq!(summary.on_track, 2);
        assert_eq!(summary.needs_reminder, 0);
        assert!((summary.progress_percentage - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn severity_bands() {
        assert_eq!(Severity::from_attention_count(0), Severity::Healthy);
        assert_eq!(Severity::from_attention_count(1), Severity::Warning);
        assert_eq!(Severity::from_attention_count(2), Severity::Warning);
        assert_eq!(Severity::from_attention_count(3), Severity::Critical);
    }

    #[test]
    fn system_stats_aggregate_across_users() {
        let users = vec![user("u1"), user("u2"), user("u3")];
        let mut done = enrollment("u1", "COURSE_001", EnrollmentStatus::Completed);
        done.completion_date = Some(date(2025, 1, 2));
        let enrollments = vec![
            done,
            enrollment("u1", "COURSE_002", EnrollmentStatus::Enrolled),
            enrollment("u2", "COURSE_001", EnrollmentStatus::InProgress),
            enrollment("u2", "COURSE_003", EnrollmentStatus::Enrolled),
        ];

        let stats = system_stats(&users, &schedules(), &enrollments, date(2025, 1, 30));
        assert_eq!(stats.total_users, 3);
        assert_eq!(stats.total_enrollments, 4);
        assert_eq!(stats.total_courses, 3);
        assert_eq!(stats.completed_courses, 1);
        assert_eq!(stats.courses_needing_attention, 3);
        assert_eq!(stats.courses_in_progress, 0);
        assert!((stats.completion_rate - 25.0).abs() < 1e-9);

        let rows = dashboard_rows(&users, &schedules(), &enrollments, date(2025, 1, 30));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].summary.severity(), Severity::Warning);
    }

    #[test]
    fn system_stats_on_empty_data() {
        let stats = system_stats(&[], &[], &[], date(2025, 1, 1));
        assert_eq!(stats.completion_rate, 0.0);
    }
}
