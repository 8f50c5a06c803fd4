use std::collections::{BTreeMap, HashSet};

use chrono::{NaiveDate, Utc};
use serde::Serialize;

use crate::error::{ClassifyError, JobWarning};
use crate::models::{
    CourseStatus, Dataset, EmailKind, EmailRecord, RunStats, ScheduleStatus, User,
};
use crate::notify::{EmailLog, NotificationSink};
use crate::status::ScheduleBook;
use crate::summary::{group_by_user, summarize};
use crate::templates::{self, TeamMemberDigest};

#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub records: Vec<EmailRecord>,
    pub stats: RunStats,
    pub warnings: Vec<JobWarning>,
}

/// Daily pass over every user: classify, remind, and brief managers.
///
/// Each run stands alone. Nothing is suppressed based on earlier runs, so a
/// user with an overdue course is reminded on every run until it is done.
#[derive(Debug, Clone)]
pub struct ReminderJob {
    sender: String,
}

struct Dispatch<'a, S> {
    sink: &'a mut S,
    log: &'a mut EmailLog,
    records: Vec<EmailRecord>,
    warnings: &'a mut Vec<JobWarning>,
    failures: usize,
}

impl<S: NotificationSink> Dispatch<'_, S> {
    /// Hands the record to the sink and appends it to the audit log.
    fn send(&mut self, record: EmailRecord) -> bool {
        let delivered = match self.sink.deliver(&record) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(to = %record.to, error = %err, "Email delivery failed");
                self.failures += 1;
                self.warnings.push(JobWarning::DeliveryFailure {
                    recipient: record.to.clone(),
                    reason: err.to_string(),
                });
                false
            }
        };
        self.log.append(record.clone());
        self.records.push(record);
        delivered
    }
}

impl ReminderJob {
    pub fn new(sender: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
        }
    }

    pub fn run<S: NotificationSink>(
        &self,
        data: &Dataset,
        on: NaiveDate,
        sink: &mut S,
        log: &mut EmailLog,
    ) -> JobReport {
        tracing::info!(date = %on, users = data.users.len(), "Running daily reminder job");

        let book = ScheduleBook::new(&data.schedules);
        let by_user = group_by_user(&data.enrollments);
        let mut stats = RunStats {
            execution_date: Some(on),
            ..RunStats::default()
        };
        let mut warnings = Vec::new();

        let known: HashSet<&str> = data.users.iter().map(|u| u.user_id.as_str()).collect();
        for enrollment in &data.enrollments {
            if !known.contains(enrollment.user_id.as_str()) {
                tracing::warn!(
                    user_id = %enrollment.user_id,
                    course_id = %enrollment.course_id,
                    "Enrollment references an unknown user"
                );
                stats.orphaned_enrollments += 1;
                warnings.push(JobWarning::UnknownUser {
                    user_id: enrollment.user_id.clone(),
                    course_id: enrollment.course_id.clone(),
                });
            }
        }

        let mut reminders: Vec<(&User, Vec<CourseStatus>)> = Vec::new();
        let mut teams: BTreeMap<&str, Vec<TeamMemberDigest>> = BTreeMap::new();

        for user in &data.users {
            stats.users_processed += 1;
            let Some(enrollments) = by_user.get(user.user_id.as_str()) else {
                tracing::debug!(user_id = %user.user_id, "No enrollments found");
                continue;
            };

            let classified = book.classify_all(enrollments.iter().copied(), on);
            for skipped in classified.skipped {
                let ClassifyError::ScheduleNotFound { course_id } = skipped;
                tracing::warn!(
                    user_id = %user.user_id,
                    course_id = %course_id,
                    "No course schedule, enrollment skipped"
                );
                stats.schedules_missing += 1;
                warnings.push(JobWarning::ScheduleNotFound {
                    user_id: user.user_id.clone(),
                    course_id,
                });
            }
            for status in &classified.statuses {
                if let Some(issue) = status.date_issue {
                    tracing::warn!(
                        user_id = %user.user_id,
                        course_id = %status.course_id,
                        issue = %issue,
                        "Enrollment dates look inconsistent"
                    );
                    stats.invalid_dates += 1;
                    warnings.push(JobWarning::InvalidDateOrdering {
                        user_id: user.user_id.clone(),
                        course_id: status.course_id.clone(),
                        issue,
                    });
                }
            }

            let summary = summarize(&classified.statuses);
            let overdue: Vec<CourseStatus> = classified
                .statuses
                .into_iter()
                .filter(CourseStatus::needs_reminder)
                .collect();

            if overdue.is_empty() {
                tracing::debug!(user_id = %user.user_id, "All courses on track");
            } else {
                tracing::info!(
                    user_id = %user.user_id,
                    overdue = overdue.len(),
                    "Courses need attention"
                );
                stats.users_needing_reminders += 1;
                reminders.push((user, overdue.clone()));
            }

            teams
                .entry(user.manager_email.as_str())
                .or_default()
                .push(TeamMemberDigest {
                    user_name: user.name.clone(),
                    user_email: user.email.clone(),
                    summary,
                    overdue,
                });
        }

        let mut dispatch = Dispatch {
            sink,
            log,
            records: Vec::new(),
            warnings: &mut warnings,
            failures: 0,
        };

        for (user, courses) in &reminders {
            if dispatch.send(self.user_reminder(user, courses)) {
                stats.reminder_emails_sent += 1;
            }
        }

        for (manager_email, team) in &teams {
            if team.iter().all(|member| member.overdue.is_empty()) {
                continue;
            }
            if dispatch.send(self.manager_summary(manager_email, team)) {
                stats.manager_summaries_sent += 1;
            }
        }

        stats.delivery_failures = dispatch.failures;
        stats.total_emails_sent = stats.reminder_emails_sent + stats.manager_summaries_sent;
        let records = dispatch.records;

        tracing::info!(
            users_processed = stats.users_processed,
            users_needing_reminders = stats.users_needing_reminders,
            reminder_emails_sent = stats.reminder_emails_sent,
            manager_summaries_sent = stats.manager_summaries_sent,
            delivery_failures = stats.delivery_failures,
            "Daily reminder job finished"
        );

        JobReport {
            records,
            stats,
            warnings,
        }
    }

    fn user_reminder(&self, user: &User, courses: &[CourseStatus]) -> EmailRecord {
        EmailRecord {
            to: user.email.clone(),
            from: self.sender.clone(),
            timestamp: Utc::now(),
            kind: EmailKind::UserReminder,
            subject: templates::reminder_subject(user),
            body: templates::reminder_body(user, courses),
            status_type: Some(ScheduleStatus::NeedsReminder),
            course_ids: Some(courses.iter().map(|c| c.course_id.clone()).collect()),
        }
    }

    fn manager_summary(&self, manager_email: &str, team: &[TeamMemberDigest]) -> EmailRecord {
        let course_ids = team
            .iter()
            .flat_map(|member| member.overdue.iter().map(|c| c.course_id.clone()))
            .collect();
        EmailRecord {
            to: manager_email.to_string(),
            from: self.sender.clone(),
            timestamp: Utc::now(),
            kind: EmailKind::ManagerSummary,
            subject: templates::manager_subject(team.len()),
            body: templates::manager_body(team),
            status_type: None,
            course_ids: Some(course_ids),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeliveryError;
    use crate::models::{CourseSchedule, Enrollment, EnrollmentStatus};
    use crate::notify::TracingSink;
    use pretty_assertions::assert_eq;

    const SENDER: &str = "noreply@learningplatform.com";

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn user(id: &str, manager: &str) -> User {
        User {
            user_id: id.to_string(),
            name: format!("User {id}"),
            email: format!("{id}@example.com"),
            manager_email: manager.to_string(),
            hire_date: date(2024, 9, 1),
        }
    }

    fn enrollment(user_id: &str, course_id: &str) -> Enrollment {
        Enrollment {
            user_id: user_id.to_string(),
            course_id: course_id.to_string(),
            status: EnrollmentStatus::Enrolled,
            enrollment_date: date(2025, 1, 1),
            start_date: None,
            completion_date: None,
        }
    }

    fn schedule(course_id: &str, days: u32) -> CourseSchedule {
        CourseSchedule {
            course_id: course_id.to_string(),
            days_to_complete: days,
            batch: 1,
        }
    }

    fn team_dataset() -> Dataset {
        Dataset {
            users: vec![
                user("u1", "boss@example.com"),
                user("u2", "boss@example.com"),
                user("u3", "other@example.com"),
            ],
            schedules: vec![schedule("SEC_101", 30), schedule("ETH_201", 90)],
            enrollments: vec![
                enrollment("u1", "SEC_101"),
                enrollment("u2", "SEC_101"),
                enrollment("u2", "ETH_201"),
                enrollment("u3", "ETH_201"),
            ],
        }
    }

    #[derive(Default)]
    struct RejectingSink {
        reject: Vec<String>,
        delivered: Vec<String>,
    }

    impl NotificationSink for RejectingSink {
        fn deliver(&mut self, record: &EmailRecord) -> Result<(), DeliveryError> {
            if self.reject.contains(&record.to) {
                return Err(DeliveryError::Rejected {
                    recipient: record.to.clone(),
                    reason: "mailbox unavailable".to_string(),
                });
            }
            self.delivered.push(record.to.clone());
            Ok(())
        }
    }

    #[test]
    fn manager_gets_one_summary_for_two_overdue_reports() {
        let job = ReminderJob::new(SENDER);
        let mut sink = TracingSink::default();
        let mut log = EmailLog::new();

        let report = job.run(&team_dataset(), date(2025, 2, 15), &mut sink, &mut log);

        let reminders: Vec<&EmailRecord> = report
            .records
            .iter()
            .filter(|r| r.kind == EmailKind::UserReminder)
            .collect();
        let summaries: Vec<&EmailRecord> = report
            .records
            .iter()
            .filter(|r| r.kind == EmailKind::ManagerSummary)
            .collect();

        assert_eq!(reminders.len(), 2);
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].to, "boss@example.com");
        assert_eq!(
            summaries[0].course_ids,
            Some(vec!["SEC_101".to_string(), "SEC_101".to_string()])
        );
        assert!(summaries[0].body.contains("User u1"));
        assert!(summaries[0].body.contains("User u2"));

        assert_eq!(
            report.stats,
            RunStats {
                execution_date: Some(date(2025, 2, 15)),
                users_processed: 3,
                users_needing_reminders: 2,
                reminder_emails_sent: 2,
                manager_summaries_sent: 1,
                total_emails_sent: 3,
                ..RunStats::default()
            }
        );
        assert_eq!(log.len(), 3);
        assert_eq!(sink.delivered(), 3);
    }

    #[test]
    fn one_reminder_lists_all_overdue_courses() {
        let mut data = team_dataset();
        data.schedules = vec![schedule("SEC_101", 5), schedule("ETH_201", 5)];
        let job = ReminderJob::new(SENDER);
        let mut log = EmailLog::new();

        let report = job.run(&data, date(2025, 2, 15), &mut TracingSink::default(), &mut log);
        let u2 = report
            .records
            .iter()
            .find(|r| r.to == "u2@example.com")
            .unwrap();
        assert_eq!(
            u2.course_ids,
            Some(vec!["SEC_101".to_string(), "ETH_201".to_string()])
        );
        assert_eq!(u2.status_type, Some(ScheduleStatus::NeedsReminder));
        assert_eq!(u2.from, SENDER);
    }

    #[test]
    fn nobody_overdue_sends_nothing() {
        let job = ReminderJob::new(SENDER);
        let mut log = EmailLog::new();
        let report = job.run(
            &team_dataset(),
            date(2025, 1, 10),
            &mut TracingSink::default(),
            &mut log,
        );
        assert!(report.records.is_empty());
        assert!(log.is_empty());
        assert_eq!(report.stats.users_processed, 3);
        assert_eq!(report.stats.total_emails_sent, 0);
    }

    #[test]
    fn missing_schedule_is_skipped_and_counted() {
        let mut data = team_dataset();
        data.enrollments.push(enrollment("u3", "GHOST_999"));
        let job = ReminderJob::new(SENDER);
        let report = job.run(
            &data,
            date(2025, 2, 15),
            &mut TracingSink::default(),
            &mut EmailLog::new(),
        );

        assert_eq!(report.stats.schedules_missing, 1);
        assert!(report.warnings.contains(&JobWarning::ScheduleNotFound {
            user_id: "u3".to_string(),
            course_id: "GHOST_999".to_string(),
        }));
        assert!(report
            .records
            .iter()
            .all(|r| !r.course_ids.iter().flatten().any(|c| c == "GHOST_999")));
        assert_eq!(report.stats.reminder_emails_sent, 2);
    }

    #[test]
    fn failed_delivery_is_counted_apart_and_run_continues() {
        let job = ReminderJob::new(SENDER);
        let mut sink = RejectingSink {
            reject: vec!["u1@example.com".to_string()],
            ..RejectingSink::default()
        };
        let mut log = EmailLog::new();

        let report = job.run(&team_dataset(), date(2025, 2, 15), &mut sink, &mut log);

        assert_eq!(report.stats.delivery_failures, 1);
        assert_eq!(report.stats.reminder_emails_sent, 1);
        assert_eq!(report.stats.manager_summaries_sent, 1);
        assert_eq!(report.stats.total_emails_sent, 2);
        assert_eq!(sink.delivered, vec!["u2@example.com", "boss@example.com"]);
        assert_eq!(log.len(), 3);
        assert!(matches!(
            report.warnings.as_slice(),
            [JobWarning::DeliveryFailure { recipient, .. }] if recipient == "u1@example.com"
        ));
    }

    #[test]
    fn unknown_users_and_bad_dates_become_warnings() {
        let mut data = team_dataset();
        data.enrollments.push(enrollment("ghost", "SEC_101"));
        let mut future = enrollment("u3", "SEC_101");
        future.enrollment_date = date(2025, 3, 1);
        data.enrollments.push(future);

        let report = ReminderJob::new(SENDER).run(
            &data,
            date(2025, 2, 15),
            &mut TracingSink::default(),
            &mut EmailLog::new(),
        );

        assert_eq!(report.stats.orphaned_enrollments, 1);
        assert_eq!(report.stats.invalid_dates, 1);
        assert!(report.records.iter().all(|r| r.to != "u3@example.com"));
    }

    #[test]
    fn repeated_runs_match_apart_from_timestamps() {
        let job = ReminderJob::new(SENDER);
        let strip = |report: JobReport| -> Vec<EmailRecord> {
            report
                .records
                .into_iter()
                .map(|mut record| {
                    record.timestamp = chrono::DateTime::<Utc>::default();
                    record
                })
                .collect()
        };

        let first = job.run(
            &team_dataset(),
            date(2025, 2, 15),
            &mut TracingSink::default(),
            &mut EmailLog::new(),
        );
        let second = job.run(
            &team_dataset(),
            date(2025, 2, 15),
            &mut TracingSink::default(),
            &mut EmailLog::new(),
        );

        assert_eq!(first.stats, second.stats);
        let first = serde_json::to_string(&strip(first)).unwrap();
        let second = serde_json::to_string(&strip(second)).unwrap();
        assert_eq!(first, second);
    }
}
