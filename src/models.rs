use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub manager_email: String,
    #[serde(with = "calendar_date")]
    pub hire_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseSchedule {
    pub course_id: String,
    /// Days allowed from enrollment; unsigned so a negative window fails to load.
    pub days_to_complete: u32,
    /// Grouping label only; never affects the deadline.
    pub batch: i32,
}

/// Raw enrollment state as reported by the upstream learning platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnrollmentStatus {
    Enrolled,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
}

impl EnrollmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::Enrolled => "Enrolled",
            EnrollmentStatus::InProgress => "In Progress",
            EnrollmentStatus::Completed => "Completed",
        }
    }
}

impl FromStr for EnrollmentStatus {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "Enrolled" => Ok(EnrollmentStatus::Enrolled),
            "In Progress" => Ok(EnrollmentStatus::InProgress),
            "Completed" => Ok(EnrollmentStatus::Completed),
            other => anyhow::bail!("unknown enrollment status: {other}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub user_id: String,
    pub course_id: String,
    pub status: EnrollmentStatus,
    #[serde(with = "calendar_date")]
    pub enrollment_date: NaiveDate,
    #[serde(default, with = "optional_calendar_date")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, with = "optional_calendar_date")]
    pub completion_date: Option<NaiveDate>,
}

impl Enrollment {
    pub fn days_since_enrollment(&self, on: NaiveDate) -> i64 {
        (on - self.enrollment_date).num_days()
    }
}

/// The three reference collections a run works from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    pub users: Vec<User>,
    pub schedules: Vec<CourseSchedule>,
    pub enrollments: Vec<Enrollment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScheduleStatus {
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "started")]
    Started,
    #[serde(rename = "progressed")]
    Progressed,
    #[serde(rename = "needs reminder")]
    NeedsReminder,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Completed => "completed",
            ScheduleStatus::Started => "started",
            ScheduleStatus::Progressed => "progressed",
            ScheduleStatus::NeedsReminder => "needs reminder",
        }
    }
}

impl FromStr for ScheduleStatus {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "completed" => Ok(ScheduleStatus::Completed),
            "started" => Ok(ScheduleStatus::Started),
            "progressed" => Ok(ScheduleStatus::Progressed),
            "needs reminder" => Ok(ScheduleStatus::NeedsReminder),
            other => anyhow::bail!("unknown schedule status: {other}"),
        }
    }
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifier rule that produced a [`CourseStatus`], in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    Completed,
    Overdue,
    InProgress,
    Started,
    Enrolled,
}

/// Data-integrity problems found while classifying an enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateIssue {
    EnrolledInFuture,
    StartBeforeEnrollment,
    CompletionBeforeEnrollment,
}

impl fmt::Display for DateIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DateIssue::EnrolledInFuture => "enrollment date is after the evaluation date",
            DateIssue::StartBeforeEnrollment => "start date is before the enrollment date",
            DateIssue::CompletionBeforeEnrollment => {
                "completion date is before the enrollment date"
            }
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseStatus {
    pub course_id: String,
    pub status: ScheduleStatus,
    pub rule: Rule,
    pub days_overdue: i64,
    pub message: String,
    pub date_issue: Option<DateIssue>,
    pub enrollment: Enrollment,
    pub schedule: CourseSchedule,
}

impl CourseStatus {
    pub fn needs_reminder(&self) -> bool {
        self.status == ScheduleStatus::NeedsReminder
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSummary {
    pub total_courses: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub needs_reminder: usize,
    pub on_track: usize,
    pub needs_attention_count: usize,
    pub progress_percentage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailKind {
    UserReminder,
    ManagerSummary,
}

impl EmailKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailKind::UserReminder => "user_reminder",
            EmailKind::ManagerSummary => "manager_summary",
        }
    }
}

impl FromStr for EmailKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user_reminder" => Ok(EmailKind::UserReminder),
            "manager_summary" => Ok(EmailKind::ManagerSummary),
            other => anyhow::bail!("unknown email type: {other}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailRecord {
    pub to: String,
    pub from: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: EmailKind,
    pub subject: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_type: Option<ScheduleStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub execution_date: Option<NaiveDate>,
    pub users_processed: usize,
    pub users_needing_reminders: usize,
    pub reminder_emails_sent: usize,
    pub manager_summaries_sent: usize,
    pub total_emails_sent: usize,
    pub delivery_failures: usize,
    pub schedules_missing: usize,
    pub invalid_dates: usize,
    pub orphaned_enrollments: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemStats {
    pub total_users: usize,
    pub total_enrollments: usize,
    pub total_courses: usize,
    pub completed_courses: usize,
    pub courses_needing_attention: usize,
    pub courses_in_progress: usize,
    pub completion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardRow {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub hire_date: NaiveDate,
    pub summary: UserSummary,
}

/// Accepts either `2025-01-01` or a timestamp such as `2025-01-01T08:00:00`
/// and keeps the calendar date.
pub fn parse_calendar_date(value: &str) -> anyhow::Result<NaiveDate> {
    let value = value.trim();
    let date_part = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map_err(|err| anyhow::anyhow!("invalid date {value:?}: {err}"))
}

pub(crate) mod calendar_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.format("%Y-%m-%d").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_calendar_date(&raw).map_err(serde::de::Error::custom)
    }
}

pub(crate) mod optional_calendar_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        date: &Option<NaiveDate>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match date {
            Some(date) => serializer.serialize_str(&date.format("%Y-%m-%d").to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDate>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(value) => super::parse_calendar_date(value)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}
