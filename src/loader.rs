use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::models::{
    calendar_date, optional_calendar_date, CourseSchedule, Dataset, EmailRecord, Enrollment,
    EnrollmentStatus, User,
};

pub const USERS_FILE: &str = "users.json";
pub const SCHEDULES_FILE: &str = "course_schedules.json";
pub const ENROLLMENTS_FILE: &str = "course_enrollments.json";
pub const EMAIL_LOG_FILE: &str = "email_log.json";

/// `course_enrollments.json` nests enrollments under their user.
#[derive(Deserialize)]
struct UserEnrollments {
    user_id: String,
    enrollments: Vec<EnrollmentEntry>,
}

#[derive(Deserialize)]
struct EnrollmentEntry {
    course_id: String,
    status: EnrollmentStatus,
    #[serde(with = "calendar_date")]
    enrollment_date: NaiveDate,
    #[serde(default, with = "optional_calendar_date")]
    start_date: Option<NaiveDate>,
    #[serde(default, with = "optional_calendar_date")]
    completion_date: Option<NaiveDate>,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

pub fn load_dir(dir: &Path) -> anyhow::Result<Dataset> {
    let users: Vec<User> = read_json(&dir.join(USERS_FILE))?;
    let schedules: Vec<CourseSchedule> = read_json(&dir.join(SCHEDULES_FILE))?;
    let grouped: Vec<UserEnrollments> = read_json(&dir.join(ENROLLMENTS_FILE))?;

    let enrollments: Vec<Enrollment> = grouped
        .into_iter()
        .flat_map(|group| {
            let user_id = group.user_id;
            group.enrollments.into_iter().map(move |entry| Enrollment {
                user_id: user_id.clone(),
                course_id: entry.course_id,
                status: entry.status,
                enrollment_date: entry.enrollment_date,
                start_date: entry.start_date,
                completion_date: entry.completion_date,
            })
        })
        .collect();

    tracing::info!(
        users = users.len(),
        schedules = schedules.len(),
        enrollments = enrollments.len(),
        dir = %dir.display(),
        "Loaded data files"
    );

    Ok(Dataset {
        users,
        schedules,
        enrollments,
    })
}

pub fn email_log_path(dir: &Path) -> PathBuf {
    dir.join(EMAIL_LOG_FILE)
}

pub fn read_email_log(path: &Path) -> anyhow::Result<Vec<EmailRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    read_json(path)
}

/// Appends `records` to the JSON email log, replacing the file in one rename.
pub fn append_email_log(path: &Path, records: &[EmailRecord]) -> anyhow::Result<usize> {
    if records.is_empty() {
        return Ok(0);
    }

    let mut existing = read_email_log(path)?;
    existing.extend_from_slice(records);

    let staging = path.with_extension("json.tmp");
    let encoded = serde_json::to_string_pretty(&existing)?;
    fs::write(&staging, encoded)
        .with_context(|| format!("failed to write {}", staging.display()))?;
    fs::rename(&staging, path)
        .with_context(|| format!("failed to replace {}", path.display()))?;

    Ok(records.len())
}
