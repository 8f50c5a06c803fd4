use serde::Serialize;

use crate::models::DateIssue;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassifyError {
    #[error("no course schedule for course {course_id}")]
    ScheduleNotFound { course_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("delivery to {recipient} rejected: {reason}")]
    Rejected { recipient: String, reason: String },
}

/// Non-fatal problems surfaced by a reminder run. The run keeps going.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobWarning {
    #[error("user {user_id}: no course schedule for {course_id}, enrollment skipped")]
    ScheduleNotFound { user_id: String, course_id: String },

    #[error("user {user_id}: course {course_id}: {issue}")]
    InvalidDateOrdering {
        user_id: String,
        course_id: String,
        issue: DateIssue,
    },

    #[error("enrollment for unknown user {user_id} (course {course_id}) skipped")]
    UnknownUser { user_id: String, course_id: String },

    #[error("delivery to {recipient} failed: {reason}")]
    DeliveryFailure { recipient: String, reason: String },
}
