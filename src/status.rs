use std::collections::HashMap;

use chrono::NaiveDate;

use crate::error::ClassifyError;
use crate::models::{
    CourseSchedule, CourseStatus, DateIssue, Enrollment, EnrollmentStatus, Rule, ScheduleStatus,
};

/// Evaluation order. The first rule that matches decides the status.
pub const RULES: [Rule; 5] = [
    Rule::Completed,
    Rule::Overdue,
    Rule::InProgress,
    Rule::Started,
    Rule::Enrolled,
];

struct Facts<'a> {
    enrollment: &'a Enrollment,
    days_since_enrollment: i64,
    days_to_complete: i64,
    date_issue: Option<DateIssue>,
}

impl Facts<'_> {
    fn days_remaining(&self) -> i64 {
        self.days_to_complete - self.days_since_enrollment
    }
}

struct Outcome {
    status: ScheduleStatus,
    days_overdue: i64,
    message: String,
}

impl Rule {
    fn evaluate(self, facts: &Facts<'_>) -> Option<Outcome> {
        let enrollment = facts.enrollment;
        match self {
            Rule::Completed => enrollment.completion_date.map(|completed_on| Outcome {
                status: ScheduleStatus::Completed,
                days_overdue: 0,
                message: format!("Completed on {}", completed_on.format("%Y-%m-%d")),
            }),
            // Bad dates fall through to the conservative `Enrolled` rule.
            _ if facts.date_issue.is_some() && self != Rule::Enrolled => None,
            Rule::Overdue => {
                if facts.days_since_enrollment <= facts.days_to_complete {
                    return None;
                }
                let days_overdue = facts.days_since_enrollment - facts.days_to_complete;
                let detail = if enrollment.start_date.is_some() {
                    "In progress but overdue"
                } else {
                    "Not started"
                };
                Some(Outcome {
                    status: ScheduleStatus::NeedsReminder,
                    days_overdue,
                    message: format!("{detail} - {days_overdue} days overdue"),
                })
            }
            Rule::InProgress => (enrollment.status == EnrollmentStatus::InProgress).then(|| {
                Outcome {
                    status: ScheduleStatus::Progressed,
                    days_overdue: 0,
                    message: format!("In progress - {} days remaining", facts.days_remaining()),
                }
            }),
            Rule::Started => enrollment.start_date.map(|_| Outcome {
                status: ScheduleStatus::Started,
                days_overdue: 0,
                message: format!("Started - {} days remaining", facts.days_remaining()),
            }),
            Rule::Enrolled => Some(enrolled(facts)),
        }
    }
}

fn enrolled(facts: &Facts<'_>) -> Outcome {
    let message = match facts.date_issue {
        Some(issue) => format!("Needs data review - {issue}"),
        None => format!(
            "Enrolled - {} days to start and complete",
            facts.days_remaining()
        ),
    };
    Outcome {
        status: ScheduleStatus::Started,
        days_overdue: 0,
        message,
    }
}

fn date_issue(enrollment: &Enrollment, on: NaiveDate) -> Option<DateIssue> {
    if enrollment.enrollment_date > on {
        return Some(DateIssue::EnrolledInFuture);
    }
    if matches!(enrollment.start_date, Some(start) if start < enrollment.enrollment_date) {
        return Some(DateIssue::StartBeforeEnrollment);
    }
    if matches!(enrollment.completion_date, Some(done) if done < enrollment.enrollment_date) {
        return Some(DateIssue::CompletionBeforeEnrollment);
    }
    None
}

/// Classifies one enrollment against its schedule as of `on` (a UTC calendar date).
pub fn classify(
    enrollment: &Enrollment,
    schedule: Option<&CourseSchedule>,
    on: NaiveDate,
) -> Result<CourseStatus, ClassifyError> {
    let schedule = schedule.ok_or_else(|| ClassifyError::ScheduleNotFound {
        course_id: enrollment.course_id.clone(),
    })?;

    let facts = Facts {
        enrollment,
        days_since_enrollment: enrollment.days_since_enrollment(on),
        days_to_complete: i64::from(schedule.days_to_complete),
        date_issue: date_issue(enrollment, on),
    };

    let (rule, outcome) = RULES
        .iter()
        .find_map(|rule| rule.evaluate(&facts).map(|outcome| (*rule, outcome)))
        .unwrap_or_else(|| (Rule::Enrolled, enrolled(&facts)));

    Ok(CourseStatus {
        course_id: enrollment.course_id.clone(),
        status: outcome.status,
        rule,
        days_overdue: outcome.days_overdue,
        message: outcome.message,
        date_issue: facts.date_issue,
        enrollment: enrollment.clone(),
        schedule: schedule.clone(),
    })
}

/// Course schedules indexed by course id.
#[derive(Debug, Clone, Default)]
pub struct ScheduleBook {
    schedules: HashMap<String, CourseSchedule>,
}

#[derive(Debug, Default)]
pub struct Classified {
    pub statuses: Vec<CourseStatus>,
    pub skipped: Vec<ClassifyError>,
}

impl ScheduleBook {
    pub fn new(schedules: &[CourseSchedule]) -> Self {
        let schedules = schedules
            .iter()
            .map(|schedule| (schedule.course_id.clone(), schedule.clone()))
            .collect();
        Self { schedules }
    }

    pub fn get(&self, course_id: &str) -> Option<&CourseSchedule> {
        self.schedules.get(course_id)
    }

    pub fn classify(
        &self,
        enrollment: &Enrollment,
        on: NaiveDate,
    ) -> Result<CourseStatus, ClassifyError> {
        classify(enrollment, self.get(&enrollment.course_id), on)
    }

    /// Classifies every enrollment, setting aside the ones without a schedule.
    pub fn classify_all<'a, I>(&self, enrollments: I, on: NaiveDate) -> Classified
    where
        I: IntoIterator<Item = &'a Enrollment>,
    {
        let mut classified = Classified::default();
        for enrollment in enrollments {
            match self.classify(enrollment, on) {
                Ok(status) => classified.statuses.push(status),
                Err(err) => classified.skipped.push(err),
            }
        }
        classified
    }
}
