use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{
    CourseSchedule, Dataset, EmailKind, EmailRecord, Enrollment, EnrollmentStatus, User,
};
use crate::notify::{EmailLogPage, EmailLogStats};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

async fn upsert_user(pool: &PgPool, user: &User) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO learntrack.users (user_id, full_name, email, manager_email, hire_date)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (user_id) DO UPDATE
        SET full_name = EXCLUDED.full_name,
            email = EXCLUDED.email,
            manager_email = EXCLUDED.manager_email,
            hire_date = EXCLUDED.hire_date
        "#,
    )
    .bind(&user.user_id)
    .bind(&user.name)
    .bind(&user.email)
    .bind(&user.manager_email)
    .bind(user.hire_date)
    .execute(pool)
    .await?;
    Ok(())
}

async fn upsert_schedule(pool: &PgPool, schedule: &CourseSchedule) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO learntrack.course_schedules (course_id, days_to_complete, batch)
        VALUES ($1, $2, $3)
        ON CONFLICT (course_id) DO UPDATE
        SET days_to_complete = EXCLUDED.days_to_complete, batch = EXCLUDED.batch
        "#,
    )
    .bind(&schedule.course_id)
    .bind(i64::from(schedule.days_to_complete))
    .bind(schedule.batch)
    .execute(pool)
    .await?;
    Ok(())
}

/// Returns true when the row was new or changed.
async fn upsert_enrollment(pool: &PgPool, enrollment: &Enrollment) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO learntrack.enrollments
        (id, user_id, course_id, status, enrollment_date, start_date, completion_date)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (user_id, course_id) DO UPDATE
        SET status = EXCLUDED.status,
            enrollment_date = EXCLUDED.enrollment_date,
            start_date = EXCLUDED.start_date,
            completion_date = EXCLUDED.completion_date
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&enrollment.user_id)
    .bind(&enrollment.course_id)
    .bind(enrollment.status.as_str())
    .bind(enrollment.enrollment_date)
    .bind(enrollment.start_date)
    .bind(enrollment.completion_date)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let date = |y: i32, m: u32, d: u32| {
        NaiveDate::from_ymd_opt(y, m, d).context("invalid seed date")
    };

    let users = vec![
        (
            "user_001",
            "Avery Lee",
            "avery.lee@learntrack.io",
            "dana.ortiz@learntrack.io",
            date(2025, 1, 2)?,
        ),
        (
            "user_002",
            "Jules Moreno",
            "jules.moreno@learntrack.io",
            "dana.ortiz@learntrack.io",
            date(2025, 1, 6)?,
        ),
        (
            "user_003",
            "Kiara Patel",
            "kiara.patel@learntrack.io",
            "sam.reyes@learntrack.io",
            date(2025, 2, 3)?,
        ),
    ];
    for (user_id, name, email, manager_email, hire_date) in users {
        upsert_user(
            pool,
            &User {
                user_id: user_id.to_string(),
                name: name.to_string(),
                email: email.to_string(),
                manager_email: manager_email.to_string(),
                hire_date,
            },
        )
        .await?;
    }

    let schedules = vec![
        ("SECURITY_BASICS", 7, 1),
        ("CODE_OF_CONDUCT", 14, 1),
        ("DATA_PRIVACY", 30, 2),
        ("LEADERSHIP_101", 60, 3),
    ];
    for (course_id, days_to_complete, batch) in schedules {
        upsert_schedule(
            pool,
            &CourseSchedule {
                course_id: course_id.to_string(),
                days_to_complete,
                batch,
            },
        )
        .await?;
    }

    let enrollments = vec![
        (
            "user_001",
            "SECURITY_BASICS",
            EnrollmentStatus::Completed,
            date(2025, 1, 2)?,
            Some(date(2025, 1, 2)?),
            Some(date(2025, 1, 5)?),
        ),
        (
            "user_001",
            "CODE_OF_CONDUCT",
            EnrollmentStatus::InProgress,
            date(2025, 1, 2)?,
            Some(date(2025, 1, 8)?),
            None,
        ),
        ("user_001", "DATA_PRIVACY", EnrollmentStatus::Enrolled, date(2025, 1, 2)?, None, None),
        ("user_002", "SECURITY_BASICS", EnrollmentStatus::Enrolled, date(2025, 1, 6)?, None, None),
        (
            "user_002",
            "CODE_OF_CONDUCT",
            EnrollmentStatus::Completed,
            date(2025, 1, 6)?,
            Some(date(2025, 1, 7)?),
            Some(date(2025, 1, 12)?),
        ),
        (
            "user_003",
            "SECURITY_BASICS",
            EnrollmentStatus::InProgress,
            date(2025, 2, 3)?,
            Some(date(2025, 2, 4)?),
            None,
        ),
        ("user_003", "LEADERSHIP_101", EnrollmentStatus::Enrolled, date(2025, 2, 3)?, None, None),
    ];
    for (user_id, course_id, status, enrollment_date, start_date, completion_date) in enrollments {
        upsert_enrollment(
            pool,
            &Enrollment {
                user_id: user_id.to_string(),
                course_id: course_id.to_string(),
                status,
                enrollment_date,
                start_date,
                completion_date,
            },
        )
        .await?;
    }

    Ok(())
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportCounts {
    pub users: usize,
    pub schedules: usize,
    pub enrollments: usize,
}

pub async fn import_csv(
    pool: &PgPool,
    users: Option<&Path>,
    schedules: Option<&Path>,
    enrollments: Option<&Path>,
) -> anyhow::Result<ImportCounts> {
    let mut counts = ImportCounts::default();

    if let Some(path) = users {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        for result in reader.deserialize::<User>() {
            upsert_user(pool, &result?).await?;
            counts.users += 1;
        }
    }

    if let Some(path) = schedules {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        for result in reader.deserialize::<CourseSchedule>() {
            upsert_schedule(pool, &result?).await?;
            counts.schedules += 1;
        }
    }

    if let Some(path) = enrollments {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        for result in reader.deserialize::<Enrollment>() {
            if upsert_enrollment(pool, &result?).await? {
                counts.enrollments += 1;
            }
        }
    }

    Ok(counts)
}

pub async fn fetch_dataset(pool: &PgPool) -> anyhow::Result<Dataset> {
    let mut users = Vec::new();
    let rows = sqlx::query(
        "SELECT user_id, full_name, email, manager_email, hire_date \
         FROM learntrack.users ORDER BY user_id",
    )
    .fetch_all(pool)
    .await?;
    for row in rows {
        users.push(User {
            user_id: row.try_get("user_id")?,
            name: row.try_get("full_name")?,
            email: row.try_get("email")?,
            manager_email: row.try_get("manager_email")?,
            hire_date: row.try_get("hire_date")?,
        });
    }

    let mut schedules = Vec::new();
    let rows = sqlx::query(
        "SELECT course_id, days_to_complete, batch \
         FROM learntrack.course_schedules ORDER BY course_id",
    )
    .fetch_all(pool)
    .await?;
    for row in rows {
        let course_id: String = row.try_get("course_id")?;
        let days: i64 = row.try_get("days_to_complete")?;
        let days_to_complete = u32::try_from(days).with_context(|| {
            format!("course {course_id} has an invalid days_to_complete of {days}")
        })?;
        schedules.push(CourseSchedule {
            course_id,
            days_to_complete,
            batch: row.try_get("batch")?,
        });
    }

    let mut enrollments = Vec::new();
    let rows = sqlx::query(
        "SELECT user_id, course_id, status, enrollment_date, start_date, completion_date \
         FROM learntrack.enrollments ORDER BY user_id, enrollment_date, course_id",
    )
    .fetch_all(pool)
    .await?;
    for row in rows {
        let status: String = row.try_get("status")?;
        enrollments.push(Enrollment {
            user_id: row.try_get("user_id")?,
            course_id: row.try_get("course_id")?,
            status: status.parse()?,
            enrollment_date: row.try_get("enrollment_date")?,
            start_date: row.try_get("start_date")?,
            completion_date: row.try_get("completion_date")?,
        });
    }

    Ok(Dataset {
        users,
        schedules,
        enrollments,
    })
}

/// Appends all records in one transaction.
pub async fn append_email_log(pool: &PgPool, records: &[EmailRecord]) -> anyhow::Result<usize> {
    let mut tx = pool.begin().await?;

    for record in records {
        sqlx::query(
            r#"
            INSERT INTO learntrack.email_log
            (id, recipient, sender, sent_at, kind, subject, body, status_type, course_ids)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&record.to)
        .bind(&record.from)
        .bind(record.timestamp)
        .bind(record.kind.as_str())
        .bind(&record.subject)
        .bind(&record.body)
        .bind(record.status_type.map(|status| status.as_str()))
        .bind(record.course_ids.as_deref())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(records.len())
}

pub async fn fetch_email_log_page(
    pool: &PgPool,
    page: usize,
    per_page: usize,
) -> anyhow::Result<EmailLogPage> {
    let total: i64 = sqlx::query("SELECT COUNT(*) AS total FROM learntrack.email_log")
        .fetch_one(pool)
        .await?
        .try_get("total")?;

    let rows = sqlx::query(
        "SELECT recipient, sender, sent_at, kind, subject, body, status_type, course_ids \
         FROM learntrack.email_log ORDER BY seq LIMIT $1 OFFSET $2",
    )
    .bind(i64::try_from(per_page.max(1)).unwrap_or(i64::MAX))
    .bind(i64::try_from(EmailLogPage::offset(page, per_page)).unwrap_or(i64::MAX))
    .fetch_all(pool)
    .await?;

    let mut logs = Vec::new();
    for row in rows {
        let kind: String = row.try_get("kind")?;
        let status_type: Option<String> = row.try_get("status_type")?;
        let timestamp: DateTime<Utc> = row.try_get("sent_at")?;
        logs.push(EmailRecord {
            to: row.try_get("recipient")?,
            from: row.try_get("sender")?,
            timestamp,
            kind: kind.parse()?,
            subject: row.try_get("subject")?,
            body: row.try_get("body")?,
            status_type: status_type.map(|value| value.parse()).transpose()?,
            course_ids: row.try_get("course_ids")?,
        });
    }

    Ok(EmailLogPage::new(logs, usize::try_from(total)?, page, per_page))
}

pub async fn email_log_stats(pool: &PgPool) -> anyhow::Result<EmailLogStats> {
    let rows = sqlx::query(
        "SELECT kind, COUNT(*) AS sent FROM learntrack.email_log GROUP BY kind",
    )
    .fetch_all(pool)
    .await?;

    let mut stats = EmailLogStats::default();
    for row in rows {
        let kind: String = row.try_get("kind")?;
        let sent: i64 = row.try_get("sent")?;
        let kind: EmailKind = kind.parse()?;
        match kind {
            EmailKind::UserReminder => stats.user_reminders += sent as usize,
            EmailKind::ManagerSummary => stats.manager_summaries += sent as usize,
        }
        stats.total_sent += sent as usize;
    }
    Ok(stats)
}
