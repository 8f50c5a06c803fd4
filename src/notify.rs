use serde::Serialize;

use crate::error::DeliveryError;
use crate::models::{EmailKind, EmailRecord};

pub trait NotificationSink {
    fn deliver(&mut self, record: &EmailRecord) -> Result<(), DeliveryError>;
}

/// Records deliveries in the log output instead of transmitting them.
#[derive(Debug, Default)]
pub struct TracingSink {
    delivered: usize,
}

impl TracingSink {
    pub fn delivered(&self) -> usize {
        self.delivered
    }
}

impl NotificationSink for TracingSink {
    fn deliver(&mut self, record: &EmailRecord) -> Result<(), DeliveryError> {
        if record.to.trim().is_empty() {
            return Err(DeliveryError::Rejected {
                recipient: record.to.clone(),
                reason: "empty recipient address".to_string(),
            });
        }

        self.delivered += 1;
        tracing::info!(
            to = %record.to,
            kind = record.kind.as_str(),
            subject = %record.subject,
            "Email recorded"
        );
        Ok(())
    }
}

/// Append-only audit trail of the email records a run produced.
#[derive(Debug, Default, Clone)]
pub struct EmailLog {
    records: Vec<EmailRecord>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct EmailLogStats {
    pub total_sent: usize,
    pub user_reminders: usize,
    pub manager_summaries: usize,
}

impl EmailLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: EmailRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[EmailRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// One page of the persisted email log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailLogPage {
    pub logs: Vec<EmailRecord>,
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
    pub total_pages: usize,
}

impl EmailLogPage {
    /// Pages are 1-based; page 0 is treated as page 1.
    pub fn new(logs: Vec<EmailRecord>, total: usize, page: usize, per_page: usize) -> Self {
        let per_page = per_page.max(1);
        Self {
            logs,
            total,
            page: page.max(1),
            per_page,
            total_pages: total.div_ceil(per_page),
        }
    }

    /// Saturates instead of overflowing, so oversized arguments land past the end.
    pub fn offset(page: usize, per_page: usize) -> usize {
        (page.max(1) - 1).saturating_mul(per_page.max(1))
    }

    pub fn slice(records: &[EmailRecord], page: usize, per_page: usize) -> Self {
        let start = Self::offset(page, per_page).min(records.len());
        let end = start.saturating_add(per_page.max(1)).min(records.len());
        Self::new(records[start..end].to_vec(), records.len(), page, per_page)
    }
}

pub fn email_stats(records: &[EmailRecord]) -> EmailLogStats {
    let mut stats = EmailLogStats {
        total_sent: records.len(),
        ..EmailLogStats::default()
    };
    for record in records {
        match record.kind {
            EmailKind::UserReminder => stats.user_reminders += 1,
            EmailKind::ManagerSummary => stats.manager_summaries += 1,
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(to: &str, kind: EmailKind) -> EmailRecord {
        EmailRecord {
            to: to.to_string(),
            from: "noreply@learningplatform.com".to_string(),
            timestamp: Utc::now(),
            kind,
            subject: "subject".to_string(),
            body: "body".to_string(),
            status_type: None,
            course_ids: None,
        }
    }

    #[test]
    fn tracing_sink_rejects_blank_recipients() {
        let mut sink = TracingSink::default();
        assert!(sink.deliver(&record("a@example.com", EmailKind::UserReminder)).is_ok());
        assert!(sink.deliver(&record("  ", EmailKind::UserReminder)).is_err());
        assert_eq!(sink.delivered(), 1);
    }

    #[test]
    fn log_keeps_append_order_and_counts_kinds() {
        let mut log = EmailLog::new();
        log.append(record("a@example.com", EmailKind::UserReminder));
        log.append(record("b@example.com", EmailKind::UserReminder));
        log.append(record("m@example.com", EmailKind::ManagerSummary));

        assert_eq!(log.len(), 3);
        assert_eq!(log.records()[2].to, "m@example.com");
        let stats = email_stats(log.records());
        assert_eq!(
            stats,
            EmailLogStats {
                total_sent: 3,
                user_reminders: 2,
                manager_summaries: 1,
            }
        );
    }

    #[test]
    fn pages_slice_the_log() {
        let records: Vec<EmailRecord> = (0..25)
            .map(|i| record(&format!("u{i}@example.com"), EmailKind::UserReminder))
            .collect();

        let page = EmailLogPage::slice(&records, 3, 10);
        assert_eq!(page.logs.len(), 5);
        assert_eq!(page.logs[0].to, "u20@example.com");
        assert_eq!(page.total, 25);
        assert_eq!(page.total_pages, 3);

        let beyond = EmailLogPage::slice(&records, 9, 10);
        assert!(beyond.logs.is_empty());

        let empty = EmailLogPage::slice(&[], 1, 10);
        assert_eq!(empty.total_pages, 0);
    }

    #[test]
    fn oversized_page_arguments_do_not_overflow() {
        let records: Vec<EmailRecord> = (0..3)
            .map(|i| record(&format!("u{i}@example.com"), EmailKind::UserReminder))
            .collect();

        assert_eq!(EmailLogPage::offset(3, usize::MAX / 2 + 1), usize::MAX);
        assert_eq!(EmailLogPage::offset(0, 0), 0);

        let huge = EmailLogPage::slice(&[], 3, usize::MAX / 2 + 1);
        assert!(huge.logs.is_empty());
        assert_eq!(huge.total_pages, 0);

        let whole = EmailLogPage::slice(&records, 1, usize::MAX);
        assert_eq!(whole.logs.len(), 3);
        assert_eq!(whole.total_pages, 1);

        let far = EmailLogPage::slice(&records, usize::MAX, usize::MAX);
        assert!(far.logs.is_empty());
        assert_eq!(far.page, usize::MAX);
    }
}
