//! Delivery record models and configuration

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::notification::NotificationType;

/// Lifecycle of a single delivery record.
///
/// ```text
/// QUEUED -> SENDING -> SENT
///    ^         |
///    +---------+ (retry budget left, or stale claim)
///              |
///              +----> FAILED -> QUEUED (manual retry)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmailStatus {
    Queued,
    Sending,
    Sent,
    Failed,
}

impl EmailStatus {
    pub const ALL: [EmailStatus; 4] = [
        EmailStatus::Queued,
        EmailStatus::Sending,
        EmailStatus::Sent,
        EmailStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmailStatus::Queued => "QUEUED",
            EmailStatus::Sending => "SENDING",
            EmailStatus::Sent => "SENT",
            EmailStatus::Failed => "FAILED",
        }
    }

    /// Whether the state machine allows `self -> next`.
    pub fn can_transition_to(&self, next: EmailStatus) -> bool {
        use EmailStatus::*;
        matches!(
            (self, next),
            (Queued, Sending) | (Sending, Sent) | (Sending, Queued) | (Sending, Failed) | (Failed, Queued)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, EmailStatus::Sent | EmailStatus::Failed)
    }
}

impl fmt::Display for EmailStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmailStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "QUEUED" => Ok(EmailStatus::Queued),
            "SENDING" => Ok(EmailStatus::Sending),
            "SENT" => Ok(EmailStatus::Sent),
            "FAILED" => Ok(EmailStatus::Failed),
            _ => Err(format!("Invalid email status: {}", s)),
        }
    }
}

/// Free-form annotations stored alongside a delivery record
pub type EmailMetadata = serde_json::Map<String, serde_json::Value>;

/// A delivery record: the unit of work and the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailLog {
    pub id: Uuid,
    pub template_id: Option<Uuid>,
    pub recipient_id: Option<Uuid>,
    pub recipient_email: String,
    pub recipient_name: Option<String>,
    pub subject: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    /// Fully rendered HTML, so a retry never re-resolves or re-renders
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_body: Option<String>,
    #[serde(default)]
    pub metadata: EmailMetadata,
    pub status: EmailStatus,
    pub retry_count: u32,
    pub error_message: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EmailLog {
    /// Materialize a new `QUEUED` record.
    pub fn queued(new: NewEmailLog) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            template_id: new.template_id,
            recipient_id: new.recipient_id,
            recipient_email: new.recipient_email,
            recipient_name: new.recipient_name,
            subject: new.subject,
            notification_type: new.notification_type,
            entity_type: new.entity_type,
            entity_id: new.entity_id,
            html_body: new.html_body,
            metadata: new.metadata,
            status: EmailStatus::Queued,
            retry_count: 0,
            error_message: None,
            sent_at: None,
            failed_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Input for [`crate::delivery::DeliveryEngine::enqueue`].
#[derive(Debug, Clone, Default)]
pub struct NewEmailLog {
    pub template_id: Option<Uuid>,
    pub recipient_id: Option<Uuid>,
    pub recipient_email: String,
    pub recipient_name: Option<String>,
    pub subject: String,
    pub notification_type: NotificationType,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub html_body: Option<String>,
    pub metadata: EmailMetadata,
}

/// Configuration for the delivery engine
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Failed attempts before a record becomes `FAILED`
    pub max_retries: u32,
    /// Pause between consecutive sends within a batch
    pub send_delay: Duration,
    /// Upper bound for a single transport send
    pub send_timeout: Duration,
    /// Default batch size for scheduled runs
    pub batch_size: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            send_delay: Duration::from_millis(200),
            send_timeout: Duration::from_secs(30),
            batch_size: 50,
        }
    }
}

/// Outcome counters of one `process_batch` run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    /// Records this run claimed and attempted
    pub processed: usize,
    pub sent: usize,
    /// Failed attempts, whether requeued or terminal
    pub failed: usize,
    /// Records another worker claimed first
    pub skipped: usize,
}

/// Query parameters for the delivery log listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmailLogFilter {
    pub status: Option<EmailStatus>,
    #[serde(rename = "type")]
    pub notification_type: Option<NotificationType>,
    /// Case-insensitive substring of the recipient address
    pub recipient: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl EmailLogFilter {
    pub const DEFAULT_LIMIT: u32 = 20;
    pub const MAX_LIMIT: u32 = 100;

    /// 1-based page number
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> u32 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page() - 1) * u64::from(self.limit())
    }

    pub fn matches(&self, log: &EmailLog) -> bool {
        if self.status.is_some_and(|s| s != log.status) {
            return false;
        }
        if self
            .notification_type
            .is_some_and(|t| t != log.notification_type)
        {
            return false;
        }
        if let Some(needle) = self.recipient.as_deref().filter(|n| !n.is_empty()) {
            if !log
                .recipient_email
                .to_lowercase()
                .contains(&needle.to_lowercase())
            {
                return false;
            }
        }
        if self.from.is_some_and(|from| log.created_at < from) {
            return false;
        }
        if self.to.is_some_and(|to| log.created_at > to) {
            return false;
        }
        true
    }
}

/// One page of delivery records, newest first
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailLogPage {
    pub items: Vec<EmailLog>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

impl EmailLogPage {
    pub fn new(items: Vec<EmailLog>, total: u64, filter: &EmailLogFilter) -> Self {
        let limit = filter.limit();
        Self {
            items,
            total,
            page: filter.page(),
            limit,
            total_pages: total.div_ceil(u64::from(limit)) as u32,
        }
    }
}

/// Aggregate delivery statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailLogStats {
    pub total: u64,
    pub queued: u64,
    pub sending: u64,
    pub sent: u64,
    pub failed: u64,
    /// Since UTC midnight
    pub sent_today: u64,
    pub failed_today: u64,
    /// Rolling seven days
    pub sent_this_week: u64,
    pub failed_this_week: u64,
}
