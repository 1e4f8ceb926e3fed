//! Storage trait for delivery records.
//!
//! The delivery engine is the only writer of `EmailLog` rows and it mutates
//! them exclusively through the conditional transitions defined here. Every
//! transition names its source status and is a no-op when the record is not
//! in that status, which is what makes a claim exclusive between concurrent
//! batch runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use super::models::{EmailLog, EmailLogFilter, EmailLogPage, EmailLogStats, NewEmailLog};

/// Errors that can occur during delivery record storage operations.
#[derive(Debug, Error)]
pub enum EmailStoreError {
    /// PostgreSQL operation failed
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored row could not be decoded
    #[error("Corrupt email log {id}: {reason}")]
    Corrupt { id: Uuid, reason: String },

    /// Backend is temporarily unavailable
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// Result type for store operations
pub type EmailStoreResult<T> = Result<T, EmailStoreError>;

/// How a failed attempt was recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Back to `QUEUED` for the next batch run
    Requeued { retry_count: u32 },
    /// Retry budget exhausted; now `FAILED`
    Exhausted { retry_count: u32 },
    /// The record was not in `SENDING` any more
    Lost,
}

/// Backend trait for delivery record storage.
///
/// # Thread Safety
///
/// Implementations must be thread-safe (`Send + Sync`) as they are shared by
/// the notification service, the scheduler task and HTTP handlers.
///
/// # Atomicity
///
/// `claim`, `mark_sent`, `record_failure`, `mark_failed`, `reset_failed` and
/// `requeue_stale` must each check and update a record in one atomic step.
#[async_trait]
pub trait EmailLogStore: Send + Sync {
    /// Backend identifier for logs and health output
    fn backend_type(&self) -> &'static str;

    /// Insert a new `QUEUED` record.
    async fn insert(&self, new: NewEmailLog) -> EmailStoreResult<EmailLog>;

    async fn get(&self, id: Uuid) -> EmailStoreResult<Option<EmailLog>>;

    /// Up to `limit` ids with `status = QUEUED AND retry_count < max_retries`,
    /// oldest first.
    async fn eligible(&self, max_retries: u32, limit: usize) -> EmailStoreResult<Vec<Uuid>>;

    /// `QUEUED -> SENDING`. Returns the claimed record, or `None` when
    /// another worker got there first.
    async fn claim(&self, id: Uuid) -> EmailStoreResult<Option<EmailLog>>;

    /// `SENDING -> SENT`, setting `sent_at` and clearing the error.
    async fn mark_sent(&self, id: Uuid) -> EmailStoreResult<bool>;

    /// Count a failed attempt: `SENDING -> QUEUED` while the incremented
    /// `retry_count` stays below `max_retries`, else `SENDING -> FAILED`.
    async fn record_failure(
        &self,
        id: Uuid,
        error: &str,
        max_retries: u32,
    ) -> EmailStoreResult<FailureOutcome>;

    /// `SENDING -> FAILED` without touching `retry_count`.
    async fn mark_failed(&self, id: Uuid, error: &str) -> EmailStoreResult<bool>;

    /// `FAILED -> QUEUED`, resetting `retry_count` and error fields.
    async fn reset_failed(&self, id: Uuid) -> EmailStoreResult<bool>;

    /// `SENDING -> QUEUED` for claims last touched before `cutoff`.
    async fn requeue_stale(&self, cutoff: DateTime<Utc>) -> EmailStoreResult<usize>;

    /// Filtered listing, newest first.
    async fn list(&self, filter: &EmailLogFilter) -> EmailStoreResult<EmailLogPage>;

    /// Aggregate counters relative to `now`.
    async fn stats(&self, now: DateTime<Utc>) -> EmailStoreResult<EmailLogStats>;
}

/// Day and week boundaries used by [`EmailLogStore::stats`].
pub(crate) fn stats_windows(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let today = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
        .unwrap_or(now);
    let week = now - chrono::Duration::days(7);
    (today, week)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_stats_windows() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 13, 45, 0).unwrap();
        let (today, week) = stats_windows(now);
        assert_eq!(today, Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap());
        assert_eq!(week, Utc.with_ymd_and_hms(2024, 3, 8, 13, 45, 0).unwrap());
    }
}
