//! In-memory delivery record store.
//!
//! Records live in a `DashMap`; every transition runs under the entry's
//! write lock, so check-and-update is atomic per record. Records are
//! ordered by an insertion sequence, which follows `created_at`.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use super::backend::{stats_windows, EmailLogStore, EmailStoreResult, FailureOutcome};
use super::models::{
    EmailLog, EmailLogFilter, EmailLogPage, EmailLogStats, EmailStatus, NewEmailLog,
};

struct Entry {
    seq: u64,
    log: EmailLog,
}

/// In-memory delivery record store.
#[derive(Default)]
pub struct MemoryEmailLogStore {
    logs: DashMap<Uuid, Entry>,
    next_seq: AtomicU64,
}

impl MemoryEmailLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `f` to the record if it is currently in `from`.
    fn transition<T>(
        &self,
        id: Uuid,
        from: EmailStatus,
        f: impl FnOnce(&mut EmailLog) -> T,
    ) -> Option<T> {
        let mut entry = self.logs.get_mut(&id)?;
        if entry.log.status != from {
            return None;
        }
        let result = f(&mut entry.log);
        entry.log.updated_at = Utc::now();
        Some(result)
    }

    /// Matching records, oldest first.
    fn sorted(&self, filter: impl Fn(&EmailLog) -> bool) -> Vec<(u64, EmailLog)> {
        let mut logs: Vec<(u64, EmailLog)> = self
            .logs
            .iter()
            .filter(|entry| filter(&entry.log))
            .map(|entry| (entry.seq, entry.log.clone()))
            .collect();
        logs.sort_by_key(|(seq, _)| *seq);
        logs
    }
}

#[async_trait]
impl EmailLogStore for MemoryEmailLogStore {
    fn backend_type(&self) -> &'static str {
        "memory"
    }

    async fn insert(&self, new: NewEmailLog) -> EmailStoreResult<EmailLog> {
        let log = EmailLog::queued(new);
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.logs.insert(
            log.id,
            Entry {
                seq,
                log: log.clone(),
            },
        );
        Ok(log)
    }

    async fn get(&self, id: Uuid) -> EmailStoreResult<Option<EmailLog>> {
        Ok(self.logs.get(&id).map(|entry| entry.log.clone()))
    }

    async fn eligible(&self, max_retries: u32, limit: usize) -> EmailStoreResult<Vec<Uuid>> {
        Ok(self
            .sorted(|log| log.status == EmailStatus::Queued && log.retry_count < max_retries)
            .into_iter()
            .take(limit)
            .map(|(_, log)| log.id)
            .collect())
    }

    async fn claim(&self, id: Uuid) -> EmailStoreResult<Option<EmailLog>> {
        Ok(self.transition(id, EmailStatus::Queued, |log| {
            log.status = EmailStatus::Sending;
            log.updated_at = Utc::now();
            log.clone()
        }))
    }

    async fn mark_sent(&self, id: Uuid) -> EmailStoreResult<bool> {
        Ok(self
            .transition(id, EmailStatus::Sending, |log| {
                log.status = EmailStatus::Sent;
                log.sent_at = Some(Utc::now());
                log.error_message = None;
            })
            .is_some())
    }

    async fn record_failure(
        &self,
        id: Uuid,
        error: &str,
        max_retries: u32,
    ) -> EmailStoreResult<FailureOutcome> {
        Ok(self
            .transition(id, EmailStatus::Sending, |log| {
                log.retry_count += 1;
                log.error_message = Some(error.to_string());
                if log.retry_count >= max_retries {
                    log.status = EmailStatus::Failed;
                    log.failed_at = Some(Utc::now());
                    FailureOutcome::Exhausted {
                        retry_count: log.retry_count,
                    }
                } else {
                    log.status = EmailStatus::Queued;
                    FailureOutcome::Requeued {
                        retry_count: log.retry_count,
                    }
                }
            })
            .unwrap_or(FailureOutcome::Lost))
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> EmailStoreResult<bool> {
        Ok(self
            .transition(id, EmailStatus::Sending, |log| {
                log.status = EmailStatus::Failed;
                log.failed_at = Some(Utc::now());
                log.error_message = Some(error.to_string());
            })
            .is_some())
    }

    async fn reset_failed(&self, id: Uuid) -> EmailStoreResult<bool> {
        Ok(self
            .transition(id, EmailStatus::Failed, |log| {
                log.status = EmailStatus::Queued;
                log.retry_count = 0;
                log.error_message = None;
                log.failed_at = None;
            })
            .is_some())
    }

    async fn requeue_stale(&self, cutoff: DateTime<Utc>) -> EmailStoreResult<usize> {
        let stale: Vec<Uuid> = self
            .logs
            .iter()
            .filter(|entry| entry.log.status == EmailStatus::Sending && entry.log.updated_at < cutoff)
            .map(|entry| *entry.key())
            .collect();

        let mut requeued = 0;
        for id in stale {
            // Re-check under the entry lock; the claim may have completed meanwhile.
            let mut entry = match self.logs.get_mut(&id) {
                Some(entry) => entry,
                None => continue,
            };
            if entry.log.status == EmailStatus::Sending && entry.log.updated_at < cutoff {
                entry.log.status = EmailStatus::Queued;
                entry.log.updated_at = Utc::now();
                requeued += 1;
            }
        }
        Ok(requeued)
    }

    async fn list(&self, filter: &EmailLogFilter) -> EmailStoreResult<EmailLogPage> {
        let mut matching = self.sorted(|log| filter.matches(log));
        matching.reverse();

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.limit() as usize)
            .map(|(_, log)| log)
            .collect();

        Ok(EmailLogPage::new(items, total, filter))
    }

    async fn stats(&self, now: DateTime<Utc>) -> EmailStoreResult<EmailLogStats> {
        let (today, week) = stats_windows(now);
        let mut stats = EmailLogStats::default();

        for entry in self.logs.iter() {
            let log = &entry.log;
            stats.total += 1;
            match log.status {
                EmailStatus::Queued => stats.queued += 1,
                EmailStatus::Sending => stats.sending += 1,
                EmailStatus::Sent => stats.sent += 1,
                EmailStatus::Failed => stats.failed += 1,
            }
            if let Some(sent_at) = log.sent_at.filter(|_| log.status == EmailStatus::Sent) {
                stats.sent_today += u64::from(sent_at >= today);
                stats.sent_this_week += u64::from(sent_at >= week);
            }
            if let Some(failed_at) = log.failed_at.filter(|_| log.status == EmailStatus::Failed) {
                stats.failed_today += u64::from(failed_at >= today);
                stats.failed_this_week += u64::from(failed_at >= week);
            }
        }

        Ok(stats)
    }
}
