use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::metrics::DeliveryMetrics;

use super::backend::{EmailLogStore, EmailStoreError, FailureOutcome};
use super::models::{
    BatchResult, DeliveryConfig, EmailLog, EmailLogFilter, EmailLogPage, EmailLogStats,
    NewEmailLog,
};
use super::transport::{is_valid_email, MailTransport, TransportError};

/// Errors surfaced by the delivery engine.
///
/// Individual send failures are not errors; they are recorded on the
/// delivery record. Only storage failures propagate.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error(transparent)]
    Store(#[from] EmailStoreError),
}

pub type DeliveryResult<T> = Result<T, DeliveryError>;

/// Why a single attempt did not deliver
enum AttemptError {
    /// No stored body; retrying cannot help
    MissingBody,
    /// Consumes one retry
    Failed { reason: &'static str, message: String },
}

/// Persists delivery records and drives them through the transport.
///
/// The engine has no scheduler of its own: `process_batch` is called by the
/// queue processor task, by the notification service for urgent mail and by
/// operators. Concurrent calls are safe; each record is claimed atomically
/// before it is sent.
#[derive(Clone)]
pub struct DeliveryEngine {
    store: Arc<dyn EmailLogStore>,
    transport: Arc<dyn MailTransport>,
    config: DeliveryConfig,
}

impl DeliveryEngine {
    pub fn new(
        store: Arc<dyn EmailLogStore>,
        transport: Arc<dyn MailTransport>,
        config: DeliveryConfig,
    ) -> Self {
        Self {
            store,
            transport,
            config,
        }
    }

    pub fn config(&self) -> &DeliveryConfig {
        &self.config
    }

    pub fn backend_type(&self) -> &'static str {
        self.store.backend_type()
    }

    pub fn is_transport_configured(&self) -> bool {
        self.transport.is_configured()
    }

    pub async fn verify_transport(&self) -> Result<(), TransportError> {
        self.transport.verify().await
    }

    /// Store one `QUEUED` record and return its id.
    pub async fn enqueue(&self, new: NewEmailLog) -> DeliveryResult<Uuid> {
        let notification_type = new.notification_type;
        let log = self.store.insert(new).await?;

        DeliveryMetrics::record_enqueued(notification_type.as_str());
        tracing::debug!(
            log_id = %log.id,
            notification_type = %notification_type,
            recipient = %log.recipient_email,
            "Email enqueued"
        );

        Ok(log.id)
    }

    /// Attempt up to `limit` queued records, oldest first.
    #[tracing::instrument(skip(self), fields(backend = self.store.backend_type()))]
    pub async fn process_batch(&self, limit: usize) -> DeliveryResult<BatchResult> {
        let started = Instant::now();
        let ids = self.store.eligible(self.config.max_retries, limit).await?;
        let mut result = BatchResult::default();

        for id in ids {
            let log = match self.store.claim(id).await {
                Ok(Some(log)) => log,
                Ok(None) => {
                    result.skipped += 1;
                    DeliveryMetrics::record_skipped();
                    continue;
                }
                Err(e) => {
                    tracing::warn!(log_id = %id, error = %e, "Failed to claim email log");
                    result.skipped += 1;
                    continue;
                }
            };

            if result.processed > 0 && !self.config.send_delay.is_zero() {
                tokio::time::sleep(self.config.send_delay).await;
            }
            result.processed += 1;

            match self.attempt(&log).await {
                Ok(latency) => {
                    result.sent += 1;
                    DeliveryMetrics::record_sent(latency);
                    if let Err(e) = self.store.mark_sent(id).await {
                        tracing::error!(
                            log_id = %id,
                            error = %e,
                            "Email sent but status update failed"
                        );
                    }
                }
                Err(AttemptError::MissingBody) => {
                    result.failed += 1;
                    self.fail_permanently(&log).await;
                }
                Err(AttemptError::Failed { reason, message }) => {
                    result.failed += 1;
                    DeliveryMetrics::record_failed_attempt(reason);
                    self.record_failure(&log, &message).await;
                }
            }
        }

        DeliveryMetrics::record_batch_duration(started.elapsed());
        if result.processed > 0 || result.skipped > 0 {
            tracing::info!(
                processed = result.processed,
                sent = result.sent,
                failed = result.failed,
                skipped = result.skipped,
                "Email batch processed"
            );
        }

        Ok(result)
    }

    async fn attempt(&self, log: &EmailLog) -> Result<Duration, AttemptError> {
        let html = match log.html_body.as_deref() {
            Some(html) if !html.is_empty() => html,
            _ => return Err(AttemptError::MissingBody),
        };

        if !is_valid_email(&log.recipient_email) {
            return Err(AttemptError::Failed {
                reason: "invalid_address",
                message: TransportError::InvalidAddress(log.recipient_email.clone()).to_string(),
            });
        }

        let started = Instant::now();
        let send = self
            .transport
            .send_mail(log.recipient_email.trim(), &log.subject, html);

        match tokio::time::timeout(self.config.send_timeout, send).await {
            Ok(Ok(())) => Ok(started.elapsed()),
            Ok(Err(e)) => Err(AttemptError::Failed {
                reason: "transport",
                message: e.to_string(),
            }),
            Err(_) => Err(AttemptError::Failed {
                reason: "timeout",
                message: TransportError::Timeout(self.config.send_timeout).to_string(),
            }),
        }
    }

    async fn record_failure(&self, log: &EmailLog, message: &str) {
        match self
            .store
            .record_failure(log.id, message, self.config.max_retries)
            .await
        {
            Ok(FailureOutcome::Requeued { retry_count }) => {
                tracing::warn!(
                    log_id = %log.id,
                    retry_count,
                    max_retries = self.config.max_retries,
                    error = %message,
                    "Email delivery failed, will retry"
                );
            }
            Ok(FailureOutcome::Exhausted { retry_count }) => {
                DeliveryMetrics::record_permanently_failed();
                tracing::error!(
                    log_id = %log.id,
                    retry_count,
                    recipient = %log.recipient_email,
                    error = %message,
                    "Email delivery failed permanently"
                );
            }
            Ok(FailureOutcome::Lost) => {
                tracing::warn!(log_id = %log.id, "Email log left SENDING before failure was recorded");
            }
            Err(e) => {
                tracing::error!(log_id = %log.id, error = %e, "Failed to record delivery failure");
            }
        }
    }

    async fn fail_permanently(&self, log: &EmailLog) {
        const MESSAGE: &str = "Email body missing from delivery record";

        DeliveryMetrics::record_failed_attempt("missing_body");
        DeliveryMetrics::record_permanently_failed();
        tracing::error!(log_id = %log.id, "{}", MESSAGE);

        if let Err(e) = self.store.mark_failed(log.id, MESSAGE).await {
            tracing::error!(log_id = %log.id, error = %e, "Failed to mark email log as failed");
        }
    }

    /// Operator retry of a `FAILED` record. False when absent or not failed.
    pub async fn retry(&self, id: Uuid) -> DeliveryResult<bool> {
        let reset = self.store.reset_failed(id).await?;
        if reset {
            DeliveryMetrics::record_manual_retry();
            tracing::info!(log_id = %id, "Failed email requeued by operator");
        }
        Ok(reset)
    }

    /// Return claims stuck in `SENDING` for longer than `older_than`.
    pub async fn requeue_stale(&self, older_than: Duration) -> DeliveryResult<usize> {
        let cutoff = chrono::Duration::from_std(older_than)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let requeued = self.store.requeue_stale(cutoff).await?;
        if requeued > 0 {
            DeliveryMetrics::record_stale_requeued(requeued);
            tracing::warn!(count = requeued, "Requeued stale email claims");
        }
        Ok(requeued)
    }

    pub async fn get(&self, id: Uuid) -> DeliveryResult<Option<EmailLog>> {
        Ok(self.store.get(id).await?)
    }

    pub async fn list(&self, filter: &EmailLogFilter) -> DeliveryResult<EmailLogPage> {
        Ok(self.store.list(filter).await?)
    }

    pub async fn stats(&self) -> DeliveryResult<EmailLogStats> {
        let stats = self.store.stats(Utc::now()).await?;
        DeliveryMetrics::set_queue_depth(stats.queued);
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::{EmailStatus, MemoryEmailLogStore};
    use crate::notification::NotificationType;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Fails the first `failures` calls, then succeeds.
    #[derive(Default)]
    struct ScriptedTransport {
        failures: usize,
        latency: Duration,
        calls: AtomicUsize,
        delivered: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn failing(failures: usize) -> Self {
            Self {
                failures,
                ..Default::default()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn delivered(&self) -> Vec<String> {
            self.delivered.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MailTransport for ScriptedTransport {
        async fn send_mail(&self, to: &str, _subject: &str, _html: &str) -> Result<(), TransportError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            if call <= self.failures {
                return Err(TransportError::Smtp(format!("attempt {} refused", call)));
            }
            self.delivered.lock().unwrap().push(to.to_string());
            Ok(())
        }

        fn is_configured(&self) -> bool {
            true
        }

        async fn verify(&self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    fn config() -> DeliveryConfig {
        DeliveryConfig {
            max_retries: 3,
            send_delay: Duration::ZERO,
            send_timeout: Duration::from_secs(1),
            batch_size: 50,
        }
    }

    fn engine(transport: Arc<ScriptedTransport>) -> DeliveryEngine {
        DeliveryEngine::new(Arc::new(MemoryEmailLogStore::new()), transport, config())
    }

    fn new_log(email: &str) -> NewEmailLog {
        NewEmailLog {
            recipient_email: email.to_string(),
            subject: "Leave Request Approved - Annual Leave".to_string(),
            notification_type: NotificationType::LeaveRequestApproved,
            html_body: Some("<p>Approved</p>".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_sends_queued_email() {
        let transport = Arc::new(ScriptedTransport::default());
        let engine = engine(transport.clone());
        let id = engine.enqueue(new_log("a@corp.test")).await.unwrap();

        let result = engine.process_batch(10).await.unwrap();
        assert_eq!(
            result,
            BatchResult {
                processed: 1,
                sent: 1,
                failed: 0,
                skipped: 0
            }
        );

        let log = engine.get(id).await.unwrap().unwrap();
        assert_eq!(log.status, EmailStatus::Sent);
        assert!(log.sent_at.is_some());
        assert!(log.error_message.is_none());
        assert_eq!(transport.delivered(), vec!["a@corp.test"]);
    }

    #[tokio::test]
    async fn test_succeeds_on_third_attempt() {
        let transport = Arc::new(ScriptedTransport::failing(2));
        let engine = engine(transport.clone());
        let id = engine.enqueue(new_log("a@corp.test")).await.unwrap();

        for _ in 0..3 {
            engine.process_batch(10).await.unwrap();
        }

        let log = engine.get(id).await.unwrap().unwrap();
        assert_eq!(log.status, EmailStatus::Sent);
        assert_eq!(log.retry_count, 2);
        assert!(log.error_message.is_none());
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn test_fails_after_max_retries() {
        let transport = Arc::new(ScriptedTransport::failing(usize::MAX));
        let engine = engine(transport.clone());
        let id = engine.enqueue(new_log("a@corp.test")).await.unwrap();

        for _ in 0..3 {
            let result = engine.process_batch(10).await.unwrap();
            assert_eq!(result.failed, 1);
        }

        let log = engine.get(id).await.unwrap().unwrap();
        assert_eq!(log.status, EmailStatus::Failed);
        assert_eq!(log.retry_count, 3);
        assert_eq!(log.error_message.as_deref(), Some("SMTP error: attempt 3 refused"));
        assert!(log.failed_at.is_some());

        let result = engine.process_batch(10).await.unwrap();
        assert_eq!(result, BatchResult::default());
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn test_manual_retry_only_from_failed() {
        let transport = Arc::new(ScriptedTransport::failing(3));
        let engine = engine(transport.clone());
        let failed = engine.enqueue(new_log("a@corp.test")).await.unwrap();
        for _ in 0..3 {
            engine.process_batch(10).await.unwrap();
        }

        assert!(engine.retry(failed).await.unwrap());
        let log = engine.get(failed).await.unwrap().unwrap();
        assert_eq!(log.status, EmailStatus::Queued);
        assert_eq!(log.retry_count, 0);
        assert!(log.error_message.is_none());
        assert!(log.failed_at.is_none());

        engine.process_batch(10).await.unwrap();
        let log = engine.get(failed).await.unwrap().unwrap();
        assert_eq!(log.status, EmailStatus::Sent);

        let before = engine.get(failed).await.unwrap().unwrap();
        assert!(!engine.retry(failed).await.unwrap());
        assert_eq!(engine.get(failed).await.unwrap().unwrap(), before);

        assert!(!engine.retry(Uuid::new_v4()).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_body_fails_without_retry() {
        let transport = Arc::new(ScriptedTransport::default());
        let engine = engine(transport.clone());
        let id = engine
            .enqueue(NewEmailLog {
                html_body: None,
                ..new_log("a@corp.test")
            })
            .await
            .unwrap();

        let result = engine.process_batch(10).await.unwrap();
        assert_eq!(result.failed, 1);

        let log = engine.get(id).await.unwrap().unwrap();
        assert_eq!(log.status, EmailStatus::Failed);
        assert_eq!(log.retry_count, 0);
        assert!(log.failed_at.is_some());
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_invalid_address_consumes_retry() {
        let transport = Arc::new(ScriptedTransport::default());
        let engine = engine(transport.clone());
        let bad = engine.enqueue(new_log("not-an-address")).await.unwrap();
        let good = engine.enqueue(new_log("b@corp.test")).await.unwrap();

        let result = engine.process_batch(10).await.unwrap();
        assert_eq!(result.processed, 2);
        assert_eq!(result.sent, 1);
        assert_eq!(result.failed, 1);

        let log = engine.get(bad).await.unwrap().unwrap();
        assert_eq!(log.status, EmailStatus::Queued);
        assert_eq!(log.retry_count, 1);
        assert!(log.error_message.unwrap().contains("not-an-address"));
        assert_eq!(engine.get(good).await.unwrap().unwrap().status, EmailStatus::Sent);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_send_timeout_is_a_failure() {
        let transport = Arc::new(ScriptedTransport {
            latency: Duration::from_millis(500),
            ..Default::default()
        });
        let engine = DeliveryEngine::new(
            Arc::new(MemoryEmailLogStore::new()),
            transport,
            DeliveryConfig {
                send_timeout: Duration::from_millis(20),
                ..config()
            },
        );
        let id = engine.enqueue(new_log("a@corp.test")).await.unwrap();

        let result = engine.process_batch(10).await.unwrap();
        assert_eq!(result.failed, 1);

        let log = engine.get(id).await.unwrap().unwrap();
        assert_eq!(log.status, EmailStatus::Queued);
        assert_eq!(log.retry_count, 1);
        assert!(log.error_message.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_batch_respects_limit_and_fifo() {
        let transport = Arc::new(ScriptedTransport::default());
        let engine = engine(transport.clone());
        for i in 0..5 {
            engine
                .enqueue(new_log(&format!("user{}@corp.test", i)))
                .await
                .unwrap();
        }

        let result = engine.process_batch(3).await.unwrap();
        assert_eq!(result.sent, 3);
        assert_eq!(
            transport.delivered(),
            vec!["user0@corp.test", "user1@corp.test", "user2@corp.test"]
        );

        let stats = engine.stats().await.unwrap();
        assert_eq!(stats.sent, 3);
        assert_eq!(stats.queued, 2);
    }

    #[tokio::test]
    async fn test_requeue_stale_claims() {
        let store = Arc::new(MemoryEmailLogStore::new());
        let engine = DeliveryEngine::new(
            store.clone(),
            Arc::new(ScriptedTransport::default()),
            config(),
        );
        let id = engine.enqueue(new_log("a@corp.test")).await.unwrap();
        store.claim(id).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(engine.requeue_stale(Duration::from_secs(600)).await.unwrap(), 0);
        assert_eq!(engine.requeue_stale(Duration::ZERO).await.unwrap(), 1);

        let result = engine.process_batch(10).await.unwrap();
        assert_eq!(result.sent, 1);
        assert_eq!(engine.get(id).await.unwrap().unwrap().retry_count, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_batches_never_double_send() {
        let transport = Arc::new(ScriptedTransport {
            latency: Duration::from_millis(2),
            ..Default::default()
        });
        let engine = engine(transport.clone());
        let total = 40;
        for i in 0..total {
            engine
                .enqueue(new_log(&format!("user{}@corp.test", i)))
                .await
                .unwrap();
        }

        let runs: Vec<_> = (0..4)
            .map(|_| {
                let engine = engine.clone();
                tokio::spawn(async move { engine.process_batch(total).await.unwrap() })
            })
            .collect();

        let mut sent = 0;
        let mut skipped = 0;
        for run in runs {
            let result = run.await.unwrap();
            sent += result.sent;
            skipped += result.skipped;
        }

        assert_eq!(sent, total);
        assert_eq!(transport.calls(), total);
        assert!(skipped <= total * 3);

        let mut per_address: HashMap<String, usize> = HashMap::new();
        for address in transport.delivered() {
            *per_address.entry(address).or_default() += 1;
        }
        assert_eq!(per_address.len(), total);
        assert!(per_address.values().all(|&count| count == 1));

        let stats = engine.stats().await.unwrap();
        assert_eq!(stats.sent, total as u64);
    }
}
