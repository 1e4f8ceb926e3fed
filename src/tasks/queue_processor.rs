use std::time::Duration;

use tokio::sync::broadcast;

use crate::config::QueueConfig;
use crate::delivery::DeliveryEngine;

/// Background task that drives the delivery engine.
///
/// Runs a batch every process interval and returns abandoned `SENDING`
/// claims to the queue every stale-check interval.
pub struct QueueProcessorTask {
    engine: DeliveryEngine,
    process_interval: Duration,
    stale_check_interval: Duration,
    stale_after: Duration,
    batch_size: usize,
    shutdown: broadcast::Receiver<()>,
}

impl QueueProcessorTask {
    pub fn new(
        config: &QueueConfig,
        engine: DeliveryEngine,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            engine,
            process_interval: config.process_interval(),
            stale_check_interval: config.stale_check_interval(),
            stale_after: config.stale_after(),
            batch_size: config.batch_size.max(1),
            shutdown,
        }
    }

    pub async fn run(mut self) {
        if !self.engine.is_transport_configured() {
            tracing::warn!("Email transport is not configured, queued emails will fail until it is");
        }

        let mut process_timer = tokio::time::interval(self.process_interval);
        let mut stale_timer = tokio::time::interval(self.stale_check_interval);
        process_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        // Skip immediate first tick
        process_timer.tick().await;
        stale_timer.tick().await;

        tracing::info!(
            process_interval_secs = self.process_interval.as_secs(),
            stale_check_interval_secs = self.stale_check_interval.as_secs(),
            batch_size = self.batch_size,
            "Queue processor task started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("Queue processor task received shutdown signal");
                    break;
                }
                _ = process_timer.tick() => {
                    self.process_queue().await;
                }
                _ = stale_timer.tick() => {
                    self.requeue_stale().await;
                }
            }
        }

        tracing::info!("Queue processor task stopped");
    }

    async fn process_queue(&self) {
        match self.engine.process_batch(self.batch_size).await {
            Ok(result) if result.processed > 0 => {
                tracing::info!(
                    processed = result.processed,
                    sent = result.sent,
                    failed = result.failed,
                    skipped = result.skipped,
                    "Email batch processed"
                );
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(error = %e, "Email batch run failed");
            }
        }
    }

    async fn requeue_stale(&self) {
        match self.engine.requeue_stale(self.stale_after).await {
            Ok(0) => {}
            Ok(requeued) => {
                tracing::warn!(
                    requeued = requeued,
                    stale_after_secs = self.stale_after.as_secs(),
                    "Requeued emails stuck in SENDING"
                );
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to requeue stale emails");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::{
        DeliveryConfig, DisabledTransport, EmailStatus, MailTransport, MemoryEmailLogStore,
        NewEmailLog, TransportError,
    };
    use async_trait::async_trait;
    use std::sync::Arc;

    struct AcceptAll;

    #[async_trait]
    impl MailTransport for AcceptAll {
        async fn send_mail(&self, _to: &str, _subject: &str, _html: &str) -> Result<(), TransportError> {
            Ok(())
        }

        fn is_configured(&self) -> bool {
            true
        }

        async fn verify(&self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    fn engine(transport: Arc<dyn MailTransport>) -> DeliveryEngine {
        let config = DeliveryConfig {
            send_delay: Duration::ZERO,
            ..Default::default()
        };
        DeliveryEngine::new(Arc::new(MemoryEmailLogStore::new()), transport, config)
    }

    fn queue_config() -> QueueConfig {
        QueueConfig {
            process_interval_seconds: 1,
            stale_check_interval_seconds: 60,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_queue_processor_shutdown() {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = QueueProcessorTask::new(&queue_config(), engine(Arc::new(DisabledTransport)), shutdown_rx);

        let handle = tokio::spawn(async move {
            task.run().await;
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown_tx.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("Task should complete")
            .expect("Task should not panic");
    }

    #[tokio::test]
    async fn test_queue_processor_sends_on_tick() {
        let engine = engine(Arc::new(AcceptAll));
        let id = engine
            .enqueue(NewEmailLog {
                recipient_email: "ana@corp.test".to_string(),
                subject: "Hello".to_string(),
                html_body: Some("<p>Hi</p>".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = QueueProcessorTask::new(&queue_config(), engine.clone(), shutdown_rx);
        let handle = tokio::spawn(async move {
            task.run().await;
        });

        let mut status = EmailStatus::Queued;
        for _ in 0..30 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            status = engine.get(id).await.unwrap().unwrap().status;
            if status == EmailStatus::Sent {
                break;
            }
        }
        assert_eq!(status, EmailStatus::Sent);

        shutdown_tx.send(()).unwrap();
        let _ = handle.await;
    }
}
