//! Metrics helper structs for convenient metric recording

use std::time::Duration;

use prometheus::{Encoder, TextEncoder};

use super::{
    BATCH_DURATION, CLAIMS_SKIPPED_TOTAL, EMAILS_ENQUEUED_TOTAL, EMAILS_FAILED_ATTEMPTS_TOTAL,
    EMAILS_PERMANENTLY_FAILED_TOTAL, EMAILS_RETRIED_TOTAL, EMAILS_SENT_TOTAL,
    NOTIFICATIONS_DROPPED_TOTAL, NOTIFICATIONS_TOTAL, QUEUE_DEPTH, SEND_LATENCY,
    STALE_REQUEUED_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording notification metrics
pub struct NotificationMetrics;

impl NotificationMetrics {
    pub fn record_accepted(notification_type: &str) {
        NOTIFICATIONS_TOTAL.with_label_values(&[notification_type]).inc();
    }

    pub fn record_dropped() {
        NOTIFICATIONS_DROPPED_TOTAL.inc();
    }
}

/// Helper struct for recording delivery metrics
pub struct DeliveryMetrics;

impl DeliveryMetrics {
    /// Record a delivery record created
    pub fn record_enqueued(notification_type: &str) {
        EMAILS_ENQUEUED_TOTAL
            .with_label_values(&[notification_type])
            .inc();
    }

    /// Record a successful send and its latency
    pub fn record_sent(latency: Duration) {
        EMAILS_SENT_TOTAL.inc();
        SEND_LATENCY.observe(latency.as_secs_f64());
    }

    /// Record a failed attempt (`invalid_address`, `transport`, `timeout`, `missing_body`)
    pub fn record_failed_attempt(reason: &str) {
        EMAILS_FAILED_ATTEMPTS_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn record_permanently_failed() {
        EMAILS_PERMANENTLY_FAILED_TOTAL.inc();
    }

    pub fn record_manual_retry() {
        EMAILS_RETRIED_TOTAL.inc();
    }

    pub fn record_skipped() {
        CLAIMS_SKIPPED_TOTAL.inc();
    }

    pub fn record_stale_requeued(count: usize) {
        STALE_REQUEUED_TOTAL.inc_by(count as u64);
    }

    pub fn record_batch_duration(duration: Duration) {
        BATCH_DURATION.observe(duration.as_secs_f64());
    }

    pub fn set_queue_depth(queued: u64) {
        QUEUE_DEPTH.set(queued as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_contains_prefixed_metrics() {
        DeliveryMetrics::record_enqueued("CUSTOM");
        DeliveryMetrics::set_queue_depth(4);

        let text = encode_metrics().unwrap();
        assert!(text.contains("hrmail_emails_enqueued_total"));
        assert!(text.contains("hrmail_queue_depth"));
    }
}
