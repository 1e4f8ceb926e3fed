//! Prometheus metrics for the notification service.
//!
//! This module provides metrics for monitoring the email pipeline:
//! - Enqueue metrics (records created per notification type)
//! - Delivery metrics (sent, failed attempts, permanent failures, skipped claims)
//! - Latency metrics (batch duration, transport send latency)
//! - Queue depth

mod helpers;

pub use helpers::{encode_metrics, DeliveryMetrics, NotificationMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "hrmail";

lazy_static! {
    // ============================================================================
    // Notification Metrics
    // ============================================================================

    /// Notifications accepted by the service, by type
    pub static ref NOTIFICATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_notifications_total", METRIC_PREFIX),
        "Total notifications accepted",
        &["type"]
    ).unwrap();

    /// Notifications dropped because recipients could not be resolved
    pub static ref NOTIFICATIONS_DROPPED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_notifications_dropped_total", METRIC_PREFIX),
        "Total notifications dropped before enqueue"
    ).unwrap();

    // ============================================================================
    // Queue Metrics
    // ============================================================================

    /// Delivery records created, by type
    pub static ref EMAILS_ENQUEUED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_emails_enqueued_total", METRIC_PREFIX),
        "Total delivery records enqueued",
        &["type"]
    ).unwrap();

    /// Records currently waiting in QUEUED
    pub static ref QUEUE_DEPTH: IntGauge = register_int_gauge!(
        format!("{}_queue_depth", METRIC_PREFIX),
        "Delivery records currently queued"
    ).unwrap();

    /// Stale SENDING claims returned to the queue
    pub static ref STALE_REQUEUED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_stale_requeued_total", METRIC_PREFIX),
        "Total stale claims returned to the queue"
    ).unwrap();

    // ============================================================================
    // Delivery Metrics
    // ============================================================================

    /// Emails delivered to the transport
    pub static ref EMAILS_SENT_TOTAL: IntCounter = register_int_counter!(
        format!("{}_emails_sent_total", METRIC_PREFIX),
        "Total emails sent"
    ).unwrap();

    /// Failed send attempts, by reason
    pub static ref EMAILS_FAILED_ATTEMPTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_emails_failed_attempts_total", METRIC_PREFIX),
        "Total failed delivery attempts",
        &["reason"]
    ).unwrap();

    /// Records that reached FAILED
    pub static ref EMAILS_PERMANENTLY_FAILED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_emails_permanently_failed_total", METRIC_PREFIX),
        "Total delivery records that exhausted their retries"
    ).unwrap();

    /// Operator-initiated retries
    pub static ref EMAILS_RETRIED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_emails_retried_total", METRIC_PREFIX),
        "Total manual retries of failed records"
    ).unwrap();

    /// Claims lost to a concurrent batch
    pub static ref CLAIMS_SKIPPED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_claims_skipped_total", METRIC_PREFIX),
        "Total records skipped because another worker claimed them"
    ).unwrap();

    // ============================================================================
    // Latency Metrics
    // ============================================================================

    /// Duration of one process_batch run
    pub static ref BATCH_DURATION: Histogram = register_histogram!(
        format!("{}_batch_duration_seconds", METRIC_PREFIX),
        "Batch processing duration in seconds",
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0]
    ).unwrap();

    /// Latency of a single transport send
    pub static ref SEND_LATENCY: Histogram = register_histogram!(
        format!("{}_send_latency_seconds", METRIC_PREFIX),
        "Transport send latency in seconds",
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    ).unwrap();
}
