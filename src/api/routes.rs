use axum::{
    routing::{get, post},
    Router,
};

use crate::server::AppState;

use super::email::{email_status, send_test_email};
use super::email_logs::{
    email_log_stats, get_email_log, list_email_logs, process_queue, retry_email_log,
};
use super::health::health;
use super::metrics::prometheus_metrics;
use super::templates::{get_default_template, validate_template};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health & Metrics
        .route("/health", get(health))
        .route("/metrics", get(prometheus_metrics))
        .nest(
            "/api/v1",
            Router::new()
                .route("/health", get(health))
                // Delivery log
                .route("/email-logs", get(list_email_logs))
                .route("/email-logs/stats", get(email_log_stats))
                .route("/email-logs/process", post(process_queue))
                .route("/email-logs/{id}", get(get_email_log))
                .route("/email-logs/{id}/retry", post(retry_email_log))
                // Transport
                .route("/email/status", get(email_status))
                .route("/email/test", post(send_test_email))
                // Templates
                .route("/templates/validate", post(validate_template))
                .route("/templates/defaults/{type}", get(get_default_template)),
        )
}
