//! API layer - operator HTTP endpoints organized by concern.

mod email;
mod email_logs;
mod health;
mod metrics;
mod routes;
mod templates;

// Re-export all handlers for use in server/app.rs
pub use email::{email_status, send_test_email, EmailStatusResponse, TestEmailRequest};
pub use email_logs::{
    email_log_stats, get_email_log, list_email_logs, process_queue, retry_email_log,
    ProcessQuery, RetryResponse,
};
pub use health::health;
pub use metrics::prometheus_metrics;
pub use routes::api_routes;
pub use templates::{get_default_template, validate_template, ValidateTemplateRequest};
