//! Integration tests for the operator API.
//!
//! Uses `tower::ServiceExt` to call the Axum router without a real HTTP
//! server, over the in-memory stores.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use hr_notification_service::config::Settings;
use hr_notification_service::delivery::{
    DeliveryConfig, DeliveryEngine, DisabledTransport, MailTransport, MemoryEmailLogStore,
    NewEmailLog, TransportError,
};
use hr_notification_service::notification::{NotificationService, NotificationType};
use hr_notification_service::recipient::{MemoryDirectory, OrganizationDirectory, RecipientResolver};
use hr_notification_service::server::{create_app, AppState};
use hr_notification_service::template::{LayoutConfig, TemplateEngine, TemplateStore};

/// Accepts every send except to `reject@...` addresses
struct TestTransport;

#[async_trait]
impl MailTransport for TestTransport {
    async fn send_mail(&self, to: &str, _subject: &str, _html: &str) -> Result<(), TransportError> {
        if to.starts_with("reject@") {
            return Err(TransportError::Smtp("550 mailbox unavailable".to_string()));
        }
        Ok(())
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn verify(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

// ============================================================
// Helpers
// ============================================================

fn test_app(transport: Arc<dyn MailTransport>) -> (Router, DeliveryEngine) {
    let config = DeliveryConfig {
        max_retries: 1,
        send_delay: Duration::ZERO,
        ..Default::default()
    };
    let delivery = DeliveryEngine::new(Arc::new(MemoryEmailLogStore::new()), transport, config);
    let directory: Arc<dyn OrganizationDirectory> = Arc::new(MemoryDirectory::new());
    let templates = TemplateEngine::new(Arc::new(TemplateStore::new()), LayoutConfig::default());
    let service = NotificationService::new(
        RecipientResolver::new(directory),
        Arc::new(templates),
        delivery.clone(),
    );

    let state = AppState::new(Settings::default(), service, None);
    (create_app(state), delivery)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn enqueue(delivery: &DeliveryEngine, email: &str) -> Uuid {
    delivery
        .enqueue(NewEmailLog {
            recipient_email: email.to_string(),
            subject: "Hello".to_string(),
            notification_type: NotificationType::Announcement,
            html_body: Some("<p>Hello</p>".to_string()),
            ..Default::default()
        })
        .await
        .unwrap()
}

// ============================================================
// Health & metrics
// ============================================================

#[tokio::test]
async fn test_health() {
    let (app, _) = test_app(Arc::new(TestTransport));
    let (status, body) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["email"]["configured"], true);
    assert_eq!(body["queue"]["backend"], "memory");
}

#[tokio::test]
async fn test_health_degraded_without_transport() {
    let (app, _) = test_app(Arc::new(DisabledTransport));
    let (_, body) = send(&app, "GET", "/api/v1/health", None).await;
    assert_eq!(body["status"], "degraded");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _) = test_app(Arc::new(TestTransport));
    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("hrmail_queue_depth"));
}

// ============================================================
// Email logs
// ============================================================

#[tokio::test]
async fn test_list_and_get_email_logs() {
    let (app, delivery) = test_app(Arc::new(TestTransport));
    let id = enqueue(&delivery, "ana@corp.test").await;
    enqueue(&delivery, "bo@corp.test").await;

    let (status, body) = send(&app, "GET", "/api/v1/email-logs?recipient=ANA&limit=500", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["limit"], 100);
    assert_eq!(body["items"][0]["recipientEmail"], "ana@corp.test");
    assert_eq!(body["items"][0]["type"], "ANNOUNCEMENT");

    let (status, body) = send(&app, "GET", &format!("/api/v1/email-logs/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "QUEUED");

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/v1/email-logs/{}", Uuid::new_v4()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_process_then_stats() {
    let (app, delivery) = test_app(Arc::new(TestTransport));
    enqueue(&delivery, "ana@corp.test").await;
    enqueue(&delivery, "reject@corp.test").await;

    let (status, body) = send(&app, "POST", "/api/v1/email-logs/process", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["processed"], 2);
    assert_eq!(body["sent"], 1);
    assert_eq!(body["failed"], 1);

    let (status, body) = send(&app, "GET", "/api/v1/email-logs/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["sent"], 1);
    assert_eq!(body["failed"], 1);
    assert_eq!(body["sentToday"], 1);

    let (_, body) = send(&app, "GET", "/api/v1/email-logs?status=FAILED", None).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["errorMessage"], "SMTP error: 550 mailbox unavailable");
}

#[tokio::test]
async fn test_retry_status_codes() {
    let (app, delivery) = test_app(Arc::new(TestTransport));
    let queued = enqueue(&delivery, "ana@corp.test").await;
    let failed = enqueue(&delivery, "reject@corp.test").await;
    delivery.process_batch(10).await.unwrap();

    let (status, body) = send(&app, "POST", &format!("/api/v1/email-logs/{}/retry", queued), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    let (status, body) = send(&app, "POST", &format!("/api/v1/email-logs/{}/retry", failed), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "QUEUED");
    assert_eq!(body["retryCount"], 0);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/v1/email-logs/{}/retry", Uuid::new_v4()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================
// Email transport
// ============================================================

#[tokio::test]
async fn test_email_status() {
    let (app, _) = test_app(Arc::new(TestTransport));
    let (_, body) = send(&app, "GET", "/api/v1/email/status", None).await;
    assert_eq!(body, json!({ "configured": true, "verified": true, "backend": "memory" }));

    let (app, _) = test_app(Arc::new(DisabledTransport));
    let (_, body) = send(&app, "GET", "/api/v1/email/status", None).await;
    assert_eq!(body["configured"], false);
    assert_eq!(body["verified"], false);
}

#[tokio::test]
async fn test_send_test_email() {
    let (app, delivery) = test_app(Arc::new(TestTransport));
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/email/test",
        Some(json!({ "to": "ops@corp.test" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "sentCount": 1, "failedCount": 0 }));
    assert_eq!(delivery.stats().await.unwrap().sent, 1);
}

#[tokio::test]
async fn test_send_test_email_rejects_bad_address() {
    let (app, _) = test_app(Arc::new(TestTransport));
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/email/test",
        Some(json!({ "to": "not-an-address" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_send_test_email_without_transport() {
    let (app, _) = test_app(Arc::new(DisabledTransport));
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/email/test",
        Some(json!({ "to": "ops@corp.test" })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "SERVICE_UNAVAILABLE");
}

// ============================================================
// Templates
// ============================================================

#[tokio::test]
async fn test_default_template_lookup() {
    let (app, _) = test_app(Arc::new(TestTransport));
    let (status, body) = send(
        &app,
        "GET",
        "/api/v1/templates/defaults/leave_request_approved",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["type"], "LEAVE_REQUEST_APPROVED");
    assert_eq!(body["subject"], "Leave Request Approved - {{leaveType}}");

    let (status, _) = send(&app, "GET", "/api/v1/templates/defaults/PAYSLIP", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_validate_template() {
    let (app, _) = test_app(Arc::new(TestTransport));
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/templates/validate",
        Some(json!({ "subject": "Hi {{name}}", "htmlBody": "<p>{{team}</p>" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], false);
    assert_eq!(body["variables"], json!(["name"]));
}
