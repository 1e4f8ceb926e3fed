//! Transport status and test sends.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::delivery::is_valid_email;
use crate::error::{AppError, Result};
use crate::notification::{NotificationContext, NotificationType, NotifySyncResult, Priority};
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct EmailStatusResponse {
    pub configured: bool,
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub backend: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct TestEmailRequest {
    pub to: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// GET /api/v1/email/status
#[tracing::instrument(name = "http.email_status", skip(state))]
pub async fn email_status(State(state): State<AppState>) -> Json<EmailStatusResponse> {
    let configured = state.delivery.is_transport_configured();
    let (verified, error) = if configured {
        match state.delivery.verify_transport().await {
            Ok(()) => (true, None),
            Err(e) => {
                tracing::warn!(error = %e, "Email transport verification failed");
                (false, Some(e.to_string()))
            }
        }
    } else {
        (false, None)
    };

    Json(EmailStatusResponse {
        configured,
        verified,
        error,
        backend: state.delivery.backend_type(),
    })
}

/// POST /api/v1/email/test - Send one email synchronously
#[tracing::instrument(name = "http.send_test_email", skip(state, request), fields(to = %request.to))]
pub async fn send_test_email(
    State(state): State<AppState>,
    Json(request): Json<TestEmailRequest>,
) -> Result<Json<NotifySyncResult>> {
    let to = request.to.trim().to_string();
    if !is_valid_email(&to) {
        return Err(AppError::Validation(format!("Invalid email address: {}", to)));
    }

    let app_name = &state.settings.app.name;
    let context = NotificationContext::builder()
        .variable(
            "subject",
            request
                .subject
                .unwrap_or_else(|| format!("{} test email", app_name)),
        )
        .variable(
            "message",
            request.message.unwrap_or_else(|| {
                "This is a test email. Your email configuration is working.".to_string()
            }),
        )
        .recipient_emails(vec![to])
        .priority(Priority::High)
        .build();

    let result = state
        .service
        .notify_sync(NotificationType::Custom, context)
        .await?;

    Ok(Json(result))
}
