//! Template types and error definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::notification::NotificationType;

/// Template-specific error type
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template not found: {0}")]
    NotFound(Uuid),

    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for template operations
pub type TemplateResult<T> = Result<T, TemplateError>;

/// An operator-authored email template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailTemplate {
    pub id: Uuid,

    /// Notification type this template renders
    #[serde(rename = "type")]
    pub notification_type: NotificationType,

    /// Subject line with {{variable}} placeholders
    pub subject: String,

    /// HTML body fragment with {{variable}} placeholders
    pub html_body: String,

    /// Variable names documented for authors
    #[serde(default)]
    pub variables: Vec<String>,

    pub is_active: bool,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl EmailTemplate {
    /// Validate the template fields
    pub fn validate(&self) -> TemplateResult<()> {
        if self.subject.trim().is_empty() || self.subject.len() > 256 {
            return Err(TemplateError::InvalidTemplate(
                "Subject must be 1-256 characters".to_string(),
            ));
        }

        if self.html_body.trim().is_empty() {
            return Err(TemplateError::InvalidTemplate(
                "HTML body must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Request to create a new template
#[derive(Debug, Deserialize)]
pub struct CreateTemplateRequest {
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub subject: String,
    pub html_body: String,
    #[serde(default)]
    pub variables: Vec<String>,
    /// Defaults to active
    pub is_active: Option<bool>,
}

impl From<CreateTemplateRequest> for EmailTemplate {
    fn from(req: CreateTemplateRequest) -> Self {
        let now = Utc::now();
        EmailTemplate {
            id: Uuid::new_v4(),
            notification_type: req.notification_type,
            subject: req.subject,
            html_body: req.html_body,
            variables: req.variables,
            is_active: req.is_active.unwrap_or(true),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Request to update an existing template
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTemplateRequest {
    pub subject: Option<String>,
    pub html_body: Option<String>,
    pub variables: Option<Vec<String>>,
    pub is_active: Option<bool>,
}

/// Compiled-in fallback template for a notification type
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DefaultTemplate {
    pub subject: &'static str,
    pub html_body: &'static str,
    pub variables: &'static [&'static str],
}

/// A template rendered for one recipient, ready to enqueue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    /// Full HTML document, layout included
    pub html: String,
    /// Set when an operator template was used instead of the default
    pub template_id: Option<Uuid>,
}

/// Result of authoring-time syntax validation
#[derive(Debug, Clone, Default, Serialize)]
pub struct TemplateValidation {
    pub valid: bool,
    pub errors: Vec<String>,
    /// Distinct variable names referenced, in first-seen order
    pub variables: Vec<String>,
}
