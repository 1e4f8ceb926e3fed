//! Template authoring helpers.

use axum::{extract::Path, Json};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::notification::NotificationType;
use crate::template::{default_template, validate_template_syntax, TemplateValidation};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateTemplateRequest {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub html_body: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultTemplateResponse {
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub subject: &'static str,
    pub html_body: &'static str,
    pub variables: &'static [&'static str],
}

/// POST /api/v1/templates/validate
///
/// Subject and body are checked together; variables are reported in the
/// order they first appear.
#[tracing::instrument(name = "http.validate_template", skip(request))]
pub async fn validate_template(
    Json(request): Json<ValidateTemplateRequest>,
) -> Json<TemplateValidation> {
    let combined = format!("{}\n{}", request.subject, request.html_body);
    Json(validate_template_syntax(&combined))
}

/// GET /api/v1/templates/defaults/:type
#[tracing::instrument(name = "http.get_default_template")]
pub async fn get_default_template(
    Path(type_name): Path<String>,
) -> Result<Json<DefaultTemplateResponse>> {
    let notification_type: NotificationType = type_name
        .parse()
        .map_err(|_| AppError::NotFound(format!("Unknown notification type: {}", type_name)))?;

    let template = default_template(notification_type);
    Ok(Json(DefaultTemplateResponse {
        notification_type,
        subject: template.subject,
        html_body: template.html_body,
        variables: template.variables,
    }))
}
