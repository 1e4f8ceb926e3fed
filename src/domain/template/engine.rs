use std::sync::Arc;

use crate::notification::{NotificationType, TemplateVariables};

use super::defaults::default_template;
use super::layout::{wrap_in_layout, LayoutConfig};
use super::store::TemplateRepository;
use super::substitution::render_variables;
use super::types::{DefaultTemplate, EmailTemplate, RenderedEmail};

/// Renders notification types into subject/body pairs.
///
/// Operator templates take precedence over the compiled-in defaults. The
/// engine holds no render state; callers render once per recipient.
pub struct TemplateEngine {
    repository: Arc<dyn TemplateRepository>,
    layout: LayoutConfig,
}

impl TemplateEngine {
    pub fn new(repository: Arc<dyn TemplateRepository>, layout: LayoutConfig) -> Self {
        Self { repository, layout }
    }

    /// The active operator template for a type.
    ///
    /// A storage failure is logged and treated as "no template", so rendering
    /// falls back to the default instead of failing.
    pub async fn get_active_template(
        &self,
        notification_type: NotificationType,
    ) -> Option<EmailTemplate> {
        match self.repository.active_template(notification_type).await {
            Ok(template) => template,
            Err(e) => {
                tracing::warn!(
                    notification_type = %notification_type,
                    error = %e,
                    "Failed to load email template, using built-in default"
                );
                None
            }
        }
    }

    pub fn get_default_template(&self, notification_type: NotificationType) -> DefaultTemplate {
        default_template(notification_type)
    }

    /// Render subject and full HTML document for one recipient.
    pub async fn render(
        &self,
        notification_type: NotificationType,
        variables: &TemplateVariables,
    ) -> RenderedEmail {
        let template = self.get_active_template(notification_type).await;
        self.render_with(notification_type, template.as_ref(), variables)
    }

    /// Render against an already-loaded template (or the default when `None`).
    ///
    /// Lets the orchestrator load the template once and render per recipient.
    pub fn render_with(
        &self,
        notification_type: NotificationType,
        template: Option<&EmailTemplate>,
        variables: &TemplateVariables,
    ) -> RenderedEmail {
        let (subject, body, template_id) = match template {
            Some(t) => (t.subject.as_str(), t.html_body.as_str(), Some(t.id)),
            None => {
                let d = default_template(notification_type);
                (d.subject, d.html_body, None)
            }
        };

        let body = render_variables(body, variables);

        RenderedEmail {
            subject: render_variables(subject, variables),
            html: wrap_in_layout(&body, &self.layout),
            template_id,
        }
    }

    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }
}
