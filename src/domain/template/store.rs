//! Template storage with CRUD operations

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::notification::NotificationType;

use super::types::{EmailTemplate, TemplateError, TemplateResult, UpdateTemplateRequest};

/// Read access the template engine needs from template storage.
#[async_trait]
pub trait TemplateRepository: Send + Sync {
    /// The single active template for a type, if any.
    ///
    /// When several are marked active, the most recently updated one wins.
    async fn active_template(
        &self,
        notification_type: NotificationType,
    ) -> TemplateResult<Option<EmailTemplate>>;
}

/// In-memory template storage
pub struct TemplateStore {
    templates: DashMap<Uuid, EmailTemplate>,
}

impl Default for TemplateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateStore {
    /// Create a new template store
    pub fn new() -> Self {
        Self {
            templates: DashMap::new(),
        }
    }

    /// Create a new template.
    ///
    /// An active template deactivates any other active template of the same type.
    pub fn create(&self, template: EmailTemplate) -> TemplateResult<EmailTemplate> {
        template.validate()?;

        if template.is_active {
            self.deactivate_type(template.notification_type, template.id);
        }

        self.templates.insert(template.id, template.clone());
        Ok(template)
    }

    /// Get a template by ID
    pub fn get(&self, id: Uuid) -> TemplateResult<EmailTemplate> {
        self.templates
            .get(&id)
            .map(|t| t.clone())
            .ok_or(TemplateError::NotFound(id))
    }

    /// List all templates, optionally for a single type
    pub fn list(&self, notification_type: Option<NotificationType>) -> Vec<EmailTemplate> {
        let mut templates: Vec<EmailTemplate> = self
            .templates
            .iter()
            .filter(|entry| notification_type.map_or(true, |t| entry.notification_type == t))
            .map(|entry| entry.value().clone())
            .collect();
        templates.sort_by_key(|t| t.created_at);
        templates
    }

    /// Update an existing template
    pub fn update(&self, id: Uuid, updates: UpdateTemplateRequest) -> TemplateResult<EmailTemplate> {
        let mut template = self.get(id)?;

        if let Some(subject) = updates.subject {
            template.subject = subject;
        }

        if let Some(html_body) = updates.html_body {
            template.html_body = html_body;
        }

        if let Some(variables) = updates.variables {
            template.variables = variables;
        }

        if let Some(is_active) = updates.is_active {
            template.is_active = is_active;
        }

        template.updated_at = Utc::now();
        template.validate()?;

        if template.is_active {
            self.deactivate_type(template.notification_type, id);
        }

        self.templates.insert(id, template.clone());

        Ok(template)
    }

    /// Delete a template by ID
    pub fn delete(&self, id: Uuid) -> TemplateResult<()> {
        self.templates
            .remove(&id)
            .map(|_| ())
            .ok_or(TemplateError::NotFound(id))
    }

    /// Get the number of templates
    pub fn count(&self) -> usize {
        self.templates.len()
    }

    fn deactivate_type(&self, notification_type: NotificationType, keep: Uuid) {
        for mut entry in self.templates.iter_mut() {
            if entry.notification_type == notification_type && entry.id != keep && entry.is_active {
                entry.is_active = false;
                entry.updated_at = Utc::now();
            }
        }
    }
}

#[async_trait]
impl TemplateRepository for TemplateStore {
    async fn active_template(
        &self,
        notification_type: NotificationType,
    ) -> TemplateResult<Option<EmailTemplate>> {
        Ok(self
            .templates
            .iter()
            .filter(|entry| entry.notification_type == notification_type && entry.is_active)
            .max_by_key(|entry| entry.updated_at)
            .map(|entry| entry.value().clone()))
    }
}

/// Create an Arc-wrapped template store
pub fn create_template_store() -> Arc<TemplateStore> {
    Arc::new(TemplateStore::new())
}
