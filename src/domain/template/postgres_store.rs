//! PostgreSQL-backed template repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::notification::NotificationType;

use super::store::TemplateRepository;
use super::types::{EmailTemplate, TemplateResult};

/// Reads operator templates from the `email_templates` table.
pub struct PostgresTemplateRepository {
    pool: PgPool,
}

impl PostgresTemplateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct EmailTemplateRow {
    id: Uuid,
    notification_type: String,
    subject: String,
    html_body: String,
    variables: serde_json::Value,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<EmailTemplateRow> for EmailTemplate {
    type Error = serde_json::Error;

    fn try_from(row: EmailTemplateRow) -> Result<Self, Self::Error> {
        Ok(EmailTemplate {
            id: row.id,
            notification_type: NotificationType::from_stored(&row.notification_type),
            subject: row.subject,
            html_body: row.html_body,
            variables: serde_json::from_value(row.variables)?,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl TemplateRepository for PostgresTemplateRepository {
    async fn active_template(
        &self,
        notification_type: NotificationType,
    ) -> TemplateResult<Option<EmailTemplate>> {
        let row: Option<EmailTemplateRow> = sqlx::query_as(
            r#"
            SELECT id, notification_type, subject, html_body, variables, is_active,
                   created_at, updated_at
            FROM email_templates
            WHERE notification_type = $1 AND is_active = TRUE
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(notification_type.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(EmailTemplate::try_from).transpose()?)
    }
}
