//! PostgreSQL-backed organization directory.
//!
//! Reads the HR schema owned by the surrounding application:
//! - `users` - accounts with role, status and hierarchy links
//! - `teams` / `departments` - lead and head assignments
//! - `notification_rules` - per-type recipient configuration (JSONB)
//! - `notification_preferences` - per-user email opt-outs

use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::notification::NotificationType;

use super::directory::OrganizationDirectory;
use super::types::{DirectoryResult, DirectoryUser, NotificationRule, RecipientConfig, Role};

const USER_COLUMNS: &str = "u.id, u.email, u.first_name, u.last_name, u.role, u.is_active, \
                            u.manager_id, u.team_id, u.department_id";

pub struct PostgresDirectory {
    pool: PgPool,
}

impl PostgresDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_optional(&self, sql: &str, id: Uuid) -> DirectoryResult<Option<DirectoryUser>> {
        let row: Option<UserRow> = sqlx::query_as(sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.and_then(UserRow::into_user))
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    first_name: Option<String>,
    last_name: Option<String>,
    role: String,
    is_active: bool,
    manager_id: Option<Uuid>,
    team_id: Option<Uuid>,
    department_id: Option<Uuid>,
}

impl UserRow {
    fn into_user(self) -> Option<DirectoryUser> {
        let role = match self.role.parse::<Role>() {
            Ok(role) => role,
            Err(e) => {
                tracing::warn!(user_id = %self.id, error = %e, "Skipping user with unknown role");
                return None;
            }
        };
        Some(DirectoryUser {
            id: self.id,
            email: self.email,
            first_name: self.first_name.unwrap_or_default(),
            last_name: self.last_name.unwrap_or_default(),
            role,
            is_active: self.is_active,
            manager_id: self.manager_id,
            team_id: self.team_id,
            department_id: self.department_id,
        })
    }
}

#[async_trait]
impl OrganizationDirectory for PostgresDirectory {
    async fn rule(
        &self,
        notification_type: NotificationType,
    ) -> DirectoryResult<Option<NotificationRule>> {
        let row: Option<(bool, Option<serde_json::Value>)> = sqlx::query_as(
            r#"
            SELECT is_active, recipient_config
            FROM notification_rules
            WHERE notification_type = $1
            ORDER BY is_active DESC
            LIMIT 1
            "#,
        )
        .bind(notification_type.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some((is_active, config)) = row else {
            return Ok(None);
        };

        let recipient_config = match config {
            Some(value) if !value.is_null() => serde_json::from_value::<RecipientConfig>(value)?,
            _ => RecipientConfig::default(),
        };

        Ok(Some(NotificationRule {
            notification_type,
            is_active,
            recipient_config,
        }))
    }

    async fn user(&self, user_id: Uuid) -> DirectoryResult<Option<DirectoryUser>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = $1");
        self.fetch_optional(&sql, user_id).await
    }

    async fn active_users(&self, ids: &[Uuid]) -> DirectoryResult<Vec<DirectoryUser>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        // Preserve caller order via array position.
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users u \
             WHERE u.id = ANY($1) AND u.is_active = TRUE \
             ORDER BY array_position($1, u.id)"
        );
        let rows: Vec<UserRow> = sqlx::query_as(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().filter_map(UserRow::into_user).collect())
    }

    async fn manager_of(&self, user_id: Uuid) -> DirectoryResult<Option<DirectoryUser>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users e JOIN users u ON u.id = e.manager_id WHERE e.id = $1"
        );
        self.fetch_optional(&sql, user_id).await
    }

    async fn team_lead_of(&self, user_id: Uuid) -> DirectoryResult<Option<DirectoryUser>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users e \
             JOIN teams t ON t.id = e.team_id \
             JOIN users u ON u.id = t.lead_id \
             WHERE e.id = $1"
        );
        self.fetch_optional(&sql, user_id).await
    }

    async fn department_head_of(&self, user_id: Uuid) -> DirectoryResult<Option<DirectoryUser>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users e \
             JOIN departments d ON d.id = e.department_id \
             JOIN users u ON u.id = d.head_id \
             WHERE e.id = $1"
        );
        self.fetch_optional(&sql, user_id).await
    }

    async fn active_users_with_role(&self, role: Role) -> DirectoryResult<Vec<DirectoryUser>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users u \
             WHERE u.role = $1 AND u.is_active = TRUE \
             ORDER BY u.created_at ASC"
        );
        let rows: Vec<UserRow> = sqlx::query_as(&sql)
            .bind(role.as_str())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().filter_map(UserRow::into_user).collect())
    }

    async fn disabled_user_ids(
        &self,
        notification_type: NotificationType,
        user_ids: &[Uuid],
    ) -> DirectoryResult<HashSet<Uuid>> {
        if user_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT user_id
            FROM notification_preferences
            WHERE notification_type = $1
              AND user_id = ANY($2)
              AND email_enabled = FALSE
            "#,
        )
        .bind(notification_type.as_str())
        .bind(user_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
