use std::collections::HashSet;
use std::sync::Arc;

use uuid::Uuid;

use crate::notification::{NotificationContext, NotificationType};

use super::directory::OrganizationDirectory;
use super::types::{DirectoryResult, DirectoryUser, Recipient, RecipientConfig, Role};

/// Insertion-ordered recipient list, unique by lower-cased email.
#[derive(Default)]
struct RecipientSet {
    seen: HashSet<String>,
    recipients: Vec<Recipient>,
}

impl RecipientSet {
    fn push(&mut self, recipient: Recipient) {
        let key = recipient.email_key();
        if key.is_empty() || !self.seen.insert(key) {
            return;
        }
        self.recipients.push(recipient);
    }

    fn push_user(&mut self, user: &DirectoryUser) {
        self.push(user.to_recipient());
    }

    fn push_active(&mut self, user: Option<DirectoryUser>) {
        if let Some(user) = user.filter(|u| u.is_active) {
            self.push_user(&user);
        }
    }

    fn into_vec(self) -> Vec<Recipient> {
        self.recipients
    }
}

/// Computes who receives a notification.
///
/// Explicit overrides win outright; otherwise the per-type rule is evaluated
/// against the organization hierarchy and opt-out preferences are applied.
/// Missing or inactive relations contribute nothing. Only directory failures
/// are errors.
#[derive(Clone)]
pub struct RecipientResolver {
    directory: Arc<dyn OrganizationDirectory>,
}

impl RecipientResolver {
    pub fn new(directory: Arc<dyn OrganizationDirectory>) -> Self {
        Self { directory }
    }

    pub fn directory(&self) -> &Arc<dyn OrganizationDirectory> {
        &self.directory
    }

    pub async fn resolve(
        &self,
        notification_type: NotificationType,
        context: &NotificationContext,
    ) -> DirectoryResult<Vec<Recipient>> {
        let mut set = RecipientSet::default();

        if !context.custom_recipient_ids.is_empty() {
            for user in self
                .directory
                .active_users(&context.custom_recipient_ids)
                .await?
            {
                set.push_user(&user);
            }
            return Ok(set.into_vec());
        }

        if !context.custom_recipient_emails.is_empty() {
            for email in &context.custom_recipient_emails {
                set.push(Recipient::from_email(email.trim()));
            }
            return Ok(set.into_vec());
        }

        let rule = self
            .directory
            .rule(notification_type)
            .await?
            .filter(|rule| rule.is_active);

        let Some(rule) = rule else {
            tracing::debug!(
                notification_type = %notification_type,
                "No active notification rule, notifying subject only"
            );
            if let Some(subject_id) = context.subject_user_id {
                set.push_active(self.directory.user(subject_id).await?);
            }
            return Ok(set.into_vec());
        };

        self.apply_rule(&rule.recipient_config, context, &mut set)
            .await?;

        self.filter_disabled(notification_type, set.into_vec()).await
    }

    async fn apply_rule(
        &self,
        config: &RecipientConfig,
        context: &NotificationContext,
        set: &mut RecipientSet,
    ) -> DirectoryResult<()> {
        if let Some(subject_id) = context.subject_user_id {
            if config.notify_requester {
                set.push_active(self.directory.user(subject_id).await?);
            }
            if config.notify_manager {
                set.push_active(self.directory.manager_of(subject_id).await?);
            }
            if config.notify_team_lead {
                set.push_active(self.directory.team_lead_of(subject_id).await?);
            }
            if config.notify_department_head {
                set.push_active(self.directory.department_head_of(subject_id).await?);
            }
        }

        if config.notify_hr {
            self.push_role(Role::Hr, set).await?;
        }
        if config.notify_admin {
            self.push_role(Role::Admin, set).await?;
        }

        if !config.custom_recipients.is_empty() {
            for user in self
                .directory
                .active_users(&config.custom_recipients)
                .await?
            {
                set.push_user(&user);
            }
        }

        for name in &config.role_recipients {
            match name.parse::<Role>() {
                Ok(role) => self.push_role(role, set).await?,
                Err(_) => tracing::warn!(role = %name, "Skipping unknown role in recipient rule"),
            }
        }

        Ok(())
    }

    async fn push_role(&self, role: Role, set: &mut RecipientSet) -> DirectoryResult<()> {
        for user in self.directory.active_users_with_role(role).await? {
            set.push_user(&user);
        }
        Ok(())
    }

    /// Drop user-tied recipients who opted out of this type.
    async fn filter_disabled(
        &self,
        notification_type: NotificationType,
        recipients: Vec<Recipient>,
    ) -> DirectoryResult<Vec<Recipient>> {
        let user_ids: Vec<Uuid> = recipients.iter().filter_map(|r| r.user_id).collect();
        if user_ids.is_empty() {
            return Ok(recipients);
        }

        let disabled = self
            .directory
            .disabled_user_ids(notification_type, &user_ids)
            .await?;

        if !disabled.is_empty() {
            tracing::debug!(
                notification_type = %notification_type,
                opted_out = disabled.len(),
                "Excluding recipients who disabled email"
            );
        }

        Ok(recipients
            .into_iter()
            .filter(|r| r.user_id.map_or(true, |id| !disabled.contains(&id)))
            .collect())
    }
}
