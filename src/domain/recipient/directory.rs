//! Organization data access for recipient resolution.
//!
//! The resolver never talks to storage directly; it goes through
//! [`OrganizationDirectory`], which has an in-memory and a PostgreSQL
//! implementation.

use std::collections::HashSet;

use async_trait::async_trait;
use uuid::Uuid;

use crate::notification::NotificationType;

use super::types::{DirectoryResult, DirectoryUser, NotificationRule, Role};

/// Read-only view of users, org hierarchy, rules and preferences.
///
/// # Thread Safety
///
/// Implementations must be thread-safe (`Send + Sync`) as they are shared
/// across notification tasks.
///
/// # Error Handling
///
/// A relation that does not exist is `Ok(None)` / an empty list. Only a
/// failing data layer returns `Err`.
#[async_trait]
pub trait OrganizationDirectory: Send + Sync {
    /// The rule configured for a notification type, active or not.
    async fn rule(&self, notification_type: NotificationType)
        -> DirectoryResult<Option<NotificationRule>>;

    /// Look up a user regardless of status.
    async fn user(&self, user_id: Uuid) -> DirectoryResult<Option<DirectoryUser>>;

    /// Active users among `ids`, in the order of `ids`.
    async fn active_users(&self, ids: &[Uuid]) -> DirectoryResult<Vec<DirectoryUser>>;

    /// Direct manager of a user, regardless of status.
    async fn manager_of(&self, user_id: Uuid) -> DirectoryResult<Option<DirectoryUser>>;

    /// Lead of the user's team, regardless of status.
    async fn team_lead_of(&self, user_id: Uuid) -> DirectoryResult<Option<DirectoryUser>>;

    /// Head of the user's department, regardless of status.
    async fn department_head_of(&self, user_id: Uuid) -> DirectoryResult<Option<DirectoryUser>>;

    /// Active users holding a role, oldest account first.
    async fn active_users_with_role(&self, role: Role) -> DirectoryResult<Vec<DirectoryUser>>;

    /// Users among `user_ids` who explicitly disabled email for this type.
    async fn disabled_user_ids(
        &self,
        notification_type: NotificationType,
        user_ids: &[Uuid],
    ) -> DirectoryResult<HashSet<Uuid>>;
}
