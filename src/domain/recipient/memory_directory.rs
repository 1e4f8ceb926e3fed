//! In-memory organization directory using DashMap.
//!
//! Used when no database is configured and as the test double for the resolver.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::notification::NotificationType;

use super::directory::OrganizationDirectory;
use super::types::{DirectoryResult, DirectoryUser, NotificationRule, RecipientConfig, Role};

/// In-memory directory.
///
/// Users keep insertion order so role lookups are deterministic.
#[derive(Default)]
pub struct MemoryDirectory {
    users: DashMap<Uuid, (u64, DirectoryUser)>,
    /// team id -> lead user id
    teams: DashMap<Uuid, Uuid>,
    /// department id -> head user id
    departments: DashMap<Uuid, Uuid>,
    rules: DashMap<NotificationType, NotificationRule>,
    preferences: DashMap<(Uuid, NotificationType), bool>,
    next_seq: AtomicU64,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_user(&self, user: DirectoryUser) {
        let seq = self
            .users
            .get(&user.id)
            .map(|entry| entry.0)
            .unwrap_or_else(|| self.next_seq.fetch_add(1, Ordering::Relaxed));
        self.users.insert(user.id, (seq, user));
    }

    pub fn set_team_lead(&self, team_id: Uuid, lead_id: Uuid) {
        self.teams.insert(team_id, lead_id);
    }

    pub fn set_department_head(&self, department_id: Uuid, head_id: Uuid) {
        self.departments.insert(department_id, head_id);
    }

    pub fn set_rule(&self, notification_type: NotificationType, is_active: bool, config: RecipientConfig) {
        self.rules.insert(
            notification_type,
            NotificationRule {
                notification_type,
                is_active,
                recipient_config: config,
            },
        );
    }

    pub fn set_email_preference(&self, user_id: Uuid, notification_type: NotificationType, enabled: bool) {
        self.preferences.insert((user_id, notification_type), enabled);
    }

    fn get(&self, user_id: Uuid) -> Option<DirectoryUser> {
        self.users.get(&user_id).map(|entry| entry.1.clone())
    }
}

#[async_trait]
impl OrganizationDirectory for MemoryDirectory {
    async fn rule(&self, notification_type: NotificationType) -> DirectoryResult<Option<NotificationRule>> {
        Ok(self.rules.get(&notification_type).map(|r| r.clone()))
    }

    async fn user(&self, user_id: Uuid) -> DirectoryResult<Option<DirectoryUser>> {
        Ok(self.get(user_id))
    }

    async fn active_users(&self, ids: &[Uuid]) -> DirectoryResult<Vec<DirectoryUser>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.get(*id))
            .filter(|u| u.is_active)
            .collect())
    }

    async fn manager_of(&self, user_id: Uuid) -> DirectoryResult<Option<DirectoryUser>> {
        Ok(self
            .get(user_id)
            .and_then(|u| u.manager_id)
            .and_then(|id| self.get(id)))
    }

    async fn team_lead_of(&self, user_id: Uuid) -> DirectoryResult<Option<DirectoryUser>> {
        Ok(self
            .get(user_id)
            .and_then(|u| u.team_id)
            .and_then(|team| self.teams.get(&team).map(|lead| *lead))
            .and_then(|id| self.get(id)))
    }

    async fn department_head_of(&self, user_id: Uuid) -> DirectoryResult<Option<DirectoryUser>> {
        Ok(self
            .get(user_id)
            .and_then(|u| u.department_id)
            .and_then(|dept| self.departments.get(&dept).map(|head| *head))
            .and_then(|id| self.get(id)))
    }

    async fn active_users_with_role(&self, role: Role) -> DirectoryResult<Vec<DirectoryUser>> {
        let mut users: Vec<(u64, DirectoryUser)> = self
            .users
            .iter()
            .filter(|entry| entry.1.role == role && entry.1.is_active)
            .map(|entry| entry.value().clone())
            .collect();
        users.sort_by_key(|(seq, _)| *seq);
        Ok(users.into_iter().map(|(_, u)| u).collect())
    }

    async fn disabled_user_ids(
        &self,
        notification_type: NotificationType,
        user_ids: &[Uuid],
    ) -> DirectoryResult<HashSet<Uuid>> {
        Ok(user_ids
            .iter()
            .copied()
            .filter(|id| {
                self.preferences
                    .get(&(*id, notification_type))
                    .is_some_and(|enabled| !*enabled)
            })
            .collect())
    }
}
