use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Business events that can produce a transactional email.
///
/// The set is closed: every variant has a compiled-in default template
/// (see [`crate::template::default_template`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    LeaveRequestSubmitted,
    LeaveRequestApproved,
    LeaveRequestRejected,
    LeaveRequestCancelled,
    AssetAssigned,
    AssetReturned,
    WelcomeEmail,
    PasswordReset,
    Appreciation,
    Announcement,
    #[default]
    Custom,
}

impl NotificationType {
    pub const ALL: [NotificationType; 11] = [
        NotificationType::LeaveRequestSubmitted,
        NotificationType::LeaveRequestApproved,
        NotificationType::LeaveRequestRejected,
        NotificationType::LeaveRequestCancelled,
        NotificationType::AssetAssigned,
        NotificationType::AssetReturned,
        NotificationType::WelcomeEmail,
        NotificationType::PasswordReset,
        NotificationType::Appreciation,
        NotificationType::Announcement,
        NotificationType::Custom,
    ];

    /// Storage / wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::LeaveRequestSubmitted => "LEAVE_REQUEST_SUBMITTED",
            NotificationType::LeaveRequestApproved => "LEAVE_REQUEST_APPROVED",
            NotificationType::LeaveRequestRejected => "LEAVE_REQUEST_REJECTED",
            NotificationType::LeaveRequestCancelled => "LEAVE_REQUEST_CANCELLED",
            NotificationType::AssetAssigned => "ASSET_ASSIGNED",
            NotificationType::AssetReturned => "ASSET_RETURNED",
            NotificationType::WelcomeEmail => "WELCOME_EMAIL",
            NotificationType::PasswordReset => "PASSWORD_RESET",
            NotificationType::Appreciation => "APPRECIATION",
            NotificationType::Announcement => "ANNOUNCEMENT",
            NotificationType::Custom => "CUSTOM",
        }
    }

    /// Decode a stored type name, mapping anything unknown to `Custom`.
    pub fn from_stored(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            tracing::warn!(value = %value, "Unknown notification type in storage, treating as CUSTOM");
            NotificationType::Custom
        })
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        NotificationType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| format!("Invalid notification type: {}", s))
    }
}

/// Priority levels for notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl Priority {
    /// Get numeric value for priority comparison
    pub fn as_weight(&self) -> u8 {
        match self {
            Priority::Low => 1,
            Priority::Normal => 2,
            Priority::High => 3,
            Priority::Urgent => 4,
        }
    }

    /// Whether enqueueing should nudge the delivery engine right away.
    pub fn is_expedited(&self) -> bool {
        matches!(self, Priority::High | Priority::Urgent)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Normal => "NORMAL",
            Priority::High => "HIGH",
            Priority::Urgent => "URGENT",
        }
    }
}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_weight().cmp(&other.as_weight())
    }
}

/// Template variables. Values are expected to be scalars.
pub type TemplateVariables = serde_json::Map<String, serde_json::Value>;

/// Everything the pipeline knows about the event that triggered a notification.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationContext {
    /// User who performed the action (approver, assigner, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<Uuid>,

    /// User the event is about (leave requester, asset holder, new hire)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_user_id: Option<Uuid>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,

    #[serde(default)]
    pub variables: TemplateVariables,

    #[serde(default)]
    pub priority: Priority,

    /// Explicit user override; bypasses rule evaluation entirely
    #[serde(default)]
    pub custom_recipient_ids: Vec<Uuid>,

    /// Explicit raw-address override; used when no user ids are given
    #[serde(default)]
    pub custom_recipient_emails: Vec<String>,
}

/// Builder for creating notification contexts
#[derive(Debug, Clone, Default)]
pub struct NotificationContextBuilder {
    context: NotificationContext,
}

impl NotificationContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actor(mut self, actor_id: Uuid) -> Self {
        self.context.actor_id = Some(actor_id);
        self
    }

    pub fn subject(mut self, user_id: Uuid) -> Self {
        self.context.subject_user_id = Some(user_id);
        self
    }

    pub fn entity(mut self, entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        self.context.entity_type = Some(entity_type.into());
        self.context.entity_id = Some(entity_id.into());
        self
    }

    /// Set a single template variable
    pub fn variable(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.context.variables.insert(name.into(), value.into());
        self
    }

    pub fn variables(mut self, variables: TemplateVariables) -> Self {
        self.context.variables.extend(variables);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.context.priority = priority;
        self
    }

    pub fn recipient_ids(mut self, ids: Vec<Uuid>) -> Self {
        self.context.custom_recipient_ids = ids;
        self
    }

    pub fn recipient_emails(mut self, emails: Vec<String>) -> Self {
        self.context.custom_recipient_emails = emails;
        self
    }

    pub fn build(self) -> NotificationContext {
        self.context
    }
}

impl NotificationContext {
    pub fn builder() -> NotificationContextBuilder {
        NotificationContextBuilder::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_round_trips_through_str() {
        for t in NotificationType::ALL {
            assert_eq!(t.as_str().parse::<NotificationType>().unwrap(), t);
        }
    }

    #[test]
    fn test_type_parse_accepts_kebab_case() {
        assert_eq!(
            "leave-request-approved".parse::<NotificationType>().unwrap(),
            NotificationType::LeaveRequestApproved
        );
    }

    #[test]
    fn test_unknown_stored_type_is_custom() {
        assert_eq!(
            NotificationType::from_stored("PAYSLIP_READY"),
            NotificationType::Custom
        );
    }

    #[test]
    fn test_type_serde_matches_storage_name() {
        let json = serde_json::to_string(&NotificationType::AssetAssigned).unwrap();
        assert_eq!(json, "\"ASSET_ASSIGNED\"");
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Urgent > Priority::High);
        assert!(Priority::High > Priority::Normal);
        assert!(Priority::Normal > Priority::Low);
        assert!(Priority::High.is_expedited());
        assert!(!Priority::Normal.is_expedited());
    }

    #[test]
    fn test_context_builder() {
        let subject = Uuid::new_v4();
        let ctx = NotificationContext::builder()
            .subject(subject)
            .entity("leave_request", "LR-7")
            .variable("leaveType", "Annual Leave")
            .variable("days", 3)
            .priority(Priority::High)
            .build();

        assert_eq!(ctx.subject_user_id, Some(subject));
        assert_eq!(ctx.entity_type.as_deref(), Some("leave_request"));
        assert_eq!(ctx.variables["leaveType"], "Annual Leave");
        assert_eq!(ctx.variables["days"], 3);
        assert_eq!(ctx.priority, Priority::High);
    }
}
