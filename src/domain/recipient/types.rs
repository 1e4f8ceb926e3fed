use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::notification::NotificationType;

/// Errors raised by organization data lookups.
///
/// Missing or inactive relations are not errors; only a failing data layer is.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Directory unavailable: {0}")]
    Unavailable(String),
}

/// Result type for directory operations
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// A resolved email target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    /// Set for directory users; absent for raw-address overrides
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    pub email: String,
    pub name: String,
}

impl Recipient {
    pub fn from_email(email: impl Into<String>) -> Self {
        let email = email.into();
        Self {
            user_id: None,
            name: email.clone(),
            email,
        }
    }

    /// Dedup key
    pub fn email_key(&self) -> String {
        self.email.trim().to_lowercase()
    }
}

/// Organizational roles relevant to recipient rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Employee,
    Manager,
    TeamLead,
    DepartmentHead,
    Hr,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Employee => "EMPLOYEE",
            Role::Manager => "MANAGER",
            Role::TeamLead => "TEAM_LEAD",
            Role::DepartmentHead => "DEPARTMENT_HEAD",
            Role::Hr => "HR",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "EMPLOYEE" => Ok(Role::Employee),
            "MANAGER" => Ok(Role::Manager),
            "TEAM_LEAD" => Ok(Role::TeamLead),
            "DEPARTMENT_HEAD" => Ok(Role::DepartmentHead),
            "HR" => Ok(Role::Hr),
            "ADMIN" => Ok(Role::Admin),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// The slice of an HR user record the resolver needs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryUser {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub is_active: bool,
    #[serde(default)]
    pub manager_id: Option<Uuid>,
    #[serde(default)]
    pub team_id: Option<Uuid>,
    #[serde(default)]
    pub department_id: Option<Uuid>,
}

impl DirectoryUser {
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let name = name.trim();
        if name.is_empty() {
            self.email.clone()
        } else {
            name.to_string()
        }
    }

    pub fn to_recipient(&self) -> Recipient {
        Recipient {
            user_id: Some(self.id),
            email: self.email.clone(),
            name: self.display_name(),
        }
    }
}

/// Who gets notified for a notification type.
///
/// Every field defaults, so partially stored configuration deserializes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecipientConfig {
    pub notify_requester: bool,
    pub notify_manager: bool,
    pub notify_team_lead: bool,
    pub notify_department_head: bool,
    #[serde(rename = "notifyHR")]
    pub notify_hr: bool,
    pub notify_admin: bool,
    pub custom_recipients: Vec<Uuid>,
    pub role_recipients: Vec<String>,
}

/// Per-type recipient rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRule {
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub is_active: bool,
    #[serde(default)]
    pub recipient_config: RecipientConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_recipient_config_deserializes() {
        let config: RecipientConfig =
            serde_json::from_str(r#"{"notifyRequester": true, "notifyHR": true}"#).unwrap();
        assert!(config.notify_requester);
        assert!(config.notify_hr);
        assert!(!config.notify_manager);
        assert!(config.custom_recipients.is_empty());
        assert!(config.role_recipients.is_empty());
    }

    #[test]
    fn test_empty_recipient_config_deserializes() {
        let config: RecipientConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, RecipientConfig::default());
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("hr".parse::<Role>().unwrap(), Role::Hr);
        assert_eq!("team-lead".parse::<Role>().unwrap(), Role::TeamLead);
        assert!("janitor".parse::<Role>().is_err());
    }

    #[test]
    fn test_display_name_falls_back_to_email() {
        let user = DirectoryUser {
            id: Uuid::new_v4(),
            email: "x@corp.test".to_string(),
            first_name: " ".to_string(),
            last_name: String::new(),
            role: Role::Employee,
            is_active: true,
            manager_id: None,
            team_id: None,
            department_id: None,
        };
        assert_eq!(user.display_name(), "x@corp.test");
    }

    #[test]
    fn test_email_key_is_case_insensitive() {
        let a = Recipient::from_email("Jane.Doe@Corp.test");
        let b = Recipient::from_email("jane.doe@corp.test ");
        assert_eq!(a.email_key(), b.email_key());
        assert_eq!(a.name, "Jane.Doe@Corp.test");
    }
}
