//! Typed business events and the template variables they produce.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::types::{NotificationType, TemplateVariables};

const DATE_FORMAT: &str = "%b %d, %Y";

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn insert_opt(variables: &mut TemplateVariables, key: &str, value: &Option<String>) {
    if let Some(value) = value {
        variables.insert(key.to_string(), json!(value));
    }
}

/// Leave request lifecycle transitions that notify
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaveStatus {
    Submitted,
    Approved,
    Rejected,
    Cancelled,
}

impl LeaveStatus {
    pub fn notification_type(&self) -> NotificationType {
        match self {
            LeaveStatus::Submitted => NotificationType::LeaveRequestSubmitted,
            LeaveStatus::Approved => NotificationType::LeaveRequestApproved,
            LeaveStatus::Rejected => NotificationType::LeaveRequestRejected,
            LeaveStatus::Cancelled => NotificationType::LeaveRequestCancelled,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRequestDetails {
    pub request_id: Uuid,
    /// The employee who requested the leave
    pub employee_id: Uuid,
    pub employee_name: String,
    pub leave_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_days: f64,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub approver_name: Option<String>,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub action_url: Option<String>,
}

impl LeaveRequestDetails {
    pub fn to_variables(&self) -> TemplateVariables {
        let mut variables = TemplateVariables::new();
        variables.insert("employeeName".into(), json!(self.employee_name));
        variables.insert("leaveType".into(), json!(self.leave_type));
        variables.insert("startDate".into(), json!(format_date(self.start_date)));
        variables.insert("endDate".into(), json!(format_date(self.end_date)));
        variables.insert("totalDays".into(), json!(self.total_days));
        insert_opt(&mut variables, "reason", &self.reason);
        insert_opt(&mut variables, "approverName", &self.approver_name);
        insert_opt(&mut variables, "comments", &self.comments);
        insert_opt(&mut variables, "actionUrl", &self.action_url);
        variables
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetDetails {
    pub asset_id: Uuid,
    /// The employee holding the asset
    pub employee_id: Uuid,
    pub employee_name: String,
    pub asset_name: String,
    pub asset_tag: String,
    #[serde(default)]
    pub category: Option<String>,
    /// Assignment or return date
    pub date: NaiveDate,
    /// Who assigned it (assignment only)
    #[serde(default)]
    pub handled_by: Option<String>,
    /// Condition on return (return only)
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl AssetDetails {
    pub fn to_assigned_variables(&self) -> TemplateVariables {
        let mut variables = self.common_variables();
        variables.insert("assignedDate".into(), json!(format_date(self.date)));
        insert_opt(&mut variables, "assignedBy", &self.handled_by);
        variables
    }

    pub fn to_returned_variables(&self) -> TemplateVariables {
        let mut variables = self.common_variables();
        variables.insert("returnedDate".into(), json!(format_date(self.date)));
        insert_opt(&mut variables, "condition", &self.condition);
        variables
    }

    fn common_variables(&self) -> TemplateVariables {
        let mut variables = TemplateVariables::new();
        variables.insert("employeeName".into(), json!(self.employee_name));
        variables.insert("assetName".into(), json!(self.asset_name));
        variables.insert("assetTag".into(), json!(self.asset_tag));
        insert_opt(&mut variables, "assetCategory", &self.category);
        insert_opt(&mut variables, "notes", &self.notes);
        variables
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leave() -> LeaveRequestDetails {
        LeaveRequestDetails {
            request_id: Uuid::new_v4(),
            employee_id: Uuid::new_v4(),
            employee_name: "Ana Lima".to_string(),
            leave_type: "Annual Leave".to_string(),
            start_date: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 7, 5).unwrap(),
            total_days: 5.0,
            reason: None,
            approver_name: Some("Bo Chen".to_string()),
            comments: None,
            action_url: None,
        }
    }

    #[test]
    fn test_leave_variables() {
        let variables = leave().to_variables();
        assert_eq!(variables["leaveType"], "Annual Leave");
        assert_eq!(variables["startDate"], "Jul 01, 2024");
        assert_eq!(variables["approverName"], "Bo Chen");
        assert!(!variables.contains_key("reason"));
    }

    #[test]
    fn test_leave_status_mapping() {
        assert_eq!(
            LeaveStatus::Approved.notification_type(),
            NotificationType::LeaveRequestApproved
        );
        assert_eq!(
            LeaveStatus::Cancelled.notification_type(),
            NotificationType::LeaveRequestCancelled
        );
    }

    #[test]
    fn test_asset_variables_differ_by_direction() {
        let asset = AssetDetails {
            asset_id: Uuid::new_v4(),
            employee_id: Uuid::new_v4(),
            employee_name: "Ana".to_string(),
            asset_name: "Laptop".to_string(),
            asset_tag: "LT-001".to_string(),
            category: Some("IT".to_string()),
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            handled_by: Some("IT Desk".to_string()),
            condition: Some("Good".to_string()),
            notes: None,
        };

        let assigned = asset.to_assigned_variables();
        assert_eq!(assigned["assignedBy"], "IT Desk");
        assert!(!assigned.contains_key("condition"));

        let returned = asset.to_returned_variables();
        assert_eq!(returned["returnedDate"], "Jan 02, 2024");
        assert_eq!(returned["condition"], "Good");
    }
}
