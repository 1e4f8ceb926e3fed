//! Notification domain module.
//!
//! - `types`: Notification types, priorities and the trigger context
//! - `events`: Typed payloads for the HR events that notify
//! - `service`: The orchestrator business code calls into

mod events;
mod service;
mod types;

pub use events::{AssetDetails, LeaveRequestDetails, LeaveStatus};
pub use service::{NotificationError, NotificationService, NotifySyncResult};
pub use types::{
    NotificationContext, NotificationContextBuilder, NotificationType, Priority,
    TemplateVariables,
};
