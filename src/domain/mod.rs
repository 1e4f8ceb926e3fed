//! Domain layer modules
//!
//! This module contains business domain logic:
//! - `notification`: Notification types and the orchestrating service
//! - `recipient`: Rule-driven recipient resolution
//! - `template`: Email templates and rendering
//! - `delivery`: Email queue, transport and batch processing

pub mod delivery;
pub mod notification;
pub mod recipient;
pub mod template;
