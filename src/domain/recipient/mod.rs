//! Recipient resolution.
//!
//! Turns a notification type plus its context into the deduplicated list of
//! people to email, using per-type rules, the organization hierarchy and
//! per-user opt-out preferences.
//!
//! # Architecture
//!
//! The resolver reads through the `OrganizationDirectory` trait:
//!
//! - `MemoryDirectory`: In-memory storage using DashMap (default)
//! - `PostgresDirectory`: Reads the HR schema in PostgreSQL

mod directory;
mod memory_directory;
mod postgres_directory;
mod resolver;
mod types;

pub use directory::OrganizationDirectory;
pub use memory_directory::MemoryDirectory;
pub use postgres_directory::PostgresDirectory;
pub use resolver::RecipientResolver;
pub use types::{
    DirectoryError, DirectoryResult, DirectoryUser, NotificationRule, Recipient, RecipientConfig,
    Role,
};
