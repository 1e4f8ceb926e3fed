//! Email queue and delivery engine.
//!
//! One `EmailLog` record is stored per (notification, recipient). Batches of
//! queued records are claimed, sent through an injected `MailTransport` and
//! advanced through the status machine with bounded retry.
//!
//! # Architecture
//!
//! The engine uses a store abstraction to support different storage
//! implementations:
//!
//! - `MemoryEmailLogStore`: In-memory storage using DashMap (default)
//! - `PostgresEmailLogStore`: Persistent storage using PostgreSQL
//!
//! Use `create_stores()` to create the appropriate stores based on configuration.

mod backend;
mod engine;
mod factory;
mod memory_backend;
mod models;
mod postgres_backend;
mod transport;

pub use backend::{EmailLogStore, EmailStoreError, EmailStoreResult, FailureOutcome};
pub use engine::{DeliveryEngine, DeliveryError, DeliveryResult};
pub use factory::{create_stores, PipelineStores};
pub use memory_backend::MemoryEmailLogStore;
pub use models::{
    BatchResult, DeliveryConfig, EmailLog, EmailLogFilter, EmailLogPage, EmailLogStats,
    EmailMetadata, EmailStatus, NewEmailLog,
};
pub use postgres_backend::PostgresEmailLogStore;
pub use transport::{
    is_valid_email, DisabledTransport, MailTransport, SmtpConfig, SmtpMailTransport,
    TransportError,
};
