//! PostgreSQL persistence module.
//!
//! Provides the shared connection pool and embedded migrations.

pub mod pool;

pub use pool::{PostgresPool, PostgresPoolError};
