//! Store factories

use std::sync::Arc;

use crate::postgres::PostgresPool;
use crate::recipient::{MemoryDirectory, OrganizationDirectory, PostgresDirectory};
use crate::template::{PostgresTemplateRepository, TemplateRepository, TemplateStore};

use super::backend::EmailLogStore;
use super::memory_backend::MemoryEmailLogStore;
use super::postgres_backend::PostgresEmailLogStore;

/// The three stores the pipeline reads and writes.
#[derive(Clone)]
pub struct PipelineStores {
    pub email_logs: Arc<dyn EmailLogStore>,
    pub directory: Arc<dyn OrganizationDirectory>,
    pub templates: Arc<dyn TemplateRepository>,
}

/// Create the stores based on whether a database is available.
///
/// - With a PostgreSQL pool: `PostgresEmailLogStore`, `PostgresDirectory`
///   and `PostgresTemplateRepository`
/// - Without: the DashMap-backed in-memory stores (empty directory, built-in
///   templates only)
pub fn create_stores(postgres_pool: Option<&PostgresPool>) -> PipelineStores {
    match postgres_pool {
        Some(pool) => {
            tracing::info!(backend = "postgres", "Creating PostgreSQL pipeline stores");
            PipelineStores {
                email_logs: Arc::new(PostgresEmailLogStore::new(pool.pool().clone())),
                directory: Arc::new(PostgresDirectory::new(pool.pool().clone())),
                templates: Arc::new(PostgresTemplateRepository::new(pool.pool().clone())),
            }
        }
        None => {
            tracing::warn!(
                backend = "memory",
                "No database configured, delivery records will not survive a restart"
            );
            PipelineStores {
                email_logs: Arc::new(MemoryEmailLogStore::new()),
                directory: Arc::new(MemoryDirectory::new()),
                templates: Arc::new(TemplateStore::new()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_stores_without_pool() {
        let stores = create_stores(None);
        assert_eq!(stores.email_logs.backend_type(), "memory");
    }
}
