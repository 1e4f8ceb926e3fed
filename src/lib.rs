// Infrastructure layer (shared components)
pub mod infrastructure;

// Re-export infrastructure modules at the crate root
pub use infrastructure::config;
pub use infrastructure::error;
pub use infrastructure::metrics;
pub use infrastructure::postgres;

// Domain layer (business logic)
pub mod domain;

pub use domain::delivery;
pub use domain::notification;
pub use domain::recipient;
pub use domain::template;

// Application layer
pub mod api;
pub mod server;

// Supporting modules
pub mod tasks;
