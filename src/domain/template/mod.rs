//! Email template system.
//!
//! This module provides:
//! - Operator templates with variable placeholders ({{variable}})
//! - Compiled-in default templates for every notification type
//! - Variable substitution and the shared HTML layout
//! - Authoring-time syntax validation
//!
//! # Example
//!
//! ```ignore
//! let engine = TemplateEngine::new(create_template_store(), LayoutConfig::default());
//!
//! let mut variables = TemplateVariables::new();
//! variables.insert("leaveType".into(), "Annual Leave".into());
//!
//! let rendered = engine
//!     .render(NotificationType::LeaveRequestApproved, &variables)
//!     .await;
//! assert_eq!(rendered.subject, "Leave Request Approved - Annual Leave");
//! ```

mod defaults;
mod engine;
mod layout;
mod postgres_store;
mod store;
mod substitution;
mod types;
mod validation;

pub use defaults::default_template;
pub use engine::TemplateEngine;
pub use layout::{wrap_in_layout, LayoutConfig};
pub use postgres_store::PostgresTemplateRepository;
pub use store::{create_template_store, TemplateRepository, TemplateStore};
pub use substitution::render_variables;
pub use types::{
    CreateTemplateRequest, DefaultTemplate, EmailTemplate, RenderedEmail, TemplateError,
    TemplateResult, TemplateValidation, UpdateTemplateRequest,
};
pub use validation::validate_template_syntax;
