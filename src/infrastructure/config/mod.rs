mod settings;

pub use settings::{
    AppConfig, DatabaseConfig, QueueConfig, ServerConfig, Settings, SmtpSettings,
};
