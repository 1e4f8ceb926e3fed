use std::env;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::delivery::{DeliveryConfig, SmtpConfig};
use crate::template::LayoutConfig;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub smtp: SmtpSettings,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub app: AppConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Unset means the in-memory stores are used
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u64,
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpSettings {
    /// Unset means email delivery is disabled
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_from_address")]
    pub from_address: String,
    #[serde(default)]
    pub from_name: Option<String>,
    #[serde(default = "default_true")]
    pub starttls: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Records per scheduled batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Pause between sends within a batch
    #[serde(default = "default_send_delay_ms")]
    pub send_delay_ms: u64,
    #[serde(default = "default_send_timeout")]
    pub send_timeout_seconds: u64,
    #[serde(default = "default_process_interval")]
    pub process_interval_seconds: u64,
    /// A SENDING claim older than this is considered abandoned
    #[serde(default = "default_stale_after")]
    pub stale_after_seconds: u64,
    #[serde(default = "default_stale_check_interval")]
    pub stale_check_interval_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_app_url")]
    pub url: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_pool_size() -> u32 {
    10
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_idle_timeout() -> u64 {
    300 // 5 minutes
}

fn default_true() -> bool {
    true
}

fn default_smtp_port() -> u16 {
    587
}

fn default_from_address() -> String {
    "noreply@localhost".to_string()
}

fn default_batch_size() -> usize {
    50
}

fn default_max_retries() -> u32 {
    3
}

fn default_send_delay_ms() -> u64 {
    200
}

fn default_send_timeout() -> u64 {
    30
}

fn default_process_interval() -> u64 {
    60 // 1 minute
}

fn default_stale_after() -> u64 {
    600 // 10 minutes
}

fn default_stale_check_interval() -> u64 {
    300 // 5 minutes
}

fn default_app_name() -> String {
    "HR Portal".to_string()
}

fn default_app_url() -> String {
    "http://localhost:3000".to_string()
}

/// Flat environment variables and the keys they set.
///
/// `Environment` splits on the separator, which cannot express keys that
/// contain underscores, so the common ones are mapped explicitly.
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("DATABASE_URL", "database.url"),
    ("DATABASE_POOL_SIZE", "database.pool_size"),
    ("SMTP_HOST", "smtp.host"),
    ("SMTP_PORT", "smtp.port"),
    ("SMTP_USERNAME", "smtp.username"),
    ("SMTP_PASSWORD", "smtp.password"),
    ("SMTP_FROM_ADDRESS", "smtp.from_address"),
    ("SMTP_FROM_NAME", "smtp.from_name"),
    ("SMTP_STARTTLS", "smtp.starttls"),
    ("QUEUE_BATCH_SIZE", "queue.batch_size"),
    ("QUEUE_MAX_RETRIES", "queue.max_retries"),
    ("QUEUE_SEND_DELAY_MS", "queue.send_delay_ms"),
    ("QUEUE_SEND_TIMEOUT_SECONDS", "queue.send_timeout_seconds"),
    ("QUEUE_PROCESS_INTERVAL_SECONDS", "queue.process_interval_seconds"),
    ("APP_NAME", "app.name"),
    ("APP_URL", "app.url"),
];

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let mut builder = Config::builder()
            // Start with default values
            .set_default("server.host", default_host())?
            .set_default("server.port", i64::from(default_port()))?
            .set_default("queue.batch_size", default_batch_size() as i64)?
            .set_default("queue.max_retries", i64::from(default_max_retries()))?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // SERVER__PORT, QUEUE__STALE_AFTER_SECONDS, ...
            .add_source(
                Environment::default()
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(","),
            );

        // SERVER_HOST / SERVER_PORT, kept for compatibility with older deployments
        builder = builder
            .set_override_option("server.host", non_empty_env("SERVER_HOST"))?
            .set_override_option("server.port", non_empty_env("SERVER_PORT"))?;
        for (var, key) in ENV_OVERRIDES {
            builder = builder.set_override_option(*key, non_empty_env(var))?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn non_empty_env(var: &str) -> Option<String> {
    env::var(var).ok().filter(|value| !value.trim().is_empty())
}

impl DatabaseConfig {
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref().filter(|url| !url.trim().is_empty())
    }
}

impl SmtpSettings {
    /// Transport settings, or `None` when no host is configured.
    pub fn transport_config(&self) -> Option<SmtpConfig> {
        let host = self.host.as_deref().map(str::trim).filter(|h| !h.is_empty())?;
        Some(SmtpConfig {
            host: host.to_string(),
            port: self.port,
            username: self.username.clone().filter(|u| !u.is_empty()),
            password: self.password.clone().filter(|p| !p.is_empty()),
            from_address: self.from_address.clone(),
            from_name: self.from_name.clone().filter(|n| !n.is_empty()),
            starttls: self.starttls,
        })
    }
}

impl QueueConfig {
    pub fn delivery_config(&self) -> DeliveryConfig {
        DeliveryConfig {
            max_retries: self.max_retries.max(1),
            send_delay: Duration::from_millis(self.send_delay_ms),
            send_timeout: Duration::from_secs(self.send_timeout_seconds.max(1)),
            batch_size: self.batch_size.max(1),
        }
    }

    pub fn process_interval(&self) -> Duration {
        Duration::from_secs(self.process_interval_seconds.max(1))
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_seconds)
    }

    pub fn stale_check_interval(&self) -> Duration {
        Duration::from_secs(self.stale_check_interval_seconds.max(1))
    }
}

impl AppConfig {
    pub fn layout(&self) -> LayoutConfig {
        LayoutConfig {
            app_name: self.name.clone(),
            app_url: self.url.clone(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            pool_size: default_pool_size(),
            connect_timeout_seconds: default_connect_timeout(),
            idle_timeout_seconds: default_idle_timeout(),
            run_migrations: true,
        }
    }
}

impl Default for SmtpSettings {
    fn default() -> Self {
        Self {
            host: None,
            port: default_smtp_port(),
            username: None,
            password: None,
            from_address: default_from_address(),
            from_name: None,
            starttls: true,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            send_delay_ms: default_send_delay_ms(),
            send_timeout_seconds: default_send_timeout(),
            process_interval_seconds: default_process_interval(),
            stale_after_seconds: default_stale_after(),
            stale_check_interval_seconds: default_stale_check_interval(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            url: default_app_url(),
        }
    }
}
