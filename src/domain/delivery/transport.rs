//! Mail transport boundary.
//!
//! The delivery engine only needs `send_mail(to, subject, html)`. The SMTP
//! implementation is built once at bootstrap and injected; tests inject
//! fakes.

use std::time::Duration;

use async_trait::async_trait;
use lazy_static::lazy_static;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use regex::Regex;
use thiserror::Error;

/// Errors reported by a mail transport
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Email transport is not configured")]
    NotConfigured,

    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    #[error("Failed to build email: {0}")]
    Build(String),

    #[error("SMTP error: {0}")]
    Smtp(String),

    #[error("Send timed out after {0:?}")]
    Timeout(Duration),
}

/// Something that can deliver one HTML email.
///
/// # Thread Safety
///
/// Implementations must be thread-safe (`Send + Sync`); one instance is
/// shared by every batch run.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send_mail(&self, to: &str, subject: &str, html: &str) -> Result<(), TransportError>;

    /// Whether the transport has enough configuration to attempt a send.
    fn is_configured(&self) -> bool;

    /// Check connectivity with the upstream relay.
    async fn verify(&self) -> Result<(), TransportError>;
}

lazy_static! {
    /// `local@domain.tld`; domain labels must be non-empty.
    static ref EMAIL_ADDRESS: Regex =
        Regex::new(r"^[^\s@]+@[^\s@.]+(\.[^\s@.]+)+$").expect("valid email regex");
}

/// Simple `local@domain` shape check run before every send.
pub fn is_valid_email(address: &str) -> bool {
    EMAIL_ADDRESS.is_match(address.trim())
}

/// SMTP settings used to build [`SmtpMailTransport`]
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: String,
    pub from_name: Option<String>,
    /// Use STARTTLS; plain connections are for local relays only
    pub starttls: bool,
}

/// SMTP transport backed by lettre's async tokio transport.
pub struct SmtpMailTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailTransport {
    pub fn new(config: &SmtpConfig) -> Result<Self, TransportError> {
        let from = match &config.from_name {
            Some(name) => format!("{} <{}>", name, config.from_address),
            None => config.from_address.clone(),
        };
        let from: Mailbox = from
            .parse()
            .map_err(|e: lettre::address::AddressError| TransportError::InvalidAddress(e.to_string()))?;

        let mut builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| TransportError::Smtp(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        }
        .port(config.port);

        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        tracing::info!(
            host = %config.host,
            port = config.port,
            starttls = config.starttls,
            "SMTP transport configured"
        );

        Ok(Self {
            mailer: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    async fn send_mail(&self, to: &str, subject: &str, html: &str) -> Result<(), TransportError> {
        let to: Mailbox = to
            .parse()
            .map_err(|e: lettre::address::AddressError| TransportError::InvalidAddress(e.to_string()))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html.to_string())
            .map_err(|e| TransportError::Build(e.to_string()))?;

        self.mailer
            .send(email)
            .await
            .map_err(|e| TransportError::Smtp(e.to_string()))?;

        Ok(())
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn verify(&self) -> Result<(), TransportError> {
        match self.mailer.test_connection().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(TransportError::Smtp("SMTP server rejected NOOP".to_string())),
            Err(e) => Err(TransportError::Smtp(e.to_string())),
        }
    }
}

/// Stand-in used when no SMTP host is configured.
///
/// Every send fails, so records accumulate retries and eventually surface as
/// `FAILED` in the delivery log instead of vanishing.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledTransport;

#[async_trait]
impl MailTransport for DisabledTransport {
    async fn send_mail(&self, _to: &str, _subject: &str, _html: &str) -> Result<(), TransportError> {
        Err(TransportError::NotConfigured)
    }

    fn is_configured(&self) -> bool {
        false
    }

    async fn verify(&self) -> Result<(), TransportError> {
        Err(TransportError::NotConfigured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("jane@corp.test"));
        assert!(is_valid_email("jane.doe+hr@mail.corp.test"));
        assert!(is_valid_email("  jane@corp.test "));
        assert!(!is_valid_email("jane"));
        assert!(!is_valid_email("jane@corp"));
        assert!(!is_valid_email("jane@.corp.test"));
        assert!(!is_valid_email("jane@corp.test."));
        assert!(!is_valid_email("ja ne@corp.test"));
        assert!(!is_valid_email("@corp.test"));
    }

    #[tokio::test]
    async fn test_disabled_transport() {
        let transport = DisabledTransport;
        assert!(!transport.is_configured());
        assert!(matches!(
            transport.send_mail("a@corp.test", "s", "b").await,
            Err(TransportError::NotConfigured)
        ));
    }

    #[test]
    fn test_smtp_transport_rejects_bad_sender() {
        let config = SmtpConfig {
            host: "localhost".to_string(),
            port: 2525,
            username: None,
            password: None,
            from_address: "not an address".to_string(),
            from_name: None,
            starttls: false,
        };
        assert!(matches!(
            SmtpMailTransport::new(&config),
            Err(TransportError::InvalidAddress(_))
        ));
    }

    #[tokio::test]
    async fn test_smtp_transport_builds_with_display_name() {
        let config = SmtpConfig {
            host: "localhost".to_string(),
            port: 2525,
            username: Some("user".to_string()),
            password: Some("secret".to_string()),
            from_address: "hr@corp.test".to_string(),
            from_name: Some("HR Portal".to_string()),
            starttls: false,
        };
        let transport = SmtpMailTransport::new(&config).unwrap();
        assert!(transport.is_configured());
    }
}
