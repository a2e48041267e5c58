//! SMTP delivery via `lettre` with STARTTLS.

use crate::traits::{Mailer, NotifyError};
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use pathfinder_core::config::EmailConfig;
use tracing::{info, warn};

/// Sends HTML emails through an SMTP relay.
///
/// Built without a transport when email is disabled or credentials are
/// missing; every send then reports `Ok(false)` without connecting.
#[derive(Debug)]
pub struct SmtpMailer {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: Option<Mailbox>,
}

impl SmtpMailer {
    pub fn disabled() -> Self {
        Self {
            transport: None,
            from: None,
        }
    }

    pub fn from_config(config: &EmailConfig) -> Result<Self, NotifyError> {
        if !config.enabled || !config.is_configured() {
            info!(enabled = config.enabled, "SMTP mailer inactive");
            return Ok(Self::disabled());
        }

        let (Some(username), Some(password)) = (&config.username, &config.password) else {
            return Ok(Self::disabled());
        };
        let from_email = config.from_email.as_deref().unwrap_or(username);
        let from: Mailbox = format!("{} <{}>", config.from_name, from_email)
            .parse()
            .map_err(|e: lettre::address::AddressError| NotifyError::Config(e.to_string()))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| NotifyError::Config(e.to_string()))?
            .port(config.smtp_port)
            .credentials(Credentials::new(username.clone(), password.clone()))
            .build();

        info!(host = %config.smtp_host, port = config.smtp_port, "SMTP mailer ready");
        Ok(Self {
            transport: Some(transport),
            from: Some(from),
        })
    }

    pub fn is_active(&self) -> bool {
        self.transport.is_some()
    }
}

#[async_trait::async_trait]
impl Mailer for SmtpMailer {
    async fn send_email(&self, to: &str, subject: &str, html: &str) -> Result<bool, NotifyError> {
        let (Some(transport), Some(from)) = (&self.transport, &self.from) else {
            warn!(to = %to, "email not sent: SMTP is not configured");
            return Ok(false);
        };

        let recipient: Mailbox = to
            .parse()
            .map_err(|e: lettre::address::AddressError| NotifyError::Config(e.to_string()))?;

        let email = Message::builder()
            .from(from.clone())
            .to(recipient)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html.to_string())
            .map_err(|e| NotifyError::Smtp(e.to_string()))?;

        transport
            .send(email)
            .await
            .map_err(|e| NotifyError::Smtp(e.to_string()))?;

        info!(channel = "smtp", to = %to, subject = %subject, "email delivered");
        Ok(true)
    }

    fn channel_name(&self) -> &str {
        "smtp"
    }
}
