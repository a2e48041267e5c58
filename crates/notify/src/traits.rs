//! Mailer trait definition and shared error types.

/// Errors that can occur while rendering or delivering an email.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("SMTP delivery failed: {0}")]
    Smtp(String),

    #[error("Template rendering failed: {0}")]
    Template(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Delivery channel for HTML emails.
///
/// `Ok(false)` means the mail was not sent (disabled or unconfigured transport);
/// `Err` means delivery was attempted and failed. Implementations never retry.
#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    async fn send_email(&self, to: &str, subject: &str, html: &str) -> Result<bool, NotifyError>;

    /// Human-readable name for this channel (e.g., "smtp").
    fn channel_name(&self) -> &str;
}

#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    pub struct SentEmail {
        pub to: String,
        pub subject: String,
        pub html: String,
    }

    /// Captures every send; reports the configured outcome.
    pub struct RecordingMailer {
        sent: Mutex<Vec<SentEmail>>,
        accept: bool,
    }

    impl RecordingMailer {
        pub fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                accept: true,
            }
        }

        /// A mailer whose transport reports every send as not delivered.
        pub fn rejecting() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                accept: false,
            }
        }

        pub fn sent(&self) -> Vec<SentEmail> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Default for RecordingMailer {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait::async_trait]
    impl Mailer for RecordingMailer {
        async fn send_email(&self, to: &str, subject: &str, html: &str) -> Result<bool, NotifyError> {
            self.sent.lock().unwrap().push(SentEmail {
                to: to.to_string(),
                subject: subject.to_string(),
                html: html.to_string(),
            });
            Ok(self.accept)
        }

        fn channel_name(&self) -> &str {
            "recording"
        }
    }
}
