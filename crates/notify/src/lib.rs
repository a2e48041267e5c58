//! Outbound email for counseling reports.
//!
//! This crate provides:
//! - `Mailer` trait for pluggable delivery, with an SMTP implementation
//! - Minijinja rendering of the built-in HTML report templates
//! - Email address validation and display-name extraction

pub mod address;
pub mod email;
pub mod templating;
pub mod traits;

pub use address::{is_valid_email, name_from_email};
pub use email::SmtpMailer;
pub use templating::ReportRenderer;
pub use traits::{Mailer, NotifyError};
