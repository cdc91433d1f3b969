//! Outbound email.
//!
//! Message bodies are rendered by [`EmailTemplates`] and handed to a
//! [`MailSender`]. The web binary picks the sender at startup: direct SMTP
//! when relay credentials are configured, otherwise a POST to an HTTP mail
//! endpoint, otherwise a sender that refuses every message.

use crate::error::AppError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod templates;
#[cfg(feature = "web")]
pub mod http;
#[cfg(feature = "web")]
pub mod smtp;

pub use templates::{Branding, EmailTemplates};
#[cfg(feature = "web")]
pub use http::HttpMailer;
#[cfg(feature = "web")]
pub use smtp::SmtpMailer;

/// A rendered HTML email ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Delivers one email at a time.
#[async_trait]
pub trait MailSender: Send + Sync {
    /// Send `email`, returning the transport's message id.
    async fn send(&self, email: &OutgoingEmail) -> Result<String, AppError>;
}

/// Sender used when no mail transport is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredMailer;

#[async_trait]
impl MailSender for UnconfiguredMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<String, AppError> {
        log::warn!("Dropping email to {}: no mail transport configured", email.to);
        Err(AppError::config(
            "Email delivery is not configured. Set SMTP_USERNAME/SMTP_PASSWORD or MAIL_ENDPOINT.",
        ))
    }
}
