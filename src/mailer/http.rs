//! Delivery through an HTTP mail endpoint (`POST {to, subject, html}`).
//!
//! The endpoint answers `{success, messageId}` or `{success: false, error}`;
//! this repository's own `/api/send-email` relay speaks the same protocol.

use super::{MailSender, OutgoingEmail};
use crate::error::AppError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EndpointReply {
    #[serde(default)]
    success: bool,
    message_id: Option<String>,
    error: Option<String>,
}

pub struct HttpMailer {
    client: Client,
    endpoint: String,
}

impl HttpMailer {
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl MailSender for HttpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<String, AppError> {
        let response = self.client.post(&self.endpoint).json(email).send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let reply = serde_json::from_str::<EndpointReply>(&body).ok();

        match reply {
            Some(reply) if status.is_success() && reply.success => {
                log::info!("Email sent to {} via {}", email.to, self.endpoint);
                Ok(reply.message_id.unwrap_or_default())
            }
            Some(EndpointReply {
                error: Some(error), ..
            }) => Err(AppError::mail(error)),
            _ => Err(AppError::mail(format!(
                "Failed to send email (HTTP {})",
                status.as_u16()
            ))),
        }
    }
}
