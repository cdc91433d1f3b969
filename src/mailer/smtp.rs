//! Direct SMTP delivery through an authenticated relay (STARTTLS).

use super::{MailSender, OutgoingEmail};
use crate::config::SmtpConfig;
use crate::error::AppError;
use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use uuid::Uuid;

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, AppError> {
        let from: Mailbox = config.from.parse()?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        log::info!("SMTP relay configured: {}:{}", config.host, config.port);
        Ok(Self { transport, from })
    }

    fn build_message(&self, email: &OutgoingEmail) -> Result<(Message, String), AppError> {
        let message_id = format!("<{}@{}>", Uuid::new_v4(), self.from.email.domain());
        let message = Message::builder()
            .from(self.from.clone())
            .to(email.to.parse()?)
            .subject(email.subject.as_str())
            .message_id(Some(message_id.clone()))
            .header(ContentType::TEXT_HTML)
            .body(email.html.clone())?;
        Ok((message, message_id))
    }
}

#[async_trait]
impl MailSender for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<String, AppError> {
        let (message, message_id) = self.build_message(email)?;
        self.transport.send(message).await?;
        log::info!("Email sent to {} ({})", email.to, message_id);
        Ok(message_id)
    }
}
