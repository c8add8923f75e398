use lettre::{
    Message, SmtpTransport, Transport,
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
};
use log::{info, warn};
use thiserror::Error;

use crate::config::MailSettings;
use crate::models::OutgoingEmail;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("email not configured")]
    NotConfigured,

    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("failed to build message: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("smtp failure: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("mail task failed: {0}")]
    Join(String),
}

/// Delivery contract consumed by the outbox.
#[rocket::async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError>;
}

pub struct SmtpMailer {
    settings: MailSettings,
}

impl SmtpMailer {
    pub fn new(settings: MailSettings) -> Self {
        SmtpMailer { settings }
    }

    fn try_send(settings: &MailSettings, email: &OutgoingEmail) -> Result<(), MailError> {
        let from_mailbox: Mailbox = settings.from.parse()?;
        let to_mailbox: Mailbox = email.to.parse()?;

        let email_message = Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(email.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(email.html.clone())?;

        let creds = Credentials::new(settings.user.clone(), settings.password.clone());
        let mailer = SmtpTransport::starttls_relay(&settings.host)?
            .port(settings.port)
            .credentials(creds)
            .build();

        mailer.send(&email_message)?;
        Ok(())
    }
}

#[rocket::async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        if !self.settings.is_configured() {
            warn!("Email credentials not configured. Skipping email to {}", email.to);
            return Err(MailError::NotConfigured);
        }

        let settings = self.settings.clone();
        let message = email.clone();
        tokio::task::spawn_blocking(move || Self::try_send(&settings, &message))
            .await
            .map_err(|e| MailError::Join(e.to_string()))??;

        info!("Email '{}' sent to {}", email.subject, email.to);
        Ok(())
    }
}
