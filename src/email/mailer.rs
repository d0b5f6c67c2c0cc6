use std::time::Duration;

use async_trait::async_trait;
use lettre::address::AddressError;
use lettre::message::{Mailbox, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

use crate::config::{SmtpConfig, SmtpTls};
use crate::secrets::{SMTP_PASSWORD, SMTP_USERNAME, SecretProvider};

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum MailError {
    #[error("Invalid address {address}: {source}")]
    Address {
        address: String,
        #[source]
        source: AddressError,
    },

    #[error("{0}")]
    NotConfigured(String),

    #[error("Failed to build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

fn mailbox(address: &str) -> Result<Mailbox, MailError> {
    address.trim().parse().map_err(|source| MailError::Address {
        address: address.to_string(),
        source,
    })
}

/// A single plain-text message with a validated recipient.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub to: Mailbox,
    pub subject: String,
    pub body: String,
}

impl OutgoingEmail {
    pub fn new(to: &str, subject: String, body: String) -> Result<Self, MailError> {
        Ok(Self {
            to: mailbox(to)?,
            subject,
            body,
        })
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig, secrets: &dyn SecretProvider) -> Result<Self, MailError> {
        let username = secrets.secret(SMTP_USERNAME);
        let password = secrets.secret(SMTP_PASSWORD);

        let sender = config
            .sender
            .clone()
            .or_else(|| username.clone())
            .ok_or_else(|| {
                MailError::NotConfigured("SMTP_SENDER or SMTP_USERNAME must be set.".to_string())
            })?;

        let builder = match config.tls {
            SmtpTls::Implicit => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?,
            SmtpTls::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?,
            SmtpTls::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host),
        };
        let mut builder = builder.port(config.port).timeout(Some(SMTP_TIMEOUT));
        match (username, password) {
            (Some(username), Some(password)) => {
                builder = builder.credentials(Credentials::new(username, password));
            }
            (Some(_), None) => tracing::warn!("SMTP_USERNAME set without SMTP_PASSWORD, sending unauthenticated"),
            _ => {}
        }

        Ok(Self {
            transport: builder.build(),
            sender: mailbox(&sender)?,
        })
    }

    fn compose(&self, email: &OutgoingEmail) -> Result<Message, MailError> {
        Ok(Message::builder()
            .from(self.sender.clone())
            .to(email.to.clone())
            .subject(email.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(email.body.clone())?)
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        let message = self.compose(email)?;
        let response = self.transport.send(message).await?;
        tracing::info!(
            "Email to {} accepted by SMTP server ({})",
            email.to,
            response.code()
        );
        Ok(())
    }
}
