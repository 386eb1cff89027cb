use crate::{
    compose::OutboundMessage,
    mailer::{MailError, MailSender},
    secrets::SecretRepository,
};
use async_once_cell::OnceCell;
use async_trait::async_trait;
use lettre::{
    message::MultiPart,
    transport::smtp::authentication::{Credentials, Mechanism},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde::Deserialize;
use tracing::info;

pub const DEFAULT_SMTP_URL: &str = "smtps://smtp.gmail.com";

/// Sends mail through an SMTP relay. The pooled transport is built on first use and shared by
/// all later sends; if building it fails, the next send tries again.
pub struct SmtpMailSender<SecretRepositoryT: SecretRepository> {
    smtp_url: String,
    credentials_name: String,
    secrets_repository: SecretRepositoryT,
    mailer: OnceCell<AsyncSmtpTransport<Tokio1Executor>>,
}

#[derive(Deserialize)]
struct SmtpCredentials {
    #[serde(rename = "SMTP_USERNAME")]
    username: String,
    #[serde(rename = "SMTP_PASSWORD")]
    password: String,
}

impl<SecretRepositoryT: SecretRepository> SmtpMailSender<SecretRepositoryT> {
    pub fn new(
        smtp_url: impl Into<String>,
        credentials_name: impl Into<String>,
        secrets_repository: SecretRepositoryT,
    ) -> Self {
        Self {
            smtp_url: smtp_url.into(),
            credentials_name: credentials_name.into(),
            secrets_repository,
            mailer: Default::default(),
        }
    }

    async fn initialise_mailer(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, MailError> {
        info!("initialise_mailer: Connecting to {}", self.smtp_url);
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::from_url(&self.smtp_url)
            .map_err(|error| MailError::Connection(error.to_string()))?
            .authentication(vec![Mechanism::Plain, Mechanism::Login]);

        // Credentials are only ever sent over TLS. A relay which insists on authentication over
        // plain text will reject the connection instead.
        if self.uses_tls() {
            let credentials: SmtpCredentials = self
                .secrets_repository
                .get_secret(&self.credentials_name)
                .await
                .map_err(|error| MailError::Credentials(error.to_string()))?;
            builder = builder.credentials(Credentials::new(
                credentials.username,
                credentials.password,
            ));
        }

        Ok(builder.build())
    }

    fn uses_tls(&self) -> bool {
        self.smtp_url.starts_with("smtps://") || self.smtp_url.contains("tls=required")
    }
}

fn build_message(message: &OutboundMessage) -> Result<Message, MailError> {
    let mut builder = Message::builder()
        .from(message.from.clone())
        .to(message.to.clone())
        .subject(message.subject.as_str())
        .message_id(None);
    if let Some(reply_to) = &message.reply_to {
        builder = builder.reply_to(reply_to.clone());
    }
    builder
        .multipart(MultiPart::alternative_plain_html(
            message.text_body.clone(),
            message.html_body.clone(),
        ))
        .map_err(|error| MailError::InvalidMessage(error.to_string()))
}

#[async_trait]
impl<SecretRepositoryT: SecretRepository> MailSender for SmtpMailSender<SecretRepositoryT> {
    async fn send(&self, message: &OutboundMessage) -> Result<String, MailError> {
        let email = build_message(message)?;
        let message_id = email
            .headers()
            .get_raw("Message-ID")
            .unwrap_or_default()
            .to_string();
        let mailer = self
            .mailer
            .get_or_try_init(self.initialise_mailer())
            .await?;
        match mailer.send(email).await {
            Ok(_) => Ok(message_id),
            Err(error) if error.is_permanent() || error.is_transient() => {
                Err(MailError::Rejected(error.to_string()))
            }
            Err(error) => Err(MailError::Delivery(error.to_string())),
        }
    }
}
