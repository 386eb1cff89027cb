use crate::{
    compose::OutboundMessage,
    mailer::{MailError, MailSender},
    secrets::SecretRepository,
};
use async_once_cell::OnceCell;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_MAIL_API_URL: &str = "https://api.resend.com/emails";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Sends mail through a transactional mail service which accepts one JSON document per message
/// and authenticates with a bearer API key.
pub struct HttpApiMailSender<SecretRepositoryT: SecretRepository> {
    client: Client,
    api_url: String,
    credentials_name: String,
    secrets_repository: SecretRepositoryT,
    credentials: OnceCell<MailApiCredentials>,
}

#[derive(Deserialize)]
struct MailApiCredentials {
    #[serde(rename = "MAIL_API_KEY")]
    api_key: String,
}

#[derive(Serialize)]
struct SendEmailPayload<'a> {
    from: String,
    to: [String; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<String>,
    subject: &'a str,
    text: &'a str,
    html: &'a str,
}

#[derive(Deserialize)]
struct SendEmailResponse {
    id: String,
}

impl<SecretRepositoryT: SecretRepository> HttpApiMailSender<SecretRepositoryT> {
    pub fn new(
        api_url: impl Into<String>,
        credentials_name: impl Into<String>,
        secrets_repository: SecretRepositoryT,
    ) -> Result<Self, MailError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|error| MailError::Connection(error.to_string()))?;
        Ok(Self {
            client,
            api_url: api_url.into(),
            credentials_name: credentials_name.into(),
            secrets_repository,
            credentials: Default::default(),
        })
    }

    async fn api_key(&self) -> Result<&str, MailError> {
        let credentials = self
            .credentials
            .get_or_try_init(async {
                info!("Retrieving mail API key {}", self.credentials_name);
                self.secrets_repository
                    .get_secret::<MailApiCredentials>(&self.credentials_name)
                    .await
                    .map_err(|error| MailError::Credentials(error.to_string()))
            })
            .await?;
        Ok(&credentials.api_key)
    }
}

#[async_trait]
impl<SecretRepositoryT: SecretRepository> MailSender for HttpApiMailSender<SecretRepositoryT> {
    async fn send(&self, message: &OutboundMessage) -> Result<String, MailError> {
        let api_key = self.api_key().await?;
        let payload = SendEmailPayload {
            from: message.from.to_string(),
            to: [message.to.to_string()],
            reply_to: message.reply_to.as_ref().map(ToString::to_string),
            subject: &message.subject,
            text: &message.text_body,
            html: &message.html_body,
        };
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|error| MailError::Connection(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Mail API returned {status}: {body}");
            return Err(if status.is_client_error() {
                MailError::Rejected(format!("{status}: {body}"))
            } else {
                MailError::Delivery(format!("{status}: {body}"))
            });
        }
        let body: SendEmailResponse = response
            .json()
            .await
            .map_err(|error| MailError::Delivery(format!("Unreadable response: {error}")))?;
        Ok(body.id)
    }
}
