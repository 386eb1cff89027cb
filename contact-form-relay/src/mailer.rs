use crate::compose::OutboundMessage;
use async_trait::async_trait;
use std::fmt::Display;

/// The capability of delivering one composed message through a mail provider.
///
/// A single sender is built at startup and shared by every in-flight request, so
/// implementations must tolerate concurrent calls.
#[async_trait]
pub trait MailSender: Send + Sync {
    /// Delivers `message` and returns the provider's identifier for it.
    async fn send(&self, message: &OutboundMessage) -> Result<String, MailError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailError {
    InvalidMessage(String),
    Credentials(String),
    Connection(String),
    Rejected(String),
    Delivery(String),
}

impl Display for MailError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MailError::InvalidMessage(description) => {
                write!(f, "Error building message: {description}")
            }
            MailError::Credentials(description) => {
                write!(f, "Unable to obtain mail credentials: {description}")
            }
            MailError::Connection(description) => {
                write!(f, "Unable to connect to mail provider: {description}")
            }
            MailError::Rejected(description) => {
                write!(f, "Mail provider rejected message: {description}")
            }
            MailError::Delivery(description) => write!(f, "Error sending message: {description}"),
        }
    }
}

impl std::error::Error for MailError {}
