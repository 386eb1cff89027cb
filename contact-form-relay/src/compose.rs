use crate::{locale::Locale, sanitize::SanitizedSubmission};
use chrono::{DateTime, Utc};
use lettre::{message::Mailbox, Address};
use serde::Serialize;
use serde_json::Value;
use std::fmt::Display;
use tinytemplate::{error::Error, format, format_unescaped, TinyTemplate};

const NOTIFICATION_TEMPLATE_NAME: &str = "notification";
const CONFIRMATION_TEMPLATE_NAME: &str = "confirmation";

const NOTIFICATION_TEXT_EN: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/notification.txt"
));
const NOTIFICATION_TEXT_ES: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/notification.es.txt"
));
const NOTIFICATION_HTML_EN: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/notification.html"
));
const NOTIFICATION_HTML_ES: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/notification.es.html"
));
const CONFIRMATION_TEXT_EN: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/confirmation.txt"
));
const CONFIRMATION_TEXT_ES: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/confirmation.es.txt"
));
const CONFIRMATION_HTML_EN: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/confirmation.html"
));
const CONFIRMATION_HTML_ES: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/confirmation.es.html"
));

pub const DEFAULT_PREVIEW_LENGTH: usize = 150;
const ELLIPSIS: &str = "...";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageKind {
    /// Tells the operator about the submission. Delivery of this message decides the request.
    Notification,
    /// Acknowledges receipt to the submitter.
    Confirmation,
}

impl Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageKind::Notification => write!(f, "notification"),
            MessageKind::Confirmation => write!(f, "confirmation"),
        }
    }
}

/// A fully composed message, ready to hand to a [`crate::mailer::MailSender`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    pub kind: MessageKind,
    pub from: Mailbox,
    pub to: Mailbox,
    pub reply_to: Option<Mailbox>,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct SocialLink {
    pub label: String,
    pub url: String,
}

#[derive(Clone, Debug)]
pub struct ComposerConfig {
    /// Receives the notification.
    pub operator: Mailbox,
    /// Appears as `From` on every message.
    pub sender: Mailbox,
    pub social_links: Vec<SocialLink>,
    pub preview_length: usize,
    pub send_confirmation: bool,
    pub locale: Locale,
}

pub struct Composer {
    config: ComposerConfig,
}

#[derive(Serialize)]
struct NotificationContext<'a> {
    name: &'a str,
    email: &'a str,
    message: &'a str,
    received_at: String,
}

#[derive(Serialize)]
struct ConfirmationContext<'a> {
    name: &'a str,
    preview: String,
    operator_name: &'a str,
    has_social_links: bool,
    social_links: &'a [SocialLink],
}

impl Composer {
    pub fn new(config: ComposerConfig) -> Self {
        Self { config }
    }

    /// Builds the notification and, if enabled, the confirmation for `submission`. The
    /// notification always comes first.
    pub fn compose(
        &self,
        submission: &SanitizedSubmission,
        received_at: DateTime<Utc>,
    ) -> Result<Vec<OutboundMessage>, ComposeError> {
        let submitter: Address = submission
            .email()
            .parse()
            .map_err(|_| ComposeError::InvalidAddress(submission.email().into()))?;

        let mut messages = vec![self.notification(submission, submitter.clone(), received_at)?];
        if self.config.send_confirmation {
            messages.push(self.confirmation(submission, submitter)?);
        }
        Ok(messages)
    }

    fn notification(
        &self,
        submission: &SanitizedSubmission,
        submitter: Address,
        received_at: DateTime<Utc>,
    ) -> Result<OutboundMessage, ComposeError> {
        let context = NotificationContext {
            name: submission.name(),
            email: submission.email(),
            message: submission.message(),
            received_at: received_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        };
        let (text_template, html_template) = match self.config.locale {
            Locale::Es => (NOTIFICATION_TEXT_ES, NOTIFICATION_HTML_ES),
            Locale::En => (NOTIFICATION_TEXT_EN, NOTIFICATION_HTML_EN),
        };
        Ok(OutboundMessage {
            kind: MessageKind::Notification,
            from: self.config.sender.clone(),
            to: self.config.operator.clone(),
            reply_to: Some(Mailbox::new(None, submitter)),
            subject: self.config.locale.notification_subject(submission.name()),
            text_body: render_text(NOTIFICATION_TEMPLATE_NAME, text_template, &context)?,
            html_body: render_html(NOTIFICATION_TEMPLATE_NAME, html_template, &context)?,
        })
    }

    fn confirmation(
        &self,
        submission: &SanitizedSubmission,
        submitter: Address,
    ) -> Result<OutboundMessage, ComposeError> {
        let context = ConfirmationContext {
            name: submission.name(),
            preview: preview(submission.message(), self.config.preview_length),
            operator_name: self
                .config
                .sender
                .name
                .as_deref()
                .unwrap_or(self.config.sender.email.as_ref()),
            has_social_links: !self.config.social_links.is_empty(),
            social_links: &self.config.social_links,
        };
        let (text_template, html_template) = match self.config.locale {
            Locale::Es => (CONFIRMATION_TEXT_ES, CONFIRMATION_HTML_ES),
            Locale::En => (CONFIRMATION_TEXT_EN, CONFIRMATION_HTML_EN),
        };
        Ok(OutboundMessage {
            kind: MessageKind::Confirmation,
            from: self.config.sender.clone(),
            to: Mailbox::new(Some(submission.name().into()), submitter),
            reply_to: None,
            subject: self.config.locale.confirmation_subject().into(),
            text_body: render_text(CONFIRMATION_TEMPLATE_NAME, text_template, &context)?,
            html_body: render_html(CONFIRMATION_TEMPLATE_NAME, html_template, &context)?,
        })
    }
}

/// The first `length` characters of `message`, with an ellipsis appended if anything was cut.
fn preview(message: &str, length: usize) -> String {
    match message.char_indices().nth(length) {
        Some((cut, _)) => format!("{}{ELLIPSIS}", &message[..cut]),
        None => message.into(),
    }
}

fn render_text(
    name: &'static str,
    template: &'static str,
    context: &impl Serialize,
) -> Result<String, ComposeError> {
    let mut tt = TinyTemplate::new();
    tt.set_default_formatter(&format_unescaped);
    tt.add_template(name, template)?;
    Ok(tt.render(name, context)?)
}

fn render_html(
    name: &'static str,
    template: &'static str,
    context: &impl Serialize,
) -> Result<String, ComposeError> {
    let mut tt = TinyTemplate::new();
    tt.add_formatter("line_breaks", render_line_breaks);
    tt.add_template(name, template)?;
    Ok(tt.render(name, context)?)
}

fn render_line_breaks(value: &Value, output: &mut String) -> Result<(), Error> {
    let mut formatted = String::new();
    format(value, &mut formatted)?;
    output.push_str(&formatted.replace("\r\n", "\n").replace('\n', "<br>"));
    Ok(())
}

#[derive(Debug)]
pub enum ComposeError {
    Template(String),
    InvalidAddress(String),
}

impl From<Error> for ComposeError {
    fn from(error: Error) -> Self {
        ComposeError::Template(error.to_string())
    }
}

impl Display for ComposeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComposeError::Template(description) => {
                write!(f, "Error rendering email template: {description}")
            }
            ComposeError::InvalidAddress(address) => {
                write!(f, "Sanitized email {address} is not a valid address")
            }
        }
    }
}

impl std::error::Error for ComposeError {}
