use crate::{
    compose::{MessageKind, OutboundMessage},
    mailer::{MailError, MailSender},
};
use std::{str::FromStr, sync::Arc};
use tracing::{info, warn};

/// What a failed confirmation means for the request as a whole. A failed notification always
/// fails the request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConfirmationFailurePolicy {
    /// Report success as long as the operator was notified.
    #[default]
    BestEffort,
    Abort,
}

impl FromStr for ConfirmationFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "best-effort" | "best_effort" => Ok(Self::BestEffort),
            "abort" => Ok(Self::Abort),
            other => Err(format!(
                "unsupported confirmation failure policy {other}, use `best-effort` or `abort`"
            )),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent {
        kind: MessageKind,
        message_id: String,
    },
    Failed {
        kind: MessageKind,
        cause: MailError,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// One entry per attempted message, in sending order.
    pub outcomes: Vec<DispatchOutcome>,
    fatal: Option<usize>,
}

impl DispatchReport {
    pub fn is_success(&self) -> bool {
        self.fatal.is_none()
    }

    /// The failure which decided the request, if any.
    pub fn fatal_error(&self) -> Option<(MessageKind, &MailError)> {
        match self.outcomes.get(self.fatal?)? {
            DispatchOutcome::Failed { kind, cause } => Some((*kind, cause)),
            DispatchOutcome::Sent { .. } => None,
        }
    }
}

pub struct Dispatcher {
    sender: Arc<dyn MailSender>,
    confirmation_failure: ConfirmationFailurePolicy,
}

impl Dispatcher {
    pub fn new(
        sender: Arc<dyn MailSender>,
        confirmation_failure: ConfirmationFailurePolicy,
    ) -> Self {
        Self {
            sender,
            confirmation_failure,
        }
    }

    /// Sends `messages` one after the other, stopping at the first failure that decides the
    /// request.
    pub async fn dispatch(&self, messages: &[OutboundMessage]) -> DispatchReport {
        let mut report = DispatchReport::default();
        for message in messages {
            let kind = message.kind;
            match self.sender.send(message).await {
                Ok(message_id) => {
                    info!("Sent {kind} message {message_id}");
                    report
                        .outcomes
                        .push(DispatchOutcome::Sent { kind, message_id });
                }
                Err(cause) => {
                    let fatal = match kind {
                        MessageKind::Notification => true,
                        MessageKind::Confirmation => {
                            self.confirmation_failure == ConfirmationFailurePolicy::Abort
                        }
                    };
                    if !fatal {
                        warn!("Could not send {kind} message, continuing: {cause}");
                    }
                    report.outcomes.push(DispatchOutcome::Failed { kind, cause });
                    if fatal {
                        report.fatal = Some(report.outcomes.len() - 1);
                        break;
                    }
                }
            }
        }
        report
    }
}
