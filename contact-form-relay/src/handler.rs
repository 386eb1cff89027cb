use crate::{
    compose::Composer,
    config::Environment,
    dispatch::{DispatchReport, Dispatcher},
    error::ContactFormError,
    locale::Locale,
    submission::ContactSubmission,
    validation::{validate, ValidationPolicy, ValidationResult},
};
use chrono::Utc;
use tracing::{debug, info};

#[derive(Clone, Debug, Default)]
pub struct HandlerConfig {
    pub validation: ValidationPolicy,
    pub locale: Locale,
    pub environment: Environment,
}

/// Runs one submission through validation, composition and dispatch. Built once at startup and
/// shared by every request.
pub struct ContactFormHandler {
    config: HandlerConfig,
    composer: Composer,
    dispatcher: Dispatcher,
}

impl ContactFormHandler {
    pub fn new(config: HandlerConfig, composer: Composer, dispatcher: Dispatcher) -> Self {
        Self {
            config,
            composer,
            dispatcher,
        }
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    pub async fn handle(
        &self,
        submission: ContactSubmission,
    ) -> Result<DispatchReport, ContactFormError> {
        debug!("Received submission {submission:?}");
        let sanitized = match validate(&submission, &self.config.validation, self.config.locale) {
            ValidationResult::Valid(sanitized) => sanitized,
            ValidationResult::Invalid(errors) => {
                return Err(ContactFormError::ValidationFailed(errors))
            }
        };

        let messages = self.composer.compose(&sanitized, Utc::now())?;

        let report = self.dispatcher.dispatch(&messages).await;
        if let Some((kind, cause)) = report.fatal_error() {
            return Err(ContactFormError::DispatchFailed {
                kind,
                cause: cause.clone(),
            });
        }
        info!(
            "Relayed contact form submission as {} message(s)",
            report.outcomes.len()
        );
        Ok(report)
    }
}
