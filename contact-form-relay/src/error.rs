use crate::{
    compose::{ComposeError, MessageKind},
    config::Environment,
    locale::Locale,
    mailer::MailError,
    validation::FieldError,
};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt::Display;
use tracing::{error, info};

#[derive(Debug)]
pub enum ContactFormError {
    ValidationFailed(Vec<FieldError>),
    DispatchFailed {
        kind: MessageKind,
        cause: MailError,
    },
    InternalError {
        description: String,
    },
    MalformedRequest {
        description: String,
    },
}

impl ContactFormError {
    pub fn log(&self) {
        match self {
            ContactFormError::ValidationFailed(errors) => {
                info!("Rejected contact form submission with {} errors", errors.len());
            }
            ContactFormError::DispatchFailed { kind, cause } => {
                error!("Unable to send {kind} message: {cause}");
            }
            ContactFormError::InternalError { description } => {
                error!("Internal error handling contact form submission: {description}");
            }
            ContactFormError::MalformedRequest { description } => {
                info!("Malformed contact form request: {description}");
            }
        }
    }

    /// Renders the error for the caller. Failure details are only disclosed outside production.
    pub fn into_response(self, locale: Locale, environment: Environment) -> Response {
        match self {
            ContactFormError::ValidationFailed(errors) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "errors": errors })),
            )
                .into_response(),
            ContactFormError::MalformedRequest { .. } => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "message": locale.malformed_request() })),
            )
                .into_response(),
            ContactFormError::DispatchFailed { .. } => {
                let message = locale.message_not_sent();
                internal_error_response(message, environment, self.to_string())
            }
            ContactFormError::InternalError { .. } => {
                let message = locale.internal_error();
                internal_error_response(message, environment, self.to_string())
            }
        }
    }
}

fn internal_error_response(message: &str, environment: Environment, detail: String) -> Response {
    let body = match environment {
        Environment::Production => json!({ "success": false, "message": message }),
        Environment::Development => {
            json!({ "success": false, "message": message, "error": detail })
        }
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

impl From<ComposeError> for ContactFormError {
    fn from(error: ComposeError) -> Self {
        ContactFormError::InternalError {
            description: error.to_string(),
        }
    }
}

impl Display for ContactFormError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContactFormError::ValidationFailed(errors) => {
                write!(f, "Validation failed:")?;
                for error in errors {
                    write!(f, " {}", error.message)?;
                }
                Ok(())
            }
            ContactFormError::DispatchFailed { kind, cause } => {
                write!(f, "Unable to send {kind} message: {cause}")
            }
            ContactFormError::InternalError { description } => {
                write!(f, "Internal error: {description}")
            }
            ContactFormError::MalformedRequest { description } => {
                write!(f, "Malformed request: {description}")
            }
        }
    }
}

impl std::error::Error for ContactFormError {}
