use crate::submission::ContactSubmission;

/// A submission whose fields are safe to interpolate into generated mail.
///
/// Only [`crate::validation::validate`] hands these out, so holding one means these exact values
/// passed every rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedSubmission {
    name: String,
    email: String,
    message: String,
}

impl SanitizedSubmission {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

pub(crate) fn sanitize(submission: &ContactSubmission) -> SanitizedSubmission {
    SanitizedSubmission {
        name: sanitize_text(submission.name()),
        email: sanitize_email(submission.email()),
        message: sanitize_text(submission.message()),
    }
}

/// Removes angle brackets, then trims. Trimming last keeps the function idempotent.
pub fn sanitize_text(value: &str) -> String {
    value
        .chars()
        .filter(|c| *c != '<' && *c != '>')
        .collect::<String>()
        .trim()
        .to_string()
}

pub fn sanitize_email(value: &str) -> String {
    value.trim().to_lowercase()
}
