use serde::Deserialize;

/// A contact form submission exactly as received. Fields which are absent or `null` in the
/// request body are treated as empty by the validator.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactSubmission {
    pub name: Option<String>,
    pub email: Option<String>,
    pub message: Option<String>,
}

impl ContactSubmission {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            email: Some(email.into()),
            message: Some(message.into()),
        }
    }

    pub(crate) fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    pub(crate) fn email(&self) -> &str {
        self.email.as_deref().unwrap_or_default()
    }

    pub(crate) fn message(&self) -> &str {
        self.message.as_deref().unwrap_or_default()
    }
}
