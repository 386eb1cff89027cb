use async_trait::async_trait;
use aws_config::BehaviorVersion;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt::Display;

/// Source of mail provider credentials. Secrets are JSON objects whose keys are named like
/// environment variables, e.g. `{"SMTP_USERNAME": "...", "SMTP_PASSWORD": "..."}`.
#[async_trait]
pub trait SecretRepository: Send + Sync {
    async fn open() -> Self
    where
        Self: Sized;

    async fn get_secret<T: DeserializeOwned>(&self, name: &str) -> Result<T, SecretError>;
}

/// Older deployments name the SMTP credentials `EMAIL_USER` and `EMAIL_PASS`. Each pair is
/// (fallback, preferred).
const LEGACY_VARIABLES: &[(&str, &str)] = &[
    ("EMAIL_USER", "SMTP_USERNAME"),
    ("EMAIL_PASS", "SMTP_PASSWORD"),
];

/// Reads secret fields straight from the process environment. The secret name is only used in
/// error messages; each field of `T` is looked up as an environment variable of the same name.
#[derive(Clone, Default)]
pub struct EnvSecretRepository;

impl EnvSecretRepository {
    fn lookup<T: DeserializeOwned>(
        name: &str,
        vars: impl Iterator<Item = (String, String)>,
    ) -> Result<T, SecretError> {
        let mut fields: Map<String, Value> = vars
            .map(|(key, value)| (key, Value::String(value)))
            .collect();
        for (legacy, preferred) in LEGACY_VARIABLES {
            if let Some(value) = fields.remove(*legacy) {
                fields.entry(*preferred).or_insert(value);
            }
        }
        serde_json::from_value(Value::Object(fields))
            .map_err(|error| SecretError::Missing(format!("{name}: {error}")))
    }
}

#[async_trait]
impl SecretRepository for EnvSecretRepository {
    async fn open() -> Self {
        Self
    }

    async fn get_secret<T: DeserializeOwned>(&self, name: &str) -> Result<T, SecretError> {
        let vars = std::env::vars_os().filter_map(|(key, value)| {
            Some((key.into_string().ok()?, value.into_string().ok()?))
        });
        Self::lookup(name, vars)
    }
}

#[derive(Clone)]
pub struct AwsSecretsManagerSecretRepository(aws_sdk_secretsmanager::Client);

#[async_trait]
impl SecretRepository for AwsSecretsManagerSecretRepository {
    async fn open() -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Ok(url) = std::env::var("AWS_ENDPOINT_URL") {
            loader = loader.endpoint_url(url);
        }
        let config = loader.load().await;
        let secrets_client = aws_sdk_secretsmanager::Client::new(&config);
        Self(secrets_client)
    }

    async fn get_secret<T: DeserializeOwned>(&self, name: &str) -> Result<T, SecretError> {
        let secret = self
            .0
            .get_secret_value()
            .secret_id(name)
            .send()
            .await
            .map_err(|error| SecretError::Backend(format!("{name}: {error}")))?;
        let Some(secret_value) = secret.secret_string() else {
            return Err(SecretError::Missing(name.into()));
        };
        serde_json::from_str(secret_value)
            .map_err(|error| SecretError::Malformed(format!("{name}: {error}")))
    }
}

#[derive(Debug)]
pub enum SecretError {
    Missing(String),
    Malformed(String),
    Backend(String),
}

impl Display for SecretError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecretError::Missing(description) => write!(f, "Missing secret {description}"),
            SecretError::Malformed(description) => write!(f, "Malformed secret {description}"),
            SecretError::Backend(description) => {
                write!(f, "Unable to retrieve secret {description}")
            }
        }
    }
}

impl std::error::Error for SecretError {}
