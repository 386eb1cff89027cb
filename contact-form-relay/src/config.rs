use crate::{
    compose::{ComposerConfig, SocialLink, DEFAULT_PREVIEW_LENGTH},
    dispatch::ConfirmationFailurePolicy,
    http_api::DEFAULT_MAIL_API_URL,
    locale::Locale,
    smtp::DEFAULT_SMTP_URL,
    validation::ValidationPolicy,
};
use axum::http::HeaderValue;
use lettre::{message::Mailbox, Address};
use std::{fmt::Display, net::IpAddr, str::FromStr};

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_CREDENTIALS_SECRET_NAME: &str = "contact-form-credentials";
const DEFAULT_OPERATOR_NAME: &str = "Contact form";

/// Controls how much failure detail reaches the caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!(
                "unsupported environment {other}, use `development` or `production`"
            )),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MailProvider {
    Smtp { url: String },
    HttpApi { url: String },
}

/// The `MAIL_PROVIDER` choice, before its URL is resolved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum ProviderKind {
    #[default]
    Smtp,
    HttpApi,
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "smtp" => Ok(Self::Smtp),
            "http-api" => Ok(Self::HttpApi),
            other => Err(format!("unsupported provider {other}, use `smtp` or `http-api`")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CredentialsSource {
    Env,
    AwsSecretsManager,
}

impl FromStr for CredentialsSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "env" => Ok(Self::Env),
            "aws-secrets-manager" => Ok(Self::AwsSecretsManager),
            other => Err(format!(
                "unsupported credentials source {other}, use `env` or `aws-secrets-manager`"
            )),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MailConfig {
    pub provider: MailProvider,
    pub credentials_source: CredentialsSource,
    pub credentials_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AllowedOrigins {
    Any,
    List(Vec<HeaderValue>),
}

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: IpAddr,
    pub port: u16,
    pub environment: Environment,
    pub validation: ValidationPolicy,
    pub confirmation_failure: ConfirmationFailurePolicy,
    pub composer: ComposerConfig,
    pub mail: MailConfig,
    pub allowed_origins: AllowedOrigins,
}

impl Config {
    /// Reads the configuration from the process environment, after loading `.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &'static str| lookup(name).filter(|value| !value.trim().is_empty());

        let locale: Locale = parse_or(var("LOCALE"), "LOCALE", Locale::default())?;
        let operator_email: Address = match var("OPERATOR_EMAIL").or_else(|| var("EMAIL_USER")) {
            Some(value) => parse("OPERATOR_EMAIL", &value)?,
            None => return Err(ConfigError::Missing("OPERATOR_EMAIL")),
        };
        let sender_email: Address = match var("FROM_ADDRESS") {
            Some(value) => parse("FROM_ADDRESS", &value)?,
            None => operator_email.clone(),
        };
        let operator_name = var("OPERATOR_NAME").unwrap_or_else(|| DEFAULT_OPERATOR_NAME.into());

        let provider = match parse_or(
            var("MAIL_PROVIDER"),
            "MAIL_PROVIDER",
            ProviderKind::default(),
        )? {
            ProviderKind::Smtp => MailProvider::Smtp {
                url: var("SMTP_URL").unwrap_or_else(|| DEFAULT_SMTP_URL.into()),
            },
            ProviderKind::HttpApi => MailProvider::HttpApi {
                url: var("MAIL_API_URL").unwrap_or_else(|| DEFAULT_MAIL_API_URL.into()),
            },
        };

        Ok(Self {
            bind_address: parse_or(
                var("BIND_ADDRESS"),
                "BIND_ADDRESS",
                IpAddr::from([0, 0, 0, 0]),
            )?,
            port: parse_or(var("PORT"), "PORT", DEFAULT_PORT)?,
            environment: parse_or(
                var("APP_ENVIRONMENT"),
                "APP_ENVIRONMENT",
                Environment::default(),
            )?,
            validation: parse_or(
                var("VALIDATION_PROFILE"),
                "VALIDATION_PROFILE",
                ValidationPolicy::standard(),
            )?,
            confirmation_failure: parse_or(
                var("CONFIRMATION_FAILURE_POLICY"),
                "CONFIRMATION_FAILURE_POLICY",
                ConfirmationFailurePolicy::default(),
            )?,
            composer: ComposerConfig {
                operator: Mailbox::new(Some(operator_name.clone()), operator_email),
                sender: Mailbox::new(Some(operator_name), sender_email),
                social_links: parse_social_links(var("SOCIAL_LINKS"))?,
                preview_length: parse_or(
                    var("PREVIEW_LENGTH"),
                    "PREVIEW_LENGTH",
                    DEFAULT_PREVIEW_LENGTH,
                )?,
                send_confirmation: parse_flag(var("SEND_CONFIRMATION"), "SEND_CONFIRMATION", true)?,
                locale,
            },
            mail: MailConfig {
                provider,
                credentials_source: parse_or(
                    var("CREDENTIALS_SOURCE"),
                    "CREDENTIALS_SOURCE",
                    CredentialsSource::Env,
                )?,
                credentials_name: var("CREDENTIALS_SECRET_NAME")
                    .unwrap_or_else(|| DEFAULT_CREDENTIALS_SECRET_NAME.into()),
            },
            allowed_origins: parse_allowed_origins(var("ALLOWED_ORIGINS"))?,
        })
    }

    pub fn locale(&self) -> Locale {
        self.composer.locale
    }
}

fn parse<T: FromStr>(variable: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    value
        .trim()
        .parse()
        .map_err(|error: T::Err| ConfigError::Invalid {
            variable,
            description: error.to_string(),
        })
}

fn parse_or<T: FromStr>(
    value: Option<String>,
    variable: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    value.map_or(Ok(default), |value| parse(variable, &value))
}

fn parse_flag(
    value: Option<String>,
    variable: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    let Some(value) = value else {
        return Ok(default);
    };
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(ConfigError::Invalid {
            variable,
            description: format!("expected true or false, got {other}"),
        }),
    }
}

fn parse_social_links(value: Option<String>) -> Result<Vec<SocialLink>, ConfigError> {
    let Some(value) = value else {
        return Ok(vec![]);
    };
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((label, url)) if !label.trim().is_empty() && !url.trim().is_empty() => {
                Ok(SocialLink {
                    label: label.trim().into(),
                    url: url.trim().into(),
                })
            }
            _ => Err(ConfigError::Invalid {
                variable: "SOCIAL_LINKS",
                description: format!("expected Label=url, got {entry}"),
            }),
        })
        .collect()
}

fn parse_allowed_origins(value: Option<String>) -> Result<AllowedOrigins, ConfigError> {
    let Some(value) = value else {
        return Ok(AllowedOrigins::Any);
    };
    if value.trim() == "*" {
        return Ok(AllowedOrigins::Any);
    }
    value
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(|origin| {
            HeaderValue::from_str(origin).map_err(|error| ConfigError::Invalid {
                variable: "ALLOWED_ORIGINS",
                description: format!("{origin}: {error}"),
            })
        })
        .collect::<Result<_, _>>()
        .map(AllowedOrigins::List)
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid {
        variable: &'static str,
        description: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Missing(variable) => {
                write!(f, "Missing required environment variable {variable}")
            }
            ConfigError::Invalid {
                variable,
                description,
            } => write!(f, "Invalid value for {variable}: {description}"),
        }
    }
}

impl std::error::Error for ConfigError {}
