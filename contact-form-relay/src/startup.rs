use crate::{
    compose::Composer,
    config::{Config, CredentialsSource, MailConfig, MailProvider},
    dispatch::Dispatcher,
    handler::{ContactFormHandler, HandlerConfig},
    http_api::HttpApiMailSender,
    mailer::{MailError, MailSender},
    routes::{router, AppState},
    secrets::{AwsSecretsManagerSecretRepository, EnvSecretRepository, SecretRepository},
    smtp::SmtpMailSender,
};
use axum::Router;
use std::sync::Arc;
use tracing::info;

/// Builds the one mail sender shared by every request.
pub async fn build_mail_sender(config: &MailConfig) -> Result<Arc<dyn MailSender>, MailError> {
    match config.credentials_source {
        CredentialsSource::Env => {
            build_with_repository(config, EnvSecretRepository::open().await)
        }
        CredentialsSource::AwsSecretsManager => {
            build_with_repository(config, AwsSecretsManagerSecretRepository::open().await)
        }
    }
}

fn build_with_repository<SecretRepositoryT: SecretRepository + 'static>(
    config: &MailConfig,
    secrets_repository: SecretRepositoryT,
) -> Result<Arc<dyn MailSender>, MailError> {
    Ok(match &config.provider {
        MailProvider::Smtp { url } => {
            info!("Sending mail through SMTP relay {url}");
            Arc::new(SmtpMailSender::new(
                url.as_str(),
                config.credentials_name.as_str(),
                secrets_repository,
            ))
        }
        MailProvider::HttpApi { url } => {
            info!("Sending mail through HTTP API {url}");
            Arc::new(HttpApiMailSender::new(
                url.as_str(),
                config.credentials_name.as_str(),
                secrets_repository,
            )?)
        }
    })
}

/// Wires `sender` into the request handler and returns the complete application.
pub fn build_app(config: Config, sender: Arc<dyn MailSender>) -> Router {
    let handler = ContactFormHandler::new(
        HandlerConfig {
            validation: config.validation,
            locale: config.composer.locale,
            environment: config.environment,
        },
        Composer::new(config.composer),
        Dispatcher::new(sender, config.confirmation_failure),
    );
    router(AppState::new(Arc::new(handler)), &config.allowed_origins)
}
