use anyhow::anyhow;
use contact_form_relay::{
    config::Config,
    startup::{build_app, build_mail_sender},
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let in_lambda = std::env::var("AWS_LAMBDA_RUNTIME_API").is_ok();
    if in_lambda {
        // CloudWatch adds its own timestamps and does not render colours.
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_target(false)
            .with_ansi(false)
            .without_time()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_target(false)
            .init();
    }

    let config = Config::from_env()?;
    let address = SocketAddr::from((config.bind_address, config.port));
    let sender = build_mail_sender(&config.mail).await?;
    let app = build_app(config, sender);

    if in_lambda {
        lambda_http::run(app).await.map_err(|error| anyhow!(error))
    } else {
        let listener = TcpListener::bind(address).await?;
        info!("Listening on {address}");
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!("Unable to listen for shutdown signal: {error}");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
