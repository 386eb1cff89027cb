use axum::http::StatusCode;
use contact_form_relay::{
    config::Config,
    startup::{build_app, build_mail_sender},
};
use googletest::prelude::*;
use serde_json::{json, Value};
use serial_test::serial;
use std::{collections::HashMap, sync::OnceLock, time::Duration};
use test_support::{
    fake_mail_api::{FakeMailApi, API_KEY},
    fake_smtp::{start_poisoned_smtp_server, FakeSmtpServer, ReceivedMail, POISONED_SMTP_PORT},
    setup_logging,
};
use tokio::{net::TcpListener, time::timeout};

fn fake_smtp() -> &'static FakeSmtpServer {
    static FAKE_SMTP: OnceLock<FakeSmtpServer> = OnceLock::new();
    FAKE_SMTP.get_or_init(FakeSmtpServer::new)
}

/// Starts the complete service on an ephemeral port and returns its base URL.
async fn start_service(vars: &[(&str, &str)]) -> String {
    let mut vars: HashMap<String, String> = vars
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    vars.entry("OPERATOR_EMAIL".into())
        .or_insert_with(|| "owner@example.com".into());
    vars.entry("OPERATOR_NAME".into())
        .or_insert_with(|| "Site Owner".into());
    vars.entry("LOCALE".into()).or_insert_with(|| "en".into());
    let config = Config::from_lookup(|name| vars.get(name).cloned()).unwrap();
    let sender = build_mail_sender(&config.mail).await.unwrap();
    let app = build_app(config, sender);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{address}")
}

async fn submit(base_url: &str, payload: Value) -> (StatusCode, Value) {
    let response = reqwest::Client::new()
        .post(format!("{base_url}/send-email"))
        .json(&payload)
        .send()
        .await
        .unwrap();
    let status = StatusCode::from_u16(response.status().as_u16()).unwrap();
    (status, response.json().await.unwrap())
}

fn valid_submission() -> Value {
    json!({ "name": "Ana", "email": "ana@example.com", "message": "Hola, quiero info" })
}

#[googletest::test]
#[tokio::test]
#[serial]
async fn relays_submission_through_smtp() {
    setup_logging();
    fake_smtp().start();
    fake_smtp().flush().await;
    let base_url = start_service(&[("SMTP_URL", FakeSmtpServer::smtp_url().as_str())]).await;

    let (status, body) = submit(&base_url, valid_submission()).await;

    expect_that!(status, eq(StatusCode::OK));
    expect_that!(
        body,
        eq(json!({ "success": true, "message": "Message sent successfully" }))
    );
    expect_that!(
        timeout(Duration::from_secs(2), fake_smtp().next_mail()).await,
        ok(some(all!(
            field!(ReceivedMail.recipients, elements_are![eq("owner@example.com")]),
            field!(
                ReceivedMail.content,
                all!(
                    contains_substring("Reply-To: ana@example.com"),
                    contains_substring("Subject: Message from Ana"),
                    contains_substring("Hola, quiero info")
                )
            )
        )))
    );
    expect_that!(
        timeout(Duration::from_secs(2), fake_smtp().next_mail()).await,
        ok(some(all!(
            field!(ReceivedMail.recipients, elements_are![eq("ana@example.com")]),
            field!(
                ReceivedMail.content,
                all!(
                    contains_substring("Subject: We have received your message"),
                    contains_substring("Hola, quiero info")
                )
            )
        )))
    );
}

#[googletest::test]
#[tokio::test]
#[serial]
async fn rejects_brackets_only_submission() {
    setup_logging();
    fake_smtp().start();
    fake_smtp().flush().await;
    let base_url = start_service(&[("SMTP_URL", FakeSmtpServer::smtp_url().as_str())]).await;

    let (status, body) = submit(
        &base_url,
        json!({ "name": "<>", "email": "ana@example.com", "message": "<<<<<<<<<<" }),
    )
    .await;

    expect_that!(status, eq(StatusCode::BAD_REQUEST));
    expect_that!(
        body["errors"],
        eq(json!([
            { "field": "name", "code": "required", "message": "Name is required" },
            { "field": "message", "code": "required", "message": "Message is required" }
        ]))
    );
    expect_that!(
        timeout(Duration::from_millis(500), fake_smtp().next_mail()).await,
        err(anything())
    );
}

#[googletest::test]
#[tokio::test]
#[serial]
async fn does_not_send_invalid_submission() {
    setup_logging();
    fake_smtp().start();
    fake_smtp().flush().await;
    let base_url = start_service(&[("SMTP_URL", FakeSmtpServer::smtp_url().as_str())]).await;

    let (status, body) = submit(
        &base_url,
        json!({ "name": "A", "email": "bad", "message": "short" }),
    )
    .await;

    expect_that!(status, eq(StatusCode::BAD_REQUEST));
    expect_that!(body["errors"].as_array().map(Vec::len), some(eq(3)));
    expect_that!(
        timeout(Duration::from_millis(500), fake_smtp().next_mail()).await,
        err(anything())
    );
}

#[googletest::test]
#[tokio::test]
#[serial]
async fn hides_smtp_failure_detail_in_production() {
    setup_logging();
    start_poisoned_smtp_server();
    let smtp_url = format!("smtp://localhost:{POISONED_SMTP_PORT}");
    let base_url = start_service(&[
        ("SMTP_URL", smtp_url.as_str()),
        ("APP_ENVIRONMENT", "production"),
    ])
    .await;

    let (status, body) = submit(&base_url, valid_submission()).await;

    expect_that!(status, eq(StatusCode::INTERNAL_SERVER_ERROR));
    expect_that!(
        body,
        eq(json!({ "success": false, "message": "Error sending the message" }))
    );
}

#[googletest::test]
#[tokio::test]
#[serial]
async fn relays_submission_through_http_api() {
    setup_logging();
    std::env::set_var("MAIL_API_KEY", API_KEY);
    let api = FakeMailApi::start().await;
    let base_url = start_service(&[
        ("MAIL_PROVIDER", "http-api"),
        ("MAIL_API_URL", api.url().as_str()),
        ("SEND_CONFIRMATION", "false"),
    ])
    .await;

    let (status, _) = submit(&base_url, valid_submission()).await;

    expect_that!(status, eq(StatusCode::OK));
    let received = api.received();
    assert_that!(received, len(eq(1)));
    expect_that!(received[0]["subject"].as_str(), some(eq("Message from Ana")));
    expect_that!(received[0]["reply_to"].as_str(), some(eq("ana@example.com")));
}

#[googletest::test]
#[tokio::test]
#[serial]
async fn shows_api_failure_detail_in_development() {
    setup_logging();
    std::env::set_var("MAIL_API_KEY", API_KEY);
    let api = FakeMailApi::start_failing(StatusCode::SERVICE_UNAVAILABLE).await;
    let base_url = start_service(&[
        ("MAIL_PROVIDER", "http-api"),
        ("MAIL_API_URL", api.url().as_str()),
        ("APP_ENVIRONMENT", "development"),
    ])
    .await;

    let (status, body) = submit(&base_url, valid_submission()).await;

    expect_that!(status, eq(StatusCode::INTERNAL_SERVER_ERROR));
    expect_that!(body["success"], eq(json!(false)));
    expect_that!(body["error"].as_str(), some(contains_substring("503")));
}

#[googletest::test]
#[tokio::test]
#[serial]
async fn answers_unknown_route_in_configured_locale() {
    let base_url = start_service(&[("LOCALE", "es")]).await;

    let response = reqwest::get(format!("{base_url}/unknown")).await.unwrap();

    expect_that!(response.status().as_u16(), eq(404));
    expect_that!(
        response.json::<Value>().await.unwrap(),
        eq(json!({ "success": false, "message": "Ruta no encontrada" }))
    );
}
