use crate::{
    config::{AllowedOrigins, Environment},
    error::ContactFormError,
    handler::ContactFormHandler,
    locale::Locale,
    submission::ContactSubmission,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;
use std::{any::Any, sync::Arc, time::Instant};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{self, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::error;

#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<ContactFormHandler>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(handler: Arc<ContactFormHandler>) -> Self {
        Self {
            handler,
            started_at: Instant::now(),
        }
    }

    fn locale(&self) -> Locale {
        self.handler.config().locale
    }

    fn environment(&self) -> Environment {
        self.handler.config().environment
    }
}

pub fn router(state: AppState, allowed_origins: &AllowedOrigins) -> Router {
    let locale = state.locale();
    Router::new()
        .route("/", get(index).fallback(not_found))
        .route("/health", get(health).fallback(not_found))
        .route("/send-email", post(send_email).fallback(not_found))
        .fallback(not_found)
        .with_state(state)
        .layer(CatchPanicLayer::custom(
            move |panic: Box<dyn Any + Send + 'static>| panic_response(panic, locale),
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(allowed_origins))
}

fn cors_layer(allowed_origins: &AllowedOrigins) -> CorsLayer {
    let allow_origin = match allowed_origins {
        AllowedOrigins::Any => AllowOrigin::from(cors::Any),
        AllowedOrigins::List(origins) => AllowOrigin::list(origins.iter().cloned()),
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

async fn send_email(
    State(state): State<AppState>,
    payload: Result<Json<ContactSubmission>, JsonRejection>,
) -> Response {
    let result = match payload {
        Ok(Json(submission)) => state.handler.handle(submission).await,
        Err(rejection) => Err(ContactFormError::MalformedRequest {
            description: rejection.body_text(),
        }),
    };
    match result {
        Ok(_) => Json(json!({
            "success": true,
            "message": state.locale().message_sent(),
        }))
        .into_response(),
        Err(error) => {
            error.log();
            error.into_response(state.locale(), state.environment())
        }
    }
}

async fn index(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "message": state.locale().api_running(),
    }))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn not_found(State(state): State<AppState>) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "success": false, "message": state.locale().route_not_found() })),
    )
        .into_response()
}

fn panic_response(panic: Box<dyn Any + Send + 'static>, locale: Locale) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");
    error!("Panic while handling request: {detail}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "success": false, "message": locale.internal_error() })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::{router, AppState};
    use crate::{
        compose::{tests::composer_config, Composer, MessageKind, OutboundMessage},
        config::{AllowedOrigins, Environment},
        dispatch::{ConfirmationFailurePolicy, Dispatcher},
        handler::{ContactFormHandler, HandlerConfig},
        locale::Locale,
        mailer::{test_support::FakeMailSender, MailError, MailSender},
        validation::ValidationPolicy,
    };
    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        Router,
    };
    use googletest::prelude::*;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    struct PanickingMailSender;

    #[async_trait]
    impl MailSender for PanickingMailSender {
        async fn send(&self, _: &OutboundMessage) -> std::result::Result<String, MailError> {
            panic!("mail sender exploded");
        }
    }

    fn app_with(sender: Arc<dyn MailSender>, locale: Locale, environment: Environment) -> Router {
        let handler = ContactFormHandler::new(
            HandlerConfig {
                validation: ValidationPolicy::standard(),
                locale,
                environment,
            },
            Composer::new(composer_config(locale)),
            Dispatcher::new(sender, ConfirmationFailurePolicy::BestEffort),
        );
        router(AppState::new(Arc::new(handler)), &AllowedOrigins::Any)
    }

    fn app(sender: Arc<FakeMailSender>) -> Router {
        app_with(sender, Locale::En, Environment::Development)
    }

    fn post_json(body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/send-email")
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.into())
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn respond(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn relays_valid_submission() -> Result<()> {
        let sender = Arc::new(FakeMailSender::new());

        let (status, body) = respond(
            app(sender.clone()),
            post_json(
                json!({ "name": "Ana", "email": "ana@example.com", "message": "Hola, quiero info" })
                    .to_string(),
            ),
        )
        .await;

        verify_that!(status, eq(StatusCode::OK))?;
        verify_that!(
            body,
            eq(json!({ "success": true, "message": Locale::En.message_sent() }))
        )?;
        verify_that!(sender.attempts(), len(eq(2)))
    }

    #[tokio::test]
    async fn reports_every_validation_error() -> Result<()> {
        let sender = Arc::new(FakeMailSender::new());

        let (status, body) = respond(
            app(sender.clone()),
            post_json(json!({ "name": "A", "email": "bad", "message": "short" }).to_string()),
        )
        .await;

        verify_that!(status, eq(StatusCode::BAD_REQUEST))?;
        verify_that!(body["success"], eq(json!(false)))?;
        verify_that!(
            body["errors"]
                .as_array()
                .unwrap()
                .iter()
                .map(|error| (error["field"].clone(), error["code"].clone()))
                .collect::<Vec<_>>(),
            elements_are![
                eq((json!("name"), json!("too_short"))),
                eq((json!("email"), json!("invalid_format"))),
                eq((json!("message"), json!("too_short")))
            ]
        )?;
        verify_that!(sender.attempts(), empty())
    }

    #[tokio::test]
    async fn treats_missing_fields_as_required() -> Result<()> {
        let (status, body) = respond(
            app(Arc::new(FakeMailSender::new())),
            post_json(json!({ "name": "Ana" }).to_string()),
        )
        .await;

        verify_that!(status, eq(StatusCode::BAD_REQUEST))?;
        verify_that!(
            body["errors"],
            eq(json!([
                { "field": "email", "code": "required", "message": "Email is required" },
                { "field": "message", "code": "required", "message": "Message is required" }
            ]))
        )
    }

    #[tokio::test]
    async fn rejects_malformed_json() -> Result<()> {
        let (status, body) = respond(
            app(Arc::new(FakeMailSender::new())),
            post_json("{ not json"),
        )
        .await;

        verify_that!(status, eq(StatusCode::BAD_REQUEST))?;
        verify_that!(
            body,
            eq(json!({ "success": false, "message": Locale::En.malformed_request() }))
        )
    }

    #[tokio::test]
    async fn rejects_missing_content_type() -> Result<()> {
        let request = Request::builder()
            .method("POST")
            .uri("/send-email")
            .body(Body::from(r#"{"name": "Ana"}"#))
            .unwrap();

        let (status, body) = respond(app(Arc::new(FakeMailSender::new())), request).await;

        verify_that!(status, eq(StatusCode::BAD_REQUEST))?;
        verify_that!(body["success"], eq(json!(false)))
    }

    #[tokio::test]
    async fn reports_failed_notification() -> Result<()> {
        let sender = Arc::new(FakeMailSender::failing_on(MessageKind::Notification));

        let (status, body) = respond(
            app_with(sender, Locale::Es, Environment::Production),
            post_json(
                json!({ "name": "Ana", "email": "ana@example.com", "message": "Hola, quiero info" })
                    .to_string(),
            ),
        )
        .await;

        verify_that!(status, eq(StatusCode::INTERNAL_SERVER_ERROR))?;
        verify_that!(
            body,
            eq(json!({ "success": false, "message": Locale::Es.message_not_sent() }))
        )
    }

    #[tokio::test]
    async fn succeeds_when_only_confirmation_fails() -> Result<()> {
        let sender = Arc::new(FakeMailSender::failing_on(MessageKind::Confirmation));

        let (status, body) = respond(
            app(sender),
            post_json(
                json!({ "name": "Ana", "email": "ana@example.com", "message": "Hola, quiero info" })
                    .to_string(),
            ),
        )
        .await;

        verify_that!(status, eq(StatusCode::OK))?;
        verify_that!(body["success"], eq(json!(true)))
    }

    #[tokio::test]
    async fn turns_panic_into_internal_error() -> Result<()> {
        let (status, body) = respond(
            app_with(
                Arc::new(PanickingMailSender),
                Locale::En,
                Environment::Development,
            ),
            post_json(
                json!({ "name": "Ana", "email": "ana@example.com", "message": "Hola, quiero info" })
                    .to_string(),
            ),
        )
        .await;

        verify_that!(status, eq(StatusCode::INTERNAL_SERVER_ERROR))?;
        verify_that!(
            body,
            eq(json!({ "success": false, "message": Locale::En.internal_error() }))
        )
    }

    #[tokio::test]
    async fn describes_service() -> Result<()> {
        let (status, body) = respond(app(Arc::new(FakeMailSender::new())), get("/")).await;

        verify_that!(status, eq(StatusCode::OK))?;
        verify_that!(
            body,
            eq(json!({
                "status": "ok",
                "service": "contact-form-relay",
                "version": env!("CARGO_PKG_VERSION"),
                "message": Locale::En.api_running()
            }))
        )
    }

    #[tokio::test]
    async fn reports_health() -> Result<()> {
        let (status, body) = respond(app(Arc::new(FakeMailSender::new())), get("/health")).await;

        verify_that!(status, eq(StatusCode::OK))?;
        verify_that!(body["status"], eq(json!("ok")))?;
        verify_that!(body["uptime_seconds"].as_u64(), some(anything()))?;
        verify_that!(
            body["timestamp"]
                .as_str()
                .map(chrono::DateTime::parse_from_rfc3339)
                .map(|parsed| parsed.is_ok()),
            some(eq(true))
        )
    }

    #[tokio::test]
    async fn answers_unknown_route_with_localized_json() -> Result<()> {
        let app = app_with(
            Arc::new(FakeMailSender::new()),
            Locale::Es,
            Environment::Production,
        );

        let (status, body) = respond(app, get("/nope")).await;

        verify_that!(status, eq(StatusCode::NOT_FOUND))?;
        verify_that!(
            body,
            eq(json!({ "success": false, "message": "Ruta no encontrada" }))
        )
    }

    #[tokio::test]
    async fn answers_wrong_method_with_localized_json() -> Result<()> {
        let app = app_with(
            Arc::new(FakeMailSender::new()),
            Locale::Es,
            Environment::Production,
        );

        let (status, body) = respond(app.clone(), get("/send-email")).await;

        verify_that!(status, eq(StatusCode::NOT_FOUND))?;
        verify_that!(
            body,
            eq(json!({ "success": false, "message": "Ruta no encontrada" }))
        )?;

        let (status, body) = respond(app, post_json("{}")).await;
        verify_that!(status, eq(StatusCode::BAD_REQUEST))?;
        verify_that!(body["success"], eq(json!(false)))
    }

    #[tokio::test]
    async fn answers_post_to_index_with_localized_json() -> Result<()> {
        let request = Request::builder()
            .method("POST")
            .uri("/")
            .body(Body::empty())
            .unwrap();

        let (status, body) = respond(app(Arc::new(FakeMailSender::new())), request).await;

        verify_that!(status, eq(StatusCode::NOT_FOUND))?;
        verify_that!(
            body,
            eq(json!({ "success": false, "message": Locale::En.route_not_found() }))
        )
    }
}
