use axum::{
    extract::{Json, State},
    http::{header, HeaderMap, StatusCode},
    routing::post,
    Router,
};
use log::debug;
use serde_json::{json, Value};
use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
};
use tokio::net::TcpListener;

pub const SEND_PATH: &str = "/emails";
pub const API_KEY: &str = "fake API key";

#[derive(Clone, Default)]
struct FakeMailApiState {
    received: Arc<Mutex<Vec<Value>>>,
    failure: Option<StatusCode>,
}

/// An HTTP mail API in the style of Resend, served on an ephemeral local port for as long as the
/// current Tokio runtime lives.
pub struct FakeMailApi {
    address: SocketAddr,
    state: FakeMailApiState,
}

impl FakeMailApi {
    pub async fn start() -> Self {
        Self::serve(FakeMailApiState::default()).await
    }

    /// Answers every request with `status` and an error body instead of accepting it.
    pub async fn start_failing(status: StatusCode) -> Self {
        Self::serve(FakeMailApiState {
            failure: Some(status),
            ..Default::default()
        })
        .await
    }

    async fn serve(state: FakeMailApiState) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let app = Router::new()
            .route(SEND_PATH, post(send))
            .with_state(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { address, state }
    }

    pub fn url(&self) -> String {
        format!("http://{}{SEND_PATH}", self.address)
    }

    /// Every payload accepted so far, in arrival order.
    pub fn received(&self) -> Vec<Value> {
        self.state.received.lock().unwrap().clone()
    }
}

async fn send(
    State(state): State<FakeMailApiState>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> (StatusCode, Json<Value>) {
    debug!("Got mail API request:\n{payload:#}");
    let authorised = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        == Some(format!("Bearer {API_KEY}").as_str());
    if !authorised {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "name": "missing_api_key", "message": "Invalid API key" })),
        );
    }
    if let Some(status) = state.failure {
        return (
            status,
            Json(json!({ "name": "application_error", "message": "Fake failure" })),
        );
    }
    let mut received = state.received.lock().unwrap();
    received.push(payload);
    let id = format!("fake-{}", received.len());
    (StatusCode::OK, Json(json!({ "id": id })))
}
