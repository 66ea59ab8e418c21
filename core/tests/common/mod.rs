#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use claude_chat_client_core::{ChatClientCore, ClientConfig};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::info;

pub type ChunkSender = mpsc::Sender<Result<Bytes, io::Error>>;
type ChunkReceiver = mpsc::Receiver<Result<Bytes, io::Error>>;

/// Canned behaviour of the mock chat service.
#[derive(Debug)]
pub struct MockServerConfig {
    pub organizations_status: StatusCode,
    pub organizations: Value,
    pub chat_status: StatusCode,
    /// Body chunks written one by one for each chat request.
    pub chat_chunks: Vec<Vec<u8>>,
    /// Abort the body with an error after the last chunk.
    pub chat_fail_after_chunks: bool,
    pub chunk_delay: Duration,
    /// Body fed by the test through a [`ChunkSender`]; used for the next chat
    /// request only.
    pub manual_body: Option<ChunkReceiver>,
    pub health_status: StatusCode,
    /// Conversations known to the chat-management routes.
    pub chats: Vec<Value>,
    pub chats_status: StatusCode,
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            organizations_status: StatusCode::OK,
            organizations: json!([
                {"id": "org-1", "name": "Personal"},
                {"id": "org-2", "name": "Team"}
            ]),
            chat_status: StatusCode::OK,
            chat_chunks: Vec::new(),
            chat_fail_after_chunks: false,
            chunk_delay: Duration::from_millis(5),
            manual_body: None,
            health_status: StatusCode::OK,
            chats: vec![json!({
                "uuid": "chat-1",
                "name": "First",
                "created_at": "2024-05-01T10:00:00Z",
                "updated_at": "2024-05-01T10:05:00Z"
            })],
            chats_status: StatusCode::OK,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub content_type: Option<String>,
    pub accept: Option<String>,
    pub body: Value,
}

/// In-process chat service bound to an ephemeral port.
#[derive(Clone)]
pub struct MockServer {
    addr: SocketAddr,
    config: Arc<Mutex<MockServerConfig>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockServer {
    pub async fn start(config: MockServerConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("mock server address");

        let server = MockServer {
            addr,
            config: Arc::new(Mutex::new(config)),
            requests: Arc::new(Mutex::new(Vec::new())),
        };

        let app = server.create_app();
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock server crashed");
        });
        info!("Mock server listening on {}", addr);

        server
    }

    fn create_app(&self) -> Router {
        Router::new()
            .route("/api/organizations", get(organizations_handler))
            .route("/api/chat/:org_id", post(chat_handler))
            .route(
                "/api/organizations/:org_id/chats",
                get(list_chats_handler)
                    .post(create_chat_handler)
                    .delete(delete_chats_handler),
            )
            .route(
                "/api/organizations/:org_id/chats/:chat_id",
                get(get_chat_handler),
            )
            .route(
                "/api/organizations/:org_id/chats/:chat_id/messages",
                post(message_handler),
            )
            .route("/api/health", get(health_handler))
            .with_state(self.clone())
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn client(&self) -> ChatClientCore {
        ChatClientCore::new(ClientConfig::new(self.base_url()).with_timeout_s(30.0).unwrap())
            .expect("client for mock server")
    }

    pub fn update_config(&self, update: impl FnOnce(&mut MockServerConfig)) {
        update(&mut self.config.lock().unwrap());
    }

    /// Routes the next chat body through the returned sender.
    pub fn manual_body(&self) -> ChunkSender {
        let (tx, rx) = mpsc::channel(8);
        self.config.lock().unwrap().manual_body = Some(rx);
        tx
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn record(&self, path: String, headers: &HeaderMap, body: &str) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        self.requests.lock().unwrap().push(RecordedRequest {
            path,
            content_type: header("content-type"),
            accept: header("accept"),
            body: serde_json::from_str(body).unwrap_or(Value::Null),
        });
    }

    fn streamed_chat_response(&self) -> Response {
        let mut config = self.config.lock().unwrap();
        if !config.chat_status.is_success() {
            return (config.chat_status, "Failed to create chat").into_response();
        }

        let rx = match config.manual_body.take() {
            Some(rx) => rx,
            None => {
                let (tx, rx) = mpsc::channel(config.chat_chunks.len() + 1);
                let chunks = config.chat_chunks.clone();
                let fail = config.chat_fail_after_chunks;
                let delay = config.chunk_delay;
                tokio::spawn(async move {
                    for chunk in chunks {
                        if tx.send(Ok(Bytes::from(chunk))).await.is_err() {
                            return;
                        }
                        tokio::time::sleep(delay).await;
                    }
                    if fail {
                        let _ = tx
                            .send(Err(io::Error::new(io::ErrorKind::Other, "injected body failure")))
                            .await;
                    }
                });
                rx
            }
        };

        let body = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });

        Response::builder()
            .status(StatusCode::OK)
            .header("content-type", "text/event-stream")
            .header("cache-control", "no-cache")
            .body(Body::from_stream(body))
            .unwrap()
    }
}

async fn organizations_handler(State(server): State<MockServer>) -> Response {
    let config = server.config.lock().unwrap();
    if config.organizations_status.is_success() {
        (config.organizations_status, Json(config.organizations.clone())).into_response()
    } else {
        (
            config.organizations_status,
            Json(json!({"detail": "Failed to fetch organizations"})),
        )
            .into_response()
    }
}

async fn chat_handler(
    State(server): State<MockServer>,
    Path(org_id): Path<String>,
    headers: HeaderMap,
    body: String,
) -> Response {
    info!("chat request for org {}", org_id);
    server.record(format!("/api/chat/{}", org_id), &headers, &body);
    server.streamed_chat_response()
}

async fn message_handler(
    State(server): State<MockServer>,
    Path((org_id, chat_id)): Path<(String, String)>,
    headers: HeaderMap,
    body: String,
) -> Response {
    server.record(
        format!("/api/organizations/{}/chats/{}/messages", org_id, chat_id),
        &headers,
        &body,
    );
    server.streamed_chat_response()
}

async fn list_chats_handler(
    State(server): State<MockServer>,
    Path(org_id): Path<String>,
) -> Response {
    let config = server.config.lock().unwrap();
    if !config.chats_status.is_success() {
        return (
            config.chats_status,
            Json(json!({"detail": format!("No access to organization {}", org_id)})),
        )
            .into_response();
    }
    Json(Value::Array(config.chats.clone())).into_response()
}

async fn create_chat_handler(
    State(server): State<MockServer>,
    Path(org_id): Path<String>,
    headers: HeaderMap,
    body: String,
) -> Response {
    server.record(format!("/api/organizations/{}/chats", org_id), &headers, &body);
    let request: Value = serde_json::from_str(&body).unwrap_or(Value::Null);

    let mut config = server.config.lock().unwrap();
    let chat = json!({
        "uuid": format!("chat-{}", config.chats.len() + 1),
        "name": request["chat_name"].as_str().unwrap_or_default(),
        "created_at": "2024-05-02T09:00:00Z",
        "updated_at": "2024-05-02T09:00:00Z"
    });
    config.chats.push(chat.clone());
    Json(chat).into_response()
}

async fn get_chat_handler(
    State(server): State<MockServer>,
    Path((_org_id, chat_id)): Path<(String, String)>,
) -> Response {
    let config = server.config.lock().unwrap();
    match config.chats.iter().find(|chat| chat["uuid"] == chat_id.as_str()) {
        Some(chat) => {
            let mut chat = chat.clone();
            chat["chat_messages"] = json!([
                {"sender": "human", "text": "Hello"},
                {"sender": "assistant", "text": "Hi there"}
            ]);
            Json(chat).into_response()
        }
        None => (
            StatusCode::BAD_REQUEST,
            Json(json!({"detail": format!("Chat {} not found", chat_id)})),
        )
            .into_response(),
    }
}

async fn delete_chats_handler(
    State(server): State<MockServer>,
    Path(org_id): Path<String>,
    headers: HeaderMap,
    body: String,
) -> Response {
    server.record(format!("/api/organizations/{}/chats", org_id), &headers, &body);
    let ids: Vec<String> = serde_json::from_str(&body).unwrap_or_default();

    let mut config = server.config.lock().unwrap();
    config
        .chats
        .retain(|chat| !ids.iter().any(|id| chat["uuid"] == id.as_str()));
    Json(json!({"deleted": ids})).into_response()
}

async fn health_handler(State(server): State<MockServer>) -> Response {
    let status = server.config.lock().unwrap().health_status;
    if status.is_success() {
        Json(json!({"status": "healthy", "claude_session_key": "configured"})).into_response()
    } else {
        (
            status,
            Json(json!({"detail": "Claude session key not configured"})),
        )
            .into_response()
    }
}

/// Splits `body` into chunks at the given byte offsets.
pub fn split_at(body: &[u8], offsets: &[usize]) -> Vec<Vec<u8>> {
    let mut chunks = Vec::new();
    let mut start = 0;
    for &offset in offsets.iter().chain(std::iter::once(&body.len())) {
        // empty chunks would end a chunked body early
        if offset > start {
            chunks.push(body[start..offset].to_vec());
        }
        start = offset;
    }
    chunks
}
