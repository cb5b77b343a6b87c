// src/test_utils/mock_stack_server.rs
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

/// A request received by the mock server.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub authorization: Option<String>,
    pub body: Value,
}

/// A scripted reply: an SSE body or a JSON body, with a status code.
#[derive(Debug, Clone)]
pub enum MockReply {
    Sse(String),
    Json(StatusCode, Value),
}

#[derive(Clone)]
struct MockServerState {
    turn_replies: Arc<Mutex<VecDeque<MockReply>>>,
    rag_replies: Arc<Mutex<VecDeque<MockReply>>>,
    chat_replies: Arc<Mutex<VecDeque<MockReply>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockServerState {
    fn record(&self, method: Method, uri: &Uri, headers: &HeaderMap, body: Value) {
        let authorization = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.requests.lock().unwrap().push(RecordedRequest {
            method,
            path: uri.path().to_string(),
            authorization,
            body,
        });
    }
}

fn reply(next: Option<MockReply>) -> Response {
    match next {
        Some(MockReply::Sse(body)) => {
            ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
        }
        Some(MockReply::Json(status, body)) => (status, Json(body)).into_response(),
        None => {
            log::error!("Mock stack server ran out of replies!");
            (StatusCode::SERVICE_UNAVAILABLE, "no scripted reply").into_response()
        }
    }
}

fn body_json(body: &str) -> Value {
    serde_json::from_str(body).unwrap_or(Value::Null)
}

async fn turn_handler(
    State(state): State<MockServerState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    state.record(method, &uri, &headers, body_json(&body));
    let next = state.turn_replies.lock().unwrap().pop_front();
    reply(next)
}

async fn rag_handler(
    State(state): State<MockServerState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    state.record(method, &uri, &headers, body_json(&body));
    let next = state.rag_replies.lock().unwrap().pop_front();
    reply(next.or(Some(MockReply::Json(StatusCode::OK, json!({"content": []})))))
}

async fn chat_handler(
    State(state): State<MockServerState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    state.record(method, &uri, &headers, body_json(&body));
    let next = state.chat_replies.lock().unwrap().pop_front();
    reply(next)
}

async fn create_agent_handler(
    State(state): State<MockServerState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    state.record(method, &uri, &headers, body_json(&body));
    Json(json!({"agent_id": "agent-1"})).into_response()
}

async fn delete_agent_handler(
    State(state): State<MockServerState>,
    Path(agent_id): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> StatusCode {
    state.record(method, &uri, &headers, Value::Null);
    if agent_id == "missing" {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::NO_CONTENT
    }
}

async fn create_session_handler(
    State(state): State<MockServerState>,
    Path(agent_id): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    state.record(method, &uri, &headers, body_json(&body));
    Json(json!({"session_id": format!("session-of-{}", agent_id)})).into_response()
}

async fn models_handler(
    State(state): State<MockServerState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Json<Value> {
    state.record(method, &uri, &headers, Value::Null);
    Json(json!({
        "data": [
            {"identifier": "ollama/llama3.2:3b", "model_type": "llm", "provider_id": "ollama"},
            {"identifier": "all-MiniLM-L6-v2", "model_type": "embedding", "metadata": {"embedding_dimension": 384}}
        ]
    }))
}

pub struct MockStackServer {
    addr: SocketAddr,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
    state: MockServerState,
}

impl MockStackServer {
    pub async fn start() -> Self {
        let state = MockServerState {
            turn_replies: Arc::new(Mutex::new(VecDeque::new())),
            rag_replies: Arc::new(Mutex::new(VecDeque::new())),
            chat_replies: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        };

        let app = Router::new()
            .route("/v1/agents", post(create_agent_handler))
            .route("/v1/agents/{agent_id}", delete(delete_agent_handler))
            .route("/v1/agents/{agent_id}/session", post(create_session_handler))
            .route(
                "/v1/agents/{agent_id}/session/{session_id}/turn",
                post(turn_handler),
            )
            .route(
                "/v1/agents/{agent_id}/session/{session_id}/turn/{turn_id}/resume",
                post(turn_handler),
            )
            .route("/v1/tool-runtime/rag-tool/query", post(rag_handler))
            .route("/v1/models", get(models_handler))
            .route("/v1/openai/v1/chat/completions", post(chat_handler))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap_or_else(|e| {
            panic!("Failed to bind mock server to 127.0.0.1:0. Error: {}", e);
        });
        let addr = listener.local_addr().unwrap();
        log::info!("Mock stack server listening on {}", addr);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap_or_else(|e| {
                    log::error!("Mock stack server error: {}", e);
                });
        });

        MockStackServer {
            addr,
            shutdown_tx,
            state,
        }
    }

    pub fn address(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn push_turn_reply(&self, reply: MockReply) {
        self.state.turn_replies.lock().unwrap().push_back(reply);
    }

    pub fn push_rag_reply(&self, reply: MockReply) {
        self.state.rag_replies.lock().unwrap().push_back(reply);
    }

    pub fn push_chat_reply(&self, reply: MockReply) {
        self.state.chat_replies.lock().unwrap().push_back(reply);
    }

    pub fn get_requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub async fn shutdown(self) {
        if self.shutdown_tx.send(()).is_err() {
            log::warn!("Mock stack server shutdown signal already sent or receiver dropped.");
        }
    }
}
