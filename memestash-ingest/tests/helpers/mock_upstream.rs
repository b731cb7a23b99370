//! In-process mock of the Discord API, a file CDN and the vision endpoint
//!
//! Routes:
//! - `GET /api/channels/:channel_id/messages` - paged message history (newest first)
//! - `GET /files/:name` - attachment and remote image bytes
//! - `POST /v1/chat/completions` - scripted analysis replies

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use super::fixtures::valid_analysis_json;

/// One call to the message listing endpoint
#[derive(Debug, Clone)]
pub struct ListingRequest {
    pub channel_id: String,
    pub before: Option<String>,
    pub limit: Option<String>,
    pub authorization: Option<String>,
}

/// One call to the completions endpoint
#[derive(Debug, Clone)]
pub struct CapturedCompletion {
    pub authorization: Option<String>,
    pub body: Value,
}

#[derive(Default)]
struct MockState {
    channels: Mutex<HashMap<String, Vec<Value>>>,
    /// channel id → (first failing request index, status)
    channel_failures: Mutex<HashMap<String, (usize, u16)>>,
    listing_requests: Mutex<Vec<ListingRequest>>,
    files: Mutex<HashMap<String, (Option<String>, Vec<u8>)>>,
    completions: Mutex<VecDeque<(u16, String)>>,
    completion_requests: Mutex<Vec<CapturedCompletion>>,
}

pub struct MockUpstream {
    addr: SocketAddr,
    state: Arc<MockState>,
}

impl MockUpstream {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let app = Router::new()
            .route("/api/channels/:channel_id/messages", get(list_messages))
            .route("/files/:name", get(serve_file))
            .route("/v1/chat/completions", post(chat_completions))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock upstream");
        let addr = listener.local_addr().expect("mock upstream address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self { addr, state }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn discord_api_base(&self) -> String {
        format!("{}/api", self.base_url())
    }

    pub fn ai_api_base(&self) -> String {
        format!("{}/v1", self.base_url())
    }

    pub fn file_url(&self, name: &str) -> String {
        format!("{}/files/{}", self.base_url(), name)
    }

    /// Serve `bytes` at `/files/{name}`
    pub fn add_file(&self, name: &str, content_type: Option<&str>, bytes: Vec<u8>) {
        self.state
            .files
            .lock()
            .unwrap()
            .insert(name.to_string(), (content_type.map(str::to_string), bytes));
    }

    /// Build a Discord message whose attachments point at served files
    ///
    /// Each attachment is `(attachment_id, filename, content_type)`; the file
    /// itself is served under the attachment id.
    pub fn message(&self, id: &str, attachments: &[(&str, &str, &str)]) -> Value {
        let attachments: Vec<Value> = attachments
            .iter()
            .map(|(att_id, filename, content_type)| {
                json!({
                    "id": att_id,
                    "filename": filename,
                    "url": self.file_url(att_id),
                    "content_type": content_type,
                })
            })
            .collect();
        json!({ "id": id, "content": "", "attachments": attachments })
    }

    /// Set a channel's full history, newest message first
    pub fn set_channel(&self, channel_id: &str, messages: Vec<Value>) {
        self.state
            .channels
            .lock()
            .unwrap()
            .insert(channel_id.to_string(), messages);
    }

    /// Fail listing requests for a channel from the `from_request`-th call on
    pub fn fail_channel(&self, channel_id: &str, from_request: usize, status: u16) {
        self.state
            .channel_failures
            .lock()
            .unwrap()
            .insert(channel_id.to_string(), (from_request, status));
    }

    pub fn listing_requests(&self) -> Vec<ListingRequest> {
        self.state.listing_requests.lock().unwrap().clone()
    }

    /// Queue a raw completions reply; an empty queue answers with a valid analysis
    pub fn push_completion(&self, status: u16, body: impl Into<String>) {
        self.state
            .completions
            .lock()
            .unwrap()
            .push_back((status, body.into()));
    }

    /// Queue a 200 reply whose message content is `content`
    pub fn push_completion_content(&self, content: &str) {
        let body = json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] });
        self.push_completion(200, body.to_string());
    }

    pub fn completion_requests(&self) -> Vec<CapturedCompletion> {
        self.state.completion_requests.lock().unwrap().clone()
    }
}

fn authorization(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn list_messages(
    State(state): State<Arc<MockState>>,
    Path(channel_id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let request_index = {
        let mut requests = state.listing_requests.lock().unwrap();
        let index = requests.iter().filter(|r| r.channel_id == channel_id).count();
        requests.push(ListingRequest {
            channel_id: channel_id.clone(),
            before: query.get("before").cloned(),
            limit: query.get("limit").cloned(),
            authorization: authorization(&headers),
        });
        index
    };

    let failure = state.channel_failures.lock().unwrap().get(&channel_id).copied();
    if let Some((from_request, status)) = failure {
        if request_index >= from_request {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            return (status, "forced failure").into_response();
        }
    }

    let Some(messages) = state.channels.lock().unwrap().get(&channel_id).cloned() else {
        return (StatusCode::NOT_FOUND, r#"{"message":"Unknown Channel"}"#).into_response();
    };

    let limit: usize = query
        .get("limit")
        .and_then(|l| l.parse().ok())
        .unwrap_or(50);
    let start = match query.get("before") {
        Some(before) => messages
            .iter()
            .position(|m| m["id"] == before.as_str())
            .map(|p| p + 1)
            .unwrap_or(messages.len()),
        None => 0,
    };

    let page: Vec<Value> = messages.into_iter().skip(start).take(limit).collect();
    Json(page).into_response()
}

async fn serve_file(State(state): State<Arc<MockState>>, Path(name): Path<String>) -> Response {
    match state.files.lock().unwrap().get(&name).cloned() {
        Some((Some(content_type), bytes)) => {
            ([(header::CONTENT_TYPE, content_type)], bytes).into_response()
        }
        Some((None, bytes)) => bytes.into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn chat_completions(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state
        .completion_requests
        .lock()
        .unwrap()
        .push(CapturedCompletion {
            authorization: authorization(&headers),
            body,
        });

    let scripted = state.completions.lock().unwrap().pop_front();
    match scripted {
        Some((status, body)) => {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
        }
        None => Json(json!({
            "choices": [{ "message": { "role": "assistant", "content": valid_analysis_json("Mock meme") } }]
        }))
        .into_response(),
    }
}
