//! In-process stand-in for the hosted assistant REST API.

#![allow(dead_code)]

use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

pub const API_KEY: &str = "sk-test-0123456789";

#[derive(Default)]
pub struct Recorded {
    /// "METHOD path" per request, in arrival order.
    pub requests: Vec<String>,
    pub unauthorized: usize,
    pub message_bodies: Vec<Value>,
    pub run_bodies: Vec<Value>,
    /// (purpose, file name, bytes) per upload.
    pub uploads: Vec<(String, String, Vec<u8>)>,
}

pub struct Upstream {
    pub recorded: Mutex<Recorded>,
    pub statuses: Mutex<VecDeque<&'static str>>,
    pub reply: Mutex<String>,
    pub fail_runs: bool,
}

impl Upstream {
    pub fn new(statuses: &[&'static str]) -> Arc<Self> {
        Arc::new(Self {
            recorded: Mutex::new(Recorded::default()),
            statuses: Mutex::new(statuses.iter().copied().collect()),
            reply: Mutex::new("Hoi! Waarmee kan ik helpen?".into()),
            fail_runs: false,
        })
    }

    pub fn failing_runs() -> Arc<Self> {
        Arc::new(Self {
            recorded: Mutex::new(Recorded::default()),
            statuses: Mutex::new(VecDeque::new()),
            reply: Mutex::new(String::new()),
            fail_runs: true,
        })
    }

    pub fn requests(&self) -> Vec<String> {
        self.recorded.lock().unwrap().requests.clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.requests().iter().filter(|r| r.starts_with(prefix)).count()
    }

    fn record(&self, headers: &HeaderMap, request: String) -> Result<(), StatusCode> {
        let mut recorded = self.recorded.lock().unwrap();
        recorded.requests.push(request);
        let auth = headers.get("authorization").and_then(|v| v.to_str().ok());
        let beta = headers.get("openai-beta").and_then(|v| v.to_str().ok());
        let expected = format!("Bearer {API_KEY}");
        if auth != Some(expected.as_str()) || beta != Some("assistants=v2") {
            recorded.unauthorized += 1;
            return Err(StatusCode::UNAUTHORIZED);
        }
        Ok(())
    }
}

type Shared = State<Arc<Upstream>>;

async fn create_thread(State(up): Shared, headers: HeaderMap) -> Result<Json<Value>, StatusCode> {
    up.record(&headers, "POST /threads".into())?;
    Ok(Json(json!({ "id": "thread_abc", "object": "thread" })))
}

async fn upload_file(
    State(up): Shared,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<Value>, StatusCode> {
    up.record(&headers, "POST /files".into())?;
    let mut purpose = String::new();
    let mut file = (String::new(), Vec::new());
    while let Some(field) = multipart.next_field().await.map_err(|_| StatusCode::BAD_REQUEST)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("purpose") => purpose = field.text().await.map_err(|_| StatusCode::BAD_REQUEST)?,
            Some("file") => {
                let name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;
                file = (name, bytes.to_vec());
            }
            _ => {}
        }
    }
    up.recorded
        .lock()
        .unwrap()
        .uploads
        .push((purpose, file.0, file.1));
    Ok(Json(json!({ "id": "file_xyz", "object": "file" })))
}

async fn create_message(
    State(up): Shared,
    Path(thread_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    up.record(&headers, format!("POST /threads/{thread_id}/messages"))?;
    up.recorded.lock().unwrap().message_bodies.push(body);
    Ok(Json(json!({ "id": "msg_user", "role": "user" })))
}

async fn create_run(
    State(up): Shared,
    Path(thread_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    up.record(&headers, format!("POST /threads/{thread_id}/runs"))?;
    up.recorded.lock().unwrap().run_bodies.push(body);
    Ok(Json(json!({ "id": "run_1", "status": "queued" })))
}

async fn retrieve_run(
    State(up): Shared,
    Path((thread_id, run_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    up.record(&headers, format!("GET /threads/{thread_id}/runs/{run_id}"))?;
    let status = if up.fail_runs {
        "failed"
    } else {
        up.statuses.lock().unwrap().pop_front().unwrap_or("completed")
    };
    Ok(Json(json!({ "id": run_id, "status": status })))
}

async fn list_messages(
    State(up): Shared,
    Path(thread_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    up.record(&headers, format!("GET /threads/{thread_id}/messages"))?;
    let reply = up.reply.lock().unwrap().clone();
    // Newest first, the way the service lists them.
    Ok(Json(json!({
        "object": "list",
        "data": [
            {
                "id": "msg_reply",
                "role": "assistant",
                "created_at": 1_700_000_020,
                "content": [{ "type": "text", "text": { "value": reply, "annotations": [] } }]
            },
            {
                "id": "msg_user",
                "role": "user",
                "created_at": 1_700_000_010,
                "content": [{ "type": "text", "text": { "value": "Hello", "annotations": [] } }]
            },
            {
                "id": "msg_older",
                "role": "assistant",
                "created_at": 1_700_000_000,
                "content": [{ "type": "text", "text": { "value": "Earlier answer", "annotations": [] } }]
            }
        ]
    })))
}

pub fn upstream_router(upstream: Arc<Upstream>) -> Router {
    Router::new()
        .route("/v1/threads", post(create_thread))
        .route("/v1/files", post(upload_file))
        .route(
            "/v1/threads/:thread_id/messages",
            post(create_message).get(list_messages),
        )
        .route("/v1/threads/:thread_id/runs", post(create_run))
        .route("/v1/threads/:thread_id/runs/:run_id", get(retrieve_run))
        .with_state(upstream)
}

pub async fn spawn(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}
