//! Fake SubARG backend served with axum on an ephemeral port.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, Sse},
        IntoResponse,
    },
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use serde_json::{json, Value};

#[derive(Clone, Default)]
pub struct BackendState {
    pub received: Arc<Mutex<Vec<Value>>>,
    pub next_ids: Arc<Mutex<VecDeque<String>>>,
    pub fail_start: bool,
    pub events: Arc<Mutex<Vec<(String, String)>>>,
}

impl BackendState {
    pub fn with_ids(ids: &[&str]) -> Self {
        let state = Self::default();
        state
            .next_ids
            .lock()
            .unwrap()
            .extend(ids.iter().map(|s| s.to_string()));
        state
    }

    pub fn failing() -> Self {
        Self {
            fail_start: true,
            ..Self::default()
        }
    }

    pub fn push_event(&self, name: &str, data: impl ToString) {
        self.events
            .lock()
            .unwrap()
            .push((name.to_string(), data.to_string()));
    }

    pub fn received(&self) -> Vec<Value> {
        self.received.lock().unwrap().clone()
    }
}

pub async fn spawn_backend(state: BackendState) -> String {
    let api = Router::new()
        .route("/scan", post(post_scan))
        .route("/scan/{id}", get(get_scan))
        .route("/results", get(get_results))
        .route("/installed_tools", get(get_tools))
        .route("/download/{filename}", get(get_download))
        .route("/events", get(get_events))
        .with_state(state);
    let app = Router::new().nest("/api", api);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn post_scan(State(state): State<BackendState>, Json(body): Json<Value>) -> impl IntoResponse {
    if state.fail_start {
        return (StatusCode::INTERNAL_SERVER_ERROR, "engine unavailable").into_response();
    }
    state.received.lock().unwrap().push(body);
    let id = state
        .next_ids
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| "scan-1".to_string());
    Json(json!({ "scan_id": id, "message": "Scan started" })).into_response()
}

async fn get_scan(Path(id): Path<String>) -> impl IntoResponse {
    if id == "missing" {
        return (StatusCode::NOT_FOUND, Json(json!({ "error": "Scan not found" }))).into_response();
    }
    Json(json!({
        "id": id,
        "target": "example.com",
        "status": "completed",
        "progress": 100,
        "results": [],
        "output_file": format!("{id}.txt"),
        "start_time": "2024-05-01T10:00:00",
        "end_time": "2024-05-01T10:05:00",
        "total_subdomains": 2
    }))
    .into_response()
}

async fn get_results() -> impl IntoResponse {
    Json(json!([
        {
            "filename": "subdomains_example.com_1714557600.txt",
            "path": "/api/download/subdomains_example.com_1714557600.txt",
            "size": 2048,
            "created": "2024-05-01T10:05:00",
            "total": 3
        },
        {
            "filename": "corp.json",
            "path": "/api/download/corp.json",
            "size": 10,
            "created": "2024-05-02T09:00:00"
        }
    ]))
}

async fn get_tools() -> impl IntoResponse {
    Json(json!({ "subfinder": true, "amass": false, "assetfinder": true }))
}

async fn get_download(Path(filename): Path<String>) -> impl IntoResponse {
    if filename.ends_with(".txt") {
        (StatusCode::OK, format!("# SubARG Results - {filename}\nwww.example.com\n")).into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

async fn get_events(State(state): State<BackendState>) -> impl IntoResponse {
    let events = state.events.lock().unwrap().clone();
    let stream = futures::stream::iter(
        events
            .into_iter()
            .map(|(name, data)| Ok::<_, Infallible>(Event::default().event(name).data(data))),
    )
    .chain(futures::stream::pending());
    Sse::new(stream)
}
