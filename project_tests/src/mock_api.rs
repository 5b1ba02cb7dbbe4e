//! An ExpTech-shaped HTTP API on an ephemeral local port.
//!
//! Routes: `/api/v2/eq/eew`, `/api/v2/eq/report` (honours `limit`) and
//! `/api/v2/eq/report/{id}`. Every response is scripted through the setters.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

#[derive(Default)]
struct ApiState {
    notifications: Mutex<Vec<Value>>,
    reports: Mutex<Vec<Value>>,
    details: Mutex<HashMap<String, Value>>,
    // 0 answers 200
    status: AtomicU16,
    polls: AtomicUsize,
    queries: Mutex<Vec<HashMap<String, String>>>,
}

/// Handle on a running mock API.
#[derive(Clone)]
pub struct MockApi {
    /// `http://127.0.0.1:<port>`
    pub base: String,
    state: Arc<ApiState>,
}

impl MockApi {
    /// Binds an ephemeral port and serves until the runtime stops.
    pub async fn start() -> Self {
        let state = Arc::new(ApiState::default());
        let app = Router::new()
            .route("/api/v2/eq/eew", get(eew))
            .route("/api/v2/eq/report", get(report_list))
            .route("/api/v2/eq/report/{id}", get(report_detail))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock api");
        let addr = listener.local_addr().expect("mock api address");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { base: format!("http://{addr}"), state }
    }

    /// Pool entry pointing at this server.
    pub fn pool_entry(&self, name: &str) -> (String, String) {
        (name.to_string(), self.base.clone())
    }

    /// Report summary endpoint.
    pub fn report_url(&self) -> String {
        format!("{}/api/v2/eq/report", self.base)
    }

    pub fn set_notifications(&self, records: Vec<Value>) {
        *self.state.notifications.lock().unwrap() = records;
    }

    pub fn set_reports(&self, reports: Vec<Value>) {
        *self.state.reports.lock().unwrap() = reports;
    }

    pub fn set_detail(&self, id: &str, detail: Value) {
        self.state.details.lock().unwrap().insert(id.to_string(), detail);
    }

    /// Status returned by the notification endpoint.
    pub fn set_status(&self, status: u16) {
        self.state.status.store(status, Ordering::SeqCst);
    }

    /// Notification polls served so far.
    pub fn polls(&self) -> usize {
        self.state.polls.load(Ordering::SeqCst)
    }

    /// Query string of the latest notification poll.
    pub fn last_query(&self) -> Option<HashMap<String, String>> {
        self.state.queries.lock().unwrap().last().cloned()
    }
}

async fn eew(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    state.polls.fetch_add(1, Ordering::SeqCst);
    state.queries.lock().unwrap().push(query);

    let status = match state.status.load(Ordering::SeqCst) {
        0 => StatusCode::OK,
        code => StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
    };
    if !status.is_success() {
        return (status, Json(json!({"error": "unavailable"})));
    }
    let records = state.notifications.lock().unwrap().clone();
    (StatusCode::OK, Json(Value::Array(records)))
}

async fn report_list(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    let limit = query.get("limit").and_then(|l| l.parse::<usize>().ok()).unwrap_or(usize::MAX);
    let reports = state.reports.lock().unwrap();
    Json(Value::Array(reports.iter().take(limit).cloned().collect()))
}

async fn report_detail(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    state
        .details
        .lock()
        .unwrap()
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}
