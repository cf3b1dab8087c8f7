#![allow(dead_code)]

//! In-process stand-ins for the events API and the Log Analytics endpoint.

use anomaly_connector::config::types::{
    CheckpointConfig, Config, RunConfig, SinkConfig, UpstreamConfig,
};
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

pub const WORKSPACE_ID: &str = "ws-123";
pub const SHARED_KEY: &str = "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY=";
pub const CLIENT_ID: &str = "client";
pub const CLIENT_SECRET: &str = "secret";

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub query: HashMap<String, String>,
    pub authorization: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SinkRequest {
    pub headers: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub raw_body: Vec<u8>,
    pub records: Vec<Value>,
}

#[derive(Default)]
pub struct MockApi {
    pub auth_calls: AtomicUsize,
    pub events: Mutex<Vec<Value>>,
    /// Statuses returned by successive event fetches; 200 once exhausted.
    pub fetch_statuses: Mutex<VecDeque<u16>>,
    /// Status for any fetch whose startTime matches.
    pub fail_fetch_at: Mutex<Option<(String, u16)>>,
    pub fetch_delay: Mutex<Option<Duration>>,
    pub fetches: Mutex<Vec<FetchRequest>>,
    /// Statuses returned by successive sink posts; 200 once exhausted.
    pub sink_statuses: Mutex<VecDeque<u16>>,
    pub sink_requests: Mutex<Vec<SinkRequest>>,
}

impl MockApi {
    pub fn set_events(&self, events: Vec<Value>) {
        *self.events.lock().unwrap() = events;
    }

    pub fn queue_fetch_statuses(&self, statuses: &[u16]) {
        self.fetch_statuses.lock().unwrap().extend(statuses);
    }

    pub fn queue_sink_statuses(&self, statuses: &[u16]) {
        self.sink_statuses.lock().unwrap().extend(statuses);
    }

    pub fn fetches(&self) -> Vec<FetchRequest> {
        self.fetches.lock().unwrap().clone()
    }

    pub fn sink_requests(&self) -> Vec<SinkRequest> {
        self.sink_requests.lock().unwrap().clone()
    }

    pub fn auth_calls(&self) -> usize {
        self.auth_calls.load(Ordering::SeqCst)
    }
}

/// Start the mock on an ephemeral port and return its base URL.
pub async fn start_mock() -> (String, Arc<MockApi>) {
    let state = Arc::new(MockApi::default());

    let app = Router::new()
        .route("/apigw/v1/authenticate", post(authenticate))
        .route("/apigw/v1/events", get(events))
        .route("/api/logs", post(ingest))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), state)
}

async fn authenticate(
    State(state): State<Arc<MockApi>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let n = state.auth_calls.fetch_add(1, Ordering::SeqCst) + 1;

    if body["clientId"] != CLIENT_ID || body["clientSecret"] != CLIENT_SECRET {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "bad credentials"})));
    }
    (StatusCode::OK, Json(json!({ "id_token": format!("token-{}", n) })))
}

async fn events(
    State(state): State<Arc<MockApi>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    state.fetches.lock().unwrap().push(FetchRequest {
        query: query.clone(),
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    });

    let delay = *state.fetch_delay.lock().unwrap();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let start = query.get("startTime").cloned().unwrap_or_default();
    let end = query.get("endTime").cloned().unwrap_or_default();

    let forced = state
        .fail_fetch_at
        .lock()
        .unwrap()
        .as_ref()
        .filter(|(at, _)| *at == start)
        .map(|(_, status)| *status);
    let status = forced
        .or_else(|| state.fetch_statuses.lock().unwrap().pop_front())
        .unwrap_or(200);
    if status != 200 {
        let code = StatusCode::from_u16(status).unwrap();
        return (code, Json(json!({"error": "mock failure"})));
    }

    let limit: usize = query
        .get("maxResults")
        .and_then(|v| v.parse().ok())
        .unwrap_or(usize::MAX);

    let data: Vec<Value> = state
        .events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| {
            let ts = e["timeStamp"].as_str().unwrap_or_default();
            ts >= start.as_str() && ts < end.as_str()
        })
        .take(limit)
        .cloned()
        .collect();

    (StatusCode::OK, Json(json!({ "data": data })))
}

async fn ingest(
    State(state): State<Arc<MockApi>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> StatusCode {
    let records: Vec<Value> = serde_json::from_slice(&body).unwrap_or_default();
    let headers = headers
        .iter()
        .filter_map(|(k, v)| Some((k.as_str().to_string(), v.to_str().ok()?.to_string())))
        .collect();

    state.sink_requests.lock().unwrap().push(SinkRequest {
        headers,
        query,
        raw_body: body.to_vec(),
        records,
    });

    let status = state.sink_statuses.lock().unwrap().pop_front().unwrap_or(200);
    StatusCode::from_u16(status).unwrap()
}

/// Config pointing both upstream and sink at the mock.
pub fn test_config(base_url: &str) -> Config {
    Config {
        upstream: UpstreamConfig {
            base_url: base_url.to_string(),
            client_id: CLIENT_ID.to_string(),
            client_secret: CLIENT_SECRET.to_string(),
            event_type: "Anomaly".to_string(),
            max_results: 50_000,
            request_timeout: Duration::from_secs(10),
        },
        sink: SinkConfig {
            workspace_id: WORKSPACE_ID.to_string(),
            shared_key: SHARED_KEY.to_string(),
            endpoint: Some(base_url.to_string()),
            domain: "azure.com".to_string(),
            log_type: "LookoutCloudSecurity".to_string(),
            request_timeout: Duration::from_secs(10),
        },
        checkpoint: CheckpointConfig {
            connection: "memory://".to_string(),
            share: "funcstatemarkershare".to_string(),
            file: "Anomalyfuncmarkerfile".to_string(),
        },
        run: RunConfig::default(),
        schedule: None,
    }
}

pub fn event(id: usize, timestamp: &str) -> Value {
    json!({
        "id": id,
        "type": "Anomaly",
        "severity": "HIGH",
        "timeStamp": timestamp,
    })
}
