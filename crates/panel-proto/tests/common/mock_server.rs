#![allow(dead_code)]

//! In-process stand-in for the control server.
//!
//! Serves canned catalogs and snapshots in the loose shapes the real server
//! emits, records every command POST, and plays scripted event-stream
//! sessions: each subscription takes the next script, sends its payloads and
//! closes.  When the scripts run out the stream stays open and silent.

use std::collections::{HashMap, VecDeque};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, Uri};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use futures_util::stream::{self, BoxStream, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;

#[derive(Clone, Default)]
pub struct MockState {
    pub commands: Arc<Mutex<Vec<(String, Value)>>>,
    pub event_scripts: Arc<Mutex<VecDeque<Vec<String>>>>,
    pub subscriptions: Arc<Mutex<usize>>,
    pub assets: Arc<Vec<String>>,
}

pub struct MockServer {
    pub addr: SocketAddr,
    pub state: MockState,
}

impl MockServer {
    pub async fn start(scripts: Vec<Vec<String>>) -> Result<Self> {
        let state = MockState {
            event_scripts: Arc::new(Mutex::new(scripts.into_iter().collect())),
            assets: Arc::new(vec![
                "fcticons/FktIcon_a_ge_07.png".to_string(),
                "icons/leeres Gleis.png".to_string(),
            ]),
            ..Default::default()
        };

        let app = Router::new()
            .route("/api/loco_list", get(loco_list))
            .route("/api/switch_list", get(switch_list))
            .route("/api/loco_state", get(loco_state))
            .route("/api/switch_state", get(switch_state))
            .route("/api/system_state", get(system_state))
            .route("/api/events", get(events))
            .route("/api/control_event", post(record))
            .route("/api/keyboard_event", post(record))
            .route("/api/stop_button", post(record))
            .route("/api/info_events", post(record))
            .route("/static/*path", get(asset))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Ok(Self { addr, state })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn commands(&self) -> Vec<(String, Value)> {
        self.state.commands.lock().unwrap().clone()
    }

    pub fn subscriptions(&self) -> usize {
        *self.state.subscriptions.lock().unwrap()
    }
}

async fn loco_list() -> Json<Value> {
    Json(json!({
        "16389": {
            "uid": "0x4005", "name": "BR 85", "icon": "br85", "tachomax": "120",
            "funktionen": { "0": { "typ": "1" }, "1": { "type": 7 } }
        },
        "7": { "name": "V 200", "bild": "v200" },
        "x": { "name": "broken" }
    }))
}

async fn switch_list() -> Json<Value> {
    Json(json!({ "artikel": [ { "name": "Einfahrt" }, { "name": 12 }, {} ] }))
}

async fn loco_state(Query(q): Query<HashMap<String, String>>) -> Response {
    match q.get("loco_id").map(String::as_str) {
        Some("7") => Json(json!({
            "speed": 420, "direction": 2, "functions": { "0": true, "3": 1 }
        }))
        .into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn switch_state() -> Json<Value> {
    Json(json!({ "switch_state": [0, 1, "1", null] }))
}

async fn system_state() -> Json<Value> {
    Json(json!({ "status": true }))
}

async fn record(State(s): State<MockState>, uri: Uri, Json(body): Json<Value>) -> Json<Value> {
    s.commands
        .lock()
        .unwrap()
        .push((uri.path().to_string(), body));
    Json(json!({ "ok": true }))
}

async fn asset(State(s): State<MockState>, Path(path): Path<String>) -> StatusCode {
    if s.assets.iter().any(|a| *a == path) {
        StatusCode::OK
    } else if path.starts_with("broken/") {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn events(State(s): State<MockState>) -> Sse<BoxStream<'static, Result<Event, Infallible>>> {
    *s.subscriptions.lock().unwrap() += 1;
    let script = s.event_scripts.lock().unwrap().pop_front();
    let stream = match script {
        Some(payloads) => stream::iter(
            payloads
                .into_iter()
                .map(|p| Ok::<_, Infallible>(Event::default().data(p))),
        )
        .boxed(),
        None => stream::pending().boxed(),
    };
    Sse::new(stream)
}
