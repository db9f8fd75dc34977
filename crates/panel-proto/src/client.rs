//! HTTP transport to the control server.
//!
//! `ControlClient` wraps the REST read and command surface.  The push stream
//! is owned by `run_event_stream`, a long-lived task that keeps one
//! `text/event-stream` subscription open, re-opens it with backoff when it
//! drops, and forwards raw payloads in receive order.

use std::time::Duration;

use futures_util::StreamExt;
use rand::Rng;
use reqwest::{header, Client, Response};
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::ClientError;
use crate::protocol::{
    endpoints, Command, LocoCatalog, LocoId, LocoSnapshot, RunStateSnapshot, SwitchCatalog,
    SwitchStates,
};
use crate::sse::SseDecoder;

#[derive(Clone)]
pub struct ControlClient {
    base: String,
    /// Request/response calls, bounded by the configured timeout.
    http: Client,
    /// Event stream; only the connect phase is bounded.
    stream_http: Client,
}

impl ControlClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let base = base_url.trim_end_matches('/').to_string();
        let build_err = |source| ClientError::Transport {
            url: base.clone(),
            source,
        };
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(build_err)?;
        let stream_http = Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(build_err)?;
        Ok(Self {
            base,
            http,
            stream_http,
        })
    }

    pub fn from_config(server: &ServerConfig) -> Result<Self, ClientError> {
        Self::new(&server.base_url, server.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        let url = self.url(path);
        let resp = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|source| ClientError::Transport {
                url: url.clone(),
                source,
            })?;
        let resp = check_status(&url, resp)?;
        let body = resp.bytes().await.map_err(|source| ClientError::Transport {
            url: url.clone(),
            source,
        })?;
        serde_json::from_slice(&body).map_err(|source| ClientError::Decode { url, source })
    }

    pub async fn loco_catalog(&self) -> Result<LocoCatalog, ClientError> {
        self.get_json(endpoints::LOCO_LIST, &[]).await
    }

    pub async fn switch_catalog(&self) -> Result<SwitchCatalog, ClientError> {
        self.get_json(endpoints::SWITCH_LIST, &[]).await
    }

    pub async fn loco_state(&self, uid: LocoId) -> Result<LocoSnapshot, ClientError> {
        self.get_json(endpoints::LOCO_STATE, &[("loco_id", uid.to_string())])
            .await
    }

    pub async fn switch_states(&self) -> Result<SwitchStates, ClientError> {
        self.get_json(endpoints::SWITCH_STATE, &[]).await
    }

    pub async fn run_state(&self) -> Result<RunStateSnapshot, ClientError> {
        self.get_json(endpoints::SYSTEM_STATE, &[]).await
    }

    /// POST one command. The response body is ignored.
    pub async fn send(&self, cmd: &Command) -> Result<(), ClientError> {
        let url = self.url(cmd.endpoint());
        let resp = self
            .http
            .post(&url)
            .json(&cmd.body())
            .send()
            .await
            .map_err(|source| ClientError::Transport {
                url: url.clone(),
                source,
            })?;
        check_status(&url, resp)?;
        Ok(())
    }

    /// HEAD request for an asset at an absolute URL.
    ///
    /// `Ok` is a definite answer: 2xx present, 4xx missing. Transport
    /// failures and 5xx come back as `Err` and say nothing about the asset.
    pub async fn asset_exists(&self, url: &str) -> Result<bool, ClientError> {
        let resp = self
            .http
            .head(url)
            .send()
            .await
            .map_err(|source| ClientError::Transport {
                url: url.to_string(),
                source,
            })?;
        let status = resp.status();
        if status.is_success() {
            Ok(true)
        } else if status.is_client_error() {
            Ok(false)
        } else {
            Err(ClientError::Status {
                url: url.to_string(),
                status,
            })
        }
    }

    pub async fn open_events(&self) -> Result<Response, ClientError> {
        let url = self.url(endpoints::EVENTS);
        let resp = self
            .stream_http
            .get(&url)
            .header(header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|source| ClientError::Transport {
                url: url.clone(),
                source,
            })?;
        check_status(&url, resp)
    }
}

fn check_status(url: &str, resp: Response) -> Result<Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else {
        Err(ClientError::Status {
            url: url.to_string(),
            status,
        })
    }
}

// ── Push subscription ─────────────────────────────────────────────────────────

/// What the subscription task reports, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Stream open. `resumed` is false only for the first attempt.
    Connected { resumed: bool },
    /// One `data:` payload, undecoded.
    Data(String),
    Disconnected,
}

/// Capped exponential backoff with up to 25% jitter.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max: max.max(initial),
            current: initial,
        }
    }

    pub fn from_config(server: &ServerConfig) -> Self {
        Self::new(server.reconnect_delay(), server.max_reconnect_delay())
    }

    /// Delay before the next attempt; doubles the base for the one after.
    pub fn next_delay(&mut self) -> Duration {
        let base = self.current;
        self.current = (self.current * 2).min(self.max);
        let jitter_ms = (base.as_millis() / 4) as u64;
        let jitter = if jitter_ms > 0 {
            rand::thread_rng().gen_range(0..=jitter_ms)
        } else {
            0
        };
        base + Duration::from_millis(jitter)
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// Keep the push subscription open until `cancel` fires or `tx` closes.
pub async fn run_event_stream(
    client: ControlClient,
    mut backoff: Backoff,
    tx: mpsc::Sender<StreamEvent>,
    cancel: CancellationToken,
) {
    let mut attempts: u64 = 0;
    loop {
        let resumed = attempts > 0;
        attempts += 1;

        let opened = tokio::select! {
            _ = cancel.cancelled() => return,
            r = client.open_events() => r,
        };

        match opened {
            Ok(resp) => {
                info!("event stream open (resumed={})", resumed);
                backoff.reset();
                if tx.send(StreamEvent::Connected { resumed }).await.is_err() {
                    return;
                }
                if !pump(resp, &tx, &cancel).await {
                    return;
                }
                if tx.send(StreamEvent::Disconnected).await.is_err() {
                    return;
                }
            }
            Err(e) => {
                warn!("event stream connect failed: {}", e);
            }
        }

        let delay = backoff.next_delay();
        debug!("event stream retry in {:?}", delay);
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Forward payloads until the body ends. Returns false when the task should stop.
async fn pump(resp: Response, tx: &mpsc::Sender<StreamEvent>, cancel: &CancellationToken) -> bool {
    let mut body = resp.bytes_stream();
    let mut decoder = SseDecoder::new();
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => return false,
            next = body.next() => next,
        };
        match next {
            Some(Ok(chunk)) => {
                for payload in decoder.push(&chunk) {
                    if tx.send(StreamEvent::Data(payload)).await.is_err() {
                        return false;
                    }
                }
            }
            Some(Err(e)) => {
                warn!("event stream read error: {}", e);
                return true;
            }
            None => {
                info!("event stream closed by server");
                return true;
            }
        }
    }
}
