//! Request/response vocabulary between the sink and the page side, the router
//! that serves it, and a client that survives one dropped channel.

use crate::lifecycle::LifecycleHandle;
use crate::mode::{ModeError, PresentationMode, ToggleOutcome};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

pub const CLIENT_RETRY_DELAY: Duration = Duration::from_secs(1);
pub const REINIT_TIMEOUT: Duration = Duration::from_secs(10);

const RECOVERING: &str = "Extension is recovering. Please try again in a moment.";
const WILL_RECOVER: &str = "If this persists, the extension will attempt automatic recovery.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    CheckSupport,
    ToggleMiniPlayer {
        #[serde(default, rename = "preferredMode", skip_serializing_if = "Option::is_none")]
        preferred_mode: Option<String>,
    },
    GetConnectionStatus,
    GetLyricsSnapshot,
    StartLyricsObserving,
    StopLyricsObserving,
}

/// `{success: true, ...payload}` or `{success: false, error, suggestion?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Response {
    pub fn ok(payload: Value) -> Self {
        let payload = match payload {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => Map::from_iter([("data".to_string(), other)]),
        };
        Self { success: true, error: None, suggestion: None, payload }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self { success: false, error: Some(error.into()), suggestion: None, payload: Map::new() }
    }

    pub fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.suggestion = Some(suggestion.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }
}

/// Parse one raw message, or the error response it deserves.
pub fn decode(raw: &str) -> Result<Request, Response> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| Response::fail(format!("Message handler error: {e}")))?;
    let action = value.get("action").and_then(Value::as_str).unwrap_or("undefined").to_string();
    serde_json::from_value::<Request>(value).map_err(|e| {
        tracing::debug!(action = %action, error = %e, "Unrecognized request");
        Response::fail(format!("Unknown action: {action}"))
    })
}

/// Serves [`Request`]s against the live lifecycle.
#[derive(Debug, Clone)]
pub struct Router {
    lifecycle: LifecycleHandle,
    document_supported: bool,
    reinit_timeout: Duration,
}

impl Router {
    pub fn new(lifecycle: LifecycleHandle, document_supported: bool) -> Self {
        Self { lifecycle, document_supported, reinit_timeout: REINIT_TIMEOUT }
    }

    pub fn with_reinit_timeout(mut self, timeout: Duration) -> Self {
        self.reinit_timeout = timeout;
        self
    }

    /// Decode and serve one raw message. Anything that is not a known
    /// request gets a structured error.
    pub async fn handle_json(&self, raw: &str) -> Response {
        match decode(raw) {
            Ok(request) => self.handle(request).await,
            Err(response) => response,
        }
    }

    pub async fn handle(&self, request: Request) -> Response {
        tracing::debug!(?request, "Request");
        match request {
            Request::CheckSupport => self.check_support(),
            Request::ToggleMiniPlayer { preferred_mode } => {
                let preferred = preferred_mode.as_deref().and_then(PresentationMode::parse);
                self.toggle(preferred).await
            }
            Request::GetConnectionStatus => Response::ok(json!({ "status": self.lifecycle.status() })),
            Request::GetLyricsSnapshot => match self.lifecycle.extractor() {
                Some(extractor) => Response::ok(json!({ "lyrics": extractor.get_lyrics() })),
                None => Response::fail("Scraper not ready"),
            },
            Request::StartLyricsObserving => self.lyrics(true),
            Request::StopLyricsObserving => self.lyrics(false),
        }
    }

    fn check_support(&self) -> Response {
        let modes = self
            .lifecycle
            .with_session(|s| (s.modes.available_modes().to_vec(), s.modes.active_mode(), s.extractor.clone()));
        let (available, active, ready) = match modes {
            Some((available, active, extractor)) => (available, active, extractor.is_ready()),
            None => (Vec::new(), None, false),
        };
        Response::ok(json!({
            "document": self.document_supported,
            "available": available,
            "active": active,
            "initialized": self.lifecycle.with_session(|_| ()).is_some(),
            "ready": ready,
        }))
    }

    async fn toggle(&self, preferred: Option<PresentationMode>) -> Response {
        if !self.lifecycle.is_healthy() || self.lifecycle.with_session(|_| ()).is_none() {
            tracing::info!("Toggle while unhealthy, reinitializing first");
            if !self.lifecycle.reinitialize(self.reinit_timeout).await {
                return Response::fail("Failed to reinitialize extension").with_suggestion(RECOVERING);
            }
            return match self.toggle_now(preferred) {
                Ok(outcome) => Response::ok(json!(outcome)),
                Err(e) => Response::fail(e).with_suggestion(RECOVERING),
            };
        }
        match self.toggle_now(preferred) {
            Ok(outcome) => Response::ok(json!(outcome)),
            Err(e) => Response::fail(e).with_suggestion(WILL_RECOVER),
        }
    }

    fn toggle_now(&self, preferred: Option<PresentationMode>) -> Result<ToggleOutcome, String> {
        self.lifecycle
            .with_session(|s| s.modes.toggle(preferred))
            .unwrap_or(Err(ModeError::NoModeAvailable))
            .map_err(|e| e.to_string())
    }

    fn lyrics(&self, on: bool) -> Response {
        let outcome = self.lifecycle.with_session(|s| {
            if on {
                s.lyrics.start()
            } else {
                s.lyrics.stop();
                Ok(())
            }
        });
        match outcome {
            Some(Ok(())) => Response::ok(Value::Null),
            Some(Err(e)) => Response::fail(e.to_string()),
            None => Response::fail("Scraper not initialized"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("mirror context lost - restart required")]
    ContextInvalidated,
}

#[derive(Debug)]
struct Envelope {
    request: Request,
    reply: oneshot::Sender<Response>,
}

type Channel = mpsc::UnboundedSender<Envelope>;

/// The serving side. Each [`bind`](Endpoint::bind) opens a fresh channel
/// that clients pick up on their next send.
#[derive(Debug)]
pub struct Endpoint {
    current: watch::Sender<Channel>,
}

impl Endpoint {
    /// A new endpoint with no router bound yet, and a client for it.
    pub fn new() -> (Self, RequestClient) {
        let (dead, _) = mpsc::unbounded_channel();
        let (current, rx) = watch::channel(dead);
        (Self { current }, RequestClient { channel: rx })
    }

    /// Serve requests with `router` until the returned task is aborted.
    pub fn bind(&self, router: Router) -> JoinHandle<()> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Envelope>();
        self.current.send_replace(tx);
        tokio::spawn(async move {
            while let Some(Envelope { request, reply }) = rx.recv().await {
                let response = router.handle(request).await;
                let _ = reply.send(response);
            }
        })
    }
}

#[derive(Debug, Clone)]
pub struct RequestClient {
    channel: watch::Receiver<Channel>,
}

impl RequestClient {
    /// Send `request`; on a dead channel wait [`CLIENT_RETRY_DELAY`] and try
    /// once more before giving up.
    pub async fn send(&self, request: Request) -> Result<Response, TransportError> {
        if let Some(response) = self.try_send(request.clone()).await {
            return Ok(response);
        }
        tracing::warn!("Request channel closed, retrying once");
        tokio::time::sleep(CLIENT_RETRY_DELAY).await;
        self.try_send(request).await.ok_or_else(|| {
            tracing::error!("Request channel still closed");
            TransportError::ContextInvalidated
        })
    }

    async fn try_send(&self, request: Request) -> Option<Response> {
        let channel = self.channel.borrow().clone();
        let (reply, rx) = oneshot::channel();
        channel.send(Envelope { request, reply }).ok()?;
        rx.await.ok()
    }
}
