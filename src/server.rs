//! ==============================================================================
//! server.rs - broadcast server
//! ==============================================================================
//!
//! purpose:
//!     produces a reading every tick and streams it to every websocket client.
//!
//! routes:
//!     GET /     - page with a <pre id="data-target"> that renders the stream
//!     GET /ws   - websocket, one text frame per reading. inbound data is
//!                 ignored; only close frames and pongs matter.
//!     GET /api  - the server's own merged view of the stream
//!
//! architecture:
//!
//! ```text
//!     tick loop ──text──▶ hub ──frames──▶ ws session (one per client)
//!         │
//!         └──update──▶ mirror: RwLock<Sensor> ◀── GET /api
//! ```
//!
//! ==============================================================================

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::{Html, IntoResponse, Json},
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio::time::MissedTickBehavior;
use tower_http::cors::CorsLayer;

use crate::accel::Reading;
use crate::hub::{Frame, Hub, Subscription};
use crate::sensor::Sensor;

/// time allowed to write one frame
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);
/// time allowed between pongs
pub const PONG_TIMEOUT: Duration = Duration::from_secs(60);
/// must be less than PONG_TIMEOUT
pub const PING_INTERVAL: Duration = Duration::from_secs(54);
/// shortest tick the loop accepts; tokio intervals cannot be zero
pub const MIN_TICK: Duration = Duration::from_millis(1);
/// clients are not expected to send data
const INBOUND_LIMIT: usize = 1024;
/// how long shutdown waits for sessions to send their close frames
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

// ==============================================================================
// shared state
// ==============================================================================
// shared between:
// - the tick loop (writes the mirror, broadcasts)
// - the web handlers (read the mirror, subscribe to the hub)

#[derive(Clone)]
pub struct AppState {
    hub: Hub,
    mirror: Arc<RwLock<Sensor>>,
    started_at: Instant,
    show_data: bool,
    keepalive: Keepalive,
}

/// ping cadence and how long a client may stay silent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Keepalive {
    pub ping_interval: Duration,
    pub pong_timeout: Duration,
}

impl Default for Keepalive {
    fn default() -> Self {
        Self {
            ping_interval: PING_INTERVAL,
            pong_timeout: PONG_TIMEOUT,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiSnapshot {
    pub clients: usize,
    pub uptime_secs: u64,
    pub sensor: Sensor,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            hub: Hub::new(),
            mirror: Arc::new(RwLock::new(Sensor::new())),
            started_at: Instant::now(),
            show_data: false,
            keepalive: Keepalive::default(),
        }
    }

    pub fn show_data(mut self, show: bool) -> Self {
        self.show_data = show;
        self
    }

    pub fn keepalive(mut self, keepalive: Keepalive) -> Self {
        self.keepalive = keepalive;
        self
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// independent copy of the mirror, taken under the read lock
    pub async fn sensor(&self) -> Sensor {
        self.mirror.read().await.copy()
    }

    pub async fn api_snapshot(&self) -> ApiSnapshot {
        ApiSnapshot {
            clients: self.hub.client_count(),
            uptime_secs: self.started_at.elapsed().as_secs(),
            sensor: self.sensor().await,
        }
    }

    /// publish one frame: merge it into the mirror, then fan it out
    pub async fn publish(&self, text: String) -> usize {
        if let Err(e) = self.mirror.write().await.update(&text) {
            tracing::warn!("not broadcasting unmergeable frame: {}", e);
            return 0;
        }
        if self.show_data {
            tracing::debug!(frame = %text, "broadcast");
        }
        self.hub.broadcast(text)
    }

    /// one tick of the simulated sensor
    pub async fn tick(&self) -> usize {
        match serde_json::to_string(&Reading::random()) {
            Ok(text) => self.publish(text).await,
            Err(e) => {
                tracing::error!("error serializing reading: {}", e);
                0
            }
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

// ==============================================================================
// tick loop
// ==============================================================================

/// tick until `shutdown` resolves, then close the hub and let sessions drain
///
/// periods shorter than MIN_TICK are raised to it.
pub async fn run_ticker<F>(state: AppState, period: Duration, shutdown: F)
where
    F: Future<Output = ()>,
{
    if period < MIN_TICK {
        tracing::warn!(?period, "tick period too short, using {:?}", MIN_TICK);
    }
    let mut ticker = tokio::time::interval(period.max(MIN_TICK));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                state.tick().await;
            }
            _ = &mut shutdown => break,
        }
    }

    tracing::info!("closing ws connections...");
    state.hub.close();
    let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
        while state.hub.client_count() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    if drained.is_err() {
        tracing::warn!(
            clients = state.hub.client_count(),
            "sessions still open after shutdown"
        );
    }
}

// ==============================================================================
// web server
// ==============================================================================

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(page_handler))
        .route("/ws", get(ws_handler))
        .route("/api", get(api_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// serve on an already bound listener until the process exits
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn page_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn api_handler(State(state): State<AppState>) -> Json<ApiSnapshot> {
    Json(state.api_snapshot().await)
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    // register before the upgrade so no frame published after this point is missed
    let subscription = state.hub.subscribe();
    let keepalive = state.keepalive;
    ws.max_message_size(INBOUND_LIMIT)
        .on_upgrade(move |socket| run_session(socket, subscription, keepalive))
}

async fn run_session(socket: WebSocket, mut subscription: Subscription, keepalive: Keepalive) {
    let (mut sender, mut receiver) = socket.split();
    let mut ping = tokio::time::interval(keepalive.ping_interval);
    // the first tick of an interval fires immediately
    ping.tick().await;
    // pushed forward by every inbound message, pongs included
    let pong_deadline = tokio::time::sleep(keepalive.pong_timeout);
    tokio::pin!(pong_deadline);

    tracing::debug!("ws session started");
    loop {
        tokio::select! {
            frame = subscription.next() => match frame {
                Frame::Text(text) => {
                    let sent = tokio::time::timeout(
                        WRITE_TIMEOUT,
                        sender.send(Message::Text(text.to_string())),
                    )
                    .await;
                    if !matches!(sent, Ok(Ok(()))) {
                        tracing::debug!("ws write failed, dropping client");
                        break;
                    }
                }
                Frame::Lagged(n) => {
                    tracing::debug!(skipped = n, "ws client lagging");
                }
                Frame::Closed => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            },
            _ = ping.tick() => {
                if sender.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
            _ = &mut pong_deadline => {
                tracing::debug!("ws client missed pong deadline");
                break;
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {
                    pong_deadline
                        .as_mut()
                        .reset(tokio::time::Instant::now() + keepalive.pong_timeout);
                }
                Some(Err(e)) => {
                    tracing::debug!("error receiving message (possible close): {}", e);
                    break;
                }
            },
        }
    }
    tracing::debug!("ws session ended");
}

const INDEX_HTML: &str = r#"<!doctype html>
<html>
<head>
    <meta charset="utf-8">
    <title>sensor stream</title>
</head>
<body style="font-family: system-ui; padding: 2rem; background: #1a1a2e; color: #eee;">
    <pre id="data-target" style="background: #16213e; padding: 1rem; border-radius: 8px;"></pre>
    <script>
        const target = document.getElementById("data-target");
        const sensor = {};
        const ws = new WebSocket(`ws://${location.host}/ws`);
        ws.addEventListener("message", (evt) => {
            try {
                Object.assign(sensor, JSON.parse(evt.data));
            } catch (e) {
                console.warn("dropping frame", e);
                return;
            }
            target.textContent = JSON.stringify(sensor, null, 2);
        });
        ws.addEventListener("close", (evt) => console.warn("ws:close", evt));
        ws.addEventListener("error", (evt) => console.error(evt));
    </script>
</body>
</html>
"#;
