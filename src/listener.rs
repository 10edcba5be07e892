//! ==============================================================================
//! listener.rs - websocket watcher feeding the sensor state
//! ==============================================================================
//!
//! purpose:
//!     connects to a sensor stream, merges every frame into one Sensor and
//!     re-renders the target after each successful merge.
//!
//! callbacks:
//!     - on_message: merge, then render. a malformed or non-object frame is
//!       logged and skipped; the previous render stays on screen.
//!     - on_close / on_error: logged, the watch ends. there is no reconnect,
//!       the caller decides what happens next.
//!
//! relationships:
//!     - uses: sensor.rs (state), render.rs (target)
//!     - talks to: server.rs (/ws endpoint)
//!
//! ==============================================================================

use futures_util::StreamExt;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use crate::error::{ListenError, RenderError};
use crate::render::RenderTarget;
use crate::sensor::Sensor;

/// websocket url for a page host such as "127.0.0.1:3000"
pub fn ws_url(host: &str) -> String {
    format!("ws://{host}/ws")
}

/// why a watch ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disconnect {
    Closed { code: Option<u16>, reason: String },
    Errored(String),
}

/// one watcher: the state and where it gets rendered
pub struct Session<T> {
    sensor: Sensor,
    target: T,
    show_data: bool,
}

impl<T: RenderTarget> Session<T> {
    pub fn new(sensor: Sensor, target: T) -> Self {
        Self {
            sensor,
            target,
            show_data: false,
        }
    }

    /// also log every accepted frame at debug level
    pub fn show_data(mut self, show: bool) -> Self {
        self.show_data = show;
        self
    }

    pub fn sensor(&self) -> &Sensor {
        &self.sensor
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn into_parts(self) -> (Sensor, T) {
        (self.sensor, self.target)
    }

    /// merge one payload and re-render
    ///
    /// returns whether the frame was applied. only a failing render target is
    /// an error here; bad payloads are dropped with a warning.
    pub fn on_message(&mut self, payload: &str) -> Result<bool, RenderError> {
        if let Err(e) = self.sensor.update(payload) {
            tracing::warn!("dropping frame: {}", e);
            return Ok(false);
        }
        if self.show_data {
            tracing::debug!(payload, "frame merged");
        }
        self.target.render(&self.sensor.to_pretty_json())?;
        Ok(true)
    }

    pub fn on_close(&mut self, frame: Option<CloseFrame<'_>>) -> Disconnect {
        let (code, reason) = match frame {
            Some(f) => (Some(u16::from(f.code)), f.reason.into_owned()),
            None => (None, String::new()),
        };
        tracing::warn!(?code, %reason, "websocket connection closed");
        Disconnect::Closed { code, reason }
    }

    pub fn on_error(&mut self, error: &WsError) -> Disconnect {
        tracing::error!("websocket error: {}", error);
        Disconnect::Errored(error.to_string())
    }
}

/// connect to `url` and feed `session` until the connection ends
///
/// fails only if the connection cannot be opened or the target stops
/// accepting renders.
pub async fn watch<T: RenderTarget>(
    url: &str,
    session: &mut Session<T>,
) -> Result<Disconnect, ListenError> {
    let (mut stream, _response) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(|source| ListenError::Connect {
            url: url.to_string(),
            source,
        })?;
    tracing::info!("connected to {}", url);

    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                session.on_message(&text)?;
            }
            Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                Ok(text) => {
                    session.on_message(text)?;
                }
                Err(_) => tracing::debug!(len = bytes.len(), "ignoring non-utf8 binary frame"),
            },
            Some(Ok(Message::Close(frame))) => return Ok(session.on_close(frame)),
            // ping/pong replies are handled by tungstenite
            Some(Ok(_)) => {}
            Some(Err(e)) => return Ok(session.on_error(&e)),
            None => return Ok(session.on_close(None)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::MemoryTarget;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

    fn session() -> Session<MemoryTarget> {
        Session::new(Sensor::new(), MemoryTarget::new())
    }

    #[test]
    fn url_from_host() {
        assert_eq!(ws_url("localhost:3000"), "ws://localhost:3000/ws");
    }

    #[test]
    fn message_merges_and_renders_pretty() {
        let mut s = session();
        assert!(s.on_message(r#"{"x":1,"y":2}"#).unwrap());
        assert!(s.on_message(r#"{"y":3}"#).unwrap());

        assert_eq!(s.target().renders(), 2);
        assert_eq!(s.target().last(), Some("{\n  \"x\": 1,\n  \"y\": 3\n}"));
    }

    #[test]
    fn bad_frames_are_skipped_without_render() {
        let mut s = session();
        s.on_message(r#"{"x":1}"#).unwrap();

        assert!(!s.on_message("{x:1}").unwrap());
        assert!(!s.on_message("[1,2,3]").unwrap());

        assert_eq!(s.target().renders(), 1);
        assert_eq!(s.sensor().get("x"), Some(&serde_json::json!(1)));
    }

    #[test]
    fn close_reports_code_and_reason() {
        let mut s = session();
        let frame = CloseFrame {
            code: CloseCode::Away,
            reason: "bye".into(),
        };
        assert_eq!(
            s.on_close(Some(frame)),
            Disconnect::Closed {
                code: Some(1001),
                reason: "bye".to_string()
            }
        );
        assert_eq!(
            s.on_close(None),
            Disconnect::Closed {
                code: None,
                reason: String::new()
            }
        );
    }

    #[test]
    fn error_is_terminal() {
        let mut s = session();
        let d = s.on_error(&WsError::ConnectionClosed);
        assert!(matches!(d, Disconnect::Errored(_)));
    }

    #[tokio::test]
    async fn unreachable_server_is_connect_error() {
        // port 9 (discard) is not listening on loopback in any sane setup
        let mut s = session();
        let err = watch("ws://127.0.0.1:9/ws", &mut s).await.unwrap_err();
        assert!(matches!(err, ListenError::Connect { .. }));
    }
}
