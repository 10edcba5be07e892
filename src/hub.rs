//! ==============================================================================
//! hub.rs - fan-out of serialized readings to connected clients
//! ==============================================================================
//!
//! purpose:
//!     the tick loop pushes one text frame per reading; every websocket
//!     session holds a subscription and forwards what it receives.
//!
//! registration:
//!     subscribe() registers a client. dropping the Subscription unregisters
//!     it. close() tells every session to send a close frame and stop.
//!
//! slow clients:
//!     each client has a bounded queue. a client that falls behind skips the
//!     frames it missed instead of stalling the broadcaster.
//!
//! ==============================================================================

use std::sync::Arc;

use tokio::sync::{broadcast, watch};

/// per-client queue depth
pub const CLIENT_QUEUE: usize = 16;

#[derive(Clone)]
pub struct Hub {
    frames: broadcast::Sender<Arc<str>>,
    closed: Arc<watch::Sender<bool>>,
}

/// what a subscription yields next
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Text(Arc<str>),
    /// the client fell behind and `n` frames were dropped for it
    Lagged(u64),
    /// the hub is shutting down
    Closed,
}

impl Hub {
    pub fn new() -> Self {
        let (frames, _) = broadcast::channel(CLIENT_QUEUE);
        let (closed, _) = watch::channel(false);
        Self {
            frames,
            closed: Arc::new(closed),
        }
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            frames: self.frames.subscribe(),
            closed: self.closed.subscribe(),
        }
    }

    /// send to every registered client, returns how many received it
    pub fn broadcast(&self, text: impl Into<Arc<str>>) -> usize {
        if self.is_closed() {
            return 0;
        }
        // no receivers is not an error for us
        self.frames.send(text.into()).unwrap_or(0)
    }

    pub fn client_count(&self) -> usize {
        self.frames.receiver_count()
    }

    pub fn close(&self) {
        self.closed.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Subscription {
    frames: broadcast::Receiver<Arc<str>>,
    closed: watch::Receiver<bool>,
}

impl Subscription {
    pub async fn next(&mut self) -> Frame {
        let closed = *self.closed.borrow();
        if closed {
            return Frame::Closed;
        }
        tokio::select! {
            frame = self.frames.recv() => match frame {
                Ok(text) => Frame::Text(text),
                Err(broadcast::error::RecvError::Lagged(n)) => Frame::Lagged(n),
                Err(broadcast::error::RecvError::Closed) => Frame::Closed,
            },
            // the flag only ever flips to true; Err means the hub went away
            _ = self.closed.changed() => Frame::Closed,
        }
    }
}
