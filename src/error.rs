//! ==============================================================================
//! error.rs - error taxonomy
//! ==============================================================================
//!
//! purpose:
//!     typed errors for the library half of the crate. the binary wraps these
//!     in anyhow at the top level.
//!
//! relationships:
//!     - StateError: returned by sensor.rs (update)
//!     - RenderError: returned by render.rs (open_target, render)
//!     - ListenError: returned by listener.rs (watch)
//!
//! ==============================================================================

use std::path::PathBuf;
use thiserror::Error;

/// failure to merge an incoming frame into the sensor state
#[derive(Debug, Error)]
pub enum StateError {
    /// the frame was not syntactically valid json
    #[error("invalid json payload: {0}")]
    Parse(#[from] serde_json::Error),

    /// the frame parsed, but only objects can be merged
    #[error("expected a json object, got {kind}")]
    NotAnObject { kind: &'static str },
}

/// failure to locate or write the render target
#[derive(Debug, Error)]
pub enum RenderError {
    /// the target could not be found at startup
    #[error("missing render target {}", .0.display())]
    MissingTarget(PathBuf),

    #[error("render write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// failure on the transport side of the watcher
#[derive(Debug, Error)]
pub enum ListenError {
    #[error("could not connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: tokio_tungstenite::tungstenite::Error,
    },

    #[error(transparent)]
    Render(#[from] RenderError),
}
