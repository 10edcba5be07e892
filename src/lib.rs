//! sensor-stream: a websocket feed of accelerometer readings and a watcher
//! that merges the feed into one sensor state and renders it as json.
//!
//! - [`sensor`]: the state container and its shallow-merge contract
//! - [`listener`]: watcher session (merge + render on every frame)
//! - [`render`]: render targets
//! - [`server`], [`hub`], [`accel`]: the broadcasting side
//! - [`config`]: `stream.toml`

pub mod accel;
pub mod config;
pub mod error;
pub mod hub;
pub mod listener;
pub mod render;
pub mod sensor;
pub mod server;

pub use error::{ListenError, RenderError, StateError};
pub use listener::{watch, ws_url, Disconnect, Session};
pub use render::{open_target, RenderTarget};
pub use sensor::{Fields, Sensor};
