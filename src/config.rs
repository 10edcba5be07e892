//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `stream.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - ServerConfig: bind address and tick rate of the broadcast loop.
//!     - ClientConfig: host the watcher connects to.
//!     - RenderConfig: where the watcher renders the merged state.
//!     - LoggingConfig: log filter and whether to echo each reading.
//!
//! every section is optional; missing ones take their defaults.
//!
//! ==============================================================================

use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct StreamConfig {
    pub server: ServerConfig,
    pub client: ClientConfig,
    pub render: RenderConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
    pub tick_ms: u64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// host[:port] of the server; the url becomes ws://{host}/ws
    pub host: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    #[default]
    Terminal,
    File,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    pub target: TargetKind,
    /// only read when target = "file"
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub show_sensor_data: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:3000".to_string(),
            tick_ms: 16,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1:3000".to_string(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            target: TargetKind::Terminal,
            path: PathBuf::from("data-target.json"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            show_sensor_data: false,
        }
    }
}

impl StreamConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        Self::parse(&content).with_context(|| format!("Failed to parse config {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load with default fallback
    pub fn load_or_default() -> Self {
        let paths = [
            PathBuf::from("config").join("stream.toml"),
            PathBuf::from("..").join("config").join("stream.toml"),
        ];

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        println!("[CONFIG] Loaded from {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        println!("[CONFIG] Warning: {:#}", e);
                    }
                }
            }
        }

        println!("[CONFIG] Warning: No config file found - using defaults");
        Self::default()
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        println!("┌─────────────────────────────────────────┐");
        println!("│          STREAM CONFIGURATION           │");
        println!("├─────────────────────────────────────────┤");
        println!("│ Server Addr: {}", self.server.addr);
        println!("│ Tick: {}ms", self.server.tick_ms);
        println!("│ Watch Host: {}", self.client.host);
        println!("│ Render: {:?} ({})", self.render.target, self.render.path.display());
        println!("│ Log Level: {}", self.logging.level);
        println!("└─────────────────────────────────────────┘");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        assert_eq!(StreamConfig::parse("").unwrap(), StreamConfig::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = StreamConfig::parse(
            r#"
            [server]
            tick_ms = 250

            [render]
            target = "file"
            path = "/tmp/out.json"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.tick_ms, 250);
        assert_eq!(config.server.addr, "0.0.0.0:3000");
        assert_eq!(config.render.target, TargetKind::File);
        assert_eq!(config.render.path, PathBuf::from("/tmp/out.json"));
        assert_eq!(config.client, ClientConfig::default());
    }

    #[test]
    fn unknown_target_is_rejected() {
        let err = StreamConfig::parse("[render]\ntarget = \"dom\"\n").unwrap_err();
        assert!(err.to_string().contains("unknown variant"), "{err}");
    }

    #[test]
    fn load_reports_missing_file() {
        let err = StreamConfig::load("/no/such/stream.toml").unwrap_err();
        assert!(format!("{err:#}").contains("Failed to read config file"));
    }
}
