// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Engine configuration.
//!
//! Validation happens once, at [`crate::Driver::spawn`]; it is the only
//! error the engine ever surfaces to the host. Everything after that
//! recovers internally.

use prism_net::TransportSpec;
use serde::{Deserialize, Serialize};

pub const DEFAULT_RECONNECT_INTERVAL_MS: u64 = 1000;

/// How the engine reaches its renderers and what canvas scenes assume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverConfig {
    #[serde(flatten)]
    pub transport: TransportSpec,
    /// Delay between reconnect attempts after a lost connection.
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
    /// Logical canvas size scenes are authored for; reshape events scale it
    /// into the reported device size.
    pub design_size: (u32, u32),
}

fn default_reconnect_interval_ms() -> u64 {
    DEFAULT_RECONNECT_INTERVAL_MS
}

/// Rejected configuration, reported at engine construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("design size must be non-zero, got {width}x{height}")]
    ZeroDesignSize { width: u32, height: u32 },
    #[error("reconnect interval must be non-zero")]
    ZeroReconnectInterval,
    #[error("outbound tcp requires a non-empty host and a non-zero port")]
    BadTcpEndpoint,
    #[error("tcp server requires a non-empty bind host")]
    BadBindHost,
    #[error("unix socket path must not be empty")]
    EmptySocketPath,
    #[error("websocket url must start with ws:// or wss://, got {url:?}")]
    BadWebSocketUrl { url: String },
}

impl DriverConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (width, height) = self.design_size;
        if width == 0 || height == 0 {
            return Err(ConfigError::ZeroDesignSize { width, height });
        }
        if self.reconnect_interval_ms == 0 {
            return Err(ConfigError::ZeroReconnectInterval);
        }
        match &self.transport {
            TransportSpec::TcpServer { host, .. } => {
                if host.is_empty() {
                    return Err(ConfigError::BadBindHost);
                }
            }
            TransportSpec::Tcp { host, port } => {
                if host.is_empty() || *port == 0 {
                    return Err(ConfigError::BadTcpEndpoint);
                }
            }
            TransportSpec::UnixSocket { path } => {
                if path.as_os_str().is_empty() {
                    return Err(ConfigError::EmptySocketPath);
                }
            }
            TransportSpec::WebSocket { url } => {
                if !url.starts_with("ws://") && !url.starts_with("wss://") {
                    return Err(ConfigError::BadWebSocketUrl { url: url.clone() });
                }
            }
        }
        Ok(())
    }
}
