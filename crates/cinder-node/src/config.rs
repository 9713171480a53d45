//! Node configuration.
//!
//! [`NodeConfig`] carries sensible defaults and can be loaded from an
//! optional TOML file; the binary layers CLI overrides on top.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use cinder_core::constants::{DEFAULT_CONTROL_PORT, DEFAULT_PEER_PORT};

/// Two-peer transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerConfig {
    /// Whether to run the transport at all (single-node mode otherwise).
    pub enabled: bool,
    /// Listen for the peer instead of dialing out.
    pub listen: bool,
    /// Address to listen on or connect to.
    pub host: String,
    pub port: u16,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: false,
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PEER_PORT,
        }
    }
}

/// Configuration for a node instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Root directory for the wallet file and other node data.
    pub data_dir: PathBuf,
    /// Log level filter string (e.g. "info", "cinder_core=debug").
    pub log_level: String,
    /// Bind address of the operator command socket.
    pub control_bind: String,
    pub control_port: u16,
    pub peer: PeerConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cinder");
        Self {
            data_dir,
            log_level: "info".to_string(),
            control_bind: "127.0.0.1".to_string(),
            control_port: DEFAULT_CONTROL_PORT,
            peer: PeerConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Load from an optional TOML file; missing fields fall back to the
    /// defaults above.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path.to_path_buf()));
        }
        builder.build()?.try_deserialize()
    }

    /// Path of the wallet key file.
    pub fn wallet_path(&self) -> PathBuf {
        self.data_dir.join("wallet")
    }

    /// Socket address string of the operator interface.
    pub fn control_addr(&self) -> String {
        format!("{}:{}", self.control_bind, self.control_port)
    }

    /// Socket address string of the peer endpoint.
    pub fn peer_addr(&self) -> String {
        format!("{}:{}", self.peer.host, self.peer.port)
    }
}
