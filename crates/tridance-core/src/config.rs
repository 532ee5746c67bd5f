//! Configuration system for TriDance.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $TRIDANCE_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/tridance/config.toml
//!   3. ~/.config/tridance/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::wire::{GATHER_TIMEOUT_MS, LIVENESS_TIMEOUT_SECS};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TridanceConfig {
    pub network: NetworkConfig,
    pub signaling: SignalingConfig,
    pub hub: HubConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address the HTTP/WebSocket server binds to.
    pub bind_addr: String,
    /// Port for signaling, the viewer stream, and the status API.
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalingConfig {
    /// STUN servers used when a phone asks for `ice: "stun"`.
    pub stun_urls: Vec<String>,
    /// Upper bound on waiting for ICE gathering before answering.
    pub gather_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Close a session after this long without a sample or ping.
    pub liveness_timeout_secs: u64,
    /// How often the liveness sweeper runs.
    pub sweep_interval_secs: u64,
    /// Events a viewer may fall behind before it is disconnected.
    pub viewer_buffer: usize,
    /// A viewer whose socket accepts no frame for this long is disconnected.
    pub viewer_send_timeout_ms: u64,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 8443,
        }
    }
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            stun_urls: vec!["stun:stun.l.google.com:19302".to_string()],
            gather_timeout_ms: GATHER_TIMEOUT_MS,
        }
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            liveness_timeout_secs: LIVENESS_TIMEOUT_SECS,
            sweep_interval_secs: 1,
            viewer_buffer: 1024,
            viewer_send_timeout_ms: 2000,
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

pub fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("tridance")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl TridanceConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            TridanceConfig::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("TRIDANCE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&TridanceConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply TRIDANCE_* overrides. `lookup` stands in for the process
    /// environment so tests need not mutate it.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("TRIDANCE_NETWORK__BIND_ADDR") {
            self.network.bind_addr = v;
        }
        if let Some(p) = lookup("TRIDANCE_NETWORK__PORT").and_then(|v| v.parse().ok()) {
            self.network.port = p;
        }
        if let Some(s) = lookup("TRIDANCE_HUB__LIVENESS_TIMEOUT_SECS").and_then(|v| v.parse().ok())
        {
            self.hub.liveness_timeout_secs = s;
        }
        if let Some(n) = lookup("TRIDANCE_HUB__VIEWER_BUFFER").and_then(|v| v.parse().ok()) {
            self.hub.viewer_buffer = n;
        }
        if let Some(ms) = lookup("TRIDANCE_HUB__VIEWER_SEND_TIMEOUT_MS").and_then(|v| v.parse().ok())
        {
            self.hub.viewer_send_timeout_ms = ms;
        }
        if let Some(ms) = lookup("TRIDANCE_SIGNALING__GATHER_TIMEOUT_MS").and_then(|v| v.parse().ok())
        {
            self.signaling.gather_timeout_ms = ms;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_protocol_constants() {
        let config = TridanceConfig::default();
        assert_eq!(config.hub.liveness_timeout_secs, LIVENESS_TIMEOUT_SECS);
        assert_eq!(config.signaling.gather_timeout_ms, 2000);
        assert_eq!(config.network.port, 8443);
        assert!(!config.signaling.stun_urls.is_empty());
    }

    #[test]
    fn overrides_apply_and_ignore_garbage() {
        let mut config = TridanceConfig::default();
        config.apply_overrides(|key| match key {
            "TRIDANCE_NETWORK__PORT" => Some("9100".into()),
            "TRIDANCE_HUB__VIEWER_BUFFER" => Some("not-a-number".into()),
            "TRIDANCE_NETWORK__BIND_ADDR" => Some("127.0.0.1".into()),
            "TRIDANCE_HUB__VIEWER_SEND_TIMEOUT_MS" => Some("750".into()),
            _ => None,
        });
        assert_eq!(config.hub.viewer_send_timeout_ms, 750);
        assert_eq!(config.network.port, 9100);
        assert_eq!(config.network.bind_addr, "127.0.0.1");
        assert_eq!(config.hub.viewer_buffer, 1024);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let config: TridanceConfig = toml::from_str("[hub]\nviewer_buffer = 8\n").unwrap();
        assert_eq!(config.hub.viewer_buffer, 8);
        assert_eq!(config.hub.liveness_timeout_secs, LIVENESS_TIMEOUT_SECS);
        assert_eq!(config.network.port, 8443);
    }

    #[test]
    fn default_config_serializes() {
        let text = toml::to_string_pretty(&TridanceConfig::default()).unwrap();
        let back: TridanceConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.network.port, 8443);
    }
}
