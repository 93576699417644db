//! Configuration for the routing core.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $LORA_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/lora/config.toml
//!   3. ~/.config/lora/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoraConfig {
    pub router: RouterConfig,
    pub broker: BrokerConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Deadline for one activation/uplink race, in milliseconds.
    pub request_timeout_ms: u64,
    /// Queued downlinks per gateway before deliveries fail.
    pub downlink_buffer: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Queued messages per router/handler stream.
    pub stream_buffer: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Database file for the sqlite backend.
    pub sqlite_path: PathBuf,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 5_000,
            downlink_buffer: 32,
        }
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self { stream_buffer: 64 }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            sqlite_path: data_dir().join("store.db"),
        }
    }
}

impl RouterConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("lora")
}

pub fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".local").join("share"))
        .join("lora")
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

impl LoraConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            LoraConfig::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("LORA_CONFIG")
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
            let text = toml::to_string_pretty(&LoraConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply LORA_* overrides. Unparseable values are ignored.
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("LORA_ROUTER__REQUEST_TIMEOUT_MS") {
            if let Ok(ms) = v.parse() {
                self.router.request_timeout_ms = ms;
            }
        }
        if let Some(v) = var("LORA_BROKER__STREAM_BUFFER") {
            if let Ok(n) = v.parse() {
                self.broker.stream_buffer = n;
            }
        }
        if let Some(v) = var("LORA_STORE__BACKEND") {
            match v.as_str() {
                "memory" => self.store.backend = StoreBackend::Memory,
                "sqlite" => self.store.backend = StoreBackend::Sqlite,
                _ => {}
            }
        }
        if let Some(v) = var("LORA_STORE__SQLITE_PATH") {
            self.store.sqlite_path = PathBuf::from(v);
        }
    }
}
