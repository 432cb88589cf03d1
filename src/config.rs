//! Configuration management
//!
//! Config file is TOML, by default `rh-bridge.toml` in the working
//! directory. Every section and field is optional; missing values take
//! the RadioHead defaults.

use crate::constants::{
    BROADCAST_ADDRESS, DEFAULT_ADDRESS, DEFAULT_BAUD_RATE, DEFAULT_CONFIG_FILE,
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_RETRIES, DEFAULT_TIMEOUT_MS,
};
use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

// =============================================================================
// Application Configuration
// =============================================================================

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub link: LinkSection,
    pub radio: RadioSection,
    pub worker: WorkerSection,
}

/// Physical link and own address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkSection {
    /// Serial port/device (e.g. "/dev/ttyUSB0", "COM3")
    pub port: String,
    /// Baud rate
    pub baud: u32,
    /// Own node address (1..=254)
    pub address: u8,
}

/// Reliable datagram settings applied after open
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioSection {
    /// Retransmissions before a send fails (0 = send once)
    pub retries: u8,
    /// Minimum retransmit timeout (milliseconds)
    pub ack_timeout_ms: u16,
    /// Accept datagrams for any destination
    pub promiscuous: bool,
}

/// Worker loop tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSection {
    /// Idle sleep between transport polls (milliseconds)
    pub poll_interval_ms: u64,
}

impl Default for LinkSection {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud: DEFAULT_BAUD_RATE,
            address: DEFAULT_ADDRESS,
        }
    }
}

impl Default for RadioSection {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            ack_timeout_ms: DEFAULT_TIMEOUT_MS,
            promiscuous: false,
        }
    }
}

impl Default for WorkerSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl WorkerSection {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Config {
    /// Check values the transport cannot accept
    pub fn validate(&self) -> Result<()> {
        if self.link.address == BROADCAST_ADDRESS {
            return Err(BridgeError::ConfigValidation {
                field: "link.address",
                reason: "0xFF is the broadcast address".into(),
            });
        }
        if self.link.baud == 0 {
            return Err(BridgeError::ConfigValidation {
                field: "link.baud",
                reason: "must be greater than 0".into(),
            });
        }
        if self.worker.poll_interval_ms == 0 {
            return Err(BridgeError::ConfigValidation {
                field: "worker.poll_interval_ms",
                reason: "must be greater than 0".into(),
            });
        }
        Ok(())
    }
}

// =============================================================================
// Load / Save
// =============================================================================

/// Resolve the config file path
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// Load config
///
/// An explicit path must exist and parse. Without one, the default file is
/// used if present; problems with it are logged and defaults are used.
pub fn load(explicit: Option<&Path>) -> Result<Config> {
    let path = config_path(explicit);

    if explicit.is_some() {
        return read(&path);
    }

    if !path.exists() {
        return Ok(Config::default());
    }

    match read(&path) {
        Ok(config) => Ok(config),
        Err(e) => {
            warn!("{}, using defaults", e);
            Ok(Config::default())
        }
    }
}

fn read(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path).map_err(|e| BridgeError::ConfigRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse(&content).map_err(|reason| BridgeError::ConfigParse {
        path: path.to_path_buf(),
        reason,
    })
}

fn parse(content: &str) -> std::result::Result<Config, String> {
    toml::from_str(content).map_err(|e| e.to_string())
}

/// Save config to file
pub fn save(config: &Config, path: &Path) -> Result<()> {
    let content = to_toml(config).map_err(|reason| BridgeError::ConfigParse {
        path: path.to_path_buf(),
        reason,
    })?;
    fs::write(path, content).map_err(|e| BridgeError::ConfigRead {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Render config as pretty TOML
pub fn to_toml(config: &Config) -> std::result::Result<String, String> {
    toml::to_string_pretty(config).map_err(|e| e.to_string())
}

// ============================================================================
// Tests
// ============================================================================
