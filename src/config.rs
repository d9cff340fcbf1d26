//! Configuration management
//!
//! The agent reads a single TOML file (default `port-agent.toml`):
//!
//! ```toml
//! [agent]
//! poll_interval_ms = 1000
//!
//! [connection]
//! type = "rsn"
//! data_port = 4001
//! ```
//!
//! `ConnectionConfig` doubles as the configuration snapshot of a live
//! `Connection`: it carries host/port/path fields only, never handles.

use crate::connection::ConnectionKind;
use crate::constants::{DEFAULT_BAUD_RATE, DEFAULT_DATA_PORT, DEFAULT_POLL_INTERVAL_MS};
use crate::error::{AgentError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

// =============================================================================
// Connection Configuration
// =============================================================================

/// Host/port pairs for the two roles of a network connection
///
/// Empty host and zero port mean "unset". Command fields are ignored by
/// variants without a command channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    pub data_host: String,
    pub data_port: u16,
    pub command_host: String,
    pub command_port: u16,
}

/// Serial line settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    /// Device path (e.g. "/dev/ttyUSB0"); empty = unset
    pub device_path: String,
    pub baud_rate: u32,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            device_path: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }
}

/// Configuration of one connection, tagged by variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ConnectionConfig {
    Rsn(NetworkSettings),
    Tcp(NetworkSettings),
    Udp(NetworkSettings),
    Serial(SerialSettings),
}

impl ConnectionConfig {
    pub fn kind(&self) -> ConnectionKind {
        match self {
            Self::Rsn(_) => ConnectionKind::Rsn,
            Self::Tcp(_) => ConnectionKind::Tcp,
            Self::Udp(_) => ConnectionKind::Udp,
            Self::Serial(_) => ConnectionKind::Serial,
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::Rsn(NetworkSettings {
            data_port: DEFAULT_DATA_PORT,
            ..NetworkSettings::default()
        })
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Delay between poll cycles
    pub poll_interval_ms: u64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub agent: AgentSettings,
    pub connection: ConnectionConfig,
}

/// Load config from file, or defaults if the file does not exist
///
/// # Errors
///
/// - `ConfigRead` - the file exists but cannot be read
/// - `ConfigValidation` - the file is not valid TOML or holds invalid values
pub fn load(path: &Path) -> Result<AgentConfig> {
    if !path.exists() {
        info!("No config at {}, using defaults", path.display());
        return Ok(AgentConfig::default());
    }

    let content = fs::read_to_string(path).map_err(|e| AgentError::ConfigRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse(&content)
}

/// Parse and validate config text
pub fn parse(content: &str) -> Result<AgentConfig> {
    let config: AgentConfig = toml::from_str(content).map_err(|e| AgentError::ConfigValidation {
        field: "config",
        reason: e.to_string(),
    })?;

    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &AgentConfig) -> Result<()> {
    if config.agent.poll_interval_ms == 0 {
        return Err(AgentError::ConfigValidation {
            field: "agent.poll_interval_ms",
            reason: "must be greater than zero".into(),
        });
    }

    if let ConnectionConfig::Serial(serial) = &config.connection {
        if serial.baud_rate == 0 {
            return Err(AgentError::ConfigValidation {
                field: "connection.baud_rate",
                reason: "must be greater than zero".into(),
            });
        }
    }

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
