//! Centralized error types for the port agent
//!
//! All endpoint and configuration errors are represented by the `AgentError` enum.
//! Use `Result<T>` as shorthand for `std::result::Result<T, AgentError>`.
//!
//! The connection layer never raises these to its caller: `Connection::initialize`
//! logs them and folds them into a `RoleStatus`. They surface directly only from
//! endpoint-level calls and from config loading.

use std::fmt;
use std::path::PathBuf;

/// All port agent errors
#[derive(Debug)]
pub enum AgentError {
    // === Network ===
    /// Failed to bind or listen on a TCP listener port
    ListenerBind { port: u16, source: std::io::Error },
    /// Failed to start a TCP connection to a remote host
    ClientConnect {
        host: String,
        port: u16,
        source: std::io::Error,
    },
    /// Failed to bind or associate a UDP socket
    UdpBind {
        host: String,
        port: u16,
        source: std::io::Error,
    },
    /// Host name did not resolve to any address
    AddressResolve { host: String, port: u16 },

    // === Serial ===
    /// Failed to open serial device
    SerialOpen {
        path: String,
        source: std::io::Error,
    },

    // === Endpoint ===
    /// Initialization requested on an endpoint lacking required fields
    NotConfigured { endpoint: String },

    // === Config ===
    /// Config file could not be read
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Invalid config value
    ConfigValidation { field: &'static str, reason: String },
}

impl std::error::Error for AgentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ListenerBind { source, .. }
            | Self::ClientConnect { source, .. }
            | Self::UdpBind { source, .. }
            | Self::SerialOpen { source, .. }
            | Self::ConfigRead { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl fmt::Display for AgentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ListenerBind { port, source } => {
                write!(f, "Cannot listen on TCP port {}: {}", port, source)
            }
            Self::ClientConnect { host, port, source } => {
                write!(f, "Cannot connect to {}:{}: {}", host, port, source)
            }
            Self::UdpBind { host, port, source } => {
                write!(f, "Cannot open UDP socket to {}:{}: {}", host, port, source)
            }
            Self::AddressResolve { host, port } => {
                write!(f, "Cannot resolve address {}:{}", host, port)
            }
            Self::SerialOpen { path, source } => {
                write!(f, "Cannot open serial device {}: {}", path, source)
            }
            Self::NotConfigured { endpoint } => write!(f, "{} is not configured", endpoint),
            Self::ConfigRead { path, .. } => write!(f, "Cannot read config: {}", path.display()),
            Self::ConfigValidation { field, reason } => {
                write!(f, "Invalid {}: {}", field, reason)
            }
        }
    }
}

/// Alias for Result with AgentError
pub type Result<T> = std::result::Result<T, AgentError>;
