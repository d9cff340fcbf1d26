//! Instrument connections
//!
//! A connection binds the two logical channels of an instrument to endpoints:
//! - **Data**: streamed telemetry
//! - **Command**: control traffic
//!
//! Which transport backs each role is fixed per variant by `ConnectionKind::binding`:
//!
//! | Kind     | Data           | Command        |
//! |----------|----------------|----------------|
//! | `Rsn`    | TCP listener   | unsupported    |
//! | `Tcp`    | TCP client     | TCP client     |
//! | `Udp`    | UDP            | unsupported    |
//! | `Serial` | serial device  | unsupported    |
//!
//! Unsupported roles always read as unconfigured, unconnected and absent, and
//! are never initialized.
//!
//! The layer is poll based. `initialize()` never blocks and never fails; the
//! outcome per role comes back in an `InitReport` and stays observable through
//! the predicates.
//!
//! # Example
//!
//! ```ignore
//! let mut conn = Connection::new(ConnectionKind::Rsn);
//! conn.set_data_port(4001);
//!
//! assert!(conn.data_configured());
//! assert!(!conn.command_configured());
//!
//! let report = conn.initialize();
//! if conn.data_connected() {
//!     let listener = conn.data_connection_object();
//! }
//! ```

pub mod rsn;
pub mod serial;
pub mod tcp;
pub mod udp;

pub use rsn::RsnConnection;
pub use serial::SerialConnection;
pub use tcp::TcpConnection;
pub use udp::UdpConnection;

use crate::config::ConnectionConfig;
use crate::endpoint::{Endpoint, TcpCommListener, TransportKind};
use serde::{Deserialize, Serialize};
use serialport::SerialPort;
use std::fmt;
use std::net::{TcpStream, UdpSocket};
use tracing::{debug, warn};

// =============================================================================
// Roles and bindings
// =============================================================================

/// Logical function of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Data,
    Command,
}

impl Role {
    /// Initialization order
    pub const ALL: [Role; 2] = [Role::Data, Role::Command];
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data => f.write_str("data"),
            Self::Command => f.write_str("command"),
        }
    }
}

/// Connection variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    /// Inbound listener on the data port; no command channel
    Rsn,
    /// Outbound client sockets for both channels
    Tcp,
    /// UDP data channel; no command channel
    Udp,
    /// Serial data channel; no command channel
    Serial,
}

/// Transport backing each role, `None` when the role is unsupported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleBinding {
    pub data: Option<TransportKind>,
    pub command: Option<TransportKind>,
}

impl RoleBinding {
    pub fn transport(&self, role: Role) -> Option<TransportKind> {
        match role {
            Role::Data => self.data,
            Role::Command => self.command,
        }
    }
}

impl ConnectionKind {
    pub const fn binding(self) -> RoleBinding {
        match self {
            Self::Rsn => RoleBinding {
                data: Some(TransportKind::TcpListener),
                command: None,
            },
            Self::Tcp => RoleBinding {
                data: Some(TransportKind::TcpClient),
                command: Some(TransportKind::TcpClient),
            },
            Self::Udp => RoleBinding {
                data: Some(TransportKind::Udp),
                command: None,
            },
            Self::Serial => RoleBinding {
                data: Some(TransportKind::Serial),
                command: None,
            },
        }
    }

    pub fn supports(self, role: Role) -> bool {
        self.binding().transport(role).is_some()
    }
}

impl fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Rsn => "rsn",
            Self::Tcp => "tcp",
            Self::Udp => "udp",
            Self::Serial => "serial",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Initialization outcome
// =============================================================================

/// Outcome of one role during `Connection::initialize`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleStatus {
    /// Variant has no such role
    Unsupported,
    /// Required fields missing; nothing attempted
    Unconfigured,
    /// Already connected; left untouched
    AlreadyConnected,
    /// Handle established and usable
    Initialized,
    /// Handle created, handshake still in flight
    Pending,
    /// Bind/connect/open failed; retried on a later call
    Failed,
}

/// Per-role result of one `initialize()` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitReport {
    pub data: RoleStatus,
    pub command: RoleStatus,
}

impl InitReport {
    pub fn status(&self, role: Role) -> RoleStatus {
        match role {
            Role::Data => self.data,
            Role::Command => self.command,
        }
    }
}

// =============================================================================
// Communication handles
// =============================================================================

/// Borrowed live handle of a role, for external I/O
pub enum CommHandle<'a> {
    Listener(&'a mut TcpCommListener),
    Stream(&'a mut TcpStream),
    Udp(&'a UdpSocket),
    Serial(&'a mut (dyn SerialPort + 'static)),
}

impl<'a> CommHandle<'a> {
    pub fn kind(&self) -> TransportKind {
        match self {
            Self::Listener(_) => TransportKind::TcpListener,
            Self::Stream(_) => TransportKind::TcpClient,
            Self::Udp(_) => TransportKind::Udp,
            Self::Serial(_) => TransportKind::Serial,
        }
    }

    pub fn into_listener(self) -> Option<&'a mut TcpCommListener> {
        match self {
            Self::Listener(listener) => Some(listener),
            _ => None,
        }
    }
}

// =============================================================================
// Connection
// =============================================================================

/// Instrument connection over one of the supported transport bindings
///
/// Owns its endpoints exclusively. Not `Clone`: use `duplicate()` or
/// `snapshot()`/`from_config()`, which copy configuration only.
pub enum Connection {
    Rsn(RsnConnection),
    Tcp(TcpConnection),
    Udp(UdpConnection),
    Serial(SerialConnection),
}

impl Connection {
    /// Create an unconfigured connection of the given kind
    pub fn new(kind: ConnectionKind) -> Self {
        match kind {
            ConnectionKind::Rsn => Self::Rsn(RsnConnection::new()),
            ConnectionKind::Tcp => Self::Tcp(TcpConnection::new()),
            ConnectionKind::Udp => Self::Udp(UdpConnection::new()),
            ConnectionKind::Serial => Self::Serial(SerialConnection::new()),
        }
    }

    /// Build a disconnected connection from a configuration snapshot
    pub fn from_config(config: &ConnectionConfig) -> Self {
        match config {
            ConnectionConfig::Rsn(net) => Self::Rsn(RsnConnection::from_settings(net)),
            ConnectionConfig::Tcp(net) => Self::Tcp(TcpConnection::from_settings(net)),
            ConnectionConfig::Udp(net) => Self::Udp(UdpConnection::from_settings(net)),
            ConnectionConfig::Serial(ser) => Self::Serial(SerialConnection::from_settings(ser)),
        }
    }

    /// Configuration snapshot; carries no handles
    pub fn snapshot(&self) -> ConnectionConfig {
        match self {
            Self::Rsn(c) => ConnectionConfig::Rsn(c.settings()),
            Self::Tcp(c) => ConnectionConfig::Tcp(c.settings()),
            Self::Udp(c) => ConnectionConfig::Udp(c.settings()),
            Self::Serial(c) => ConnectionConfig::Serial(c.settings()),
        }
    }

    /// Copy of the configuration, starting disconnected
    pub fn duplicate(&self) -> Self {
        Self::from_config(&self.snapshot())
    }

    pub fn kind(&self) -> ConnectionKind {
        match self {
            Self::Rsn(_) => ConnectionKind::Rsn,
            Self::Tcp(_) => ConnectionKind::Tcp,
            Self::Udp(_) => ConnectionKind::Udp,
            Self::Serial(_) => ConnectionKind::Serial,
        }
    }

    // =========================================================================
    // Role lookup
    // =========================================================================

    /// Endpoint behind a role, `None` when the variant does not support it
    pub fn endpoint(&self, role: Role) -> Option<&dyn Endpoint> {
        if !self.kind().supports(role) {
            return None;
        }
        match self {
            Self::Rsn(c) => c.endpoint(role),
            Self::Tcp(c) => c.endpoint(role),
            Self::Udp(c) => c.endpoint(role),
            Self::Serial(c) => c.endpoint(role),
        }
    }

    fn endpoint_mut(&mut self, role: Role) -> Option<&mut dyn Endpoint> {
        if !self.kind().supports(role) {
            return None;
        }
        match self {
            Self::Rsn(c) => c.endpoint_mut(role),
            Self::Tcp(c) => c.endpoint_mut(role),
            Self::Udp(c) => c.endpoint_mut(role),
            Self::Serial(c) => c.endpoint_mut(role),
        }
    }

    // =========================================================================
    // Predicates
    // =========================================================================

    pub fn configured(&self, role: Role) -> bool {
        self.endpoint(role)
            .map(|ep| ep.is_configured())
            .unwrap_or(false)
    }

    /// No handshake exists at this layer, so initialized means configured
    pub fn initialized(&self, role: Role) -> bool {
        self.configured(role)
    }

    pub fn connected(&self, role: Role) -> bool {
        self.endpoint(role)
            .map(|ep| ep.connected())
            .unwrap_or(false)
    }

    pub fn data_configured(&self) -> bool {
        self.configured(Role::Data)
    }

    pub fn command_configured(&self) -> bool {
        self.configured(Role::Command)
    }

    pub fn data_initialized(&self) -> bool {
        self.initialized(Role::Data)
    }

    pub fn command_initialized(&self) -> bool {
        self.initialized(Role::Command)
    }

    pub fn data_connected(&self) -> bool {
        self.connected(Role::Data)
    }

    pub fn command_connected(&self) -> bool {
        self.connected(Role::Command)
    }

    // =========================================================================
    // Handles
    // =========================================================================

    /// Live handle of a role, `None` when unsupported or not connected
    pub fn connection_object(&mut self, role: Role) -> Option<CommHandle<'_>> {
        if !self.connected(role) {
            return None;
        }
        match self {
            Self::Rsn(c) => c.connection_object(role),
            Self::Tcp(c) => c.connection_object(role),
            Self::Udp(c) => c.connection_object(role),
            Self::Serial(c) => c.connection_object(role),
        }
    }

    pub fn data_connection_object(&mut self) -> Option<CommHandle<'_>> {
        self.connection_object(Role::Data)
    }

    pub fn command_connection_object(&mut self) -> Option<CommHandle<'_>> {
        self.connection_object(Role::Command)
    }

    /// Release the handle of a role, keeping its configuration
    ///
    /// For callers that found the channel dead while doing I/O. The next
    /// `initialize()` brings it up again. No-op for unsupported roles.
    pub fn disconnect(&mut self, role: Role) {
        if let Some(ep) = self.endpoint_mut(role) {
            if ep.has_handle() {
                debug!("{} channel released ({})", role, ep.describe());
                ep.disconnect();
            }
        }
    }

    pub fn disconnect_data(&mut self) {
        self.disconnect(Role::Data);
    }

    pub fn disconnect_command(&mut self) {
        self.disconnect(Role::Command);
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Initialize every supported, configured role that is not yet connected
    ///
    /// Data is attempted before command. Failures are logged and reported,
    /// never raised; the caller retries on a later cycle.
    pub fn initialize(&mut self) -> InitReport {
        InitReport {
            data: self.initialize_role(Role::Data),
            command: self.initialize_role(Role::Command),
        }
    }

    fn initialize_role(&mut self, role: Role) -> RoleStatus {
        let Some(ep) = self.endpoint_mut(role) else {
            return RoleStatus::Unsupported;
        };

        if !ep.is_configured() {
            debug!("{} port not configured. Not initializing", role);
            return RoleStatus::Unconfigured;
        }
        if ep.connected() {
            return RoleStatus::AlreadyConnected;
        }

        debug!("initialize {} socket ({})", role, ep.describe());
        match ep.initialize() {
            Ok(()) if ep.connected() => RoleStatus::Initialized,
            Ok(()) => RoleStatus::Pending,
            Err(e) => {
                warn!("{} channel not initialized: {}", role, e);
                RoleStatus::Failed
            }
        }
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    pub fn set_data_port(&mut self, port: u16) {
        match self {
            Self::Rsn(c) => c.set_data_port(port),
            Self::Tcp(c) => c.set_data_port(port),
            Self::Udp(c) => c.set_data_port(port),
            Self::Serial(_) => ignored("set_data_port", ConnectionKind::Serial),
        }
    }

    pub fn set_data_host(&mut self, host: impl Into<String>) {
        match self {
            Self::Rsn(c) => c.set_data_host(host),
            Self::Tcp(c) => c.set_data_host(host),
            Self::Udp(c) => c.set_data_host(host),
            Self::Serial(_) => ignored("set_data_host", ConnectionKind::Serial),
        }
    }

    pub fn set_command_port(&mut self, port: u16) {
        let kind = self.kind();
        match self {
            Self::Rsn(c) => c.set_command_port(port),
            Self::Tcp(c) => c.set_command_port(port),
            Self::Udp(_) | Self::Serial(_) => ignored("set_command_port", kind),
        }
    }

    pub fn set_command_host(&mut self, host: impl Into<String>) {
        let kind = self.kind();
        match self {
            Self::Rsn(c) => c.set_command_host(host),
            Self::Tcp(c) => c.set_command_host(host),
            Self::Udp(_) | Self::Serial(_) => ignored("set_command_host", kind),
        }
    }

    pub fn set_device_path(&mut self, path: impl Into<String>) {
        let kind = self.kind();
        match self {
            Self::Serial(c) => c.set_device_path(path),
            _ => ignored("set_device_path", kind),
        }
    }

    pub fn set_baud_rate(&mut self, baud_rate: u32) {
        let kind = self.kind();
        match self {
            Self::Serial(c) => c.set_baud_rate(baud_rate),
            _ => ignored("set_baud_rate", kind),
        }
    }
}

fn ignored(setter: &str, kind: ConnectionKind) {
    debug!("{} does not apply to {} connections, ignored", setter, kind);
}
