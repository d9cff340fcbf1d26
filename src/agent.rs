//! Port agent poll loop
//!
//! Drives one connection per cycle:
//! 1. `initialize()` brings up any configured role that is down
//! 2. A bound listener releases a peer that hung up, then accepts a waiting
//!    instrument peer
//! 3. The resulting status is compared with the previous cycle and
//!    transitions are logged
//!
//! Nothing here blocks. Retries happen simply because the next cycle calls
//! `initialize()` again.

use crate::config::AgentConfig;
use crate::connection::{CommHandle, Connection, Role, RoleStatus};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Observable state of one role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RoleState {
    pub supported: bool,
    pub configured: bool,
    pub connected: bool,
}

impl fmt::Display for RoleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.supported {
            f.write_str("unsupported")
        } else if !self.configured {
            f.write_str("unconfigured")
        } else if self.connected {
            f.write_str("connected")
        } else {
            f.write_str("disconnected")
        }
    }
}

/// Snapshot of a connection's state after one poll cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub data: RoleState,
    pub command: RoleState,
    /// Inbound peer attached to the data listener; `None` when data is not a listener
    pub peer_attached: Option<bool>,
}

impl ConnectionStatus {
    pub fn of(connection: &Connection) -> Self {
        let role_state = |role: Role| RoleState {
            supported: connection.kind().supports(role),
            configured: connection.configured(role),
            connected: connection.connected(role),
        };

        let peer_attached = match connection {
            Connection::Rsn(c) => Some(
                c.data_endpoint()
                    .handle()
                    .map(|h| h.client_connected())
                    .unwrap_or(false),
            ),
            _ => None,
        };

        Self {
            data: role_state(Role::Data),
            command: role_state(Role::Command),
            peer_attached,
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data: {}, command: {}", self.data, self.command)?;
        if let Some(attached) = self.peer_attached {
            let peer = if attached { "attached" } else { "waiting" };
            write!(f, ", peer: {}", peer)?;
        }
        Ok(())
    }
}

pub struct PortAgent {
    connection: Connection,
    last_status: Option<ConnectionStatus>,
}

impl PortAgent {
    pub fn new(connection: Connection) -> Self {
        Self {
            connection,
            last_status: None,
        }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(Connection::from_config(&config.connection))
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.connection
    }

    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus::of(&self.connection)
    }

    /// Run one cycle and return the resulting status
    pub fn poll(&mut self) -> ConnectionStatus {
        let report = self.connection.initialize();
        for role in Role::ALL {
            if report.status(role) == RoleStatus::Pending {
                debug!("{} channel handshake in progress", role);
            }
        }
        self.accept_inbound();

        let status = self.status();
        if self.last_status != Some(status) {
            info!("{} connection: {}", self.connection.kind(), status);
            self.last_status = Some(status);
        }
        status
    }

    fn accept_inbound(&mut self) {
        let Some(listener) = self
            .connection
            .data_connection_object()
            .and_then(CommHandle::into_listener)
        else {
            return;
        };

        listener.release_closed_client();
        if let Err(e) = listener.accept_client() {
            warn!("Accept on data listener failed: {}", e);
        }
    }

    /// Poll every `interval` until `shutdown` is set
    pub async fn run(mut self, interval: Duration, shutdown: Arc<AtomicBool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !shutdown.load(Ordering::Relaxed) {
            ticker.tick().await;
            self.poll();
        }

        info!("Agent stopped");
    }
}
