//! Port agent connection layer
//!
//! Bridges serial and network-attached instruments to client software. Each
//! instrument has a data channel and, depending on its connection variant, a
//! command channel. This crate manages the sockets behind those channels:
//! configuration, non-blocking initialization, reconnect on configuration
//! change, and truthful readiness reporting for callers that poll.
//!
//! - `endpoint` - one socket or serial line and its lifecycle
//! - `connection` - role-to-endpoint bindings and the uniform contract
//! - `agent` - poll loop driving a connection
//! - `config`, `cli`, `logging` - ambient setup for the binary

pub mod agent;
pub mod cli;
pub mod config;
pub mod connection;
pub mod constants;
pub mod endpoint;
pub mod error;
pub mod logging;

pub use agent::{ConnectionStatus, PortAgent};
pub use config::{AgentConfig, ConnectionConfig};
pub use connection::{CommHandle, Connection, ConnectionKind, InitReport, Role, RoleStatus};
pub use error::{AgentError, Result};
