//! Outbound TCP client endpoint
//!
//! Starts a non-blocking connect and returns immediately. The endpoint is
//! connected once the handshake has completed (the peer address is known) and
//! for as long as the peer keeps its side open. A peer that hung up leaves
//! the endpoint disconnected, so the next `initialize()` connects again.
//! A connect still in flight is kept across `initialize()` calls so a slow
//! handshake is not restarted every poll cycle.

use super::{is_in_progress, peer_closed, reconfigure, Endpoint, NetAddress, TransportKind};
use crate::error::{AgentError, Result};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{Shutdown, SocketAddr, TcpStream};
use tracing::debug;

/// Outbound TCP endpoint; host and port are both required
#[derive(Default)]
pub struct TcpClientEndpoint {
    address: NetAddress,
    stream: Option<TcpStream>,
}

impl TcpClientEndpoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hostname(&self) -> &str {
        &self.address.host
    }

    pub fn port(&self) -> u16 {
        self.address.port
    }

    pub fn set_hostname(&mut self, host: impl Into<String>) {
        let host = host.into();
        reconfigure(self, |ep| {
            let changed = ep.address.host != host;
            ep.address.host = host;
            changed
        });
    }

    pub fn set_port(&mut self, port: u16) {
        reconfigure(self, |ep| {
            let changed = ep.address.port != port;
            ep.address.port = port;
            changed
        });
    }

    /// Connected stream, if the handshake has completed and the peer is still there
    pub fn handle(&self) -> Option<&TcpStream> {
        self.stream.as_ref().filter(|s| is_live(s))
    }

    pub fn handle_mut(&mut self) -> Option<&mut TcpStream> {
        self.stream.as_mut().filter(|s| is_live(s))
    }

    /// Connect started but not completed, and no error reported yet
    ///
    /// Reading the socket error clears it, so only `initialize` asks.
    fn connect_in_flight(&self) -> bool {
        let Some(stream) = self.stream.as_ref() else {
            return false;
        };
        if stream.peer_addr().is_ok() {
            return false;
        }

        match stream.take_error() {
            // A reset connect can surface as a closed socket with no error left
            Ok(None) => !peer_closed(stream),
            Ok(Some(e)) | Err(e) => {
                debug!("{}: connect failed: {}", self.describe(), e);
                false
            }
        }
    }

    fn start_connect(addr: SocketAddr) -> std::io::Result<TcpStream> {
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
        socket.set_nonblocking(true)?;
        socket.set_nodelay(true)?;

        match socket.connect(&addr.into()) {
            Ok(()) => {}
            Err(e) if is_in_progress(&e) => {}
            Err(e) => return Err(e),
        }

        Ok(socket.into())
    }
}

fn is_live(stream: &TcpStream) -> bool {
    stream.peer_addr().is_ok() && !peer_closed(stream)
}

impl Endpoint for TcpClientEndpoint {
    fn kind(&self) -> TransportKind {
        TransportKind::TcpClient
    }

    fn is_configured(&self) -> bool {
        self.address.has_host() && self.address.has_port()
    }

    fn connected(&self) -> bool {
        self.handle().is_some()
    }

    fn has_handle(&self) -> bool {
        self.stream.is_some()
    }

    fn initialize(&mut self) -> Result<()> {
        if self.connected() || self.connect_in_flight() {
            return Ok(());
        }
        if !self.is_configured() {
            return Err(AgentError::NotConfigured {
                endpoint: self.describe(),
            });
        }

        // Failed connect attempt or a peer that hung up
        self.disconnect();

        let addr = self.address.resolve()?;
        let stream = Self::start_connect(addr).map_err(|e| AgentError::ClientConnect {
            host: self.address.host.clone(),
            port: self.address.port,
            source: e,
        })?;

        debug!("Connecting to {}", addr);
        self.stream = Some(stream);
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(stream) = self.stream.take() {
            debug!("Shutdown socket to {}", self.address);
            let _ = stream.shutdown(Shutdown::Write);
        }
    }

    fn describe(&self) -> String {
        format!("{} {}", self.kind(), self.address)
    }
}

impl Drop for TcpClientEndpoint {
    fn drop(&mut self) {
        self.disconnect();
    }
}
