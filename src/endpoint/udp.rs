//! UDP endpoint
//!
//! Binds an ephemeral local port and associates it with the configured remote
//! address, so plain `send`/`recv` reach that peer only. Association is local
//! bookkeeping: nothing is exchanged on the wire and nothing blocks.

use super::{reconfigure, Endpoint, NetAddress, TransportKind};
use crate::error::{AgentError, Result};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use tracing::debug;

/// Connectionless endpoint; host and port are both required
#[derive(Default)]
pub struct UdpEndpoint {
    address: NetAddress,
    socket: Option<UdpSocket>,
}

impl UdpEndpoint {
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

    pub fn handle(&self) -> Option<&UdpSocket> {
        self.socket.as_ref()
    }

    fn open(remote: SocketAddr) -> std::io::Result<UdpSocket> {
        let local_ip = match remote {
            SocketAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            SocketAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        };
        let local = SocketAddr::new(local_ip, 0);

        let socket = Socket::new(Domain::for_address(remote), Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_nonblocking(true)?;
        socket.bind(&local.into())?;
        socket.connect(&remote.into())?;

        Ok(socket.into())
    }
}

impl Endpoint for UdpEndpoint {
    fn kind(&self) -> TransportKind {
        TransportKind::Udp
    }

    fn is_configured(&self) -> bool {
        self.address.has_host() && self.address.has_port()
    }

    fn connected(&self) -> bool {
        self.socket
            .as_ref()
            .map(|s| s.peer_addr().is_ok())
            .unwrap_or(false)
    }

    fn has_handle(&self) -> bool {
        self.socket.is_some()
    }

    fn initialize(&mut self) -> Result<()> {
        if self.connected() {
            return Ok(());
        }
        if !self.is_configured() {
            return Err(AgentError::NotConfigured {
                endpoint: self.describe(),
            });
        }

        self.disconnect();

        let remote = self.address.resolve()?;
        let socket = Self::open(remote).map_err(|e| AgentError::UdpBind {
            host: self.address.host.clone(),
            port: self.address.port,
            source: e,
        })?;

        debug!("UDP socket associated with {}", remote);
        self.socket = Some(socket);
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.socket.take().is_some() {
            debug!("Closed UDP socket to {}", self.address);
        }
    }

    fn describe(&self) -> String {
        format!("{} {}", self.kind(), self.address)
    }
}
