//! TCP listener endpoint
//!
//! Binds a non-blocking listening socket on the configured port and accepts
//! a single inbound peer (the instrument or its relay). The endpoint counts as
//! connected as soon as the listening socket is bound, whether or not a peer
//! has attached. Peer attachment is tracked by `TcpCommListener`; a peer that
//! hung up no longer counts as attached.

use super::{peer_closed, reconfigure, Endpoint, NetAddress, TransportKind};
use crate::constants::{ANY_HOST, LISTEN_BACKLOG};
use crate::error::{AgentError, Result};
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use tracing::{debug, info, warn};

/// Listening socket plus the peer it accepted, if any
pub struct TcpCommListener {
    listener: TcpListener,
    client: Option<TcpStream>,
}

impl TcpCommListener {
    /// Bind and listen in non-blocking mode with SO_REUSEADDR for quick rebind
    fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
        socket.set_reuse_address(true)?;
        socket.set_nonblocking(true)?;
        socket.bind(&addr.into())?;
        socket.listen(LISTEN_BACKLOG)?;

        Ok(Self {
            listener: socket.into(),
            client: None,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Listening socket is still bound
    ///
    /// Pending socket errors are not read here; reading clears them, so the
    /// owning endpoint checks them in `initialize()`.
    pub fn is_usable(&self) -> bool {
        self.listener.local_addr().is_ok()
    }

    fn take_error(&self) -> io::Result<Option<io::Error>> {
        self.listener.take_error()
    }

    /// Accept a waiting peer without blocking
    ///
    /// Returns `Ok(None)` when nobody is waiting. A newly accepted peer
    /// replaces the previous one, which is shut down.
    pub fn accept_client(&mut self) -> io::Result<Option<SocketAddr>> {
        match self.listener.accept() {
            Ok((stream, peer)) => {
                stream.set_nonblocking(true)?;
                if self.client.is_some() {
                    debug!("Replacing previous peer with {}", peer);
                    self.drop_client();
                }
                info!("Accepted peer {}", peer);
                self.client = Some(stream);
                Ok(Some(peer))
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// A peer is attached and has not hung up
    pub fn client_connected(&self) -> bool {
        self.client().is_some()
    }

    /// Attached peer, if it is still there
    pub fn client(&self) -> Option<&TcpStream> {
        self.client.as_ref().filter(|c| !peer_closed(c))
    }

    pub fn client_mut(&mut self) -> Option<&mut TcpStream> {
        self.client.as_mut().filter(|c| !peer_closed(c))
    }

    /// Release an attached peer that hung up; returns whether one was released
    pub fn release_closed_client(&mut self) -> bool {
        if self.client.is_none() || self.client_connected() {
            return false;
        }
        info!("Peer hung up");
        self.drop_client();
        true
    }

    /// Shut down and release the attached peer, keeping the listener
    pub fn drop_client(&mut self) {
        if let Some(client) = self.client.take() {
            let _ = client.shutdown(Shutdown::Both);
        }
    }
}

impl Drop for TcpCommListener {
    fn drop(&mut self) {
        self.drop_client();
    }
}

/// Inbound TCP endpoint
///
/// Only the port is required. An empty host binds to every interface.
#[derive(Default)]
pub struct TcpListenerEndpoint {
    address: NetAddress,
    listener: Option<TcpCommListener>,
}

impl TcpListenerEndpoint {
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

    /// Live listener, if bound
    pub fn handle(&self) -> Option<&TcpCommListener> {
        self.listener.as_ref()
    }

    pub fn handle_mut(&mut self) -> Option<&mut TcpCommListener> {
        self.listener.as_mut()
    }

    fn bind_host(&self) -> &str {
        if self.address.has_host() {
            &self.address.host
        } else {
            ANY_HOST
        }
    }
}

impl Endpoint for TcpListenerEndpoint {
    fn kind(&self) -> TransportKind {
        TransportKind::TcpListener
    }

    fn is_configured(&self) -> bool {
        self.address.has_port()
    }

    fn connected(&self) -> bool {
        self.listener
            .as_ref()
            .map(TcpCommListener::is_usable)
            .unwrap_or(false)
    }

    fn has_handle(&self) -> bool {
        self.listener.is_some()
    }

    fn initialize(&mut self) -> Result<()> {
        let pending = self.listener.as_ref().map(TcpCommListener::take_error);
        if let Some(Ok(Some(e)) | Err(e)) = pending {
            warn!("{}: listener error: {}", self.describe(), e);
            self.disconnect();
        }

        if self.connected() {
            return Ok(());
        }
        if !self.is_configured() {
            return Err(AgentError::NotConfigured {
                endpoint: self.describe(),
            });
        }

        // Stale handle must be gone before the port is bound again
        self.disconnect();

        let port = self.address.port;
        let addr = super::resolve(self.bind_host(), port)?;
        let listener =
            TcpCommListener::bind(addr).map_err(|e| AgentError::ListenerBind { port, source: e })?;

        debug!("Listening on {}", addr);
        self.listener = Some(listener);
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.listener.take().is_some() {
            debug!("Closed listener on port {}", self.address.port);
        }
    }

    fn describe(&self) -> String {
        format!("{} {}:{}", self.kind(), self.bind_host(), self.address.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn free_port() -> u16 {
        std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    #[test]
    fn test_listener_configured_by_port_alone() {
        let mut ep = TcpListenerEndpoint::new();
        assert!(!ep.is_configured());

        ep.set_hostname("127.0.0.1");
        assert!(!ep.is_configured());

        ep.set_port(4001);
        assert!(ep.is_configured());
        assert!(!ep.connected());
    }

    #[test]
    fn test_initialize_unconfigured_is_rejected() {
        let mut ep = TcpListenerEndpoint::new();
        let err = ep.initialize().unwrap_err();
        assert!(matches!(err, AgentError::NotConfigured { .. }));
        assert!(!ep.has_handle());
    }

    #[test]
    fn test_initialize_binds_listener() {
        let port = free_port();
        let mut ep = TcpListenerEndpoint::new();
        ep.set_hostname("127.0.0.1");
        ep.set_port(port);

        ep.initialize().unwrap();
        assert!(ep.connected());
        assert_eq!(ep.handle().unwrap().local_addr().unwrap().port(), port);
        assert!(!ep.handle().unwrap().client_connected());
    }

    #[test]
    fn test_accept_client_without_peer_returns_none() {
        let mut ep = TcpListenerEndpoint::new();
        ep.set_hostname("127.0.0.1");
        ep.set_port(free_port());
        ep.initialize().unwrap();

        let accepted = ep.handle_mut().unwrap().accept_client().unwrap();
        assert!(accepted.is_none());
    }

    #[test]
    fn test_accept_client_attaches_peer() {
        let port = free_port();
        let mut ep = TcpListenerEndpoint::new();
        ep.set_hostname("127.0.0.1");
        ep.set_port(port);
        ep.initialize().unwrap();

        let _peer = TcpStream::connect(("127.0.0.1", port)).unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        let handle = ep.handle_mut().unwrap();
        while handle.accept_client().unwrap().is_none() {
            assert!(Instant::now() < deadline, "peer never accepted");
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(handle.client_connected());

        handle.drop_client();
        assert!(!handle.client_connected());
        assert!(ep.connected());
    }

    #[test]
    fn test_hung_up_peer_is_released() {
        let port = free_port();
        let mut ep = TcpListenerEndpoint::new();
        ep.set_hostname("127.0.0.1");
        ep.set_port(port);
        ep.initialize().unwrap();

        let peer = TcpStream::connect(("127.0.0.1", port)).unwrap();
        let deadline = Instant::now() + Duration::from_secs(2);
        let handle = ep.handle_mut().unwrap();
        while handle.accept_client().unwrap().is_none() {
            assert!(Instant::now() < deadline, "peer never accepted");
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(!handle.release_closed_client());
        assert!(handle.client_mut().is_some());

        drop(peer);
        while handle.client_connected() {
            assert!(Instant::now() < deadline, "hangup never noticed");
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(handle.client().is_none());
        assert!(handle.release_closed_client());
        assert!(!handle.release_closed_client());
        assert!(ep.connected());
    }

    #[test]
    fn test_connected_query_is_repeatable() {
        let mut ep = TcpListenerEndpoint::new();
        ep.set_hostname("127.0.0.1");
        ep.set_port(free_port());
        ep.initialize().unwrap();
        let bound = ep.handle().unwrap().local_addr().unwrap();

        for _ in 0..3 {
            assert!(ep.connected());
        }
        ep.initialize().unwrap();
        assert_eq!(ep.handle().unwrap().local_addr().unwrap(), bound);
    }

    #[test]
    fn test_port_cleared_leaves_listener_down() {
        let mut ep = TcpListenerEndpoint::new();
        ep.set_hostname("127.0.0.1");
        ep.set_port(free_port());
        ep.initialize().unwrap();

        ep.set_port(0);
        assert!(!ep.is_configured());
        assert!(!ep.connected());
        assert!(!ep.has_handle());
    }

    #[test]
    fn test_same_port_keeps_listener() {
        let port = free_port();
        let mut ep = TcpListenerEndpoint::new();
        ep.set_hostname("127.0.0.1");
        ep.set_port(port);
        ep.initialize().unwrap();
        let before = ep.handle().unwrap().local_addr().unwrap();

        ep.set_port(port);
        assert!(ep.connected());
        assert_eq!(ep.handle().unwrap().local_addr().unwrap(), before);
    }

    #[test]
    fn test_port_change_rebinds() {
        let first = free_port();
        let second = loop {
            let p = free_port();
            if p != first {
                break p;
            }
        };
        let mut ep = TcpListenerEndpoint::new();
        ep.set_hostname("127.0.0.1");
        ep.set_port(first);
        ep.initialize().unwrap();

        ep.set_port(second);
        assert!(ep.connected());
        assert_eq!(ep.port(), second);
        assert_eq!(ep.handle().unwrap().local_addr().unwrap().port(), second);
    }

    #[test]
    fn test_disconnect_releases_listener() {
        let mut ep = TcpListenerEndpoint::new();
        ep.set_hostname("127.0.0.1");
        ep.set_port(free_port());
        ep.initialize().unwrap();

        ep.disconnect();
        assert!(!ep.connected());
        assert!(ep.handle().is_none());
        assert!(ep.is_configured());
    }
}
