//! Endpoint abstraction for one socket or serial line
//!
//! An endpoint owns the addressable configuration of a single channel
//! (host/port or device path) and, while connected, its communication handle:
//! - **TcpListener**: non-blocking listening socket, accepts one inbound peer
//! - **TcpClient**: non-blocking outbound connection
//! - **Udp**: connectionless socket associated with one remote address
//! - **Serial**: opened serial device
//!
//! Endpoints do not read or write payload bytes. That belongs to whoever
//! borrows the handle.
//!
//! # Lifecycle
//!
//! 1. Created empty (unconfigured) by the owning connection
//! 2. Setters fill in the address; `is_configured()` turns true once every
//!    field the transport needs is set
//! 3. `initialize()` creates the handle without blocking
//! 4. `connected()` reports whether the handle is usable
//! 5. Changing an address field while a handle is held releases it first and,
//!    when it was connected, re-initializes against the new address

pub mod serial;
pub mod tcp_client;
pub mod tcp_listener;
pub mod udp;

pub use serial::SerialEndpoint;
pub use tcp_client::TcpClientEndpoint;
pub use tcp_listener::{TcpCommListener, TcpListenerEndpoint};
pub use udp::UdpEndpoint;

use crate::error::{AgentError, Result};
use socket2::SockRef;
use std::fmt;
use std::io;
use std::mem::MaybeUninit;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use tracing::{debug, warn};

/// Transport an endpoint is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    TcpClient,
    TcpListener,
    Udp,
    Serial,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TcpClient => "tcp client",
            Self::TcpListener => "tcp listener",
            Self::Udp => "udp",
            Self::Serial => "serial",
        };
        f.write_str(name)
    }
}

/// Connectivity contract shared by every endpoint
///
/// Object safe so a connection can look up the endpoint behind a role
/// without knowing its concrete transport.
pub trait Endpoint: Send {
    /// Transport this endpoint is bound to
    fn kind(&self) -> TransportKind;

    /// All fields required by the transport are set to non-default values
    fn is_configured(&self) -> bool;

    /// A live handle exists and the transport reports it usable
    fn connected(&self) -> bool;

    /// A handle exists, usable or not
    fn has_handle(&self) -> bool;

    /// Establish the communication handle without blocking
    ///
    /// No-op when already connected. Callers check `is_configured()` first;
    /// an unconfigured endpoint returns `NotConfigured` and stays untouched.
    ///
    /// Socket setup never waits on the network, but a host name (as opposed
    /// to an IP literal) is resolved through the system resolver, which can
    /// block for as long as the resolver takes. Configure IP literals where
    /// the poll cycle must stay short.
    ///
    /// # Errors
    ///
    /// Returns the bind/connect/open failure. The endpoint is left without a
    /// handle in that case.
    fn initialize(&mut self) -> Result<()>;

    /// Release the handle, if any
    fn disconnect(&mut self);

    /// Short human-readable description for logs (e.g. `tcp client 10.0.0.5:4002`)
    fn describe(&self) -> String;
}

/// Host and port of a network endpoint
///
/// Empty host and zero port mean "unset".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetAddress {
    pub host: String,
    pub port: u16,
}

impl NetAddress {
    pub fn has_host(&self) -> bool {
        !self.host.is_empty()
    }

    pub fn has_port(&self) -> bool {
        self.port != 0
    }

    /// Resolve to the first socket address
    ///
    /// IP literals resolve without touching the network. Host names go through
    /// the system resolver.
    pub fn resolve(&self) -> Result<SocketAddr> {
        resolve(&self.host, self.port)
    }
}

impl fmt::Display for NetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

pub(crate) fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    let unresolved = || AgentError::AddressResolve {
        host: host.to_string(),
        port,
    };

    (host, port)
        .to_socket_addrs()
        .map_err(|_| unresolved())?
        .next()
        .ok_or_else(unresolved)
}

/// Apply a configuration change with the eager reconnect-on-change policy
///
/// `apply` stores the new value and returns whether it differed from the old
/// one. On a real change, any held handle is released before a new one is
/// created, so one role never has two live handles. Only an endpoint that was
/// connected is re-initialized here; the others wait for the next
/// `initialize()`.
pub(crate) fn reconfigure<E, F>(endpoint: &mut E, apply: F)
where
    E: Endpoint + ?Sized,
    F: FnOnce(&mut E) -> bool,
{
    let was_connected = endpoint.connected();
    let held = endpoint.has_handle();

    if !apply(endpoint) {
        return;
    }

    if held {
        debug!("{}: configuration changed, releasing handle", endpoint.describe());
        endpoint.disconnect();
    }

    if !was_connected {
        return;
    }
    if !endpoint.is_configured() {
        debug!("{}: not configured after change, left down", endpoint.describe());
        return;
    }
    if let Err(e) = endpoint.initialize() {
        warn!("{}: re-initialization failed: {}", endpoint.describe(), e);
    }
}

/// Peer has closed its side or the stream carries a hard error
///
/// Peeks one byte without blocking and without consuming it. Pending data or
/// "would block" both mean the peer is still there.
pub(crate) fn peer_closed(stream: &TcpStream) -> bool {
    let mut buf = [MaybeUninit::<u8>::uninit(); 1];
    match peek_nonblocking(stream, &mut buf) {
        Ok(0) => true,
        Ok(_) => false,
        Err(e) => !matches!(
            e.kind(),
            io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
        ),
    }
}

#[cfg(unix)]
fn peek_nonblocking(stream: &TcpStream, buf: &mut [MaybeUninit<u8>]) -> io::Result<usize> {
    SockRef::from(stream).recv_with_flags(buf, libc::MSG_PEEK | libc::MSG_DONTWAIT)
}

/// Handles on this platform are switched to non-blocking mode when created
#[cfg(not(unix))]
fn peek_nonblocking(stream: &TcpStream, buf: &mut [MaybeUninit<u8>]) -> io::Result<usize> {
    SockRef::from(stream).peek(buf)
}

/// Non-blocking connect reported "in progress" rather than failure
pub(crate) fn is_in_progress(e: &io::Error) -> bool {
    if e.kind() == io::ErrorKind::WouldBlock {
        return true;
    }

    #[cfg(unix)]
    {
        if e.raw_os_error() == Some(libc::EINPROGRESS) {
            return true;
        }
    }

    false
}
