//! Integration tests for the connection layer
//!
//! Exercises connections end to end against real loopback sockets.

use port_agent::connection::{CommHandle, Connection, ConnectionKind, Role, RoleStatus};
use port_agent::PortAgent;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::time::{Duration, Instant};

// =============================================================================
// Helpers
// =============================================================================

/// Port that was free a moment ago
fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn free_port_except(taken: u16) -> u16 {
    loop {
        let port = free_port();
        if port != taken {
            return port;
        }
    }
}

/// Re-run `initialize()` until `done` holds or two seconds pass
fn poll_until(conn: &mut Connection, done: impl Fn(&Connection) -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        conn.initialize();
        if done(conn) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

fn listener_port(conn: &mut Connection) -> u16 {
    let handle = conn.data_connection_object().expect("data not connected");
    let listener = handle.into_listener().expect("data is not a listener");
    listener.local_addr().unwrap().port()
}

// =============================================================================
// RSN (listener data, no command)
// =============================================================================

#[test]
fn test_rsn_data_port_scenario() {
    let port = free_port();
    let mut conn = Connection::new(ConnectionKind::Rsn);
    conn.set_data_port(port);

    assert!(conn.data_configured());
    assert!(!conn.command_configured());
    assert!(!conn.data_connected());
    assert!(!conn.command_connected());

    let report = conn.initialize();
    assert_eq!(report.data, RoleStatus::Initialized);
    assert_eq!(report.command, RoleStatus::Unsupported);

    assert!(conn.data_connected());
    assert!(!conn.command_connected());

    let handle = conn.data_connection_object().expect("data handle absent");
    assert!(matches!(handle, CommHandle::Listener(_)));
    assert!(conn.command_connection_object().is_none());
}

#[test]
fn test_rsn_port_change_rebinds_on_new_port() {
    let first = free_port();
    let second = free_port_except(first);

    let mut conn = Connection::new(ConnectionKind::Rsn);
    conn.set_data_port(first);
    conn.initialize();
    assert_eq!(listener_port(&mut conn), first);

    conn.set_data_port(second);
    assert!(conn.data_connected());
    assert_eq!(listener_port(&mut conn), second);

    // Old port is released
    let rebound = TcpListener::bind(("127.0.0.1", first));
    assert!(rebound.is_ok());
}

#[test]
fn test_rsn_same_port_keeps_listener() {
    let port = free_port();
    let mut conn = Connection::new(ConnectionKind::Rsn);
    conn.set_data_port(port);
    conn.initialize();

    conn.set_data_port(port);
    assert!(conn.data_connected());
    assert_eq!(conn.initialize().data, RoleStatus::AlreadyConnected);
    assert_eq!(listener_port(&mut conn), port);
}

#[test]
fn test_rsn_command_role_is_always_absent() {
    let mut conn = Connection::new(ConnectionKind::Rsn);
    conn.set_command_host("127.0.0.1");
    conn.set_command_port(free_port());
    conn.set_data_port(free_port());

    let report = conn.initialize();
    assert_eq!(report.command, RoleStatus::Unsupported);
    assert!(!conn.command_configured());
    assert!(!conn.command_initialized());
    assert!(!conn.command_connected());
    assert!(conn.command_connection_object().is_none());
}

// =============================================================================
// TCP (client data, client command)
// =============================================================================

#[test]
fn test_tcp_partial_initialization_is_observable() {
    let data_server = TcpListener::bind("127.0.0.1:0").unwrap();
    let data_port = data_server.local_addr().unwrap().port();
    let command_port = free_port_except(data_port);

    let mut conn = Connection::new(ConnectionKind::Tcp);
    conn.set_data_host("127.0.0.1");
    conn.set_data_port(data_port);
    conn.set_command_host("127.0.0.1");
    conn.set_command_port(command_port);

    assert!(poll_until(&mut conn, |c| c.data_connected()));
    assert!(!conn.command_connected());
    assert!(conn.command_configured());
    assert!(conn.command_connection_object().is_none());

    let handle = conn.data_connection_object().expect("data handle absent");
    assert_eq!(handle.kind(), port_agent::endpoint::TransportKind::TcpClient);
}

#[test]
fn test_tcp_both_roles_connect() {
    let data_server = TcpListener::bind("127.0.0.1:0").unwrap();
    let command_server = TcpListener::bind("127.0.0.1:0").unwrap();

    let mut conn = Connection::new(ConnectionKind::Tcp);
    conn.set_data_host("127.0.0.1");
    conn.set_data_port(data_server.local_addr().unwrap().port());
    conn.set_command_host("127.0.0.1");
    conn.set_command_port(command_server.local_addr().unwrap().port());

    assert!(poll_until(&mut conn, |c| c.data_connected() && c.command_connected()));
    assert_eq!(conn.initialize().data, RoleStatus::AlreadyConnected);
    assert_eq!(conn.initialize().command, RoleStatus::AlreadyConnected);
}

#[test]
fn test_tcp_peer_hangup_reconnects_on_next_initialize() {
    let server = TcpListener::bind("127.0.0.1:0").unwrap();
    let mut conn = Connection::new(ConnectionKind::Tcp);
    conn.set_data_host("127.0.0.1");
    conn.set_data_port(server.local_addr().unwrap().port());
    assert!(poll_until(&mut conn, |c| c.data_connected()));

    let (instrument, _) = server.accept().unwrap();
    drop(instrument);

    let deadline = Instant::now() + Duration::from_secs(2);
    while conn.data_connected() {
        assert!(Instant::now() < deadline, "hangup never noticed");
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(conn.data_connection_object().is_none());
    assert_ne!(conn.initialize().data, RoleStatus::AlreadyConnected);

    assert!(poll_until(&mut conn, |c| c.data_connected()));
    let (_instrument, _) = server.accept().unwrap();
    assert_eq!(conn.initialize().data, RoleStatus::AlreadyConnected);
}

#[test]
fn test_caller_disconnect_then_reinitialize() {
    let server = TcpListener::bind("127.0.0.1:0").unwrap();
    let mut conn = Connection::new(ConnectionKind::Tcp);
    conn.set_data_host("127.0.0.1");
    conn.set_data_port(server.local_addr().unwrap().port());
    assert!(poll_until(&mut conn, |c| c.data_connected()));

    conn.disconnect(Role::Data);
    assert!(!conn.data_connected());
    assert!(conn.data_configured());
    assert!(conn.data_connection_object().is_none());

    assert!(poll_until(&mut conn, |c| c.data_connected()));
}

// =============================================================================
// UDP and Serial
// =============================================================================

#[test]
fn test_udp_connection_initializes_data_only() {
    let mut conn = Connection::new(ConnectionKind::Udp);
    conn.set_data_host("127.0.0.1");
    conn.set_data_port(4005);
    conn.set_command_port(4006);

    let report = conn.initialize();
    assert_eq!(report.data, RoleStatus::Initialized);
    assert_eq!(report.command, RoleStatus::Unsupported);
    assert!(matches!(
        conn.data_connection_object(),
        Some(CommHandle::Udp(_))
    ));
}

#[test]
fn test_serial_connection_missing_device() {
    let mut conn = Connection::new(ConnectionKind::Serial);
    conn.set_device_path("/dev/port-agent-missing-device");

    assert!(conn.data_configured());
    assert_eq!(conn.initialize().data, RoleStatus::Failed);
    assert!(!conn.data_connected());

    // Retrying is allowed and stays failed
    assert_eq!(conn.initialize().data, RoleStatus::Failed);
}

// =============================================================================
// Copy semantics
// =============================================================================

#[test]
fn test_duplicate_starts_disconnected() {
    let mut conn = Connection::new(ConnectionKind::Rsn);
    conn.set_data_port(free_port());
    conn.set_command_port(4010);
    conn.initialize();
    assert!(conn.data_connected());

    let copy = conn.duplicate();
    assert_eq!(copy.snapshot(), conn.snapshot());
    for role in Role::ALL {
        assert!(!copy.connected(role));
    }

    // Source keeps its handle
    assert!(conn.data_connected());
}

#[test]
fn test_from_snapshot_starts_disconnected() {
    let server = TcpListener::bind("127.0.0.1:0").unwrap();
    let mut conn = Connection::new(ConnectionKind::Tcp);
    conn.set_data_host("127.0.0.1");
    conn.set_data_port(server.local_addr().unwrap().port());
    assert!(poll_until(&mut conn, |c| c.data_connected()));

    let snapshot = conn.snapshot();
    let rebuilt = Connection::from_config(&snapshot);
    assert_eq!(rebuilt.kind(), ConnectionKind::Tcp);
    assert!(rebuilt.data_configured());
    assert!(!rebuilt.data_connected());
}

// =============================================================================
// Agent
// =============================================================================

#[test]
fn test_agent_accepts_inbound_peer() {
    let port = free_port();
    let mut conn = Connection::new(ConnectionKind::Rsn);
    conn.set_data_host("127.0.0.1");
    conn.set_data_port(port);
    let mut agent = PortAgent::new(conn);

    let status = agent.poll();
    assert!(status.data.connected);
    assert_eq!(status.peer_attached, Some(false));

    let _instrument = TcpStream::connect(("127.0.0.1", port)).unwrap();

    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        let status = agent.poll();
        if status.peer_attached == Some(true) {
            break;
        }
        assert!(Instant::now() < deadline, "peer never attached");
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_agent_releases_peer_that_hung_up() {
    let port = free_port();
    let mut conn = Connection::new(ConnectionKind::Rsn);
    conn.set_data_host("127.0.0.1");
    conn.set_data_port(port);
    let mut agent = PortAgent::new(conn);
    agent.poll();

    let mut instrument = TcpStream::connect(("127.0.0.1", port)).unwrap();
    let deadline = Instant::now() + Duration::from_secs(2);
    while agent.poll().peer_attached != Some(true) {
        assert!(Instant::now() < deadline, "peer never attached");
        std::thread::sleep(Duration::from_millis(5));
    }

    // Caller I/O goes through the accepted peer stream
    let listener = agent
        .connection_mut()
        .data_connection_object()
        .and_then(CommHandle::into_listener)
        .unwrap();
    listener.client_mut().unwrap().write_all(b"ping").unwrap();
    let mut buf = [0u8; 4];
    instrument.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"ping");

    drop(instrument);
    loop {
        let status = agent.poll();
        if status.peer_attached == Some(false) {
            assert!(status.data.connected);
            break;
        }
        assert!(Instant::now() < deadline, "hangup never noticed");
        std::thread::sleep(Duration::from_millis(5));
    }
}
