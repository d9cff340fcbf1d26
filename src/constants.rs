//! Application-wide constants
//!
//! Centralized constants to avoid duplication and ensure consistency.

// =============================================================================
// Network
// =============================================================================

/// Address a listener binds to when no host is configured
pub const ANY_HOST: &str = "0.0.0.0";

/// Pending-connection backlog for TCP listener endpoints
pub const LISTEN_BACKLOG: i32 = 8;

/// Default data port for a freshly created agent config
pub const DEFAULT_DATA_PORT: u16 = 4001;

// =============================================================================
// Serial
// =============================================================================

/// Baud rate assumed until one is configured
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Read timeout applied to opened serial devices (milliseconds)
pub const SERIAL_TIMEOUT_MS: u64 = 1;

// =============================================================================
// Timing
// =============================================================================

/// Delay between agent poll cycles (milliseconds)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

// =============================================================================
// Files
// =============================================================================

/// Config file used when none is given on the command line
pub const DEFAULT_CONFIG_FILE: &str = "port-agent.toml";
