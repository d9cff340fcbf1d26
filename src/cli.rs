//! Command-line interface definition using clap
//!
//! Flags override the matching fields of the config file.

use crate::connection::Connection;
use crate::constants::DEFAULT_CONFIG_FILE;
use clap::Parser;
use std::path::PathBuf;

// =============================================================================
// CLI Definition
// =============================================================================

/// Port agent bridging serial and network instruments to client software
#[derive(Parser, Debug)]
#[command(name = "port-agent")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file
    #[arg(short, long, value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Enable verbose debug output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run a single poll cycle, print the connection status and exit
    #[arg(long)]
    pub once: bool,

    /// Data host (overrides config)
    #[arg(long, value_name = "HOST")]
    pub data_host: Option<String>,

    /// Data port (overrides config)
    #[arg(long, value_name = "PORT")]
    pub data_port: Option<u16>,

    /// Command host (overrides config)
    #[arg(long, value_name = "HOST")]
    pub command_host: Option<String>,

    /// Command port (overrides config)
    #[arg(long, value_name = "PORT")]
    pub command_port: Option<u16>,

    /// Serial device path (overrides config)
    #[arg(long, value_name = "PATH")]
    pub device: Option<String>,

    /// Serial baud rate (overrides config)
    #[arg(long, value_name = "BAUD")]
    pub baud_rate: Option<u32>,
}

impl Cli {
    /// Apply command-line overrides to a freshly built connection
    pub fn apply_overrides(&self, connection: &mut Connection) {
        if let Some(host) = &self.data_host {
            connection.set_data_host(host.as_str());
        }
        if let Some(port) = self.data_port {
            connection.set_data_port(port);
        }
        if let Some(host) = &self.command_host {
            connection.set_command_host(host.as_str());
        }
        if let Some(port) = self.command_port {
            connection.set_command_port(port);
        }
        if let Some(path) = &self.device {
            connection.set_device_path(path.as_str());
        }
        if let Some(baud) = self.baud_rate {
            connection.set_baud_rate(baud);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
