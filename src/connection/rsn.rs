//! RSN instrument connection
//!
//! The instrument (or its relay) dials in: the data role is a non-blocking TCP
//! listener on the data port. There is no command channel. Command host/port
//! setters are still accepted and the values are kept in the snapshot, but they
//! never make the command role configured, connected or initialized.

use super::{CommHandle, Role};
use crate::config::NetworkSettings;
use crate::endpoint::{Endpoint, TcpListenerEndpoint};

#[derive(Default)]
pub struct RsnConnection {
    data: TcpListenerEndpoint,
    /// Stored for forward compatibility; never initialized
    command: TcpListenerEndpoint,
}

impl RsnConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub(super) fn from_settings(settings: &NetworkSettings) -> Self {
        let mut conn = Self::new();
        conn.set_data_host(settings.data_host.as_str());
        conn.set_data_port(settings.data_port);
        conn.set_command_host(settings.command_host.as_str());
        conn.set_command_port(settings.command_port);
        conn
    }

    pub(super) fn settings(&self) -> NetworkSettings {
        NetworkSettings {
            data_host: self.data.hostname().to_string(),
            data_port: self.data.port(),
            command_host: self.command.hostname().to_string(),
            command_port: self.command.port(),
        }
    }

    pub fn set_data_port(&mut self, port: u16) {
        self.data.set_port(port);
    }

    pub fn set_data_host(&mut self, host: impl Into<String>) {
        self.data.set_hostname(host);
    }

    pub fn set_command_port(&mut self, port: u16) {
        self.command.set_port(port);
    }

    pub fn set_command_host(&mut self, host: impl Into<String>) {
        self.command.set_hostname(host);
    }

    pub fn data_endpoint(&self) -> &TcpListenerEndpoint {
        &self.data
    }

    pub(super) fn endpoint(&self, role: Role) -> Option<&dyn Endpoint> {
        match role {
            Role::Data => Some(&self.data),
            Role::Command => None,
        }
    }

    pub(super) fn endpoint_mut(&mut self, role: Role) -> Option<&mut dyn Endpoint> {
        match role {
            Role::Data => Some(&mut self.data),
            Role::Command => None,
        }
    }

    pub(super) fn connection_object(&mut self, role: Role) -> Option<CommHandle<'_>> {
        match role {
            Role::Data => self.data.handle_mut().map(CommHandle::Listener),
            Role::Command => None,
        }
    }
}
