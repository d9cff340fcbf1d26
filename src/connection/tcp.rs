//! TCP instrument connection
//!
//! The agent dials out to the instrument on two sockets, one per role.

use super::{CommHandle, Role};
use crate::config::NetworkSettings;
use crate::endpoint::{Endpoint, TcpClientEndpoint};

#[derive(Default)]
pub struct TcpConnection {
    data: TcpClientEndpoint,
    command: TcpClientEndpoint,
}

impl TcpConnection {
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

    pub fn data_endpoint(&self) -> &TcpClientEndpoint {
        &self.data
    }

    pub fn command_endpoint(&self) -> &TcpClientEndpoint {
        &self.command
    }

    pub(super) fn endpoint(&self, role: Role) -> Option<&dyn Endpoint> {
        match role {
            Role::Data => Some(&self.data),
            Role::Command => Some(&self.command),
        }
    }

    pub(super) fn endpoint_mut(&mut self, role: Role) -> Option<&mut dyn Endpoint> {
        match role {
            Role::Data => Some(&mut self.data),
            Role::Command => Some(&mut self.command),
        }
    }

    pub(super) fn connection_object(&mut self, role: Role) -> Option<CommHandle<'_>> {
        let endpoint = match role {
            Role::Data => &mut self.data,
            Role::Command => &mut self.command,
        };
        endpoint.handle_mut().map(CommHandle::Stream)
    }
}
