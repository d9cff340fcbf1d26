//! UDP instrument connection: datagram data channel, no command channel

use super::{CommHandle, Role};
use crate::config::NetworkSettings;
use crate::endpoint::{Endpoint, UdpEndpoint};

#[derive(Default)]
pub struct UdpConnection {
    data: UdpEndpoint,
}

impl UdpConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub(super) fn from_settings(settings: &NetworkSettings) -> Self {
        let mut conn = Self::new();
        conn.set_data_host(settings.data_host.as_str());
        conn.set_data_port(settings.data_port);
        conn
    }

    pub(super) fn settings(&self) -> NetworkSettings {
        NetworkSettings {
            data_host: self.data.hostname().to_string(),
            data_port: self.data.port(),
            ..NetworkSettings::default()
        }
    }

    pub fn set_data_port(&mut self, port: u16) {
        self.data.set_port(port);
    }

    pub fn set_data_host(&mut self, host: impl Into<String>) {
        self.data.set_hostname(host);
    }

    pub fn data_endpoint(&self) -> &UdpEndpoint {
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
            Role::Data => self.data.handle().map(CommHandle::Udp),
            Role::Command => None,
        }
    }
}
