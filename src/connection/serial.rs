//! Serial instrument connection: serial data channel, no command channel

use super::{CommHandle, Role};
use crate::config::SerialSettings;
use crate::endpoint::{Endpoint, SerialEndpoint};

#[derive(Default)]
pub struct SerialConnection {
    data: SerialEndpoint,
}

impl SerialConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub(super) fn from_settings(settings: &SerialSettings) -> Self {
        let mut conn = Self::new();
        conn.set_device_path(settings.device_path.as_str());
        conn.set_baud_rate(settings.baud_rate);
        conn
    }

    pub(super) fn settings(&self) -> SerialSettings {
        SerialSettings {
            device_path: self.data.device_path().to_string(),
            baud_rate: self.data.baud_rate(),
        }
    }

    pub fn set_device_path(&mut self, path: impl Into<String>) {
        self.data.set_device_path(path);
    }

    pub fn set_baud_rate(&mut self, baud_rate: u32) {
        self.data.set_baud_rate(baud_rate);
    }

    pub fn data_endpoint(&self) -> &SerialEndpoint {
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
            Role::Data => self.data.handle_mut().map(CommHandle::Serial),
            Role::Command => None,
        }
    }
}
