//! Connection (§3 Connection): a bidirectional link between two interfaces.

use crate::ids::DeviceId;

#[derive(Debug, Clone)]
pub struct Connection {
    pub a_device: DeviceId,
    pub a_interface: String,
    pub b_device: DeviceId,
    pub b_interface: String,

    pub bandwidth_mbps: u32,
    pub latency_ms: u32,
    pub packet_loss: f64,
    pub up: bool,
}

impl Connection {
    pub fn new(
        a_device: DeviceId,
        a_interface: impl Into<String>,
        a_speed: u32,
        b_device: DeviceId,
        b_interface: impl Into<String>,
        b_speed: u32,
    ) -> Self {
        Self {
            a_device,
            a_interface: a_interface.into(),
            b_device,
            b_interface: b_interface.into(),
            bandwidth_mbps: a_speed.min(b_speed),
            latency_ms: 0,
            packet_loss: 0.0,
            up: true,
        }
    }

    /// Returns the peer `(device, interface)` given one endpoint's device id.
    pub fn peer_of(&self, device: DeviceId) -> Option<(DeviceId, &str)> {
        if device == self.a_device {
            Some((self.b_device, self.b_interface.as_str()))
        } else if device == self.b_device {
            Some((self.a_device, self.a_interface.as_str()))
        } else {
            None
        }
    }

    pub fn interface_of(&self, device: DeviceId) -> Option<&str> {
        if device == self.a_device {
            Some(self.a_interface.as_str())
        } else if device == self.b_device {
            Some(self.b_interface.as_str())
        } else {
            None
        }
    }

    pub fn involves(&self, device: DeviceId) -> bool {
        device == self.a_device || device == self.b_device
    }
}
