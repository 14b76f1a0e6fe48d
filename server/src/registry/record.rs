//! Device record held by the registry

use fleet_shared::{now_ms, DeviceId, DeviceStatus};

/// Mutable state of one registered device
#[derive(Debug, Clone)]
pub struct DeviceRecord {
    pub device_id: DeviceId,
    pub status: DeviceStatus,
    /// Description of the most recent lifecycle event
    pub info: String,
    pub registered_at_ms: u64,
    pub updated_at_ms: u64,
}

impl DeviceRecord {
    pub fn new(device_id: DeviceId, status: DeviceStatus) -> Self {
        let now = now_ms();
        Self {
            device_id,
            status,
            info: format!("registered with status {}", status.as_str_name()),
            registered_at_ms: now,
            updated_at_ms: now,
        }
    }

    /// Change status and record why
    pub fn set_status(&mut self, status: DeviceStatus, note: impl Into<String>) {
        self.status = status;
        self.note(note);
    }

    /// Replace the info string without touching the status
    pub fn note(&mut self, note: impl Into<String>) {
        self.info = note.into();
        self.updated_at_ms = now_ms();
    }

    pub fn snapshot(&self) -> DeviceSnapshot {
        DeviceSnapshot {
            device_id: self.device_id,
            status: self.status,
            info: self.info.clone(),
        }
    }
}

/// Point-in-time copy of a device's status and info
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSnapshot {
    pub device_id: DeviceId,
    pub status: DeviceStatus,
    pub info: String,
}
