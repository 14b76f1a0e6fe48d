//! Device registry
//!
//! This module handles:
//! - Registration of devices under caller-assigned ids
//! - Status updates and status/info queries
//! - Per-device locking shared with the action tracker

mod record;

pub use record::{DeviceRecord, DeviceSnapshot};

use crate::error::{FleetError, FleetResult};
use fleet_shared::{DeviceId, DeviceStatus};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Exclusive handle to one device record
pub(crate) type DeviceHandle = Arc<Mutex<DeviceRecord>>;

/// Owns every registered device
pub struct DeviceRegistry {
    /// Map of device_id -> record
    devices: RwLock<HashMap<DeviceId, DeviceHandle>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self {
            devices: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new device with its initial status
    ///
    /// An id can only be registered once; a second registration fails with
    /// [`FleetError::DeviceAlreadyExists`] and leaves the existing record untouched.
    pub async fn register(&self, device_id: DeviceId, status: DeviceStatus) -> FleetResult<()> {
        let mut devices = self.devices.write().await;

        match devices.entry(device_id) {
            Entry::Occupied(_) => Err(FleetError::DeviceAlreadyExists(device_id)),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(DeviceRecord::new(device_id, status))));
                info!(device_id, status = status.as_str_name(), "Device registered");
                Ok(())
            }
        }
    }

    /// Overwrite the status of a registered device
    pub async fn set_status(&self, device_id: DeviceId, status: DeviceStatus) -> FleetResult<()> {
        let handle = self.handle(device_id).await?;
        let mut record = handle.lock().await;
        let previous = record.status;
        record.set_status(status, format!("status set to {}", status.as_str_name()));

        debug!(
            device_id,
            from = previous.as_str_name(),
            to = status.as_str_name(),
            "Device status updated"
        );
        Ok(())
    }

    /// Current status and info of a device
    pub async fn info(&self, device_id: DeviceId) -> FleetResult<DeviceSnapshot> {
        let handle = self.handle(device_id).await?;
        let record = handle.lock().await;
        Ok(record.snapshot())
    }

    pub async fn contains(&self, device_id: DeviceId) -> bool {
        self.devices.read().await.contains_key(&device_id)
    }

    /// Number of registered devices
    pub async fn count(&self) -> usize {
        self.devices.read().await.len()
    }

    /// Look up the lockable record for a device
    pub(crate) async fn handle(&self, device_id: DeviceId) -> FleetResult<DeviceHandle> {
        self.devices
            .read()
            .await
            .get(&device_id)
            .cloned()
            .ok_or(FleetError::DeviceNotFound(device_id))
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_and_query() {
        let registry = DeviceRegistry::new();
        registry.register(5, DeviceStatus::Idle).await.unwrap();

        let info = registry.info(5).await.unwrap();
        assert_eq!(info.device_id, 5);
        assert_eq!(info.status, DeviceStatus::Idle);
        assert_eq!(info.info, "registered with status STATUS_IDLE");
        assert_eq!(registry.count().await, 1);
    }

    #[tokio::test]
    async fn test_unknown_device_is_not_found() {
        let registry = DeviceRegistry::new();

        assert_eq!(registry.info(1).await, Err(FleetError::DeviceNotFound(1)));
        assert_eq!(
            registry.set_status(1, DeviceStatus::Busy).await,
            Err(FleetError::DeviceNotFound(1))
        );
        assert!(!registry.contains(1).await);
    }

    #[tokio::test]
    async fn test_status_last_write_wins() {
        let registry = DeviceRegistry::new();
        registry.register(5, DeviceStatus::Idle).await.unwrap();

        // Any status may follow any status
        registry.set_status(5, DeviceStatus::Error).await.unwrap();
        assert_eq!(registry.info(5).await.unwrap().status, DeviceStatus::Error);

        registry.set_status(5, DeviceStatus::Updating).await.unwrap();
        registry.set_status(5, DeviceStatus::Offline).await.unwrap();
        let info = registry.info(5).await.unwrap();
        assert_eq!(info.status, DeviceStatus::Offline);
        assert_eq!(info.info, "status set to STATUS_OFFLINE");
    }

    #[tokio::test]
    async fn test_duplicate_registration_rejected() {
        let registry = DeviceRegistry::new();
        registry.register(5, DeviceStatus::Idle).await.unwrap();

        let result = registry.register(5, DeviceStatus::Busy).await;
        assert_eq!(result, Err(FleetError::DeviceAlreadyExists(5)));

        // Existing record is untouched
        assert_eq!(registry.info(5).await.unwrap().status, DeviceStatus::Idle);
    }

    #[tokio::test]
    async fn test_concurrent_registration_single_winner() {
        let registry = Arc::new(DeviceRegistry::new());

        let attempts = (0..16).map(|_| {
            let registry = registry.clone();
            tokio::spawn(async move { registry.register(9, DeviceStatus::Busy).await })
        });
        let results = futures::future::join_all(attempts).await;

        let ok = results.iter().filter(|r| matches!(r, Ok(Ok(())))).count();
        assert_eq!(ok, 1);
        assert_eq!(registry.count().await, 1);
    }
}
