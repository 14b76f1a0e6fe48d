//! Action tracking for device actions
//!
//! This module handles:
//! - Allocating per-device action ids
//! - Recording actions and their lifecycle (PENDING -> RUNNING -> COMPLETED/FAILED)
//! - Moving the owning device into and out of its busy status
//! - Handing accepted actions to the background worker

mod action;
mod worker;

pub use action::{ActionJob, ActionOutcome, DeviceAction};
pub use worker::{ActionExecutor, ActionWorker, SimulatedExecutor};

use crate::error::{FleetError, FleetResult};
use crate::registry::DeviceRegistry;
use action::ActionLedger;
use fleet_shared::{now_ms, ActionId, ActionStatus, ActionType, DeviceId, DeviceStatus};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

/// Result of a successful InitiateDeviceAction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InitiatedAction {
    pub action_id: ActionId,
    /// Device status after the action was accepted
    pub device_status: DeviceStatus,
}

/// Status a device occupies while an action of this type is in flight
pub fn busy_status_for(action_type: ActionType) -> DeviceStatus {
    match action_type {
        ActionType::SoftwareUpdate => DeviceStatus::Updating,
    }
}

/// Tracks device actions
///
/// Lock order is always: device record, then ledgers.
pub struct ActionTracker {
    registry: Arc<DeviceRegistry>,
    /// Map of device_id -> that device's actions
    ledgers: RwLock<HashMap<DeviceId, ActionLedger>>,
    job_tx: mpsc::UnboundedSender<ActionJob>,
}

impl ActionTracker {
    /// Create a tracker and the job receiver its worker consumes
    pub fn new(registry: Arc<DeviceRegistry>) -> (Self, mpsc::UnboundedReceiver<ActionJob>) {
        let (job_tx, job_rx) = mpsc::unbounded_channel();
        let tracker = Self {
            registry,
            ledgers: RwLock::new(HashMap::new()),
            job_tx,
        };
        (tracker, job_rx)
    }

    /// Start an action on a registered device
    pub async fn initiate(
        &self,
        device_id: DeviceId,
        action_type: ActionType,
        action_param: String,
    ) -> FleetResult<InitiatedAction> {
        let handle = self.registry.handle(device_id).await?;
        let mut device = handle.lock().await;

        if self.job_tx.is_closed() {
            return Err(FleetError::Internal("action worker is not running".into()));
        }

        let action = {
            let mut ledgers = self.ledgers.write().await;
            let ledger = ledgers.entry(device_id).or_default();
            let action_id = ledger.allocate().ok_or_else(|| {
                FleetError::Internal(format!("device {} has no action ids left", device_id))
            })?;
            let action = DeviceAction::new(action_id, device_id, action_type, action_param);
            ledger.insert(action.clone());
            action
        };

        if self.job_tx.send(ActionJob::from(&action)).is_err() {
            // Worker stopped after the check above; drop the record, the id stays burned
            if let Some(ledger) = self.ledgers.write().await.get_mut(&device_id) {
                ledger.remove(action.action_id);
            }
            return Err(FleetError::Internal("action worker is not running".into()));
        }

        device.set_status(
            busy_status_for(action_type),
            format!("{} pending", action.describe()),
        );

        info!(
            device_id,
            action_id = action.action_id,
            action_type = action_type.as_str_name(),
            param = %action.action_param,
            "Device action initiated"
        );

        Ok(InitiatedAction {
            action_id: action.action_id,
            device_status: device.status,
        })
    }

    /// Current status of one action
    pub async fn status(&self, device_id: DeviceId, action_id: ActionId) -> FleetResult<ActionStatus> {
        self.action(device_id, action_id).await.map(|a| a.status)
    }

    /// Full record of one action
    pub async fn action(&self, device_id: DeviceId, action_id: ActionId) -> FleetResult<DeviceAction> {
        if !self.registry.contains(device_id).await {
            return Err(FleetError::DeviceNotFound(device_id));
        }

        self.ledgers
            .read()
            .await
            .get(&device_id)
            .and_then(|ledger| ledger.get(action_id))
            .cloned()
            .ok_or(FleetError::ActionNotFound {
                device_id,
                action_id,
            })
    }

    /// All actions of a device, ordered by id
    pub async fn actions(&self, device_id: DeviceId) -> FleetResult<Vec<DeviceAction>> {
        if !self.registry.contains(device_id).await {
            return Err(FleetError::DeviceNotFound(device_id));
        }

        Ok(self
            .ledgers
            .read()
            .await
            .get(&device_id)
            .map(|ledger| ledger.list())
            .unwrap_or_default())
    }

    /// Number of actions of a device that have not finished
    pub async fn in_flight(&self, device_id: DeviceId) -> FleetResult<usize> {
        if !self.registry.contains(device_id).await {
            return Err(FleetError::DeviceNotFound(device_id));
        }

        Ok(self
            .ledgers
            .read()
            .await
            .get(&device_id)
            .map(|ledger| ledger.in_flight())
            .unwrap_or(0))
    }

    /// Move a pending action to RUNNING
    pub(crate) async fn mark_running(&self, job: &ActionJob) -> FleetResult<()> {
        let mut ledgers = self.ledgers.write().await;
        let action = ledgers
            .get_mut(&job.device_id)
            .and_then(|ledger| ledger.get_mut(job.action_id))
            .ok_or(FleetError::ActionNotFound {
                device_id: job.device_id,
                action_id: job.action_id,
            })?;

        if action.status == ActionStatus::Pending {
            action.status = ActionStatus::Running;
            debug!(device_id = job.device_id, action_id = job.action_id, "Action running");
        }
        Ok(())
    }

    /// Record the outcome of an action and release the device
    ///
    /// The device leaves its busy status only when no other action is in
    /// flight and nobody changed its status in the meantime.
    pub(crate) async fn finish(
        &self,
        job: &ActionJob,
        outcome: ActionOutcome,
    ) -> FleetResult<ActionStatus> {
        let handle = self.registry.handle(job.device_id).await?;
        let mut device = handle.lock().await;
        let mut ledgers = self.ledgers.write().await;

        let not_found = FleetError::ActionNotFound {
            device_id: job.device_id,
            action_id: job.action_id,
        };
        let ledger = ledgers.get_mut(&job.device_id).ok_or(not_found.clone())?;
        let action = ledger.get_mut(job.action_id).ok_or(not_found)?;

        if action.status.is_terminal() {
            warn!(
                device_id = job.device_id,
                action_id = job.action_id,
                status = action.status.as_str_name(),
                "Action already finished"
            );
            return Ok(action.status);
        }

        action.finished_at_ms = Some(now_ms());
        let (status, note, released_status) = match outcome {
            ActionOutcome::Succeeded => {
                action.status = ActionStatus::Completed;
                (
                    ActionStatus::Completed,
                    format!("{} completed", action.describe()),
                    DeviceStatus::Idle,
                )
            }
            ActionOutcome::Failed(reason) => {
                action.status = ActionStatus::Failed;
                let note = format!("{} failed: {}", action.describe(), reason);
                action.error = Some(reason);
                (ActionStatus::Failed, note, DeviceStatus::Error)
            }
        };

        let release = ledger.in_flight() == 0 && device.status == busy_status_for(job.action_type);
        if release {
            device.set_status(released_status, note);
        } else {
            device.note(note);
        }

        info!(
            device_id = job.device_id,
            action_id = job.action_id,
            status = status.as_str_name(),
            device_status = device.status.as_str_name(),
            "Device action finished"
        );

        Ok(status)
    }
}
