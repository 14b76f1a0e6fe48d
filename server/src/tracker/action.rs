//! Action records and per-device ledgers

use fleet_shared::{now_ms, ActionId, ActionStatus, ActionType, DeviceId};
use std::collections::HashMap;

/// A long-running action started against a device
#[derive(Debug, Clone)]
pub struct DeviceAction {
    pub action_id: ActionId,
    pub device_id: DeviceId,
    pub action_type: ActionType,
    pub action_param: String,
    pub status: ActionStatus,
    pub created_at_ms: u64,
    pub finished_at_ms: Option<u64>,
    /// Failure reason, set when the action ends in FAILED
    pub error: Option<String>,
}

impl DeviceAction {
    pub fn new(
        action_id: ActionId,
        device_id: DeviceId,
        action_type: ActionType,
        action_param: String,
    ) -> Self {
        Self {
            action_id,
            device_id,
            action_type,
            action_param,
            status: ActionStatus::Pending,
            created_at_ms: now_ms(),
            finished_at_ms: None,
            error: None,
        }
    }

    /// Short human-readable label, e.g. `SOFTWARE_UPDATE 1.2.3 (action 4)`
    pub fn describe(&self) -> String {
        format!(
            "{} {} (action {})",
            self.action_type.as_str_name(),
            self.action_param,
            self.action_id
        )
    }
}

/// Work item handed to the action worker
#[derive(Debug, Clone, PartialEq)]
pub struct ActionJob {
    pub device_id: DeviceId,
    pub action_id: ActionId,
    pub action_type: ActionType,
    pub action_param: String,
}

impl From<&DeviceAction> for ActionJob {
    fn from(action: &DeviceAction) -> Self {
        Self {
            device_id: action.device_id,
            action_id: action.action_id,
            action_type: action.action_type,
            action_param: action.action_param.clone(),
        }
    }
}

/// How an executed action ended
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Succeeded,
    Failed(String),
}

/// All actions of one device plus its id counter
#[derive(Debug)]
pub(crate) struct ActionLedger {
    next_action_id: ActionId,
    actions: HashMap<ActionId, DeviceAction>,
}

impl Default for ActionLedger {
    fn default() -> Self {
        Self {
            next_action_id: 1,
            actions: HashMap::new(),
        }
    }
}

impl ActionLedger {
    /// Reserve the next action id; ids are never handed out twice
    ///
    /// Returns `None` once the id space of this device is exhausted.
    pub fn allocate(&mut self) -> Option<ActionId> {
        let id = self.next_action_id;
        self.next_action_id = id.checked_add(1)?;
        Some(id)
    }

    #[cfg(test)]
    pub fn starting_at(next_action_id: ActionId) -> Self {
        Self {
            next_action_id,
            ..Self::default()
        }
    }

    pub fn insert(&mut self, action: DeviceAction) {
        self.actions.insert(action.action_id, action);
    }

    pub fn remove(&mut self, action_id: ActionId) -> Option<DeviceAction> {
        self.actions.remove(&action_id)
    }

    pub fn get(&self, action_id: ActionId) -> Option<&DeviceAction> {
        self.actions.get(&action_id)
    }

    pub fn get_mut(&mut self, action_id: ActionId) -> Option<&mut DeviceAction> {
        self.actions.get_mut(&action_id)
    }

    /// Actions that have not reached a terminal state
    pub fn in_flight(&self) -> usize {
        self.actions
            .values()
            .filter(|a| !a.status.is_terminal())
            .count()
    }

    /// Actions ordered by id
    pub fn list(&self) -> Vec<DeviceAction> {
        let mut actions: Vec<DeviceAction> = self.actions.values().cloned().collect();
        actions.sort_by_key(|a| a.action_id);
        actions
    }
}
