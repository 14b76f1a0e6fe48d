use fleet_shared::{ActionId, DeviceId, ErrorCode};
use thiserror::Error;

/// Failures raised by the registry, tracker and dispatcher
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FleetError {
    #[error("Device not found: {0}")]
    DeviceNotFound(DeviceId),

    #[error("Action {action_id} not found for device {device_id}")]
    ActionNotFound {
        device_id: DeviceId,
        action_id: ActionId,
    },

    #[error("Device already exists: {0}")]
    DeviceAlreadyExists(DeviceId),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FleetError {
    /// Boundary error code for this failure
    pub fn code(&self) -> ErrorCode {
        match self {
            FleetError::DeviceNotFound(_) | FleetError::ActionNotFound { .. } => {
                ErrorCode::NotFound
            }
            FleetError::DeviceAlreadyExists(_) => ErrorCode::AlreadyExists,
            FleetError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            FleetError::Internal(_) => ErrorCode::Internal,
        }
    }
}

pub type FleetResult<T> = Result<T, FleetError>;
