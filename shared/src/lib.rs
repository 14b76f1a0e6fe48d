//! Fleet Shared Protocol Types
//!
//! This crate provides the message types, enum names and frame codec shared
//! by the device fleet management server and its clients.

pub mod codec;
pub mod names;
pub mod proto;

use std::time::{SystemTime, UNIX_EPOCH};

// Re-export commonly used types at crate root
pub use names::{action_status_name, device_status_name, name_of, EnumName, NamedEnum};
pub use proto::*;

/// Device identifier, assigned by the caller at registration
pub type DeviceId = i32;

/// Action identifier, unique within one device
pub type ActionId = i32;

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Protocol limits and well-known defaults
pub mod limits {
    /// Default port the server listens on
    pub const DEFAULT_PORT: u16 = 50051;

    /// Longest accepted action parameter, in bytes
    pub const MAX_ACTION_PARAM_LEN: usize = 256;

    /// How long a client waits for a response before giving up
    pub const REQUEST_TIMEOUT_MS: u64 = 5000;
}

/// Builder helpers for creating messages
impl Request {
    pub fn new(request_id: u64, call: request::Call) -> Self {
        Self {
            request_id,
            call: Some(call),
        }
    }

    /// Operation name, or `"<empty>"` for a request without a call
    pub fn operation(&self) -> &'static str {
        self.call.as_ref().map(|c| c.name()).unwrap_or("<empty>")
    }
}

impl Response {
    pub fn reply(request_id: u64, reply: response::Reply) -> Self {
        Self {
            request_id,
            reply: Some(reply),
        }
    }

    pub fn error(request_id: u64, code: ErrorCode, message: impl Into<String>) -> Self {
        Self::reply(request_id, response::Reply::Error(RpcError::new(code, message)))
    }
}

impl RpcError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl Device {
    pub fn new(device_id: DeviceId, status: DeviceStatus) -> Self {
        Self {
            device_id,
            status: status.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_creation() {
        let req = Request::new(
            7,
            request::Call::GetDeviceInfo(GetDeviceInfoRequest { device_id: 5 }),
        );
        assert_eq!(req.request_id, 7);
        assert_eq!(req.operation(), "GetDeviceInfo");
        assert_eq!(Request::default().operation(), "<empty>");
    }

    #[test]
    fn test_error_response() {
        let resp = Response::error(3, ErrorCode::NotFound, "Device not found: 9");
        assert_eq!(resp.request_id, 3);
        match resp.reply {
            Some(response::Reply::Error(err)) => {
                assert_eq!(err.code(), ErrorCode::NotFound);
                assert_eq!(err.message, "Device not found: 9");
            }
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[test]
    fn test_device_status_field_accessor() {
        let device = Device::new(5, DeviceStatus::Maintenance);
        assert_eq!(device.status, 3);
        assert_eq!(device.status(), DeviceStatus::Maintenance);
    }
}
