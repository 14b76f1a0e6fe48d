//! Protocol messages for the device fleet management service
//!
//! Field tags and enum ordinals are part of the wire contract and must not
//! be renumbered.

use prost::{Enumeration, Message};

/// Operational status of a device
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum DeviceStatus {
    Idle = 0,
    Busy = 1,
    Offline = 2,
    Maintenance = 3,
    Updating = 4,
    Recovering = 5,
    Error = 6,
}

impl DeviceStatus {
    pub fn as_str_name(&self) -> &'static str {
        match self {
            DeviceStatus::Idle => "STATUS_IDLE",
            DeviceStatus::Busy => "STATUS_BUSY",
            DeviceStatus::Offline => "STATUS_OFFLINE",
            DeviceStatus::Maintenance => "STATUS_MAINTENANCE",
            DeviceStatus::Updating => "STATUS_UPDATING",
            DeviceStatus::Recovering => "STATUS_RECOVERING",
            DeviceStatus::Error => "STATUS_ERROR",
        }
    }

    pub fn from_str_name(value: &str) -> Option<Self> {
        match value {
            "STATUS_IDLE" => Some(Self::Idle),
            "STATUS_BUSY" => Some(Self::Busy),
            "STATUS_OFFLINE" => Some(Self::Offline),
            "STATUS_MAINTENANCE" => Some(Self::Maintenance),
            "STATUS_UPDATING" => Some(Self::Updating),
            "STATUS_RECOVERING" => Some(Self::Recovering),
            "STATUS_ERROR" => Some(Self::Error),
            _ => None,
        }
    }
}

/// Kind of long-running action that can be started on a device
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum ActionType {
    SoftwareUpdate = 0,
}

impl ActionType {
    pub fn as_str_name(&self) -> &'static str {
        match self {
            ActionType::SoftwareUpdate => "SOFTWARE_UPDATE",
        }
    }

    pub fn from_str_name(value: &str) -> Option<Self> {
        match value {
            "SOFTWARE_UPDATE" => Some(Self::SoftwareUpdate),
            _ => None,
        }
    }
}

/// Lifecycle of a device action
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum ActionStatus {
    Pending = 0,
    Running = 1,
    Completed = 2,
    Failed = 3,
}

impl ActionStatus {
    pub fn as_str_name(&self) -> &'static str {
        match self {
            ActionStatus::Pending => "PENDING",
            ActionStatus::Running => "RUNNING",
            ActionStatus::Completed => "COMPLETED",
            ActionStatus::Failed => "FAILED",
        }
    }

    pub fn from_str_name(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(Self::Pending),
            "RUNNING" => Some(Self::Running),
            "COMPLETED" => Some(Self::Completed),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Whether the action has reached a final state
    pub fn is_terminal(&self) -> bool {
        matches!(self, ActionStatus::Completed | ActionStatus::Failed)
    }
}

/// Error classification carried by [`RpcError`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum ErrorCode {
    Ok = 0,
    NotFound = 1,
    AlreadyExists = 2,
    InvalidArgument = 3,
    Internal = 4,
}

impl ErrorCode {
    pub fn as_str_name(&self) -> &'static str {
        match self {
            ErrorCode::Ok => "OK",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::AlreadyExists => "ALREADY_EXISTS",
            ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ErrorCode::Internal => "INTERNAL",
        }
    }

    pub fn from_str_name(value: &str) -> Option<Self> {
        match value {
            "OK" => Some(Self::Ok),
            "NOT_FOUND" => Some(Self::NotFound),
            "ALREADY_EXISTS" => Some(Self::AlreadyExists),
            "INVALID_ARGUMENT" => Some(Self::InvalidArgument),
            "INTERNAL" => Some(Self::Internal),
            _ => None,
        }
    }
}

/// Payload of RegisterDevice and SetDeviceStatus
#[derive(Clone, PartialEq, Message)]
pub struct Device {
    #[prost(int32, tag = "1")]
    pub device_id: i32,
    #[prost(enumeration = "DeviceStatus", tag = "2")]
    pub status: i32,
}

/// Empty reply
#[derive(Clone, PartialEq, Message)]
pub struct NoParam {}

#[derive(Clone, PartialEq, Message)]
pub struct GetDeviceInfoRequest {
    #[prost(int32, tag = "1")]
    pub device_id: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct GetDeviceInfoReply {
    #[prost(enumeration = "DeviceStatus", tag = "1")]
    pub current_state: i32,
    #[prost(string, tag = "2")]
    pub info: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct InitiateDeviceActionRequest {
    #[prost(int32, tag = "1")]
    pub device_id: i32,
    #[prost(enumeration = "ActionType", tag = "2")]
    pub action_type: i32,
    #[prost(string, tag = "3")]
    pub action_param: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct InitiateDeviceActionReply {
    #[prost(int32, tag = "1")]
    pub action_id: i32,
    /// Device status after the action was accepted
    #[prost(enumeration = "DeviceStatus", tag = "2")]
    pub state: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct GetDeviceActionRequest {
    #[prost(int32, tag = "1")]
    pub device_id: i32,
    #[prost(int32, tag = "2")]
    pub action_id: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct GetDeviceActionReply {
    #[prost(enumeration = "ActionStatus", tag = "1")]
    pub action_status: i32,
}

/// Failure returned in place of a reply
#[derive(Clone, PartialEq, Message)]
pub struct RpcError {
    #[prost(enumeration = "ErrorCode", tag = "1")]
    pub code: i32,
    #[prost(string, tag = "2")]
    pub message: String,
}

/// Client → server frame
#[derive(Clone, PartialEq, Message)]
pub struct Request {
    #[prost(uint64, tag = "1")]
    pub request_id: u64,
    #[prost(oneof = "request::Call", tags = "2, 3, 4, 5, 6")]
    pub call: Option<request::Call>,
}

pub mod request {
    use prost::Oneof;

    #[derive(Clone, PartialEq, Oneof)]
    pub enum Call {
        #[prost(message, tag = "2")]
        RegisterDevice(super::Device),
        #[prost(message, tag = "3")]
        SetDeviceStatus(super::Device),
        #[prost(message, tag = "4")]
        GetDeviceInfo(super::GetDeviceInfoRequest),
        #[prost(message, tag = "5")]
        InitiateDeviceAction(super::InitiateDeviceActionRequest),
        #[prost(message, tag = "6")]
        GetDeviceAction(super::GetDeviceActionRequest),
    }

    impl Call {
        /// Operation name as exposed at the service boundary
        pub fn name(&self) -> &'static str {
            match self {
                Call::RegisterDevice(_) => "RegisterDevice",
                Call::SetDeviceStatus(_) => "SetDeviceStatus",
                Call::GetDeviceInfo(_) => "GetDeviceInfo",
                Call::InitiateDeviceAction(_) => "InitiateDeviceAction",
                Call::GetDeviceAction(_) => "GetDeviceAction",
            }
        }
    }
}

/// Server → client frame
#[derive(Clone, PartialEq, Message)]
pub struct Response {
    /// Echoes the id of the request being answered
    #[prost(uint64, tag = "1")]
    pub request_id: u64,
    #[prost(oneof = "response::Reply", tags = "2, 3, 4, 5, 6")]
    pub reply: Option<response::Reply>,
}

pub mod response {
    use prost::Oneof;

    #[derive(Clone, PartialEq, Oneof)]
    pub enum Reply {
        #[prost(message, tag = "2")]
        Empty(super::NoParam),
        #[prost(message, tag = "3")]
        DeviceInfo(super::GetDeviceInfoReply),
        #[prost(message, tag = "4")]
        ActionInitiated(super::InitiateDeviceActionReply),
        #[prost(message, tag = "5")]
        ActionStatus(super::GetDeviceActionReply),
        #[prost(message, tag = "6")]
        Error(super::RpcError),
    }
}
