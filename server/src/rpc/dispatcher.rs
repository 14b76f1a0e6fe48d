//! Routes requests to the registry and action tracker

use super::error::fleet_error_to_rpc;
use crate::error::{FleetError, FleetResult};
use crate::registry::DeviceRegistry;
use crate::tracker::ActionTracker;
use fleet_shared::{
    limits, request, response, ActionType, Device, DeviceStatus, GetDeviceActionReply,
    GetDeviceActionRequest, GetDeviceInfoReply, GetDeviceInfoRequest,
    InitiateDeviceActionReply, InitiateDeviceActionRequest, NoParam, Request, Response,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Stateless router for the five boundary operations
pub struct RequestDispatcher {
    registry: Arc<DeviceRegistry>,
    tracker: Arc<ActionTracker>,
    max_action_param_len: usize,
}

impl RequestDispatcher {
    pub fn new(registry: Arc<DeviceRegistry>, tracker: Arc<ActionTracker>) -> Self {
        Self {
            registry,
            tracker,
            max_action_param_len: limits::MAX_ACTION_PARAM_LEN,
        }
    }

    pub fn with_max_action_param_len(mut self, max: usize) -> Self {
        self.max_action_param_len = max;
        self
    }

    /// Handle one request; failures are returned as an error reply, never dropped
    pub async fn dispatch(&self, request: Request) -> Response {
        let request_id = request.request_id;
        let operation = request.operation();

        debug!(request_id, operation, "Dispatching request");

        let result = match request.call {
            Some(call) => self.route(call).await,
            None => Err(FleetError::InvalidArgument("request carries no operation".into())),
        };

        match result {
            Ok(reply) => Response::reply(request_id, reply),
            Err(e) => {
                warn!(request_id, operation, code = e.code().as_str_name(), "Request failed: {}", e);
                Response::reply(request_id, response::Reply::Error(fleet_error_to_rpc(e)))
            }
        }
    }

    async fn route(&self, call: request::Call) -> FleetResult<response::Reply> {
        match call {
            request::Call::RegisterDevice(req) => {
                self.register_device(req).await.map(response::Reply::Empty)
            }
            request::Call::SetDeviceStatus(req) => {
                self.set_device_status(req).await.map(response::Reply::Empty)
            }
            request::Call::GetDeviceInfo(req) => {
                self.get_device_info(req).await.map(response::Reply::DeviceInfo)
            }
            request::Call::InitiateDeviceAction(req) => self
                .initiate_device_action(req)
                .await
                .map(response::Reply::ActionInitiated),
            request::Call::GetDeviceAction(req) => {
                self.get_device_action(req).await.map(response::Reply::ActionStatus)
            }
        }
    }

    pub async fn register_device(&self, req: Device) -> FleetResult<NoParam> {
        let status = parse_device_status(req.status)?;
        self.registry.register(req.device_id, status).await?;
        Ok(NoParam {})
    }

    pub async fn set_device_status(&self, req: Device) -> FleetResult<NoParam> {
        let status = parse_device_status(req.status)?;
        self.registry.set_status(req.device_id, status).await?;
        Ok(NoParam {})
    }

    pub async fn get_device_info(&self, req: GetDeviceInfoRequest) -> FleetResult<GetDeviceInfoReply> {
        let snapshot = self.registry.info(req.device_id).await?;
        Ok(GetDeviceInfoReply {
            current_state: snapshot.status.into(),
            info: snapshot.info,
        })
    }

    pub async fn initiate_device_action(
        &self,
        req: InitiateDeviceActionRequest,
    ) -> FleetResult<InitiateDeviceActionReply> {
        let action_type = ActionType::try_from(req.action_type).map_err(|_| {
            FleetError::InvalidArgument(format!("unknown action type {}", req.action_type))
        })?;
        let param = self.validate_action_param(action_type, req.action_param)?;

        let started = self.tracker.initiate(req.device_id, action_type, param).await?;
        Ok(InitiateDeviceActionReply {
            action_id: started.action_id,
            state: started.device_status.into(),
        })
    }

    pub async fn get_device_action(
        &self,
        req: GetDeviceActionRequest,
    ) -> FleetResult<GetDeviceActionReply> {
        let status = self.tracker.status(req.device_id, req.action_id).await?;
        Ok(GetDeviceActionReply {
            action_status: status.into(),
        })
    }

    /// Check an action param and return the value to store
    ///
    /// Surrounding whitespace is removed before the checks and is not kept:
    /// `" 1.2.3 "` is stored and reported as `"1.2.3"`, and a param made only
    /// of whitespace counts as missing.
    fn validate_action_param(&self, action_type: ActionType, param: String) -> FleetResult<String> {
        let param = param.trim().to_string();

        if param.len() > self.max_action_param_len {
            return Err(FleetError::InvalidArgument(format!(
                "action_param is {} bytes (max: {})",
                param.len(),
                self.max_action_param_len
            )));
        }

        match action_type {
            ActionType::SoftwareUpdate if param.is_empty() => Err(FleetError::InvalidArgument(
                "SOFTWARE_UPDATE requires a target version in action_param".into(),
            )),
            _ => Ok(param),
        }
    }
}

fn parse_device_status(raw: i32) -> FleetResult<DeviceStatus> {
    DeviceStatus::try_from(raw)
        .map_err(|_| FleetError::InvalidArgument(format!("unknown device status {}", raw)))
}
