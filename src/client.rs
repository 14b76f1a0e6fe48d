//! Typed client for the fleet service

use crate::transport::{TcpConnector, TransportConnector, TransportStream};
use fleet_shared::{
    codec::{self, CodecError, FrameDecoder},
    limits, request, response, ActionId, ActionStatus, ActionType, Device, DeviceId,
    DeviceStatus, ErrorCode, GetDeviceActionRequest, GetDeviceInfoReply, GetDeviceInfoRequest,
    InitiateDeviceActionReply, InitiateDeviceActionRequest, Request, Response,
};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Errors returned by [`FleetClient`]
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Server returned {}: {message}", .code.as_str_name())]
    Rpc { code: ErrorCode, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Transport error: {0:#}")]
    Transport(#[from] anyhow::Error),

    #[error("Connection closed by server")]
    ConnectionClosed,

    #[error("Unexpected reply to {operation}")]
    UnexpectedReply { operation: &'static str },

    #[error("No response within {0:?}")]
    Timeout(Duration),
}

impl ClientError {
    /// Server-side error code, when the failure came from the server
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ClientError::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Device status and info as reported by GetDeviceInfo
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInfo {
    /// Raw status ordinal; use [`DeviceInfo::status`] for the typed value
    pub status: i32,
    pub info: String,
}

impl DeviceInfo {
    /// Typed status, `None` if the server sent an ordinal this client does not know
    pub fn status(&self) -> Option<DeviceStatus> {
        DeviceStatus::try_from(self.status).ok()
    }
}

impl From<GetDeviceInfoReply> for DeviceInfo {
    fn from(reply: GetDeviceInfoReply) -> Self {
        Self {
            status: reply.current_state,
            info: reply.info,
        }
    }
}

/// Result of InitiateDeviceAction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StartedAction {
    pub action_id: ActionId,
    /// Raw device status after the action was accepted
    pub device_status: i32,
}

impl From<InitiateDeviceActionReply> for StartedAction {
    fn from(reply: InitiateDeviceActionReply) -> Self {
        Self {
            action_id: reply.action_id,
            device_status: reply.state,
        }
    }
}

/// One connection to a fleet server
///
/// Calls are issued one at a time; each waits for the response carrying
/// its request id.
pub struct FleetClient<S: TransportStream> {
    stream: S,
    decoder: FrameDecoder,
    read_buf: Vec<u8>,
    next_request_id: u64,
    request_timeout: Duration,
}

impl FleetClient<tokio::net::TcpStream> {
    /// Connect over TCP, e.g. `FleetClient::connect("localhost:50051")`
    pub async fn connect(address: impl Into<String>) -> Result<Self, ClientError> {
        Self::connect_with(&TcpConnector::new(address)).await
    }
}

impl<S: TransportStream> FleetClient<S> {
    /// Connect through any transport connector
    pub async fn connect_with<C>(connector: &C) -> Result<Self, ClientError>
    where
        C: TransportConnector<Stream = S>,
    {
        let stream = connector.connect().await?;
        debug!(transport = connector.name(), target = %connector.target(), "Connected to fleet server");
        Ok(Self::from_stream(stream))
    }

    /// Wrap an already-connected stream
    pub fn from_stream(stream: S) -> Self {
        Self {
            stream,
            decoder: FrameDecoder::new(),
            read_buf: vec![0u8; 4096],
            next_request_id: 1,
            request_timeout: Duration::from_millis(limits::REQUEST_TIMEOUT_MS),
        }
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub async fn register_device(
        &mut self,
        device_id: DeviceId,
        status: DeviceStatus,
    ) -> Result<(), ClientError> {
        let call = request::Call::RegisterDevice(Device::new(device_id, status));
        match self.call(call).await? {
            response::Reply::Empty(_) => Ok(()),
            _ => Err(ClientError::UnexpectedReply {
                operation: "RegisterDevice",
            }),
        }
    }

    pub async fn set_device_status(
        &mut self,
        device_id: DeviceId,
        status: DeviceStatus,
    ) -> Result<(), ClientError> {
        let call = request::Call::SetDeviceStatus(Device::new(device_id, status));
        match self.call(call).await? {
            response::Reply::Empty(_) => Ok(()),
            _ => Err(ClientError::UnexpectedReply {
                operation: "SetDeviceStatus",
            }),
        }
    }

    pub async fn get_device_info(&mut self, device_id: DeviceId) -> Result<DeviceInfo, ClientError> {
        let call = request::Call::GetDeviceInfo(GetDeviceInfoRequest { device_id });
        match self.call(call).await? {
            response::Reply::DeviceInfo(reply) => Ok(reply.into()),
            _ => Err(ClientError::UnexpectedReply {
                operation: "GetDeviceInfo",
            }),
        }
    }

    pub async fn initiate_device_action(
        &mut self,
        device_id: DeviceId,
        action_type: ActionType,
        action_param: impl Into<String>,
    ) -> Result<StartedAction, ClientError> {
        let call = request::Call::InitiateDeviceAction(InitiateDeviceActionRequest {
            device_id,
            action_type: action_type.into(),
            action_param: action_param.into(),
        });
        match self.call(call).await? {
            response::Reply::ActionInitiated(reply) => Ok(reply.into()),
            _ => Err(ClientError::UnexpectedReply {
                operation: "InitiateDeviceAction",
            }),
        }
    }

    /// Raw action status ordinal; see [`fleet_shared::action_status_name`]
    pub async fn get_device_action(
        &mut self,
        device_id: DeviceId,
        action_id: ActionId,
    ) -> Result<i32, ClientError> {
        let call = request::Call::GetDeviceAction(GetDeviceActionRequest {
            device_id,
            action_id,
        });
        match self.call(call).await? {
            response::Reply::ActionStatus(reply) => Ok(reply.action_status),
            _ => Err(ClientError::UnexpectedReply {
                operation: "GetDeviceAction",
            }),
        }
    }

    /// Poll an action until it reaches COMPLETED or FAILED
    pub async fn wait_for_action(
        &mut self,
        device_id: DeviceId,
        action_id: ActionId,
        poll_interval: Duration,
        deadline: Duration,
    ) -> Result<ActionStatus, ClientError> {
        let started = tokio::time::Instant::now();
        loop {
            let raw = self.get_device_action(device_id, action_id).await?;
            if let Ok(status) = ActionStatus::try_from(raw) {
                if status.is_terminal() {
                    return Ok(status);
                }
            }
            if started.elapsed() >= deadline {
                return Err(ClientError::Timeout(deadline));
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Close the connection
    pub async fn close(mut self) -> Result<(), ClientError> {
        TransportStream::shutdown(&mut self.stream).await?;
        Ok(())
    }

    /// Send one request and wait for its response
    async fn call(&mut self, call: request::Call) -> Result<response::Reply, ClientError> {
        let request_id = self.next_request_id;
        self.next_request_id += 1;

        let request = Request::new(request_id, call);
        let operation = request.operation();
        let encoded = codec::encode(&request)?;
        self.stream.write_all(&encoded).await?;
        self.stream.flush().await?;

        debug!(request_id, operation, "Request sent");

        let request_timeout = self.request_timeout;
        let response = timeout(request_timeout, self.recv_response(request_id))
            .await
            .map_err(|_| ClientError::Timeout(request_timeout))??;

        match response.reply {
            Some(response::Reply::Error(err)) => Err(ClientError::Rpc {
                code: err.code(),
                message: err.message,
            }),
            Some(reply) => Ok(reply),
            None => Err(ClientError::UnexpectedReply { operation }),
        }
    }

    async fn recv_response(&mut self, request_id: u64) -> Result<Response, ClientError> {
        loop {
            while let Some(response) = self.decoder.decode_next::<Response>()? {
                if response.request_id == request_id {
                    return Ok(response);
                }
                // Late answer to a request that already timed out
                warn!(
                    expected = request_id,
                    received = response.request_id,
                    "Discarding stale response"
                );
            }

            let n = self.stream.read(&mut self.read_buf).await?;
            if n == 0 {
                return Err(ClientError::ConnectionClosed);
            }
            self.decoder.extend(&self.read_buf[..n]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_shared::{GetDeviceActionReply, RpcError};
    use tokio::io::{duplex, DuplexStream};

    /// Minimal peer that answers each request with the reply built by `answer`
    fn fake_server<F>(mut stream: DuplexStream, answer: F) -> tokio::task::JoinHandle<()>
    where
        F: Fn(&Request) -> Option<response::Reply> + Send + 'static,
    {
        tokio::spawn(async move {
            let mut decoder = FrameDecoder::new();
            let mut buf = [0u8; 1024];
            loop {
                while let Some(req) = decoder.decode_next::<Request>().unwrap() {
                    if let Some(reply) = answer(&req) {
                        let resp = Response::reply(req.request_id, reply);
                        stream.write_all(&codec::encode(&resp).unwrap()).await.unwrap();
                    }
                }
                match stream.read(&mut buf).await {
                    Ok(0) | Err(_) => return,
                    Ok(n) => decoder.extend(&buf[..n]),
                }
            }
        })
    }

    #[tokio::test]
    async fn test_rpc_error_is_typed() {
        let (client_end, server_end) = duplex(4096);
        fake_server(server_end, |_| {
            Some(response::Reply::Error(RpcError::new(
                ErrorCode::NotFound,
                "Device not found: 3",
            )))
        });

        let mut client = FleetClient::from_stream(client_end);
        let err = client.get_device_info(3).await.unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::NotFound));
        assert_eq!(err.to_string(), "Server returned NOT_FOUND: Device not found: 3");
    }

    #[tokio::test]
    async fn test_mismatched_reply_type() {
        let (client_end, server_end) = duplex(4096);
        fake_server(server_end, |_| {
            Some(response::Reply::ActionStatus(GetDeviceActionReply { action_status: 0 }))
        });

        let mut client = FleetClient::from_stream(client_end);
        let err = client.register_device(1, DeviceStatus::Idle).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::UnexpectedReply {
                operation: "RegisterDevice"
            }
        ));
    }

    #[tokio::test]
    async fn test_request_ids_increase() {
        let (client_end, server_end) = duplex(4096);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        fake_server(server_end, move |req| {
            tx.send(req.request_id).unwrap();
            Some(response::Reply::Empty(fleet_shared::NoParam {}))
        });

        let mut client = FleetClient::from_stream(client_end);
        client.register_device(1, DeviceStatus::Idle).await.unwrap();
        client.set_device_status(1, DeviceStatus::Busy).await.unwrap();

        assert_eq!(rx.recv().await, Some(1));
        assert_eq!(rx.recv().await, Some(2));
    }

    #[tokio::test]
    async fn test_timeout_when_server_is_silent() {
        let (client_end, server_end) = duplex(4096);
        fake_server(server_end, |_| None);

        let mut client =
            FleetClient::from_stream(client_end).with_request_timeout(Duration::from_millis(50));
        let err = client.get_device_action(1, 1).await.unwrap_err();
        assert!(matches!(err, ClientError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_connection_closed() {
        let (client_end, server_end) = duplex(4096);
        drop(server_end);

        let mut client = FleetClient::from_stream(client_end);
        let err = client.get_device_info(1).await.unwrap_err();
        assert!(matches!(err, ClientError::ConnectionClosed | ClientError::Io(_)));
    }
}
