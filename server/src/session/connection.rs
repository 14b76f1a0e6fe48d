//! Individual client session handling

use crate::rpc::RequestDispatcher;
use anyhow::Result;
use fleet_shared::{
    codec::{self, FrameDecoder},
    ErrorCode, Request, Response,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, error, info, warn};

/// Requests of one session dispatched at the same time, by default
pub const DEFAULT_MAX_IN_FLIGHT: usize = 64;

/// Handle to send responses to a connected client
pub struct SessionHandle<S> {
    pub peer: String,
    writer: Arc<Mutex<WriteHalf<S>>>,
    pub connected_at: Instant,
}

impl<S> Clone for SessionHandle<S> {
    fn clone(&self) -> Self {
        Self {
            peer: self.peer.clone(),
            writer: self.writer.clone(),
            connected_at: self.connected_at,
        }
    }
}

impl<S: AsyncWrite> SessionHandle<S> {
    /// Send a response to this client
    pub async fn send(&self, response: &Response) -> Result<()> {
        let encoded = codec::encode(response)?;
        let mut writer = self.writer.lock().await;
        writer.write_all(&encoded).await?;
        writer.flush().await?;
        Ok(())
    }
}

/// Active client session
pub struct ClientSession<S> {
    pub handle: SessionHandle<S>,
    reader: ReadHalf<S>,
    decoder: FrameDecoder,
    read_buf: Vec<u8>,
    max_in_flight: usize,
}

impl<S> ClientSession<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Create a new session over any byte stream (TCP socket, in-memory pipe)
    pub fn new(stream: S, peer: impl Into<String>) -> Self {
        let (reader, writer) = tokio::io::split(stream);

        let handle = SessionHandle {
            peer: peer.into(),
            writer: Arc::new(Mutex::new(writer)),
            connected_at: Instant::now(),
        };

        Self {
            handle,
            reader,
            decoder: FrameDecoder::new(),
            read_buf: vec![0u8; 4096],
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }

    /// Cap on concurrently dispatched requests; reading pauses at the cap
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    /// Get a cloneable handle for sending responses
    pub fn get_handle(&self) -> SessionHandle<S> {
        self.handle.clone()
    }

    /// Read the next request from this session
    /// Returns None if the connection is closed or sent garbage
    pub async fn recv(&mut self) -> Option<Request> {
        loop {
            match self.decoder.decode_next::<Request>() {
                Ok(Some(request)) => return Some(request),
                Ok(None) => {}
                Err(e) => {
                    warn!(peer = %self.handle.peer, "Decode error: {}", e);
                    return None;
                }
            }

            match self.reader.read(&mut self.read_buf).await {
                Ok(0) => return None,
                Ok(n) => self.decoder.extend(&self.read_buf[..n]),
                Err(e) => {
                    warn!(peer = %self.handle.peer, "Read error: {}", e);
                    return None;
                }
            }
        }
    }

    /// Serve requests until the client goes away
    ///
    /// Each request runs on its own task, so responses can be written out of
    /// order; clients match them up by request id. At most `max_in_flight`
    /// requests are dispatched at once.
    pub async fn serve(mut self, dispatcher: Arc<RequestDispatcher>) {
        info!(peer = %self.handle.peer, "Client connected");
        let mut served: u64 = 0;
        let permits = Arc::new(Semaphore::new(self.max_in_flight));

        while let Some(request) = self.recv().await {
            let Ok(permit) = permits.clone().acquire_owned().await else {
                break;
            };
            served += 1;
            let handle = self.get_handle();
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                let response = handle_request(dispatcher, request).await;
                if let Err(e) = handle.send(&response).await {
                    debug!(peer = %handle.peer, request_id = response.request_id, "Failed to send response: {}", e);
                }
                drop(permit);
            });
        }

        info!(
            peer = %self.handle.peer,
            requests = served,
            connected_ms = self.handle.connected_at.elapsed().as_millis() as u64,
            "Client disconnected"
        );
    }
}

/// Dispatch a request, reporting a crashed handler as INTERNAL
async fn handle_request(dispatcher: Arc<RequestDispatcher>, request: Request) -> Response {
    let request_id = request.request_id;
    let operation = request.operation();

    match tokio::spawn(async move { dispatcher.dispatch(request).await }).await {
        Ok(response) => response,
        Err(e) => {
            error!(request_id, operation, "Request handler aborted: {}", e);
            Response::error(request_id, ErrorCode::Internal, format!("{} aborted", operation))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::FleetService;
    use crate::ServerConfig;
    use bytes::BytesMut;
    use fleet_shared::{request, response, Device, DeviceStatus, GetDeviceInfoRequest};
    use tokio::io::{duplex, DuplexStream};

    async fn read_response(stream: &mut DuplexStream, decoder: &mut FrameDecoder) -> Response {
        let mut buf = [0u8; 1024];
        loop {
            if let Some(resp) = decoder.decode_next::<Response>().unwrap() {
                return resp;
            }
            let n = stream.read(&mut buf).await.unwrap();
            assert!(n > 0, "server closed the stream");
            decoder.extend(&buf[..n]);
        }
    }

    #[tokio::test]
    async fn test_session_round_trip_over_duplex() {
        let service = FleetService::start(&ServerConfig::default());
        let (mut client, server) = duplex(64 * 1024);
        tokio::spawn(ClientSession::new(server, "duplex").serve(service.dispatcher()));

        // Two requests in a single write; answers may arrive in either order
        let mut out = BytesMut::new();
        for (id, device_id) in [(1, 5), (2, 6)] {
            codec::encode_into(
                &Request::new(
                    id,
                    request::Call::RegisterDevice(Device::new(device_id, DeviceStatus::Busy)),
                ),
                &mut out,
            )
            .unwrap();
        }
        client.write_all(&out).await.unwrap();

        let mut decoder = FrameDecoder::new();
        let mut ids = vec![
            read_response(&mut client, &mut decoder).await.request_id,
            read_response(&mut client, &mut decoder).await.request_id,
        ];
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2]);

        let info_req = Request::new(
            3,
            request::Call::GetDeviceInfo(GetDeviceInfoRequest { device_id: 5 }),
        );
        client.write_all(&codec::encode(&info_req).unwrap()).await.unwrap();
        let info_resp = read_response(&mut client, &mut decoder).await;
        assert_eq!(info_resp.request_id, 3);
        match info_resp.reply {
            Some(response::Reply::DeviceInfo(info)) => {
                assert_eq!(info.current_state(), DeviceStatus::Busy)
            }
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_single_permit_serializes_pipelined_requests() {
        let service = FleetService::start(&ServerConfig::default());
        let (mut client, server) = duplex(64 * 1024);
        tokio::spawn(
            ClientSession::new(server, "duplex")
                .with_max_in_flight(1)
                .serve(service.dispatcher()),
        );

        let mut out = BytesMut::new();
        for id in 1..=20u64 {
            codec::encode_into(
                &Request::new(
                    id,
                    request::Call::RegisterDevice(Device::new(id as i32, DeviceStatus::Idle)),
                ),
                &mut out,
            )
            .unwrap();
        }
        client.write_all(&out).await.unwrap();

        let mut decoder = FrameDecoder::new();
        for id in 1..=20u64 {
            let resp = read_response(&mut client, &mut decoder).await;
            assert_eq!(resp.request_id, id);
        }
        assert_eq!(service.registry().count().await, 20);
    }

    #[tokio::test]
    async fn test_garbage_frame_closes_session() {
        let service = FleetService::start(&ServerConfig::default());
        let (mut client, server) = duplex(1024);
        let session = tokio::spawn(ClientSession::new(server, "duplex").serve(service.dispatcher()));

        // Length prefix far beyond the maximum frame size
        client.write_all(&[0xff, 0xff, 0xff, 0xff]).await.unwrap();

        session.await.expect("session task finished cleanly");
        let mut buf = [0u8; 16];
        assert_eq!(client.read(&mut buf).await.unwrap(), 0);
    }
}
