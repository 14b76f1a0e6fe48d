//! Length-prefixed codec for TCP framing
//!
//! All messages are framed as:
//! ```text
//! [ 4 bytes: length (u32, big-endian) ][ N bytes: protobuf message ]
//! ```
//!
//! Requests and responses use the same framing; the caller picks the
//! message type when decoding.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use prost::Message;
use thiserror::Error;

/// Maximum message size (1 MiB)
pub const MAX_MESSAGE_SIZE: u32 = 1024 * 1024;

/// Errors that can occur during encoding/decoding
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Message too large: {0} bytes (max: {MAX_MESSAGE_SIZE})")]
    MessageTooLarge(usize),

    #[error("Invalid message length prefix: {0}")]
    InvalidLength(u32),

    #[error("Protobuf decode error: {0}")]
    DecodeError(#[from] prost::DecodeError),

    #[error("Protobuf encode error: {0}")]
    EncodeError(#[from] prost::EncodeError),
}

/// Encode a message into a length-prefixed byte buffer
pub fn encode<M: Message>(message: &M) -> Result<Bytes, CodecError> {
    let mut buf = BytesMut::new();
    encode_into(message, &mut buf)?;
    Ok(buf.freeze())
}

/// Encode a message directly into a provided buffer
pub fn encode_into<M: Message>(message: &M, buf: &mut BytesMut) -> Result<(), CodecError> {
    let msg_len = message.encoded_len();

    if msg_len > MAX_MESSAGE_SIZE as usize {
        return Err(CodecError::MessageTooLarge(msg_len));
    }

    buf.reserve(4 + msg_len);
    buf.put_u32(msg_len as u32);
    message.encode(buf)?;

    Ok(())
}

/// Try to decode a length-prefixed message from a buffer
///
/// Returns:
/// - `Ok(Some(message))` if a complete message was decoded
/// - `Ok(None)` if more data is needed
/// - `Err(...)` if the data is invalid
pub fn decode<M: Message + Default>(buf: &mut BytesMut) -> Result<Option<M>, CodecError> {
    if buf.len() < 4 {
        return Ok(None);
    }

    // Peek at the length prefix without consuming
    let msg_len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);

    if msg_len > MAX_MESSAGE_SIZE {
        return Err(CodecError::InvalidLength(msg_len));
    }

    let total_len = 4 + msg_len as usize;
    if buf.len() < total_len {
        return Ok(None);
    }

    buf.advance(4);
    let msg_bytes = buf.split_to(msg_len as usize);
    let message = M::decode(msg_bytes)?;

    Ok(Some(message))
}

/// Decoder state machine for streaming decoding
#[derive(Debug, Default)]
pub struct FrameDecoder {
    /// Partial frame data being accumulated
    buffer: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Add data to the decoder buffer
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to decode the next frame from the buffer
    ///
    /// Call this repeatedly until it returns `Ok(None)` to drain all complete frames
    pub fn decode_next<M: Message + Default>(&mut self) -> Result<Option<M>, CodecError> {
        decode(&mut self.buffer)
    }

    /// Bytes buffered but not yet decoded
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{request, response, DeviceStatus, InitiateDeviceActionRequest, Request, Response};

    fn create_test_request() -> Request {
        Request::new(
            1,
            request::Call::InitiateDeviceAction(InitiateDeviceActionRequest {
                device_id: 5,
                action_type: 0,
                action_param: "1.2.3".into(),
            }),
        )
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let original = create_test_request();

        let encoded = encode(&original).expect("encode failed");

        let len_prefix = u32::from_be_bytes([encoded[0], encoded[1], encoded[2], encoded[3]]);
        assert_eq!(len_prefix as usize, encoded.len() - 4);

        let mut buf = BytesMut::from(&encoded[..]);
        let decoded: Request = decode(&mut buf).expect("decode failed").expect("no message");

        assert_eq!(decoded, original);
        assert!(buf.is_empty(), "buffer should be empty after decode");
    }

    #[test]
    fn test_partial_decode() {
        let encoded = encode(&create_test_request()).expect("encode failed");

        let mut buf = BytesMut::from(&encoded[..5]);
        let result: Option<Request> = decode(&mut buf).expect("decode should not fail on partial data");
        assert!(result.is_none(), "should return None for partial data");

        // Data is not consumed until a whole frame is available
        assert_eq!(buf.len(), 5);
    }

    #[test]
    fn test_frame_decoder_chunked() {
        let request = create_test_request();
        let encoded = encode(&request).expect("encode failed");

        let mut decoder = FrameDecoder::new();

        decoder.extend(&encoded[..3]);
        assert!(decoder.decode_next::<Request>().expect("decode error").is_none());

        decoder.extend(&encoded[3..]);
        let decoded = decoder
            .decode_next::<Request>()
            .expect("decode error")
            .expect("should have message");

        assert_eq!(decoded.request_id, request.request_id);
        assert_eq!(decoder.buffer_len(), 0);
    }

    #[test]
    fn test_multiple_frames() {
        let first = Response::reply(
            1,
            response::Reply::DeviceInfo(crate::GetDeviceInfoReply {
                current_state: DeviceStatus::Busy.into(),
                info: "registered".into(),
            }),
        );
        let second = Response::error(2, crate::ErrorCode::NotFound, "Device not found: 3");

        let mut decoder = FrameDecoder::new();
        decoder.extend(&encode(&first).expect("encode failed"));
        decoder.extend(&encode(&second).expect("encode failed"));

        let a = decoder.decode_next::<Response>().expect("decode error").expect("first");
        let b = decoder.decode_next::<Response>().expect("decode error").expect("second");
        assert_eq!(a.request_id, 1);
        assert_eq!(b.request_id, 2);
        assert!(decoder.decode_next::<Response>().expect("decode error").is_none());
    }

    #[test]
    fn test_message_too_large() {
        let mut buf = BytesMut::new();
        buf.put_u32(MAX_MESSAGE_SIZE + 1);
        buf.put_bytes(0, 100);

        let result = decode::<Request>(&mut buf);
        assert!(matches!(result, Err(CodecError::InvalidLength(_))));
    }

    #[test]
    fn test_oversized_message_rejected_on_encode() {
        let request = Request::new(
            1,
            request::Call::InitiateDeviceAction(InitiateDeviceActionRequest {
                device_id: 1,
                action_type: 0,
                action_param: "x".repeat(MAX_MESSAGE_SIZE as usize + 1),
            }),
        );
        assert!(matches!(encode(&request), Err(CodecError::MessageTooLarge(_))));
    }
}
