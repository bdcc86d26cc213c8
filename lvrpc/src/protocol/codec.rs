//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//


//! Length-value framing.
//!
//! Each message travels as one frame. All integers are unsigned 32-bit,
//! big-endian.
//!
//! # Protocol
//!
//! ```text
//! +--------------+----------+------------+--------------+---------------+
//! | total_length | type     | id_length  | id (N bytes) | body (M bytes)|
//! +--------------+----------+------------+--------------+---------------+
//! ```
//!
//! - **total_length**: bytes following the field, `8 + N + M`
//! - **type**: [`MessageType`] wire value
//! - **id_length**: `N`
//! - **body**: JSON document for the message type
//!
//! # Examples
//!
//! ```rust
//! use bytes::BytesMut;
//! use lvrpc::message::{Message, TopicRequest};
//! use lvrpc::protocol::LengthValueCodec;
//!
//! let codec = LengthValueCodec::default();
//! let message = Message::new("id-1", TopicRequest::create("news"));
//!
//! let mut buffer = BytesMut::from(&codec.encode(&message).unwrap()[..]);
//! assert!(codec.can_decode(&buffer));
//! assert_eq!(codec.decode(&mut buffer).unwrap(), message);
//! assert!(buffer.is_empty());
//! ```

use crate::message::{Body, Message, MessageType};
use crate::protocol::ProtocolError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Size of the `total_length` field.
pub const LENGTH_FIELD_SIZE: usize = 4;

/// Size of the `type` field.
pub const TYPE_FIELD_SIZE: usize = 4;

/// Size of the `id_length` field.
pub const ID_LENGTH_FIELD_SIZE: usize = 4;

/// Size of the fixed frame header.
pub const FRAME_HEADER_SIZE: usize = LENGTH_FIELD_SIZE + TYPE_FIELD_SIZE + ID_LENGTH_FIELD_SIZE;

/// Default maximum frame size, length prefix included (64 KiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1 << 16;

/// Encoder and decoder for length-value frames.
///
/// The codec is stateless apart from its size limit; callers own the stream
/// buffer and feed it to [`decode_next`](Self::decode_next) after every read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthValueCodec {
    max_frame_size: usize,
}

impl LengthValueCodec {
    /// Creates a codec accepting frames up to `max_frame_size` bytes,
    /// length prefix included.
    #[must_use]
    pub const fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    /// Returns the configured maximum frame size.
    #[must_use]
    pub const fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Returns the full size of the next frame, if its length prefix is buffered.
    #[must_use]
    pub fn peek_frame_size(&self, buf: &[u8]) -> Option<usize> {
        let prefix: [u8; LENGTH_FIELD_SIZE] = buf.get(..LENGTH_FIELD_SIZE)?.try_into().ok()?;
        Some(u32::from_be_bytes(prefix) as usize + LENGTH_FIELD_SIZE)
    }

    /// Returns `true` if `buf` holds at least one complete frame.
    ///
    /// Only peeks; nothing is consumed.
    #[must_use]
    pub fn can_decode(&self, buf: &[u8]) -> bool {
        self.peek_frame_size(buf)
            .is_some_and(|frame_size| frame_size <= buf.len())
    }

    /// Decodes exactly one frame from the front of `buf`.
    ///
    /// The whole frame is consumed even when its content is rejected, so the
    /// buffer stays aligned on frame boundaries.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::Incomplete`] if [`can_decode`](Self::can_decode) is false
    /// - [`ProtocolError::FrameTooLarge`] if the frame exceeds the maximum
    /// - [`ProtocolError::MalformedHeader`] if `id_length` overruns the frame
    /// - [`ProtocolError::UnknownMessageType`], [`ProtocolError::InvalidId`],
    ///   [`ProtocolError::Deserialize`] for bad content
    pub fn decode(&self, buf: &mut BytesMut) -> Result<Message, ProtocolError> {
        let frame_size = self
            .peek_frame_size(buf)
            .ok_or(ProtocolError::Incomplete {
                available: buf.len(),
                required: LENGTH_FIELD_SIZE,
            })?;
        if frame_size > self.max_frame_size {
            return Err(ProtocolError::FrameTooLarge {
                size: frame_size,
                max: self.max_frame_size,
            });
        }
        if frame_size > buf.len() {
            return Err(ProtocolError::Incomplete {
                available: buf.len(),
                required: frame_size,
            });
        }

        let mut frame = buf.split_to(frame_size).freeze();
        let total_length = frame.get_u32() as usize;
        if total_length < TYPE_FIELD_SIZE + ID_LENGTH_FIELD_SIZE {
            return Err(ProtocolError::MalformedHeader {
                total_length,
                id_length: 0,
            });
        }

        let raw_type = frame.get_u32();
        let id_length = frame.get_u32() as usize;
        if id_length > frame.remaining() {
            return Err(ProtocolError::MalformedHeader {
                total_length,
                id_length,
            });
        }

        let message_type = MessageType::try_from(raw_type)
            .map_err(|_| ProtocolError::UnknownMessageType { value: raw_type })?;
        let id = String::from_utf8(frame.split_to(id_length).to_vec())
            .map_err(|source| ProtocolError::InvalidId { source })?;
        let body = Body::from_json(message_type, &frame).map_err(|source| {
            ProtocolError::Deserialize {
                message_type,
                source,
            }
        })?;

        Ok(Message::new(id, body))
    }

    /// Decodes the next frame if one is complete.
    ///
    /// Oversized frames are reported as soon as their length prefix arrives
    /// instead of being buffered.
    ///
    /// # Errors
    ///
    /// Any error from [`decode`](Self::decode) other than
    /// [`ProtocolError::Incomplete`].
    pub fn decode_next(&self, buf: &mut BytesMut) -> Result<Option<Message>, ProtocolError> {
        match self.peek_frame_size(buf) {
            None => Ok(None),
            Some(frame_size) if frame_size > self.max_frame_size => {
                Err(ProtocolError::FrameTooLarge {
                    size: frame_size,
                    max: self.max_frame_size,
                })
            }
            Some(frame_size) if frame_size > buf.len() => Ok(None),
            Some(_) => self.decode(buf).map(Some),
        }
    }

    /// Encodes `message` into a single frame.
    ///
    /// The body is validated and serialized before any header is written.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::InvalidBody`] if validation fails or the body is empty
    /// - [`ProtocolError::Serialize`] if JSON encoding fails
    /// - [`ProtocolError::FrameTooLarge`] if the frame would exceed the maximum
    pub fn encode(&self, message: &Message) -> Result<Bytes, ProtocolError> {
        let message_type = message.message_type();
        if !message.validate() {
            return Err(ProtocolError::InvalidBody { message_type });
        }
        let body = message
            .body()
            .to_json()
            .map_err(|source| ProtocolError::Serialize {
                message_type,
                source,
            })?;
        if body.is_empty() {
            return Err(ProtocolError::InvalidBody { message_type });
        }

        let id = message.id().as_bytes();
        let frame_size = FRAME_HEADER_SIZE + id.len() + body.len();
        if frame_size > self.max_frame_size {
            return Err(ProtocolError::FrameTooLarge {
                size: frame_size,
                max: self.max_frame_size,
            });
        }

        let mut frame = BytesMut::with_capacity(frame_size);
        frame.put_u32((frame_size - LENGTH_FIELD_SIZE) as u32);
        frame.put_u32(message_type.as_u32());
        frame.put_u32(id.len() as u32);
        frame.put_slice(id);
        frame.put_slice(&body);
        Ok(frame.freeze())
    }
}

impl Default for LengthValueCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{
        HostAddr, RCode, RpcRequest, RpcResponse, ServiceResponse, TopicRequest,
    };
    use serde_json::json;

    fn raw_frame(message_type: u32, id: &[u8], body: &[u8]) -> BytesMut {
        let mut buf = BytesMut::new();
        buf.put_u32((8 + id.len() + body.len()) as u32);
        buf.put_u32(message_type);
        buf.put_u32(id.len() as u32);
        buf.put_slice(id);
        buf.put_slice(body);
        buf
    }

    #[test]
    fn test_encode_layout() {
        let codec = LengthValueCodec::default();
        let message = Message::new("ab", RpcResponse::ok(json!(50)));
        let frame = codec.encode(&message).unwrap();
        let body = br#"{"rcode":0,"result":50}"#;

        assert_eq!(&frame[0..4], &((8 + 2 + body.len()) as u32).to_be_bytes());
        assert_eq!(&frame[4..8], &1u32.to_be_bytes());
        assert_eq!(&frame[8..12], &2u32.to_be_bytes());
        assert_eq!(&frame[12..14], b"ab");
        assert_eq!(&frame[14..], body);
    }

    #[test]
    fn test_decode_every_kind() {
        let codec = LengthValueCodec::default();
        let messages = vec![
            Message::request(RpcRequest::new("add", json!({"num1": 1}))),
            Message::request(RpcResponse::error(RCode::InvalidParams)),
            Message::request(TopicRequest::publish("t", "hello")),
            Message::request(ServiceResponse::discovered(
                RCode::Fine,
                "add",
                vec![HostAddr::new("127.0.0.1", 9000)],
            )),
        ];

        let mut buf = BytesMut::new();
        for message in &messages {
            buf.extend_from_slice(&codec.encode(message).unwrap());
        }
        for message in &messages {
            assert_eq!(&codec.decode_next(&mut buf).unwrap().unwrap(), message);
        }
        assert!(buf.is_empty());
        assert!(codec.decode_next(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_partial_frame_fed_byte_by_byte() {
        let codec = LengthValueCodec::default();
        let message = Message::new("x1", TopicRequest::subscribe("news"));
        let frame = codec.encode(&message).unwrap();

        let mut buf = BytesMut::new();
        for (i, byte) in frame.iter().enumerate() {
            assert!(!codec.can_decode(&buf), "complete after {i} bytes");
            assert!(codec.decode_next(&mut buf).unwrap().is_none());
            buf.put_u8(*byte);
        }
        assert!(codec.can_decode(&buf));
        assert_eq!(codec.decode_next(&mut buf).unwrap().unwrap(), message);
    }

    #[test]
    fn test_can_decode_does_not_consume() {
        let codec = LengthValueCodec::default();
        let buf = raw_frame(2, b"i", br#"{"topic_key":"t","optype":0}"#);
        let before = buf.len();
        assert!(codec.can_decode(&buf));
        assert_eq!(buf.len(), before);
    }

    #[test]
    fn test_decode_incomplete() {
        let codec = LengthValueCodec::default();
        let mut buf = BytesMut::from(&[0u8, 0, 0][..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::Incomplete { .. })
        ));
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn test_oversized_frame_rejected_from_prefix() {
        let codec = LengthValueCodec::new(64);
        let mut buf = BytesMut::new();
        buf.put_u32(100);
        assert!(matches!(
            codec.decode_next(&mut buf),
            Err(ProtocolError::FrameTooLarge { size: 104, max: 64 })
        ));
    }

    #[test]
    fn test_encode_rejects_oversized_message() {
        let codec = LengthValueCodec::new(32);
        let message = Message::new("id", TopicRequest::publish("t", "x".repeat(64)));
        assert!(matches!(
            codec.encode(&message),
            Err(ProtocolError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn test_encode_rejects_invalid_body() {
        let codec = LengthValueCodec::default();
        let message = Message::new("id", RpcRequest::new("add", json!("not an object")));
        assert!(matches!(
            codec.encode(&message),
            Err(ProtocolError::InvalidBody {
                message_type: MessageType::ReqRpc
            })
        ));
    }

    #[test]
    fn test_unknown_type_consumes_frame() {
        let codec = LengthValueCodec::default();
        let mut buf = raw_frame(17, b"x", b"{}");
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::UnknownMessageType { value: 17 })
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_id_length_overrun() {
        let codec = LengthValueCodec::default();
        let mut buf = BytesMut::new();
        buf.put_u32(10);
        buf.put_u32(0);
        buf.put_u32(50);
        buf.put_slice(b"ab");
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::MalformedHeader { id_length: 50, .. })
        ));
    }

    #[test]
    fn test_total_length_below_header() {
        let codec = LengthValueCodec::default();
        let mut buf = BytesMut::new();
        buf.put_u32(4);
        buf.put_u32(0);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::MalformedHeader { total_length: 4, .. })
        ));
    }

    #[test]
    fn test_empty_body_fails_deserialization() {
        let codec = LengthValueCodec::default();
        let mut buf = raw_frame(0, b"x", b"");
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::Deserialize {
                message_type: MessageType::ReqRpc,
                ..
            })
        ));
    }
}
