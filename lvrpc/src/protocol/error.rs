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


//! Error types for the wire protocol.

use crate::message::{MessageType, RCode};
use std::string::FromUtf8Error;
use thiserror::Error;

/// Errors raised while framing or unframing messages.
///
/// Every variant except [`ProtocolError::Incomplete`] indicates a broken peer
/// contract; the reader treats them as connection-fatal.
///
/// # Examples
///
/// ```rust
/// use lvrpc::protocol::ProtocolError;
///
/// let error = ProtocolError::FrameTooLarge { size: 70_000, max: 65_536 };
/// assert!(error.is_fatal());
/// assert!(error.to_string().contains("70000"));
/// ```
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A frame's declared size exceeds the configured maximum.
    #[error("frame of {size} bytes exceeds maximum of {max} bytes")]
    FrameTooLarge {
        /// Declared frame size including the length prefix.
        size: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Not enough bytes are buffered to decode a frame.
    #[error("incomplete frame: {available} of {required} bytes buffered")]
    Incomplete {
        /// Bytes currently buffered.
        available: usize,
        /// Bytes needed for the next frame.
        required: usize,
    },

    /// The header fields do not add up.
    #[error("malformed frame header: total_length={total_length}, id_length={id_length}")]
    MalformedHeader {
        /// Declared length of everything after the length prefix.
        total_length: usize,
        /// Declared id length.
        id_length: usize,
    },

    /// The request id is not valid UTF-8.
    #[error("request id is not valid UTF-8: {source}")]
    InvalidId {
        /// The underlying conversion error
        #[source]
        source: FromUtf8Error,
    },

    /// The type field names no known message type.
    #[error("unknown message type {value}")]
    UnknownMessageType {
        /// Raw type field.
        value: u32,
    },

    /// The body did not parse as the schema of its message type.
    #[error("failed to deserialize {message_type} body: {source}")]
    Deserialize {
        /// Type named by the frame.
        message_type: MessageType,
        /// The underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// The body could not be serialized.
    #[error("failed to serialize {message_type} body: {source}")]
    Serialize {
        /// Type of the message being encoded.
        message_type: MessageType,
        /// The underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// The body serialized to nothing or failed validation.
    #[error("refusing to encode invalid {message_type} body")]
    InvalidBody {
        /// Type of the message being encoded.
        message_type: MessageType,
    },
}

impl ProtocolError {
    /// Returns `true` if the connection must be closed after this error.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ProtocolError::Incomplete { .. })
    }

    /// Returns the response code matching this error.
    #[must_use]
    pub fn rcode(&self) -> RCode {
        match self {
            ProtocolError::UnknownMessageType { .. } => RCode::WrongMsgType,
            ProtocolError::InvalidBody { .. } => RCode::InvalidMsg,
            _ => RCode::ParseFailed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incomplete_is_not_fatal() {
        let error = ProtocolError::Incomplete {
            available: 3,
            required: 4,
        };
        assert!(!error.is_fatal());
        assert!(ProtocolError::UnknownMessageType { value: 9 }.is_fatal());
    }

    #[test]
    fn test_rcode_mapping() {
        assert_eq!(
            ProtocolError::UnknownMessageType { value: 9 }.rcode(),
            RCode::WrongMsgType
        );
        assert_eq!(
            ProtocolError::InvalidBody {
                message_type: MessageType::ReqRpc
            }
            .rcode(),
            RCode::InvalidMsg
        );
        assert_eq!(
            ProtocolError::MalformedHeader {
                total_length: 2,
                id_length: 0
            }
            .rcode(),
            RCode::ParseFailed
        );
    }
}
