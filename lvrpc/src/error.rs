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


//! Top-level error type for lvrpc.
//!
//! Errors fall into the layers a call can fail in:
//!
//! 1. **Transport**: the socket failed ([`TransportError`])
//! 2. **Protocol**: a frame or body broke the wire contract ([`ProtocolError`])
//! 3. **Remote**: the peer answered with an [`RCode`] other than fine
//! 4. **Correlation**: the response never came, or came back as the wrong kind
//!
//! # Error Handling Strategy
//!
//! - **Transport and protocol errors** → the connection is unusable and is shut down
//! - **Remote errors** → reported to the caller, connection stays open
//! - **Correlation errors** → reported to the caller, connection stays open
//!
//! # Examples
//!
//! ```rust
//! use lvrpc::RpcError;
//! use lvrpc::message::RCode;
//! use lvrpc::transport::TransportError;
//!
//! let error: RpcError = TransportError::Closed.into();
//! assert!(error.is_transport_error());
//! assert_eq!(error.rcode(), RCode::Disconnected);
//!
//! let error = RpcError::Remote { rcode: RCode::NotFoundService };
//! assert_eq!(error.to_string(), "remote error: service not found");
//! ```

use crate::message::{MessageType, RCode};
use crate::protocol::ProtocolError;
use crate::transport::TransportError;
use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

/// Convenience alias used throughout the crate.
pub type Result<T, E = RpcError> = std::result::Result<T, E>;

/// Unified error type for every lvrpc operation.
#[derive(Debug)]
pub enum RpcError {
    /// Socket-level failure.
    Transport(TransportError),

    /// Framing or body encoding failure.
    Protocol(ProtocolError),

    /// The peer answered with a non-fine response code.
    Remote {
        /// Code carried by the response.
        rcode: RCode,
    },

    /// No response arrived within the allotted time.
    Timeout {
        /// Id of the unanswered request.
        request_id: String,
        /// How long the caller waited.
        duration: Duration,
    },

    /// The request can no longer be answered because its connection closed.
    Abandoned {
        /// Id of the abandoned request.
        request_id: String,
    },

    /// A request with this id is already awaiting its response.
    DuplicateRequest {
        /// The conflicting id.
        request_id: String,
    },

    /// The response carried a different message kind than the request implies.
    UnexpectedResponse {
        /// Kind the caller expected.
        expected: MessageType,
        /// Kind that arrived.
        actual: MessageType,
    },

    /// No provider host is known for a method.
    NoProvider {
        /// The method looked up.
        method: String,
    },

    /// A service description was incomplete.
    InvalidService {
        /// What was missing.
        reason: String,
    },
}

impl RpcError {
    /// Returns `true` if this is a transport-layer error.
    #[must_use]
    pub const fn is_transport_error(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Returns `true` if this is a protocol-layer error.
    #[must_use]
    pub const fn is_protocol_error(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }

    /// Returns `true` if the peer reported the failure.
    #[must_use]
    pub const fn is_remote_error(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }

    /// Returns `true` if this is a timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns the response code a peer would see for this failure.
    #[must_use]
    pub fn rcode(&self) -> RCode {
        match self {
            Self::Remote { rcode } => *rcode,
            Self::Protocol(e) => e.rcode(),
            Self::Transport(_) | Self::Abandoned { .. } => RCode::Disconnected,
            Self::UnexpectedResponse { .. } => RCode::WrongMsgType,
            Self::NoProvider { .. } => RCode::NotFoundService,
            Self::InvalidService { .. } => RCode::InvalidParams,
            Self::Timeout { .. } | Self::DuplicateRequest { .. } => RCode::InternalError,
        }
    }

    /// Returns `true` if retrying the same call may succeed.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_recoverable(),
            Self::Timeout { .. } | Self::Abandoned { .. } | Self::NoProvider { .. } => true,
            Self::Remote { rcode } => matches!(rcode, RCode::Disconnected),
            Self::Protocol(_)
            | Self::DuplicateRequest { .. }
            | Self::UnexpectedResponse { .. }
            | Self::InvalidService { .. } => false,
        }
    }

    /// Returns `true` if the connection that produced this error should be closed.
    #[must_use]
    pub fn should_close_connection(&self) -> bool {
        match self {
            Self::Transport(e) => e.should_close_transport(),
            Self::Protocol(e) => e.is_fatal(),
            _ => false,
        }
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport error: {}", e),
            Self::Protocol(e) => write!(f, "protocol error: {}", e),
            Self::Remote { rcode } => write!(f, "remote error: {}", rcode.reason()),
            Self::Timeout {
                request_id,
                duration,
            } => write!(f, "request {} timed out after {:?}", request_id, duration),
            Self::Abandoned { request_id } => {
                write!(f, "request {} abandoned before a response arrived", request_id)
            }
            Self::DuplicateRequest { request_id } => {
                write!(f, "request {} is already pending", request_id)
            }
            Self::UnexpectedResponse { expected, actual } => {
                write!(f, "expected {} response, received {}", expected, actual)
            }
            Self::NoProvider { method } => write!(f, "no provider available for {}", method),
            Self::InvalidService { reason } => write!(f, "invalid service: {}", reason),
        }
    }
}

impl StdError for RpcError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            Self::Protocol(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TransportError> for RpcError {
    fn from(error: TransportError) -> Self {
        Self::Transport(error)
    }
}

impl From<ProtocolError> for RpcError {
    fn from(error: ProtocolError) -> Self {
        Self::Protocol(error)
    }
}
