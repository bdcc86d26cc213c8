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


//! Typed messages exchanged over a [`Connection`](crate::connection::Connection).
//!
//! A [`Message`] is a request or response id plus a [`Body`]. The body is a
//! closed sum over the six message kinds, so the wire [`MessageType`] is
//! always derived from the body and can never disagree with it.
//!
//! # Examples
//!
//! ```rust
//! use lvrpc::message::{Message, MessageType, RpcRequest, RpcResponse};
//! use serde_json::json;
//!
//! let request = Message::request(RpcRequest::new("add", json!({"num1": 20, "num2": 30})));
//! assert_eq!(request.message_type(), MessageType::ReqRpc);
//!
//! let response = request.reply(RpcResponse::ok(json!(50)));
//! assert_eq!(response.id(), request.id());
//! assert_eq!(response.message_type(), MessageType::RespRpc);
//! ```

mod host;
mod rpc;
mod service;
mod topic;
mod types;

pub use self::host::HostAddr;
pub use self::rpc::{RpcRequest, RpcResponse};
pub use self::service::{ServiceRequest, ServiceResponse};
pub use self::topic::{TopicRequest, TopicResponse};
pub use self::types::{
    MessageType, Optype, RCode, ServiceOptype, TopicOptype, UnknownVariant, err_reason,
};

use crate::error::RpcError;
use uuid::Uuid;

/// Generates a collision-resistant request id.
#[must_use]
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// The body of a message, one variant per [`MessageType`].
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// RPC call request.
    RpcRequest(RpcRequest),
    /// RPC call response.
    RpcResponse(RpcResponse),
    /// Topic operation request or pushed publish.
    TopicRequest(TopicRequest),
    /// Topic operation response.
    TopicResponse(TopicResponse),
    /// Registry request or pushed online/offline notice.
    ServiceRequest(ServiceRequest),
    /// Registry response.
    ServiceResponse(ServiceResponse),
}

impl Body {
    /// Returns the wire type of this body.
    #[must_use]
    pub const fn message_type(&self) -> MessageType {
        match self {
            Body::RpcRequest(_) => MessageType::ReqRpc,
            Body::RpcResponse(_) => MessageType::RespRpc,
            Body::TopicRequest(_) => MessageType::ReqTopic,
            Body::TopicResponse(_) => MessageType::RespTopic,
            Body::ServiceRequest(_) => MessageType::ReqService,
            Body::ServiceResponse(_) => MessageType::RespService,
        }
    }

    /// Returns `false` if a required field is missing or mis-typed.
    #[must_use]
    pub fn validate(&self) -> bool {
        match self {
            Body::RpcRequest(body) => body.validate(),
            Body::RpcResponse(body) => body.validate(),
            Body::TopicRequest(body) => body.validate(),
            Body::TopicResponse(body) => body.validate(),
            Body::ServiceRequest(body) => body.validate(),
            Body::ServiceResponse(body) => body.validate(),
        }
    }

    pub(crate) fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        match self {
            Body::RpcRequest(body) => serde_json::to_vec(body),
            Body::RpcResponse(body) => serde_json::to_vec(body),
            Body::TopicRequest(body) => serde_json::to_vec(body),
            Body::TopicResponse(body) => serde_json::to_vec(body),
            Body::ServiceRequest(body) => serde_json::to_vec(body),
            Body::ServiceResponse(body) => serde_json::to_vec(body),
        }
    }

    pub(crate) fn from_json(message_type: MessageType, bytes: &[u8]) -> serde_json::Result<Self> {
        Ok(match message_type {
            MessageType::ReqRpc => Body::RpcRequest(serde_json::from_slice(bytes)?),
            MessageType::RespRpc => Body::RpcResponse(serde_json::from_slice(bytes)?),
            MessageType::ReqTopic => Body::TopicRequest(serde_json::from_slice(bytes)?),
            MessageType::RespTopic => Body::TopicResponse(serde_json::from_slice(bytes)?),
            MessageType::ReqService => Body::ServiceRequest(serde_json::from_slice(bytes)?),
            MessageType::RespService => Body::ServiceResponse(serde_json::from_slice(bytes)?),
        })
    }
}

/// A concrete body type tied to exactly one [`MessageType`].
///
/// Used by [`Dispatcher::register_typed`](crate::dispatcher::Dispatcher::register_typed)
/// and [`Message::into_kind`] to move between [`Body`] and the typed structs.
pub trait MessageKind: Into<Body> + Send + Sized + 'static {
    /// The wire type carrying this body.
    const MESSAGE_TYPE: MessageType;

    /// Extracts this kind from `body`, handing the body back on mismatch.
    fn from_body(body: Body) -> Result<Self, Body>;
}

macro_rules! message_kind {
    ($($ty:ident => $variant:ident, $message_type:ident;)+) => {
        $(
            impl From<$ty> for Body {
                fn from(body: $ty) -> Self {
                    Body::$variant(body)
                }
            }

            impl MessageKind for $ty {
                const MESSAGE_TYPE: MessageType = MessageType::$message_type;

                fn from_body(body: Body) -> Result<Self, Body> {
                    match body {
                        Body::$variant(body) => Ok(body),
                        other => Err(other),
                    }
                }
            }
        )+
    };
}

message_kind! {
    RpcRequest => RpcRequest, ReqRpc;
    RpcResponse => RpcResponse, RespRpc;
    TopicRequest => TopicRequest, ReqTopic;
    TopicResponse => TopicResponse, RespTopic;
    ServiceRequest => ServiceRequest, ReqService;
    ServiceResponse => ServiceResponse, RespService;
}

/// An id plus a typed body.
///
/// Messages are immutable once built; responses copy the request id through
/// [`Message::reply`].
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    id: String,
    body: Body,
}

impl Message {
    /// Creates a message with an explicit id.
    pub fn new(id: impl Into<String>, body: impl Into<Body>) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
        }
    }

    /// Creates a message with a freshly generated id.
    pub fn request(body: impl Into<Body>) -> Self {
        Self::new(generate_id(), body)
    }

    /// Creates a response to this message, carrying the same id.
    #[must_use]
    pub fn reply(&self, body: impl Into<Body>) -> Self {
        Self::new(self.id.clone(), body)
    }

    /// Returns the request id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the body.
    #[must_use]
    pub const fn body(&self) -> &Body {
        &self.body
    }

    /// Returns the wire type derived from the body.
    #[must_use]
    pub const fn message_type(&self) -> MessageType {
        self.body.message_type()
    }

    /// Validates the body.
    #[must_use]
    pub fn validate(&self) -> bool {
        self.body.validate()
    }

    /// Splits the message into its id and body.
    #[must_use]
    pub fn into_parts(self) -> (String, Body) {
        (self.id, self.body)
    }

    /// Converts the body into the typed kind `T`.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::UnexpectedResponse`] if the body is another kind.
    pub fn into_kind<T: MessageKind>(self) -> Result<T, RpcError> {
        T::from_body(self.body).map_err(|other| RpcError::UnexpectedResponse {
            expected: T::MESSAGE_TYPE,
            actual: other.message_type(),
        })
    }
}
