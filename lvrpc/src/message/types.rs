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

//! Wire-stable enumerations shared by every message kind.
//!
//! All integer values in this module are part of the wire format and must
//! never be renumbered.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error returned when an integer on the wire does not name a known variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value {value}")]
pub struct UnknownVariant {
    /// Name of the enumeration that rejected the value.
    pub kind: &'static str,
    /// The rejected raw value.
    pub value: i64,
}

/// Discriminant of a [`Message`](super::Message) on the wire.
///
/// # Examples
///
/// ```rust
/// use lvrpc::message::MessageType;
///
/// assert_eq!(MessageType::try_from(4), Ok(MessageType::ReqService));
/// assert!(MessageType::RespRpc.is_response());
/// assert_eq!(MessageType::ReqTopic.response_type(), MessageType::RespTopic);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u32)]
pub enum MessageType {
    /// RPC call request.
    ReqRpc = 0,
    /// RPC call response.
    RespRpc = 1,
    /// Topic operation request (also used for server-pushed publishes).
    ReqTopic = 2,
    /// Topic operation response.
    RespTopic = 3,
    /// Service registry request (also used for online/offline pushes).
    ReqService = 4,
    /// Service registry response.
    RespService = 5,
}

impl MessageType {
    /// Every message type, in wire order.
    pub const ALL: [MessageType; 6] = [
        MessageType::ReqRpc,
        MessageType::RespRpc,
        MessageType::ReqTopic,
        MessageType::RespTopic,
        MessageType::ReqService,
        MessageType::RespService,
    ];

    /// Returns the wire value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self as u32
    }

    /// Returns `true` for the three response kinds.
    #[must_use]
    pub const fn is_response(self) -> bool {
        matches!(
            self,
            MessageType::RespRpc | MessageType::RespTopic | MessageType::RespService
        )
    }

    /// Returns the response type paired with this type.
    ///
    /// Response types map to themselves.
    #[must_use]
    pub const fn response_type(self) -> MessageType {
        match self {
            MessageType::ReqRpc | MessageType::RespRpc => MessageType::RespRpc,
            MessageType::ReqTopic | MessageType::RespTopic => MessageType::RespTopic,
            MessageType::ReqService | MessageType::RespService => MessageType::RespService,
        }
    }

    /// Returns a short stable name, used in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            MessageType::ReqRpc => "req_rpc",
            MessageType::RespRpc => "resp_rpc",
            MessageType::ReqTopic => "req_topic",
            MessageType::RespTopic => "resp_topic",
            MessageType::ReqService => "req_service",
            MessageType::RespService => "resp_service",
        }
    }
}

impl TryFrom<u32> for MessageType {
    type Error = UnknownVariant;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        MessageType::ALL
            .into_iter()
            .find(|ty| ty.as_u32() == value)
            .ok_or(UnknownVariant {
                kind: "message type",
                value: i64::from(value),
            })
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Declares an `i32`-backed wire enum with serde support through `i32`.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $($(#[$vmeta:meta])* $variant:ident = $value:literal => $label:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "i32", into = "i32")]
        pub enum $name {
            $($(#[$vmeta])* $variant = $value,)+
        }

        impl $name {
            /// Returns a short stable name, used in logs.
            #[must_use]
            pub const fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }

        impl From<$name> for i32 {
            fn from(value: $name) -> i32 {
                value as i32
            }
        }

        impl TryFrom<i32> for $name {
            type Error = UnknownVariant;

            fn try_from(value: i32) -> Result<Self, Self::Error> {
                match value {
                    $($value => Ok($name::$variant),)+
                    _ => Err(UnknownVariant {
                        kind: $kind,
                        value: i64::from(value),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

wire_enum! {
    /// Status code carried in every response body.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use lvrpc::message::{RCode, err_reason};
    ///
    /// assert_eq!(i32::from(RCode::NotFoundTopic), 8);
    /// assert_eq!(err_reason(RCode::NotFoundService), "service not found");
    /// ```
    RCode, "rcode" {
        /// Request handled successfully.
        Fine = 0 => "fine",
        /// The body could not be parsed.
        ParseFailed = 1 => "parse_failed",
        /// The message kind was not the one expected.
        WrongMsgType = 2 => "wrong_msg_type",
        /// The body failed validation.
        InvalidMsg = 3 => "invalid_msg",
        /// The connection went away.
        Disconnected = 4 => "disconnected",
        /// RPC parameters did not match the method's declaration.
        InvalidParams = 5 => "invalid_params",
        /// No provider or handler exists for the method.
        NotFoundService = 6 => "not_found_service",
        /// The operation type is not valid for this request.
        InvalidOpType = 7 => "invalid_op_type",
        /// The named topic does not exist.
        NotFoundTopic = 8 => "not_found_topic",
        /// The handler failed.
        InternalError = 9 => "internal_error",
    }
}

impl RCode {
    /// Returns `true` for [`RCode::Fine`].
    #[must_use]
    pub const fn is_fine(self) -> bool {
        matches!(self, RCode::Fine)
    }

    /// Returns the human-readable reason for this code.
    #[must_use]
    pub const fn reason(self) -> &'static str {
        match self {
            RCode::Fine => "ok",
            RCode::ParseFailed => "message parse failed",
            RCode::WrongMsgType => "wrong message type",
            RCode::InvalidMsg => "invalid message",
            RCode::Disconnected => "connection disconnected",
            RCode::InvalidParams => "invalid rpc parameters",
            RCode::NotFoundService => "service not found",
            RCode::InvalidOpType => "invalid operation type",
            RCode::NotFoundTopic => "topic not found",
            RCode::InternalError => "internal error",
        }
    }
}

/// Returns the human-readable reason for `rcode`.
#[must_use]
pub const fn err_reason(rcode: RCode) -> &'static str {
    rcode.reason()
}

wire_enum! {
    /// Operation carried by a topic request.
    TopicOptype, "topic optype" {
        /// Create a topic.
        Create = 0 => "create",
        /// Remove a topic and detach its subscribers.
        Remove = 1 => "remove",
        /// Subscribe the sending connection.
        Subscribe = 2 => "subscribe",
        /// Unsubscribe the sending connection.
        Cancel = 3 => "cancel",
        /// Publish a message to every subscriber.
        Publish = 4 => "publish",
    }
}

wire_enum! {
    /// Operation carried by a service registry message.
    ServiceOptype, "service optype" {
        /// A provider announces a method.
        Register = 0 => "register",
        /// A consumer asks for a method's providers.
        Discover = 1 => "discover",
        /// Push: a provider came online.
        Online = 2 => "online",
        /// Push: a provider went offline.
        Offline = 3 => "offline",
        /// Reply tag for a request whose optype was not understood.
        WrongType = 4 => "wrong_type",
        /// Unspecified.
        Unknown = 5 => "unknown",
    }
}

/// An optype as carried by a request body.
///
/// Values outside the enumeration still decode, so a server can answer them
/// with [`RCode::InvalidOpType`] instead of treating the frame as garbage.
///
/// # Examples
///
/// ```rust
/// use lvrpc::message::{Optype, TopicOptype};
///
/// let known: Optype<TopicOptype> = serde_json::from_str("4").unwrap();
/// assert_eq!(known, TopicOptype::Publish);
///
/// let unknown: Optype<TopicOptype> = serde_json::from_str("9").unwrap();
/// assert_eq!(unknown, Optype::Unrecognized(9));
/// assert_eq!(serde_json::to_string(&unknown).unwrap(), "9");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Optype<T> {
    /// A value naming a variant of `T`.
    Known(T),
    /// A value `T` does not define.
    Unrecognized(i32),
}

impl<T: Copy + Into<i32>> Optype<T> {
    /// Returns the wire value.
    #[must_use]
    pub fn raw(self) -> i32 {
        match self {
            Optype::Known(value) => value.into(),
            Optype::Unrecognized(raw) => raw,
        }
    }
}

impl<T: TryFrom<i32>> Optype<T> {
    /// Classifies a wire value.
    #[must_use]
    pub fn from_raw(raw: i32) -> Self {
        T::try_from(raw).map_or(Optype::Unrecognized(raw), Optype::Known)
    }
}

impl<T> Optype<T> {
    /// Returns the known variant, or `None` for an unrecognized value.
    #[must_use]
    pub fn known(self) -> Option<T> {
        match self {
            Optype::Known(value) => Some(value),
            Optype::Unrecognized(_) => None,
        }
    }
}

impl<T> From<T> for Optype<T> {
    fn from(value: T) -> Self {
        Optype::Known(value)
    }
}

impl<T: PartialEq> PartialEq<T> for Optype<T> {
    fn eq(&self, other: &T) -> bool {
        matches!(self, Optype::Known(value) if value == other)
    }
}

impl<T: Copy + Into<i32>> Serialize for Optype<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.raw())
    }
}

impl<'de, T: TryFrom<i32>> Deserialize<'de> for Optype<T> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        i32::deserialize(deserializer).map(Self::from_raw)
    }
}

impl<T: fmt::Display> fmt::Display for Optype<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Optype::Known(value) => value.fmt(f),
            Optype::Unrecognized(raw) => write!(f, "unrecognized({raw})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_wire_values() {
        for (value, ty) in MessageType::ALL.into_iter().enumerate() {
            assert_eq!(ty.as_u32() as usize, value);
            assert_eq!(MessageType::try_from(value as u32), Ok(ty));
        }
        let err = MessageType::try_from(6).unwrap_err();
        assert_eq!(err.value, 6);
    }

    #[test]
    fn test_response_pairing() {
        assert_eq!(MessageType::ReqRpc.response_type(), MessageType::RespRpc);
        assert_eq!(MessageType::ReqService.response_type(), MessageType::RespService);
        assert!(!MessageType::ReqTopic.is_response());
        assert!(MessageType::RespService.is_response());
    }

    #[test]
    fn test_rcode_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&RCode::InvalidOpType).unwrap(), "7");
        let parsed: RCode = serde_json::from_str("9").unwrap();
        assert_eq!(parsed, RCode::InternalError);
        assert!(serde_json::from_str::<RCode>("10").is_err());
    }

    #[test]
    fn test_err_reason_is_distinct_per_code() {
        let codes = (0..10).map(|v| RCode::try_from(v).unwrap());
        let reasons: std::collections::HashSet<_> = codes.map(err_reason).collect();
        assert_eq!(reasons.len(), 10);
    }

    #[test]
    fn test_optype_values() {
        assert_eq!(i32::from(TopicOptype::Publish), 4);
        assert_eq!(i32::from(ServiceOptype::Offline), 3);
        assert_eq!(ServiceOptype::try_from(5), Ok(ServiceOptype::Unknown));
        assert!(TopicOptype::try_from(5).is_err());
    }

    #[test]
    fn test_optype_keeps_unrecognized_values() {
        let optype = Optype::<ServiceOptype>::from_raw(1);
        assert_eq!(optype, ServiceOptype::Discover);
        assert_eq!(optype.known(), Some(ServiceOptype::Discover));

        let optype = Optype::<ServiceOptype>::from_raw(-3);
        assert_eq!(optype.known(), None);
        assert_eq!(optype.raw(), -3);
        assert_ne!(optype, ServiceOptype::Unknown);
        assert_eq!(optype.to_string(), "unrecognized(-3)");

        assert!(serde_json::from_str::<Optype<TopicOptype>>("\"4\"").is_err());
    }
}
