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


#![doc = include_str!("../../README.md")]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

//! ## Architecture
//!
//! Inbound bytes flow up through the layers; responses flow back down:
//!
//! - **[`protocol`]**: length-prefixed framing of [`message::Message`]s
//! - **[`transport`]**: TCP sockets
//! - **[`connection`]**: per-socket read and write tasks
//! - **[`dispatcher`]**: routes each inbound message by its type
//! - **[`requestor`]**: matches responses to outstanding requests
//! - **[`rpc`]**, **[`registry`]**, **[`topic`]**: the three services
//! - **[`endpoint`]**: ready-made servers and clients
//!
//! ## Error Handling
//!
//! Every fallible operation returns [`Result`], whose error type
//! [`RpcError`] wraps [`transport::TransportError`] and
//! [`protocol::ProtocolError`] and adds remote and correlation failures.
//!
//! ## Features
//!
//! - `observability` (default): structured [`tracing`](https://docs.rs/tracing)
//!   events throughout. The library never installs a subscriber.

pub mod connection;
pub mod dispatcher;
pub mod endpoint;
pub mod error;
pub mod message;
pub mod protocol;
pub mod registry;
pub mod requestor;
pub mod rpc;
pub mod topic;
pub mod transport;

pub use error::{Result, RpcError};
