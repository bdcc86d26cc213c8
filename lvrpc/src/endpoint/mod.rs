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


//! Server and client endpoints over TCP.
//!
//! # Servers
//!
//! - **[`RpcServer`]**: serves methods described by
//!   [`ServiceDescriptor`](crate::rpc::ServiceDescriptor)s, optionally
//!   announcing them to a registry
//! - **[`RegistryServer`]**: the service registry
//! - **[`TopicServer`]**: topic pub/sub
//! - **[`Server`]**: a bare listener and dispatcher, for custom handlers
//!
//! # Clients
//!
//! - **[`RpcClient`]**: calls methods on one server, or on providers found
//!   through a registry
//! - **[`RegistryClient`]**: announces methods to a registry
//! - **[`DiscoveryClient`]**: looks providers up in a registry
//! - **[`TopicClient`]**: topic operations and subscriptions
//!
//! All of them are configured with an [`EndpointConfig`].
//!
//! # Example
//!
//! ```rust,no_run
//! use lvrpc::endpoint::{EndpointConfig, RpcClient, RpcServer};
//! use lvrpc::rpc::{ParamType, ServiceDescriptor};
//! use serde_json::json;
//!
//! # async fn example() -> lvrpc::Result<()> {
//! let server = RpcServer::bind("127.0.0.1:0", EndpointConfig::default()).await?;
//! server.register_service(
//!     ServiceDescriptor::builder("echo")
//!         .param("text", ParamType::String)
//!         .returns(ParamType::String)
//!         .handler(|p| Ok(p["text"].clone()))
//!         .build()?,
//! );
//! let handle = server.spawn().await?;
//!
//! let client = RpcClient::connect(&handle.local_addr().to_string(), EndpointConfig::default()).await?;
//! assert_eq!(client.call("echo", json!({"text": "hi"})).await?, json!("hi"));
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod server;

pub use self::client::{DiscoveryClient, RegistryClient, RpcClient, TopicClient};
pub use self::config::EndpointConfig;
pub use self::server::{
    RegistryServer, RpcServer, RpcServerHandle, Server, ServerHandle, TopicServer,
};
