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


//! Server endpoints.
//!
//! A [`Server`] owns a TCP listener and a [`Dispatcher`] shared by every
//! accepted connection. [`RpcServer`], [`RegistryServer`] and [`TopicServer`]
//! wire the matching engine into that dispatcher.

use super::{EndpointConfig, RegistryClient};
use crate::connection::{Connection, ConnectionId, ConnectionRef};
use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::message::HostAddr;
use crate::registry::ProviderDiscovererManager;
use crate::rpc::{RpcRouter, ServiceDescriptor};
use crate::topic::server::TopicManager;
use crate::transport::TcpAcceptor;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

#[cfg(feature = "observability")]
use tracing::{error, info};

type ConnectionTable = Arc<Mutex<HashMap<ConnectionId, ConnectionRef>>>;

/// A bound listener whose connections share one dispatcher.
///
/// # Example
///
/// ```rust,no_run
/// use lvrpc::endpoint::{EndpointConfig, Server};
/// use lvrpc::message::MessageType;
///
/// # async fn example() -> lvrpc::Result<()> {
/// let server = Server::bind("127.0.0.1:0", EndpointConfig::default()).await?;
/// server.dispatcher().register(MessageType::ReqRpc, |connection, message| {
///     println!("{} sent {}", connection.id(), message.id());
/// });
/// let handle = server.spawn();
/// println!("listening on {}", handle.local_addr());
/// handle.shutdown();
/// # Ok(())
/// # }
/// ```
pub struct Server {
    acceptor: TcpAcceptor,
    local_addr: SocketAddr,
    config: EndpointConfig,
    dispatcher: Arc<Dispatcher>,
    connections: ConnectionTable,
}

impl Server {
    /// Binds a listener to `addr`.
    ///
    /// # Errors
    ///
    /// Fails if `config` is invalid or the address cannot be bound.
    pub async fn bind(addr: impl Into<String>, config: EndpointConfig) -> Result<Self> {
        config.validate()?;
        let addr: String = addr.into();
        let acceptor = TcpAcceptor::bind(&addr, &config).await?;
        let local_addr = acceptor.local_addr();

        let dispatcher = Arc::new(Dispatcher::new());
        let connections: ConnectionTable = Arc::default();
        let table = connections.clone();
        dispatcher.on_close(move |connection| {
            table.lock().remove(&connection.id());
        });

        Ok(Self {
            acceptor,
            local_addr,
            config,
            dispatcher,
            connections,
        })
    }

    /// Returns the bound address.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the dispatcher every accepted connection is served by.
    #[must_use]
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Accepts connections until the task is aborted.
    ///
    /// Accept failures are logged and do not stop the loop.
    pub async fn run(self) {
        #[cfg(feature = "observability")]
        info!(local_addr = %self.local_addr, "Server accepting connections");

        loop {
            match self.acceptor.accept().await {
                Ok(transport) => {
                    let connection =
                        Connection::spawn_tcp(transport, &self.config, self.dispatcher.clone());
                    self.connections
                        .lock()
                        .insert(connection.id(), connection.clone());
                    // The close hook may have run before the insert.
                    if !connection.is_connected() {
                        self.connections.lock().remove(&connection.id());
                    }
                }
                Err(_e) => {
                    #[cfg(feature = "observability")]
                    error!(local_addr = %self.local_addr, error = %_e, "Accept failed");

                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
            }
        }
    }

    /// Runs the accept loop on a new task.
    pub fn spawn(self) -> ServerHandle {
        let local_addr = self.local_addr;
        let connections = self.connections.clone();
        let accept_task = tokio::spawn(self.run());
        ServerHandle {
            local_addr,
            accept_task,
            connections,
        }
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("local_addr", &self.local_addr)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

/// A running [`Server`].
///
/// Dropping the handle stops accepting; open connections stay up until
/// [`shutdown`](Self::shutdown) or until their peers close them.
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    accept_task: JoinHandle<()>,
    connections: ConnectionTable,
}

impl ServerHandle {
    /// Returns the bound address.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the number of open connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Stops accepting and shuts every open connection down.
    pub fn shutdown(&self) {
        #[cfg(feature = "observability")]
        info!(local_addr = %self.local_addr, "Shutting down server");

        self.accept_task.abort();
        let connections: Vec<_> = self.connections.lock().values().cloned().collect();
        for connection in connections {
            connection.shutdown();
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

/// Serves RPC methods, optionally announcing them to a registry.
///
/// # Example
///
/// ```rust,no_run
/// use lvrpc::endpoint::{EndpointConfig, RpcServer};
/// use lvrpc::rpc::{ParamType, ServiceDescriptor};
/// use serde_json::json;
///
/// # async fn example() -> lvrpc::Result<()> {
/// let mut server = RpcServer::bind("127.0.0.1:9090", EndpointConfig::default()).await?;
/// server.register_service(
///     ServiceDescriptor::builder("add")
///         .param("num1", ParamType::Integral)
///         .param("num2", ParamType::Integral)
///         .returns(ParamType::Integral)
///         .handler(|p| Ok(json!(p["num1"].as_i64().unwrap_or(0) + p["num2"].as_i64().unwrap_or(0))))
///         .build()?,
/// );
/// server.enable_registry("127.0.0.1:8080", None);
/// let handle = server.spawn().await?;
/// # drop(handle);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct RpcServer {
    server: Server,
    router: Arc<RpcRouter>,
    registry: Option<(String, Option<HostAddr>)>,
}

impl RpcServer {
    /// Binds an RPC server to `addr`.
    ///
    /// # Errors
    ///
    /// As [`Server::bind`].
    pub async fn bind(addr: impl Into<String>, config: EndpointConfig) -> Result<Self> {
        let server = Server::bind(addr, config).await?;
        let router = Arc::new(RpcRouter::new());
        router.attach(server.dispatcher());
        Ok(Self {
            server,
            router,
            registry: None,
        })
    }

    /// Returns the bound address.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    /// Adds a method. Returns `false` if the name is taken.
    pub fn register_service(&self, service: ServiceDescriptor) -> bool {
        self.router.register_service(service)
    }

    /// Returns the router serving this server's methods.
    #[must_use]
    pub fn router(&self) -> &Arc<RpcRouter> {
        &self.router
    }

    /// Announces every method to the registry at `registry_addr` on start.
    ///
    /// Consumers are told to connect to `access_host`, or to the bound
    /// address if `None`.
    pub fn enable_registry(&mut self, registry_addr: impl Into<String>, access_host: Option<HostAddr>) {
        self.registry = Some((registry_addr.into(), access_host));
    }

    /// Starts accepting, then registers with the registry if enabled.
    ///
    /// # Errors
    ///
    /// Fails if the registry cannot be reached or refuses a registration;
    /// the server is stopped again in that case.
    pub async fn spawn(self) -> Result<RpcServerHandle> {
        let config = self.server.config.clone();
        let access = HostAddr::from(self.server.local_addr());
        let server = self.server.spawn();

        let registry = match self.registry {
            Some((registry_addr, access_host)) => {
                let access = access_host.unwrap_or(access);
                match Self::announce(&registry_addr, &config, &self.router, &access).await {
                    Ok(client) => Some(client),
                    Err(e) => {
                        server.shutdown();
                        return Err(e);
                    }
                }
            }
            None => None,
        };

        Ok(RpcServerHandle { server, registry })
    }

    async fn announce(
        registry_addr: &str,
        config: &EndpointConfig,
        router: &RpcRouter,
        access: &HostAddr,
    ) -> Result<RegistryClient> {
        let client = RegistryClient::connect(registry_addr, config.clone()).await?;
        for method in router.services().methods() {
            client.register_service(&method, access).await?;
        }

        #[cfg(feature = "observability")]
        info!(registry = %registry_addr, host = %access, "Announced services to registry");

        Ok(client)
    }
}

/// A running [`RpcServer`].
///
/// Keeps the registry connection open; closing it takes every announced
/// method offline.
#[derive(Debug)]
pub struct RpcServerHandle {
    server: ServerHandle,
    registry: Option<RegistryClient>,
}

impl RpcServerHandle {
    /// Returns the bound address.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    /// Returns the number of open client connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.server.connection_count()
    }

    /// Stops serving and withdraws from the registry.
    pub fn shutdown(&self) {
        if let Some(registry) = &self.registry {
            registry.shutdown();
        }
        self.server.shutdown();
    }
}

/// Serves the service registry.
#[derive(Debug)]
pub struct RegistryServer {
    server: Server,
    registry: Arc<ProviderDiscovererManager>,
}

impl RegistryServer {
    /// Binds a registry server to `addr`.
    ///
    /// # Errors
    ///
    /// As [`Server::bind`].
    pub async fn bind(addr: impl Into<String>, config: EndpointConfig) -> Result<Self> {
        let server = Server::bind(addr, config).await?;
        let registry = Arc::new(ProviderDiscovererManager::new());
        registry.attach(server.dispatcher());
        Ok(Self { server, registry })
    }

    /// Returns the bound address.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    /// Returns the registry tables.
    #[must_use]
    pub fn registry(&self) -> &Arc<ProviderDiscovererManager> {
        &self.registry
    }

    /// Accepts connections until the task is aborted.
    pub async fn run(self) {
        self.server.run().await;
    }

    /// Runs the accept loop on a new task.
    pub fn spawn(self) -> ServerHandle {
        self.server.spawn()
    }
}

/// Serves topic pub/sub.
#[derive(Debug)]
pub struct TopicServer {
    server: Server,
    topics: Arc<TopicManager>,
}

impl TopicServer {
    /// Binds a topic server to `addr`.
    ///
    /// # Errors
    ///
    /// As [`Server::bind`].
    pub async fn bind(addr: impl Into<String>, config: EndpointConfig) -> Result<Self> {
        let server = Server::bind(addr, config).await?;
        let topics = Arc::new(TopicManager::new());
        topics.attach(server.dispatcher());
        Ok(Self { server, topics })
    }

    /// Returns the bound address.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    /// Returns the topic tables.
    #[must_use]
    pub fn topics(&self) -> &Arc<TopicManager> {
        &self.topics
    }

    /// Accepts connections until the task is aborted.
    pub async fn run(self) {
        self.server.run().await;
    }

    /// Runs the accept loop on a new task.
    pub fn spawn(self) -> ServerHandle {
        self.server.spawn()
    }
}
