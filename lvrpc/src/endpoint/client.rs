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


//! Client endpoints.
//!
//! Every client owns one connection with its own [`Requestor`] and
//! [`Dispatcher`]. Dropping a client shuts its connection down.

use super::EndpointConfig;
use crate::connection::{Connection, ConnectionRef};
use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::message::HostAddr;
use crate::registry::{Discoverer, OfflineCallback, Provider};
use crate::requestor::Requestor;
use crate::rpc::{RpcCaller, RpcFuture};
use crate::topic::client::TopicManager;
use crate::transport::TcpTransport;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;

#[cfg(feature = "observability")]
use tracing::{debug, info};

/// One outbound connection with response correlation installed.
struct ClientCore {
    connection: ConnectionRef,
    requestor: Arc<Requestor>,
    reaper: Option<JoinHandle<()>>,
}

impl ClientCore {
    /// Connects to `addr`. `install` registers extra handlers before any
    /// message can arrive; its output is returned alongside the core.
    async fn connect<T>(
        addr: &str,
        config: &EndpointConfig,
        install: impl FnOnce(&Arc<Requestor>, &Dispatcher) -> T,
    ) -> Result<(Self, T)> {
        config.validate()?;

        let requestor = Arc::new(Requestor::new(config));
        let dispatcher = Arc::new(Dispatcher::new());
        requestor.attach(&dispatcher);
        let installed = install(&requestor, &dispatcher);

        let transport = TcpTransport::connect(addr, config).await?;
        let connection = Connection::spawn_tcp(transport, config, dispatcher);

        let reaper = config
            .request_ttl
            .map(|ttl| requestor.spawn_reaper(ttl, config.reap_interval));

        #[cfg(feature = "observability")]
        info!(connection_id = %connection.id(), address = %addr, "Client connected");

        let core = Self {
            connection,
            requestor,
            reaper,
        };
        Ok((core, installed))
    }

    fn shutdown(&self) {
        self.connection.shutdown();
        if let Some(reaper) = &self.reaper {
            reaper.abort();
        }
    }
}

impl Drop for ClientCore {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for ClientCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCore")
            .field("connection", &self.connection)
            .field("requestor", &self.requestor)
            .finish_non_exhaustive()
    }
}

/// Provider-role client of a registry.
#[derive(Debug)]
pub struct RegistryClient {
    core: ClientCore,
    provider: Provider,
}

impl RegistryClient {
    /// Connects to the registry at `addr`.
    ///
    /// # Errors
    ///
    /// Fails if `config` is invalid or the registry cannot be reached.
    pub async fn connect(addr: &str, config: EndpointConfig) -> Result<Self> {
        let (core, provider) =
            ClientCore::connect(addr, &config, |requestor, _| Provider::new(requestor.clone()))
                .await?;
        Ok(Self { core, provider })
    }

    /// Announces `host` as a provider of `method`.
    ///
    /// # Errors
    ///
    /// As [`Provider::register_service`].
    pub async fn register_service(&self, method: &str, host: &HostAddr) -> Result<()> {
        self.provider
            .register_service(&self.core.connection, method, host)
            .await
    }

    /// Returns `true` while the registry connection is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.core.connection.is_connected()
    }

    /// Closes the registry connection, taking every registered method offline.
    pub fn shutdown(&self) {
        self.core.shutdown();
    }
}

/// Consumer-role client of a registry.
#[derive(Debug)]
pub struct DiscoveryClient {
    core: ClientCore,
    discoverer: Arc<Discoverer>,
}

impl DiscoveryClient {
    /// Connects to the registry at `addr`.
    ///
    /// `offline_callback` runs for every provider the registry reports offline.
    ///
    /// # Errors
    ///
    /// Fails if `config` is invalid or the registry cannot be reached.
    pub async fn connect(
        addr: &str,
        config: EndpointConfig,
        offline_callback: Option<OfflineCallback>,
    ) -> Result<Self> {
        let (core, discoverer) = ClientCore::connect(addr, &config, |requestor, dispatcher| {
            let discoverer = Arc::new(Discoverer::new(requestor.clone(), offline_callback));
            discoverer.attach(dispatcher);
            discoverer
        })
        .await?;
        Ok(Self { core, discoverer })
    }

    /// Returns a provider host for `method`, round-robin over known providers.
    ///
    /// # Errors
    ///
    /// As [`Discoverer::discover_host`].
    pub async fn discover(&self, method: &str) -> Result<HostAddr> {
        self.discoverer
            .discover_host(&self.core.connection, method)
            .await
    }

    /// Returns the cached providers of `method`.
    #[must_use]
    pub fn cached_hosts(&self, method: &str) -> Vec<HostAddr> {
        self.discoverer.cached_hosts(method)
    }

    /// Returns `true` while the registry connection is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.core.connection.is_connected()
    }

    /// Closes the registry connection.
    pub fn shutdown(&self) {
        self.core.shutdown();
    }
}

/// Client of a topic server.
///
/// # Example
///
/// ```rust,no_run
/// use lvrpc::endpoint::{EndpointConfig, TopicClient};
///
/// # async fn example() -> lvrpc::Result<()> {
/// let client = TopicClient::connect("127.0.0.1:7070", EndpointConfig::default()).await?;
/// client.create("news").await?;
/// client
///     .subscribe("news", |topic, content| println!("{topic}: {content}"))
///     .await?;
/// client.publish("news", "hello").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TopicClient {
    core: ClientCore,
    topics: Arc<TopicManager>,
}

impl TopicClient {
    /// Connects to the topic server at `addr`.
    ///
    /// # Errors
    ///
    /// Fails if `config` is invalid or the server cannot be reached.
    pub async fn connect(addr: &str, config: EndpointConfig) -> Result<Self> {
        let (core, topics) = ClientCore::connect(addr, &config, |requestor, dispatcher| {
            let topics = Arc::new(TopicManager::new(requestor.clone()));
            topics.attach(dispatcher);
            topics
        })
        .await?;
        Ok(Self { core, topics })
    }

    /// Creates `name`.
    ///
    /// # Errors
    ///
    /// As [`TopicManager::create`].
    pub async fn create(&self, name: &str) -> Result<()> {
        self.topics.create(&self.core.connection, name).await
    }

    /// Removes `name`.
    ///
    /// # Errors
    ///
    /// As [`TopicManager::remove`].
    pub async fn remove(&self, name: &str) -> Result<()> {
        self.topics.remove(&self.core.connection, name).await
    }

    /// Subscribes to `name`.
    ///
    /// # Errors
    ///
    /// As [`TopicManager::subscribe`].
    pub async fn subscribe<F>(&self, name: &str, callback: F) -> Result<()>
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        self.topics
            .subscribe(&self.core.connection, name, callback)
            .await
    }

    /// Unsubscribes from `name`.
    ///
    /// # Errors
    ///
    /// As [`TopicManager::cancel`].
    pub async fn cancel(&self, name: &str) -> Result<()> {
        self.topics.cancel(&self.core.connection, name).await
    }

    /// Publishes `content` on `name`.
    ///
    /// # Errors
    ///
    /// As [`TopicManager::publish`].
    pub async fn publish(&self, name: &str, content: &str) -> Result<()> {
        self.topics
            .publish(&self.core.connection, name, content)
            .await
    }

    /// Returns `true` while the connection is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.core.connection.is_connected()
    }

    /// Closes the connection; the server drops every subscription.
    pub fn shutdown(&self) {
        self.core.shutdown();
    }
}

type ConnectionPool = Arc<Mutex<HashMap<HostAddr, Arc<ClientCore>>>>;

#[derive(Debug)]
enum Mode {
    Direct(ClientCore),
    Discovery {
        discovery: DiscoveryClient,
        pool: ConnectionPool,
        config: EndpointConfig,
    },
}

/// Calls remote methods, either on one fixed server or on providers found
/// through a registry.
///
/// In discovery mode each provider host gets one pooled connection. A host
/// the registry reports offline is evicted from the pool and its connection
/// closed.
///
/// # Example
///
/// ```rust,no_run
/// use lvrpc::endpoint::{EndpointConfig, RpcClient};
/// use serde_json::json;
///
/// # async fn example() -> lvrpc::Result<()> {
/// let client = RpcClient::with_discovery("127.0.0.1:8080", EndpointConfig::default()).await?;
/// let sum = client.call("add", json!({"num1": 20, "num2": 30})).await?;
/// assert_eq!(sum, json!(50));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct RpcClient {
    mode: Mode,
}

impl RpcClient {
    /// Connects directly to the RPC server at `addr`.
    ///
    /// # Errors
    ///
    /// Fails if `config` is invalid or the server cannot be reached.
    pub async fn connect(addr: &str, config: EndpointConfig) -> Result<Self> {
        let (core, ()) = ClientCore::connect(addr, &config, |_, _| ()).await?;
        Ok(Self {
            mode: Mode::Direct(core),
        })
    }

    /// Connects to the registry at `registry_addr` and resolves providers
    /// per call.
    ///
    /// # Errors
    ///
    /// Fails if `config` is invalid or the registry cannot be reached.
    pub async fn with_discovery(registry_addr: &str, config: EndpointConfig) -> Result<Self> {
        let pool: ConnectionPool = Arc::default();
        let evict = pool.clone();
        let on_offline: OfflineCallback = Arc::new(move |host: &HostAddr| {
            let evicted = evict.lock().remove(host);
            if let Some(core) = evicted {
                #[cfg(feature = "observability")]
                info!(host = %host, "Evicting offline provider connection");

                core.shutdown();
            }
        });

        let discovery = DiscoveryClient::connect(registry_addr, config.clone(), Some(on_offline)).await?;
        Ok(Self {
            mode: Mode::Discovery {
                discovery,
                pool,
                config,
            },
        })
    }

    /// Returns the caller and connection serving `method`.
    async fn route(&self, method: &str) -> Result<(RpcCaller, ConnectionRef)> {
        match &self.mode {
            Mode::Direct(core) => Ok((RpcCaller::new(core.requestor.clone()), core.connection.clone())),
            Mode::Discovery {
                discovery,
                pool,
                config,
            } => {
                let host = discovery.discover(method).await?;
                let core = Self::pooled(pool, &host, config).await?;
                Ok((RpcCaller::new(core.requestor.clone()), core.connection.clone()))
            }
        }
    }

    async fn pooled(pool: &ConnectionPool, host: &HostAddr, config: &EndpointConfig) -> Result<Arc<ClientCore>> {
        let existing = pool.lock().get(host).cloned();
        if let Some(core) = existing {
            if core.connection.is_connected() {
                return Ok(core);
            }
        }

        #[cfg(feature = "observability")]
        debug!(host = %host, "Opening provider connection");

        let (fresh, ()) = ClientCore::connect(&host.to_string(), config, |_, _| ()).await?;
        let fresh = Arc::new(fresh);
        let mut pool = pool.lock();
        let entry = pool.entry(host.clone()).or_insert_with(|| fresh.clone());
        if !entry.connection.is_connected() {
            *entry = fresh;
        }
        Ok(entry.clone())
    }

    /// Calls `method` and waits for its result.
    ///
    /// # Errors
    ///
    /// As [`RpcCaller::call`], plus any discovery or connect failure.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let (caller, connection) = self.route(method).await?;
        caller.call(&connection, method, params).await
    }

    /// Sends a call and returns a future resolving to its result.
    ///
    /// # Errors
    ///
    /// As [`RpcCaller::call_async`], plus any discovery or connect failure.
    pub async fn call_async(&self, method: &str, params: Value) -> Result<RpcFuture> {
        let (caller, connection) = self.route(method).await?;
        caller.call_async(&connection, method, params)
    }

    /// Sends a call; `callback` later receives its result.
    ///
    /// # Errors
    ///
    /// As [`RpcCaller::call_with_callback`], plus any discovery or connect
    /// failure.
    pub async fn call_with_callback<F>(&self, method: &str, params: Value, callback: F) -> Result<()>
    where
        F: FnOnce(Result<Value>) + Send + 'static,
    {
        let (caller, connection) = self.route(method).await?;
        caller.call_with_callback(&connection, method, params, callback)
    }

    /// Returns the provider hosts with an open pooled connection.
    ///
    /// Always empty in direct mode.
    #[must_use]
    pub fn pooled_hosts(&self) -> Vec<HostAddr> {
        match &self.mode {
            Mode::Direct(_) => Vec::new(),
            Mode::Discovery { pool, .. } => pool.lock().keys().cloned().collect(),
        }
    }

    /// Closes every connection this client holds.
    pub fn shutdown(&self) {
        match &self.mode {
            Mode::Direct(core) => core.shutdown(),
            Mode::Discovery {
                discovery, pool, ..
            } => {
                discovery.shutdown();
                let cores: Vec<_> = pool.lock().drain().map(|(_, core)| core).collect();
                for core in cores {
                    core.shutdown();
                }
            }
        }
    }
}
