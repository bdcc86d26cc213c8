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


//! Registry side of service discovery.
//!
//! The registry keeps two indexes, both keyed by connection: providers and
//! the methods they registered, and discoverers and the methods they asked
//! about. A discoverer is told whenever a provider of a method it asked
//! about comes online or goes offline. A provider goes offline, for every
//! method it registered, when its connection closes.

use crate::connection::{ConnectionId, ConnectionRef};
use crate::dispatcher::Dispatcher;
use crate::message::{
    HostAddr, Message, Optype, RCode, ServiceOptype, ServiceRequest, ServiceResponse,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

#[cfg(feature = "observability")]
use tracing::{debug, info, warn};

/// A provider removed from the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRecord {
    /// Address the provider announced.
    pub host: HostAddr,
    /// Every method it registered.
    pub methods: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct ProviderIndex {
    by_connection: HashMap<ConnectionId, ProviderRecord>,
    by_method: HashMap<String, BTreeMap<ConnectionId, HostAddr>>,
}

/// Method to provider index.
#[derive(Debug, Default)]
pub struct ProviderManager {
    index: Mutex<ProviderIndex>,
}

impl ProviderManager {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the connection `connection_id` as a provider of `method` at `host`.
    ///
    /// A connection keeps the host it first registered with.
    pub fn insert_provider(&self, connection_id: ConnectionId, method: &str, host: HostAddr) {
        let mut index = self.index.lock();
        let record = index
            .by_connection
            .entry(connection_id)
            .or_insert_with(|| ProviderRecord {
                host,
                methods: BTreeSet::new(),
            });
        record.methods.insert(method.to_string());
        let host = record.host.clone();
        index
            .by_method
            .entry(method.to_string())
            .or_default()
            .insert(connection_id, host);
    }

    /// Removes the provider behind `connection_id`, returning what it had registered.
    pub fn remove_provider(&self, connection_id: ConnectionId) -> Option<ProviderRecord> {
        let mut index = self.index.lock();
        let record = index.by_connection.remove(&connection_id)?;
        for method in &record.methods {
            if let Some(providers) = index.by_method.get_mut(method) {
                providers.remove(&connection_id);
                if providers.is_empty() {
                    index.by_method.remove(method);
                }
            }
        }
        Some(record)
    }

    /// Returns the hosts currently providing `method`.
    #[must_use]
    pub fn service_providers(&self, method: &str) -> Vec<HostAddr> {
        self.index
            .lock()
            .by_method
            .get(method)
            .map(|providers| providers.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns the number of provider connections.
    #[must_use]
    pub fn provider_count(&self) -> usize {
        self.index.lock().by_connection.len()
    }
}

#[derive(Default)]
struct DiscovererIndex {
    by_connection: HashMap<ConnectionId, BTreeSet<String>>,
    by_method: HashMap<String, BTreeMap<ConnectionId, ConnectionRef>>,
}

/// Method to interested-discoverer index.
#[derive(Default)]
pub struct DiscovererManager {
    index: Mutex<DiscovererIndex>,
}

impl DiscovererManager {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `connection` as interested in `method`.
    pub fn insert_discoverer(&self, connection: &ConnectionRef, method: &str) {
        let mut index = self.index.lock();
        index
            .by_connection
            .entry(connection.id())
            .or_default()
            .insert(method.to_string());
        index
            .by_method
            .entry(method.to_string())
            .or_default()
            .insert(connection.id(), connection.clone());
    }

    /// Forgets the discoverer behind `connection_id`, returning the methods
    /// it was interested in.
    pub fn remove_discoverer(&self, connection_id: ConnectionId) -> Option<BTreeSet<String>> {
        let mut index = self.index.lock();
        let methods = index.by_connection.remove(&connection_id)?;
        for method in &methods {
            if let Some(discoverers) = index.by_method.get_mut(method) {
                discoverers.remove(&connection_id);
                if discoverers.is_empty() {
                    index.by_method.remove(method);
                }
            }
        }
        Some(methods)
    }

    /// Pushes an online or offline notice for `method` to every interested
    /// discoverer. Returns how many notices were sent.
    ///
    /// Each discoverer gets its own message with a fresh id. Send failures are
    /// logged and skipped.
    pub fn notify(&self, method: &str, host: &HostAddr, optype: ServiceOptype) -> usize {
        let targets: Vec<ConnectionRef> = self
            .index
            .lock()
            .by_method
            .get(method)
            .map(|discoverers| discoverers.values().cloned().collect())
            .unwrap_or_default();

        let mut sent = 0;
        for connection in targets {
            let request = ServiceRequest {
                method: method.to_string(),
                optype: optype.into(),
                host: Some(host.clone()),
            };
            match connection.send(&Message::request(request)) {
                Ok(()) => sent += 1,
                Err(_e) => {
                    #[cfg(feature = "observability")]
                    warn!(
                        connection_id = %connection.id(),
                        method = %method,
                        optype = %optype,
                        error = %_e,
                        "Failed to notify discoverer"
                    );
                }
            }
        }
        sent
    }

    /// Returns the number of discoverer connections.
    #[must_use]
    pub fn discoverer_count(&self) -> usize {
        self.index.lock().by_connection.len()
    }
}

impl std::fmt::Debug for DiscovererManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let index = self.index.lock();
        f.debug_struct("DiscovererManager")
            .field("discoverers", &index.by_connection.len())
            .field("methods", &index.by_method.len())
            .finish()
    }
}

/// The registry: answers register and discover requests and pushes
/// provider changes to discoverers.
#[derive(Debug, Default)]
pub struct ProviderDiscovererManager {
    providers: ProviderManager,
    discoverers: DiscovererManager,
}

impl ProviderDiscovererManager {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the provider index.
    #[must_use]
    pub fn providers(&self) -> &ProviderManager {
        &self.providers
    }

    /// Returns the discoverer index.
    #[must_use]
    pub fn discoverers(&self) -> &DiscovererManager {
        &self.discoverers
    }

    /// Handles a register or discover request and replies on `connection`.
    ///
    /// Replies with an invalid-message code if the request fails validation,
    /// and with an invalid-optype code for any other operation.
    pub fn handle_service_request(
        &self,
        connection: &ConnectionRef,
        request_id: &str,
        request: ServiceRequest,
    ) {
        let response = if !request.validate() {
            #[cfg(feature = "observability")]
            warn!(
                connection_id = %connection.id(),
                request_id = %request_id,
                method = %request.method,
                "Invalid service request"
            );
            let optype = request.optype.known().unwrap_or(ServiceOptype::WrongType);
            ServiceResponse::new(RCode::InvalidMsg, optype, request.method)
        } else {
            match (request.optype, request.host) {
                (Optype::Known(ServiceOptype::Register), Some(host)) => {
                    self.register(connection, &request.method, host)
                }
                (Optype::Known(ServiceOptype::Discover), _) => {
                    self.discover(connection, &request.method)
                }
                (_optype, _) => {
                    #[cfg(feature = "observability")]
                    warn!(
                        connection_id = %connection.id(),
                        optype = %_optype,
                        method = %request.method,
                        "Unsupported service optype"
                    );
                    ServiceResponse::new(
                        RCode::InvalidOpType,
                        ServiceOptype::WrongType,
                        request.method,
                    )
                }
            }
        };

        if let Err(_e) = connection.send(&Message::new(request_id, response)) {
            #[cfg(feature = "observability")]
            warn!(
                connection_id = %connection.id(),
                request_id = %request_id,
                error = %_e,
                "Failed to send service response"
            );
        }
    }

    fn register(&self, connection: &ConnectionRef, method: &str, host: HostAddr) -> ServiceResponse {
        #[cfg(feature = "observability")]
        info!(connection_id = %connection.id(), method = %method, host = %host, "Provider registered");

        self.providers.insert_provider(connection.id(), method, host.clone());
        self.discoverers.notify(method, &host, ServiceOptype::Online);
        ServiceResponse::new(RCode::Fine, ServiceOptype::Register, method)
    }

    fn discover(&self, connection: &ConnectionRef, method: &str) -> ServiceResponse {
        self.discoverers.insert_discoverer(connection, method);
        let hosts = self.providers.service_providers(method);

        #[cfg(feature = "observability")]
        debug!(
            connection_id = %connection.id(),
            method = %method,
            providers = hosts.len(),
            "Discover request"
        );

        let rcode = if hosts.is_empty() {
            RCode::NotFoundService
        } else {
            RCode::Fine
        };
        ServiceResponse::discovered(rcode, method, hosts)
    }

    /// Drops everything `connection` registered or asked about, pushing an
    /// offline notice for each method it provided.
    pub fn handle_connection_shutdown(&self, connection: &ConnectionRef) {
        if let Some(record) = self.providers.remove_provider(connection.id()) {
            #[cfg(feature = "observability")]
            info!(
                connection_id = %connection.id(),
                host = %record.host,
                methods = record.methods.len(),
                "Provider offline"
            );

            for method in &record.methods {
                self.discoverers
                    .notify(method, &record.host, ServiceOptype::Offline);
            }
        }
        self.discoverers.remove_discoverer(connection.id());
    }

    /// Registers the registry's request and close handlers on `dispatcher`.
    pub fn attach(self: &Arc<Self>, dispatcher: &Dispatcher) {
        let registry = self.clone();
        dispatcher.register_typed::<ServiceRequest, _>(move |connection, id, request| {
            registry.handle_service_request(connection, id, request);
        });

        let registry = self.clone();
        dispatcher.on_close(move |connection| registry.handle_connection_shutdown(connection));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Connection;
    use crate::endpoint::EndpointConfig;
    use crate::message::{Body, MessageType};
    use std::time::Duration;

    /// Registry-side connection plus everything its peer received.
    struct Peer {
        connection: ConnectionRef,
        inbox: Arc<Mutex<Vec<Message>>>,
        _remote: ConnectionRef,
    }

    fn peer() -> Peer {
        let (a, b) = tokio::io::duplex(64 * 1024);
        let (a_read, a_write) = tokio::io::split(a);
        let (b_read, b_write) = tokio::io::split(b);
        let config = EndpointConfig::default();

        let connection = Connection::spawn(a_read, a_write, None, &config, Arc::new(Dispatcher::new()));

        let inbox = Arc::new(Mutex::new(Vec::new()));
        let remote = Dispatcher::new();
        for message_type in [MessageType::ReqService, MessageType::RespService] {
            let inbox = inbox.clone();
            remote.register(message_type, move |_, message| inbox.lock().push(message));
        }
        let remote = Connection::spawn(b_read, b_write, None, &config, Arc::new(remote));

        Peer {
            connection,
            inbox,
            _remote: remote,
        }
    }

    async fn received(peer: &Peer, count: usize) -> Vec<Message> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if peer.inbox.lock().len() >= count {
                    return std::mem::take(&mut *peer.inbox.lock());
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap()
    }

    fn service_response(message: &Message) -> &ServiceResponse {
        match message.body() {
            Body::ServiceResponse(response) => response,
            other => panic!("expected service response, got {other:?}"),
        }
    }

    fn service_request(message: &Message) -> &ServiceRequest {
        match message.body() {
            Body::ServiceRequest(request) => request,
            other => panic!("expected service request, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_discover_before_register_then_online_push() {
        let registry = ProviderDiscovererManager::new();
        let consumer = peer();
        let provider = peer();
        let host = HostAddr::new("127.0.0.1", 9000);

        registry.handle_service_request(&consumer.connection, "d1", ServiceRequest::discover("add"));
        let replies = received(&consumer, 1).await;
        assert_eq!(replies[0].id(), "d1");
        let reply = service_response(&replies[0]);
        assert_eq!(reply.rcode, RCode::NotFoundService);
        assert_eq!(reply.hosts, Some(Vec::new()));

        registry.handle_service_request(
            &provider.connection,
            "r1",
            ServiceRequest::register("add", host.clone()),
        );
        let reply = &received(&provider, 1).await[0];
        assert_eq!(service_response(reply).rcode, RCode::Fine);
        assert_eq!(service_response(reply).optype, ServiceOptype::Register);

        let pushes = received(&consumer, 1).await;
        let push = service_request(&pushes[0]);
        assert_eq!(push.optype, ServiceOptype::Online);
        assert_eq!(push.method, "add");
        assert_eq!(push.host, Some(host.clone()));

        registry.handle_service_request(&consumer.connection, "d2", ServiceRequest::discover("add"));
        let replies = received(&consumer, 1).await;
        let reply = service_response(&replies[0]);
        assert_eq!(reply.rcode, RCode::Fine);
        assert_eq!(reply.hosts, Some(vec![host]));
    }

    #[tokio::test]
    async fn test_provider_shutdown_pushes_offline_per_method() {
        let registry = ProviderDiscovererManager::new();
        let consumer = peer();
        let provider = peer();
        let host = HostAddr::new("10.0.0.1", 7000);

        for method in ["add", "sub"] {
            registry.handle_service_request(
                &provider.connection,
                method,
                ServiceRequest::register(method, host.clone()),
            );
            registry.handle_service_request(&consumer.connection, method, ServiceRequest::discover(method));
        }
        received(&provider, 2).await;
        received(&consumer, 2).await;

        registry.handle_connection_shutdown(&provider.connection);
        assert_eq!(registry.providers().provider_count(), 0);
        assert!(registry.providers().service_providers("add").is_empty());

        let pushes = received(&consumer, 2).await;
        let mut methods: Vec<_> = pushes
            .iter()
            .map(|message| {
                let push = service_request(message);
                assert_eq!(push.optype, ServiceOptype::Offline);
                assert_eq!(push.host.as_ref(), Some(&host));
                push.method.clone()
            })
            .collect();
        methods.sort();
        assert_eq!(methods, ["add", "sub"]);
        assert_ne!(pushes[0].id(), pushes[1].id());
    }

    #[tokio::test]
    async fn test_invalid_and_unsupported_requests() {
        let registry = ProviderDiscovererManager::new();
        let client = peer();

        let mut missing_host = ServiceRequest::register("add", HostAddr::new("h", 1));
        missing_host.host = None;
        registry.handle_service_request(&client.connection, "x1", missing_host);

        registry.handle_service_request(
            &client.connection,
            "x2",
            ServiceRequest::online("add", HostAddr::new("h", 1)),
        );

        let replies = received(&client, 2).await;
        let invalid = service_response(&replies[0]);
        assert_eq!(invalid.rcode, RCode::InvalidMsg);
        let unsupported = service_response(&replies[1]);
        assert_eq!(unsupported.rcode, RCode::InvalidOpType);
        assert_eq!(unsupported.optype, ServiceOptype::WrongType);
        assert_eq!(registry.providers().provider_count(), 0);
    }

    #[tokio::test]
    async fn test_unrecognized_optype_is_answered() {
        let registry = ProviderDiscovererManager::new();
        let client = peer();

        let mut request = ServiceRequest::register("add", HostAddr::new("h", 1));
        request.optype = Optype::Unrecognized(9);
        registry.handle_service_request(&client.connection, "bad", request);

        let replies = received(&client, 1).await;
        assert_eq!(replies[0].id(), "bad");
        let reply = service_response(&replies[0]);
        assert_eq!(reply.rcode, RCode::InvalidOpType);
        assert_eq!(reply.optype, ServiceOptype::WrongType);
        assert_eq!(reply.method, "add");
        assert!(client.connection.is_connected());
        assert_eq!(registry.providers().provider_count(), 0);
    }

    #[tokio::test]
    async fn test_discoverer_removed_on_shutdown() {
        let registry = ProviderDiscovererManager::new();
        let consumer = peer();
        registry.handle_service_request(&consumer.connection, "d", ServiceRequest::discover("add"));
        assert_eq!(registry.discoverers().discoverer_count(), 1);

        registry.handle_connection_shutdown(&consumer.connection);
        assert_eq!(registry.discoverers().discoverer_count(), 0);
        assert_eq!(
            registry
                .discoverers()
                .notify("add", &HostAddr::new("h", 1), ServiceOptype::Online),
            0
        );
    }

    #[tokio::test]
    async fn test_remove_discoverer_returns_methods() {
        let discoverers = DiscovererManager::new();
        let client = peer();
        discoverers.insert_discoverer(&client.connection, "add");
        discoverers.insert_discoverer(&client.connection, "sub");
        discoverers.insert_discoverer(&client.connection, "add");

        let methods = discoverers.remove_discoverer(client.connection.id()).unwrap();
        assert_eq!(methods.into_iter().collect::<Vec<_>>(), ["add", "sub"]);
        assert!(discoverers.remove_discoverer(client.connection.id()).is_none());
        assert_eq!(
            discoverers.notify("add", &HostAddr::new("h", 1), ServiceOptype::Online),
            0
        );
    }

    #[test]
    fn test_provider_keeps_first_host() {
        let providers = ProviderManager::new();
        let id = ConnectionId::from_raw(7);
        providers.insert_provider(id, "add", HostAddr::new("a", 1));
        providers.insert_provider(id, "sub", HostAddr::new("b", 2));
        assert_eq!(providers.service_providers("sub"), vec![HostAddr::new("a", 1)]);

        let record = providers.remove_provider(id).unwrap();
        assert_eq!(record.methods.len(), 2);
        assert!(providers.remove_provider(id).is_none());
    }
}
