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


//! Consumer role: discovering and caching provider hosts.

use crate::connection::ConnectionRef;
use crate::dispatcher::Dispatcher;
use crate::error::{Result, RpcError};
use crate::message::{HostAddr, Message, Optype, ServiceOptype, ServiceRequest, ServiceResponse};
use crate::registry::HostManager;
use crate::requestor::Requestor;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[cfg(feature = "observability")]
use tracing::{debug, info, warn};

/// Invoked with the host of every provider reported offline.
pub type OfflineCallback = Arc<dyn Fn(&HostAddr) + Send + Sync>;

/// Method to [`HostManager`] cache kept current by registry pushes.
///
/// The first lookup of a method asks the registry; later lookups are served
/// round-robin from the cache, which the registry updates with unsolicited
/// online/offline notices.
pub struct Discoverer {
    requestor: Arc<Requestor>,
    methods: Mutex<HashMap<String, Arc<HostManager>>>,
    offline_callback: Option<OfflineCallback>,
}

impl Discoverer {
    /// Creates a discoverer. `offline_callback` runs for every offline notice.
    #[must_use]
    pub fn new(requestor: Arc<Requestor>, offline_callback: Option<OfflineCallback>) -> Self {
        Self {
            requestor,
            methods: Mutex::new(HashMap::new()),
            offline_callback,
        }
    }

    fn cached(&self, method: &str) -> Option<Arc<HostManager>> {
        self.methods.lock().get(method).cloned()
    }

    fn hosts_for(&self, method: &str) -> Arc<HostManager> {
        self.methods
            .lock()
            .entry(method.to_string())
            .or_default()
            .clone()
    }

    /// Returns the next provider host for `method`.
    ///
    /// # Errors
    ///
    /// - [`RpcError::Remote`] if the registry knows no provider
    /// - [`RpcError::NoProvider`] if the registry returned an empty list
    /// - any error from the discover request itself
    pub async fn discover_host(&self, connection: &ConnectionRef, method: &str) -> Result<HostAddr> {
        if let Some(host) = self.cached(method).and_then(|hosts| hosts.choose()) {
            #[cfg(feature = "observability")]
            debug!(method = %method, host = %host, "Discovered host from cache");
            return Ok(host);
        }

        let request = Message::request(ServiceRequest::discover(method));
        let response: ServiceResponse = self.requestor.call_kind(connection, request).await?;
        if !response.rcode.is_fine() {
            #[cfg(feature = "observability")]
            warn!(method = %method, rcode = %response.rcode, "Service discovery failed");
            return Err(RpcError::Remote {
                rcode: response.rcode,
            });
        }

        let hosts = self.hosts_for(method);
        hosts.extend(response.hosts.unwrap_or_default());

        #[cfg(feature = "observability")]
        info!(method = %method, providers = hosts.len(), "Service discovered");

        hosts.choose().ok_or_else(|| RpcError::NoProvider {
            method: method.to_string(),
        })
    }

    /// Applies an online or offline notice pushed by the registry.
    pub fn handle_service_request(&self, _connection: &ConnectionRef, request: ServiceRequest) {
        let Some(host) = request.host else {
            #[cfg(feature = "observability")]
            warn!(method = %request.method, "Ignoring service notice without host");
            return;
        };

        match request.optype {
            Optype::Known(ServiceOptype::Online) => {
                #[cfg(feature = "observability")]
                info!(method = %request.method, host = %host, "Provider online");

                self.hosts_for(&request.method).append(host);
            }
            Optype::Known(ServiceOptype::Offline) => {
                #[cfg(feature = "observability")]
                info!(method = %request.method, host = %host, "Provider offline");

                if let Some(hosts) = self.cached(&request.method) {
                    hosts.remove(&host);
                }
                if let Some(callback) = &self.offline_callback {
                    callback(&host);
                }
            }
            _other => {
                #[cfg(feature = "observability")]
                warn!(optype = %_other, "Ignoring unexpected service notice");
            }
        }
    }

    /// Returns the cached hosts for `method`.
    #[must_use]
    pub fn cached_hosts(&self, method: &str) -> Vec<HostAddr> {
        self.cached(method)
            .map(|hosts| hosts.hosts())
            .unwrap_or_default()
    }

    /// Registers this discoverer as the service-notice handler on `dispatcher`.
    pub fn attach(self: &Arc<Self>, dispatcher: &Dispatcher) {
        let discoverer = self.clone();
        dispatcher.register_typed::<ServiceRequest, _>(move |connection, _id, request| {
            discoverer.handle_service_request(connection, request);
        });
    }
}

impl std::fmt::Debug for Discoverer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut methods: Vec<_> = self.methods.lock().keys().cloned().collect();
        methods.sort();
        f.debug_struct("Discoverer")
            .field("methods", &methods)
            .field("has_offline_callback", &self.offline_callback.is_some())
            .finish()
    }
}
