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


//! Provider role: announcing methods to the registry.

use crate::connection::ConnectionRef;
use crate::error::{Result, RpcError};
use crate::message::{HostAddr, Message, ServiceRequest, ServiceResponse};
use crate::requestor::Requestor;
use std::sync::Arc;

#[cfg(feature = "observability")]
use tracing::{info, warn};

/// Registers methods served at a host with a registry.
///
/// The registry considers every method registered over a connection to be
/// offline once that connection closes.
#[derive(Debug, Clone)]
pub struct Provider {
    requestor: Arc<Requestor>,
}

impl Provider {
    /// Creates a provider sending through `requestor`.
    #[must_use]
    pub fn new(requestor: Arc<Requestor>) -> Self {
        Self { requestor }
    }

    /// Announces `host` as a provider of `method`.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Remote`] if the registry answers with a code other
    /// than fine, or any error from the request itself.
    pub async fn register_service(
        &self,
        connection: &ConnectionRef,
        method: &str,
        host: &HostAddr,
    ) -> Result<()> {
        let request = Message::request(ServiceRequest::register(method, host.clone()));
        let response: ServiceResponse = self.requestor.call_kind(connection, request).await?;

        if !response.rcode.is_fine() {
            #[cfg(feature = "observability")]
            warn!(
                method = %method,
                host = %host,
                rcode = %response.rcode,
                reason = response.rcode.reason(),
                "Service registration rejected"
            );
            return Err(RpcError::Remote {
                rcode: response.rcode,
            });
        }

        #[cfg(feature = "observability")]
        info!(method = %method, host = %host, "Service registered");

        Ok(())
    }
}
