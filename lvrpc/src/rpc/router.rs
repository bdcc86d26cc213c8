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


//! Server side of RPC: routes requests to registered methods.

use super::{ServiceDescriptor, ServiceManager};
use crate::connection::ConnectionRef;
use crate::dispatcher::Dispatcher;
use crate::message::{Message, RCode, RpcRequest, RpcResponse};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

#[cfg(feature = "observability")]
use tracing::{debug, error, warn};

/// Answers RPC requests from a [`ServiceManager`].
///
/// Every request gets exactly one response:
///
/// | Situation | Code |
/// |---|---|
/// | parameters are not an object | `invalid_msg` |
/// | unknown method | `not_found_service` |
/// | missing or mistyped parameter | `invalid_params` |
/// | handler error or panic, or wrongly typed result | `internal_error` |
/// | otherwise | `fine`, with the result |
#[derive(Debug, Default)]
pub struct RpcRouter {
    services: ServiceManager,
}

impl RpcRouter {
    /// Creates a router with no methods.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a method. Returns `false` if the method name is taken.
    pub fn register_service(&self, service: ServiceDescriptor) -> bool {
        #[cfg(feature = "observability")]
        let method = service.method().to_string();

        let inserted = self.services.insert_service(service);

        #[cfg(feature = "observability")]
        if inserted {
            debug!(method = %method, "Registered service");
        } else {
            warn!(method = %method, "Service already registered, ignoring");
        }

        inserted
    }

    /// Returns the method table.
    #[must_use]
    pub fn services(&self) -> &ServiceManager {
        &self.services
    }

    /// Computes the response to `request`.
    #[must_use]
    pub fn route(&self, request: &RpcRequest) -> RpcResponse {
        if !request.validate() {
            return RpcResponse::error(RCode::InvalidMsg);
        }

        let Some(service) = self.services.find_service(&request.method) else {
            #[cfg(feature = "observability")]
            warn!(method = %request.method, "Service not found");
            return RpcResponse::error(RCode::NotFoundService);
        };

        if !service.check_params(&request.parameters) {
            #[cfg(feature = "observability")]
            warn!(method = %request.method, "Invalid parameters");
            return RpcResponse::error(RCode::InvalidParams);
        }

        match catch_unwind(AssertUnwindSafe(|| service.call(&request.parameters))) {
            Ok(Ok(result)) if service.check_return(&result) => RpcResponse::ok(result),
            Ok(Ok(_result)) => {
                #[cfg(feature = "observability")]
                error!(
                    method = %request.method,
                    expected = ?service.return_type(),
                    "Handler returned a value of the wrong type"
                );
                RpcResponse::error(RCode::InternalError)
            }
            Ok(Err(_reason)) => {
                #[cfg(feature = "observability")]
                warn!(method = %request.method, reason = %_reason, "Handler failed");
                RpcResponse::error(RCode::InternalError)
            }
            Err(_) => {
                #[cfg(feature = "observability")]
                error!(method = %request.method, "Handler panicked");
                RpcResponse::error(RCode::InternalError)
            }
        }
    }

    /// Routes `request` and sends the response on `connection`.
    pub fn handle_rpc_request(&self, connection: &ConnectionRef, request_id: &str, request: RpcRequest) {
        let response = self.route(&request);

        #[cfg(feature = "observability")]
        debug!(
            connection_id = %connection.id(),
            request_id = %request_id,
            method = %request.method,
            rcode = %response.rcode,
            "Handled rpc request"
        );

        if let Err(_e) = connection.send(&Message::new(request_id, response)) {
            #[cfg(feature = "observability")]
            warn!(
                connection_id = %connection.id(),
                request_id = %request_id,
                error = %_e,
                "Failed to send rpc response"
            );
        }
    }

    /// Registers this router as the RPC request handler on `dispatcher`.
    pub fn attach(self: &Arc<Self>, dispatcher: &Dispatcher) {
        let router = self.clone();
        dispatcher.register_typed::<RpcRequest, _>(move |connection, id, request| {
            router.handle_rpc_request(connection, id, request);
        });
    }
}
