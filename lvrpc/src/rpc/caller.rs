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


//! Client side of RPC.

use crate::connection::ConnectionRef;
use crate::error::{Result, RpcError};
use crate::message::{Message, RpcRequest, RpcResponse};
use crate::requestor::{PendingResponse, Requestor};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::{Instant, Sleep};

#[cfg(feature = "observability")]
use tracing::{debug, warn};

/// Calls remote methods and unwraps their results.
///
/// # Example
///
/// ```rust,no_run
/// use lvrpc::rpc::RpcCaller;
/// use serde_json::json;
///
/// # async fn example(caller: RpcCaller, connection: lvrpc::connection::ConnectionRef) -> lvrpc::Result<()> {
/// let sum = caller.call(&connection, "add", json!({"num1": 20, "num2": 30})).await?;
/// assert_eq!(sum, json!(50));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RpcCaller {
    requestor: Arc<Requestor>,
}

fn into_result(message: Message) -> Result<Value> {
    let response = message.into_kind::<RpcResponse>()?;
    if response.rcode.is_fine() {
        Ok(response.result)
    } else {
        #[cfg(feature = "observability")]
        warn!(rcode = %response.rcode, reason = response.rcode.reason(), "Rpc call failed");
        Err(RpcError::Remote {
            rcode: response.rcode,
        })
    }
}

impl RpcCaller {
    /// Creates a caller sending through `requestor`.
    #[must_use]
    pub fn new(requestor: Arc<Requestor>) -> Self {
        Self { requestor }
    }

    fn request(method: &str, params: Value) -> Message {
        let message = Message::request(RpcRequest::new(method, params));

        #[cfg(feature = "observability")]
        debug!(request_id = %message.id(), method = %method, "Calling");

        message
    }

    /// Calls `method` and waits for its result.
    ///
    /// # Errors
    ///
    /// [`RpcError::Remote`] if the server answered with a non-fine code, or
    /// any error from the request itself.
    pub async fn call(&self, connection: &ConnectionRef, method: &str, params: Value) -> Result<Value> {
        into_result(
            self.requestor
                .call(connection, Self::request(method, params))
                .await?,
        )
    }

    /// Sends a call and returns a future resolving to its result.
    ///
    /// The future fails with a timeout once the requestor's request timeout
    /// has elapsed since sending.
    ///
    /// # Errors
    ///
    /// Fails immediately if the request cannot be sent.
    pub fn call_async(&self, connection: &ConnectionRef, method: &str, params: Value) -> Result<RpcFuture> {
        let pending = self.requestor.send(connection, Self::request(method, params))?;
        Ok(RpcFuture::new(pending, self.requestor.request_timeout()))
    }

    /// Sends a call; `callback` later receives its result.
    ///
    /// # Errors
    ///
    /// Fails immediately, without invoking `callback`, if the request cannot
    /// be sent.
    pub fn call_with_callback<F>(
        &self,
        connection: &ConnectionRef,
        method: &str,
        params: Value,
        callback: F,
    ) -> Result<()>
    where
        F: FnOnce(Result<Value>) + Send + 'static,
    {
        self.requestor.send_with_callback(
            connection,
            Self::request(method, params),
            move |outcome| callback(outcome.and_then(into_result)),
        )
    }
}

/// Result of [`RpcCaller::call_async`].
///
/// Dropping it abandons the call.
#[must_use = "dropping an RpcFuture abandons the call"]
#[derive(Debug)]
pub struct RpcFuture {
    pending: PendingResponse,
    timeout: Option<(Duration, Instant)>,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl RpcFuture {
    fn new(pending: PendingResponse, timeout: Option<Duration>) -> Self {
        Self {
            pending,
            timeout: timeout.map(|duration| (duration, Instant::now() + duration)),
            sleep: None,
        }
    }

    /// Returns the id of the underlying request.
    #[must_use]
    pub fn request_id(&self) -> &str {
        self.pending.request_id()
    }
}

impl Future for RpcFuture {
    type Output = Result<Value>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if let Poll::Ready(outcome) = Pin::new(&mut this.pending).poll(cx) {
            return Poll::Ready(outcome.and_then(into_result));
        }

        let Some((duration, deadline)) = this.timeout else {
            return Poll::Pending;
        };
        let sleep = this
            .sleep
            .get_or_insert_with(|| Box::pin(tokio::time::sleep_until(deadline)));
        match sleep.as_mut().poll(cx) {
            Poll::Ready(()) => Poll::Ready(Err(RpcError::Timeout {
                request_id: this.pending.request_id().to_string(),
                duration,
            })),
            Poll::Pending => Poll::Pending,
        }
    }
}
