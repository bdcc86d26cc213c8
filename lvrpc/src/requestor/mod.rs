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


//! Request/response correlation.
//!
//! The [`Requestor`] sends requests over a [`Connection`](crate::connection::Connection)
//! and matches inbound responses to them by request id. Three calling
//! conventions are offered:
//!
//! - **await**: [`call`](Requestor::call) / [`call_timeout`](Requestor::call_timeout)
//! - **future**: [`send`](Requestor::send) returns a [`PendingResponse`]
//! - **callback**: [`send_with_callback`](Requestor::send_with_callback)
//!
//! Awaiting is only possible from async code. Dispatch handlers are
//! synchronous closures, so a handler cannot wait on a response that its own
//! connection's read task would have to deliver.

mod pending;

pub use self::pending::{PendingResponse, ResponseCallback};

use self::pending::{PendingRequests, ResponseSlot};
use crate::connection::{ConnectionId, ConnectionRef};
use crate::dispatcher::Dispatcher;
use crate::endpoint::EndpointConfig;
use crate::error::Result;
use crate::message::{Message, MessageKind, MessageType};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[cfg(feature = "observability")]
use tracing::{debug, warn};

/// Correlates outbound requests with inbound responses.
///
/// # Example
///
/// ```rust,no_run
/// use lvrpc::dispatcher::Dispatcher;
/// use lvrpc::message::{Message, TopicRequest, TopicResponse};
/// use lvrpc::requestor::Requestor;
/// use std::sync::Arc;
///
/// # async fn example(connection: lvrpc::connection::ConnectionRef) -> lvrpc::Result<()> {
/// let dispatcher = Dispatcher::new();
/// let requestor = Arc::new(Requestor::default());
/// requestor.attach(&dispatcher);
///
/// let response: TopicResponse = requestor
///     .call_kind(&connection, Message::request(TopicRequest::create("news")))
///     .await?;
/// println!("create answered with {}", response.rcode);
/// # Ok(())
/// # }
/// ```
pub struct Requestor {
    pending: Arc<PendingRequests>,
    request_timeout: Option<Duration>,
}

impl Requestor {
    /// Creates a requestor using `config.request_timeout` for awaited calls.
    #[must_use]
    pub fn new(config: &EndpointConfig) -> Self {
        Self {
            pending: Arc::new(PendingRequests::default()),
            request_timeout: config.request_timeout,
        }
    }

    /// Returns the timeout applied by [`call`](Self::call).
    #[must_use]
    pub const fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }

    fn send_with_slot(
        &self,
        connection: &ConnectionRef,
        message: &Message,
        slot: ResponseSlot,
    ) -> Result<u64> {
        let sequence = self
            .pending
            .register(message.id(), connection.id(), slot)?;

        if let Err(e) = connection.send(message) {
            #[cfg(feature = "observability")]
            warn!(
                connection_id = %connection.id(),
                request_id = %message.id(),
                error = %e,
                "Failed to send request"
            );
            self.pending.cancel(message.id(), sequence);
            return Err(e);
        }
        Ok(sequence)
    }

    /// Sends `message` and returns a future resolving to its response.
    ///
    /// # Errors
    ///
    /// Fails if a request with the same id is pending or the message cannot
    /// be sent; no descriptor is left behind in either case.
    pub fn send(&self, connection: &ConnectionRef, message: Message) -> Result<PendingResponse> {
        let (tx, rx) = oneshot::channel();
        let sequence = self.send_with_slot(connection, &message, ResponseSlot::Future(tx))?;
        let (request_id, _) = message.into_parts();
        Ok(PendingResponse::new(
            request_id,
            sequence,
            rx,
            Arc::downgrade(&self.pending),
        ))
    }

    /// Sends `message` and invokes `callback` with the outcome.
    ///
    /// The callback runs on the read task of the connection the response
    /// arrives on, or on whichever task abandons or expires the request.
    /// It is not invoked if this method returns an error.
    ///
    /// # Errors
    ///
    /// Fails if a request with the same id is pending or the message cannot
    /// be sent.
    pub fn send_with_callback<F>(
        &self,
        connection: &ConnectionRef,
        message: Message,
        callback: F,
    ) -> Result<()>
    where
        F: FnOnce(Result<Message>) + Send + 'static,
    {
        self.send_with_slot(connection, &message, ResponseSlot::Callback(Box::new(callback)))
            .map(|_| ())
    }

    /// Sends `message` and waits for its response, honouring the configured
    /// request timeout.
    ///
    /// # Errors
    ///
    /// Any send error, [`RpcError::Timeout`](crate::RpcError::Timeout), or
    /// [`RpcError::Abandoned`](crate::RpcError::Abandoned) if the connection
    /// closes first.
    pub async fn call(&self, connection: &ConnectionRef, message: Message) -> Result<Message> {
        let pending = self.send(connection, message)?;
        match self.request_timeout {
            Some(timeout) => pending.wait_timeout(timeout).await,
            None => pending.await,
        }
    }

    /// Sends `message` and waits at most `timeout` for its response.
    ///
    /// # Errors
    ///
    /// As [`call`](Self::call).
    pub async fn call_timeout(
        &self,
        connection: &ConnectionRef,
        message: Message,
        timeout: Duration,
    ) -> Result<Message> {
        self.send(connection, message)?.wait_timeout(timeout).await
    }

    /// Like [`call`](Self::call), converting the response body into `T`.
    ///
    /// # Errors
    ///
    /// As [`call`](Self::call), plus
    /// [`RpcError::UnexpectedResponse`](crate::RpcError::UnexpectedResponse)
    /// if the response is not a `T`.
    pub async fn call_kind<T: MessageKind>(
        &self,
        connection: &ConnectionRef,
        message: Message,
    ) -> Result<T> {
        self.call(connection, message).await?.into_kind()
    }

    /// Delivers an inbound response to the request with the same id.
    ///
    /// Responses for unknown, completed or expired requests are logged and
    /// discarded.
    pub fn handle_response(&self, _connection: &ConnectionRef, message: Message) {
        #[cfg(feature = "observability")]
        let request_id = message.id().to_string();

        if self.pending.complete(message) {
            #[cfg(feature = "observability")]
            debug!(connection_id = %_connection.id(), request_id = %request_id, "Delivered response");
        } else {
            #[cfg(feature = "observability")]
            warn!(
                connection_id = %_connection.id(),
                request_id = %request_id,
                "Discarding response for unknown request"
            );
        }
    }

    /// Returns the number of requests awaiting a response.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Fails every request pending for at least `ttl` with a timeout.
    ///
    /// Returns how many requests were expired.
    pub fn reap_expired(&self, ttl: Duration) -> usize {
        let count = self.pending.expire(ttl);
        #[cfg(feature = "observability")]
        if count > 0 {
            warn!(count, ttl = ?ttl, "Expired pending requests");
        }
        count
    }

    /// Fails every request sent over the connection `connection_id`.
    ///
    /// Returns how many requests were abandoned.
    pub fn abandon_connection(&self, connection_id: ConnectionId) -> usize {
        let count = self.pending.abandon(connection_id);
        #[cfg(feature = "observability")]
        if count > 0 {
            debug!(connection_id = %connection_id, count, "Abandoned pending requests");
        }
        count
    }

    /// Registers this requestor as the response handler on `dispatcher`.
    ///
    /// Handles every response type, and abandons a connection's pending
    /// requests when it closes.
    pub fn attach(self: &Arc<Self>, dispatcher: &Dispatcher) {
        for message_type in [
            MessageType::RespRpc,
            MessageType::RespTopic,
            MessageType::RespService,
        ] {
            let requestor = self.clone();
            dispatcher.register(message_type, move |connection, message| {
                requestor.handle_response(connection, message);
            });
        }

        let requestor = self.clone();
        dispatcher.on_close(move |connection| {
            requestor.abandon_connection(connection.id());
        });
    }

    /// Spawns a task that expires requests older than `ttl` every `interval`.
    ///
    /// The task stops once the requestor is dropped.
    pub fn spawn_reaper(self: &Arc<Self>, ttl: Duration, interval: Duration) -> JoinHandle<()> {
        let requestor = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(requestor) = requestor.upgrade() else {
                    break;
                };
                requestor.reap_expired(ttl);
            }
        })
    }
}

impl Default for Requestor {
    fn default() -> Self {
        Self::new(&EndpointConfig::default())
    }
}

impl std::fmt::Debug for Requestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Requestor")
            .field("pending", &self.pending.len())
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RpcError;
    use crate::connection::Connection;
    use crate::message::{RCode, RpcRequest, RpcResponse, TopicRequest, TopicResponse};
    use parking_lot::Mutex;
    use serde_json::json;

    /// Client-side connection whose peer is a requestor-free echo of request ids.
    struct Harness {
        requestor: Arc<Requestor>,
        connection: ConnectionRef,
        peer: ConnectionRef,
        inbox: Arc<Mutex<Vec<Message>>>,
    }

    fn harness(config: EndpointConfig) -> Harness {
        let (a, b) = tokio::io::duplex(64 * 1024);
        let (a_read, a_write) = tokio::io::split(a);
        let (b_read, b_write) = tokio::io::split(b);

        let requestor = Arc::new(Requestor::new(&config));
        let client = Arc::new(Dispatcher::new());
        requestor.attach(&client);
        let connection = Connection::spawn(a_read, a_write, None, &config, client);

        let inbox = Arc::new(Mutex::new(Vec::new()));
        let server = Arc::new(Dispatcher::new());
        for message_type in [MessageType::ReqRpc, MessageType::ReqTopic] {
            let inbox = inbox.clone();
            server.register(message_type, move |_, message| inbox.lock().push(message));
        }
        let peer = Connection::spawn(b_read, b_write, None, &config, server);

        Harness {
            requestor,
            connection,
            peer,
            inbox,
        }
    }

    async fn wait_for_requests(inbox: &Mutex<Vec<Message>>, count: usize) -> Vec<Message> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if inbox.lock().len() >= count {
                    return inbox.lock().clone();
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_permuted_responses_resolve_matching_futures() {
        let h = harness(EndpointConfig::default());
        let mut futures = Vec::new();
        for i in 0..8 {
            let message = Message::new(
                format!("req-{i}"),
                RpcRequest::new("echo", json!({ "n": i })),
            );
            futures.push(h.requestor.send(&h.connection, message).unwrap());
        }
        assert_eq!(h.requestor.pending_count(), 8);

        let mut requests = wait_for_requests(&h.inbox, 8).await;
        requests.reverse();
        requests.swap(1, 5);
        for request in &requests {
            let crate::message::Body::RpcRequest(body) = request.body() else {
                panic!("unexpected body");
            };
            let reply = request.reply(RpcResponse::ok(body.parameters["n"].clone()));
            h.peer.send(&reply).unwrap();
        }

        for (i, future) in futures.into_iter().enumerate() {
            let response = future.await.unwrap();
            assert_eq!(response.id(), format!("req-{i}"));
            let body: RpcResponse = response.into_kind().unwrap();
            assert_eq!(body.result, json!(i));
        }
        assert_eq!(h.requestor.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_callback_mode() {
        let h = harness(EndpointConfig::default());
        let (tx, rx) = oneshot::channel();
        h.requestor
            .send_with_callback(
                &h.connection,
                Message::new("cb", TopicRequest::create("t")),
                move |outcome| {
                    let _ = tx.send(outcome);
                },
            )
            .unwrap();

        let requests = wait_for_requests(&h.inbox, 1).await;
        h.peer
            .send(&requests[0].reply(TopicResponse::new(RCode::Fine)))
            .unwrap();

        let response = rx.await.unwrap().unwrap();
        assert_eq!(response.id(), "cb");
        assert_eq!(h.requestor.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_response_is_discarded() {
        let h = harness(EndpointConfig::default());
        let pending = h
            .requestor
            .send(&h.connection, Message::new("known", TopicRequest::create("t")))
            .unwrap();

        h.peer
            .send(&Message::new("stranger", TopicResponse::new(RCode::Fine)))
            .unwrap();
        h.peer
            .send(&Message::new("known", TopicResponse::new(RCode::Fine)))
            .unwrap();

        assert_eq!(pending.await.unwrap().id(), "known");
        assert!(h.connection.is_connected());
        assert_eq!(h.requestor.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_call_timeout_removes_descriptor() {
        let h = harness(EndpointConfig::default());
        let err = h
            .requestor
            .call_timeout(
                &h.connection,
                Message::new("slow", TopicRequest::create("t")),
                Duration::from_millis(20),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::Timeout { ref request_id, .. } if request_id == "slow"));
        assert_eq!(h.requestor.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_request_id() {
        let h = harness(EndpointConfig::default());
        let _first = h
            .requestor
            .send(&h.connection, Message::new("dup", TopicRequest::create("t")))
            .unwrap();
        let err = h
            .requestor
            .send(&h.connection, Message::new("dup", TopicRequest::create("u")))
            .unwrap_err();
        assert!(matches!(err, RpcError::DuplicateRequest { .. }));
        assert_eq!(h.requestor.pending_count(), 1);
    }

    #[tokio::test]
    async fn test_send_failure_leaves_no_descriptor() {
        let h = harness(EndpointConfig::default());
        h.connection.shutdown();
        let err = h
            .requestor
            .send(&h.connection, Message::new("x", TopicRequest::create("t")))
            .unwrap_err();
        assert!(err.is_transport_error());
        assert_eq!(h.requestor.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_connection_close_abandons_pending() {
        let h = harness(EndpointConfig::default().with_request_timeout(None));
        let pending = h
            .requestor
            .send(&h.connection, Message::new("orphan", TopicRequest::create("t")))
            .unwrap();

        h.peer.shutdown();
        let err = pending.await.unwrap_err();
        assert!(matches!(err, RpcError::Abandoned { .. }));
        assert_eq!(h.requestor.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_reaper_expires_callbacks() {
        let h = harness(EndpointConfig::default());
        let (tx, rx) = oneshot::channel();
        h.requestor
            .send_with_callback(
                &h.connection,
                Message::new("forgotten", TopicRequest::create("t")),
                move |outcome| {
                    let _ = tx.send(outcome);
                },
            )
            .unwrap();

        let reaper = h
            .requestor
            .spawn_reaper(Duration::from_millis(10), Duration::from_millis(5));
        let outcome = tokio::time::timeout(Duration::from_secs(5), rx)
            .await
            .unwrap()
            .unwrap();
        assert!(outcome.unwrap_err().is_timeout());
        assert_eq!(h.requestor.pending_count(), 0);
        reaper.abort();
    }
}
