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


//! Tracking of pending requests awaiting responses.
//!
//! Every outbound request gets a descriptor keyed by its request id. The
//! descriptor holds where the response goes: a oneshot channel behind a
//! [`PendingResponse`] future, or a callback. Descriptors are removed under
//! the table lock and delivered outside it, so a response is delivered at
//! most once and a slow callback never blocks other lookups.

use crate::connection::ConnectionId;
use crate::error::{Result, RpcError};
use crate::message::Message;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Weak;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

/// Callback invoked with the outcome of a callback-mode request.
pub type ResponseCallback = Box<dyn FnOnce(Result<Message>) + Send>;

/// Where a response is delivered.
pub(crate) enum ResponseSlot {
    Future(oneshot::Sender<Result<Message>>),
    Callback(ResponseCallback),
}

impl ResponseSlot {
    fn deliver(self, outcome: Result<Message>) {
        match self {
            // The receiver is gone when the caller stopped waiting.
            ResponseSlot::Future(tx) => {
                let _ = tx.send(outcome);
            }
            ResponseSlot::Callback(callback) => callback(outcome),
        }
    }
}

struct RequestDescriptor {
    sequence: u64,
    connection_id: ConnectionId,
    slot: ResponseSlot,
    created_at: Instant,
}

/// Table of requests sent but not yet answered.
#[derive(Default)]
pub(crate) struct PendingRequests {
    descriptors: Mutex<HashMap<String, RequestDescriptor>>,
    next_sequence: AtomicU64,
}

impl PendingRequests {
    /// Inserts a descriptor, returning its sequence number.
    ///
    /// Fails if a request with the same id is already pending.
    pub(crate) fn register(
        &self,
        request_id: &str,
        connection_id: ConnectionId,
        slot: ResponseSlot,
    ) -> Result<u64> {
        let mut descriptors = self.descriptors.lock();
        if descriptors.contains_key(request_id) {
            return Err(RpcError::DuplicateRequest {
                request_id: request_id.to_string(),
            });
        }
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        descriptors.insert(
            request_id.to_string(),
            RequestDescriptor {
                sequence,
                connection_id,
                slot,
                created_at: Instant::now(),
            },
        );
        Ok(sequence)
    }

    /// Delivers `response` to the descriptor with the same id.
    ///
    /// Returns `false` if no such request is pending.
    pub(crate) fn complete(&self, response: Message) -> bool {
        let descriptor = self.descriptors.lock().remove(response.id());
        match descriptor {
            Some(descriptor) => {
                descriptor.slot.deliver(Ok(response));
                true
            }
            None => false,
        }
    }

    /// Drops the descriptor registered under `sequence` without delivering.
    ///
    /// A descriptor later re-registered under the same id is left alone.
    pub(crate) fn cancel(&self, request_id: &str, sequence: u64) -> bool {
        let mut descriptors = self.descriptors.lock();
        match descriptors.get(request_id) {
            Some(descriptor) if descriptor.sequence == sequence => {
                descriptors.remove(request_id);
                true
            }
            _ => false,
        }
    }

    /// Fails every descriptor at least `ttl` old with a timeout.
    pub(crate) fn expire(&self, ttl: Duration) -> usize {
        let expired = self.drain_where(|descriptor| descriptor.created_at.elapsed() >= ttl);
        let count = expired.len();
        for (request_id, descriptor) in expired {
            descriptor.slot.deliver(Err(RpcError::Timeout {
                request_id,
                duration: ttl,
            }));
        }
        count
    }

    /// Fails every descriptor sent over `connection_id`.
    pub(crate) fn abandon(&self, connection_id: ConnectionId) -> usize {
        let abandoned = self.drain_where(|descriptor| descriptor.connection_id == connection_id);
        let count = abandoned.len();
        for (request_id, descriptor) in abandoned {
            descriptor
                .slot
                .deliver(Err(RpcError::Abandoned { request_id }));
        }
        count
    }

    fn drain_where(
        &self,
        predicate: impl Fn(&RequestDescriptor) -> bool,
    ) -> Vec<(String, RequestDescriptor)> {
        let mut descriptors = self.descriptors.lock();
        let ids: Vec<String> = descriptors
            .iter()
            .filter(|(_, descriptor)| predicate(descriptor))
            .map(|(id, _)| id.clone())
            .collect();
        ids.into_iter()
            .filter_map(|id| descriptors.remove(&id).map(|descriptor| (id, descriptor)))
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.descriptors.lock().len()
    }
}

/// Future resolving to the response of a request sent with
/// [`Requestor::send`](super::Requestor::send).
///
/// Dropping it before completion removes the request's descriptor, so a late
/// response is discarded as unknown.
///
/// # Example
///
/// ```rust,no_run
/// # use lvrpc::connection::ConnectionRef;
/// # use lvrpc::message::{Message, TopicRequest};
/// # use lvrpc::requestor::Requestor;
/// # use std::time::Duration;
/// # async fn example(requestor: Requestor, connection: ConnectionRef) -> lvrpc::Result<()> {
/// let pending = requestor.send(&connection, Message::request(TopicRequest::create("news")))?;
/// let response = pending.wait_timeout(Duration::from_secs(5)).await?;
/// # Ok(())
/// # }
/// ```
#[must_use = "dropping a PendingResponse abandons the request"]
pub struct PendingResponse {
    request_id: String,
    sequence: u64,
    receiver: oneshot::Receiver<Result<Message>>,
    pending: Weak<PendingRequests>,
    finished: bool,
}

impl PendingResponse {
    pub(crate) fn new(
        request_id: String,
        sequence: u64,
        receiver: oneshot::Receiver<Result<Message>>,
        pending: Weak<PendingRequests>,
    ) -> Self {
        Self {
            request_id,
            sequence,
            receiver,
            pending,
            finished: false,
        }
    }

    /// Returns the id of the request this future answers.
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Waits for the response for at most `duration`.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Timeout`] if the response does not arrive in
    /// time, or the error the request failed with.
    pub async fn wait_timeout(self, duration: Duration) -> Result<Message> {
        let request_id = self.request_id.clone();
        match tokio::time::timeout(duration, self).await {
            Ok(outcome) => outcome,
            Err(_) => Err(RpcError::Timeout {
                request_id,
                duration,
            }),
        }
    }
}

impl Future for PendingResponse {
    type Output = Result<Message>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(outcome) => {
                this.finished = true;
                Poll::Ready(outcome.unwrap_or_else(|_| {
                    Err(RpcError::Abandoned {
                        request_id: this.request_id.clone(),
                    })
                }))
            }
        }
    }
}

impl Drop for PendingResponse {
    fn drop(&mut self) {
        if !self.finished {
            if let Some(pending) = self.pending.upgrade() {
                pending.cancel(&self.request_id, self.sequence);
            }
        }
    }
}

impl std::fmt::Debug for PendingResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingResponse")
            .field("request_id", &self.request_id)
            .field("finished", &self.finished)
            .finish()
    }
}
