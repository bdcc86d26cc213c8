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


//! Client side of topic pub/sub.

use crate::connection::ConnectionRef;
use crate::dispatcher::Dispatcher;
use crate::error::{Result, RpcError};
use crate::message::{Message, TopicOptype, TopicRequest, TopicResponse};
use crate::requestor::Requestor;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[cfg(feature = "observability")]
use tracing::{debug, info, warn};

/// Invoked with `(topic, content)` for every publish received on a topic.
pub type PublishCallback = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Issues topic operations and routes pushed publishes to subscriptions.
pub struct TopicManager {
    requestor: Arc<Requestor>,
    callbacks: Mutex<HashMap<String, PublishCallback>>,
}

impl TopicManager {
    /// Creates a topic client sending through `requestor`.
    #[must_use]
    pub fn new(requestor: Arc<Requestor>) -> Self {
        Self {
            requestor,
            callbacks: Mutex::new(HashMap::new()),
        }
    }

    async fn common_request(&self, connection: &ConnectionRef, request: TopicRequest) -> Result<()> {
        #[cfg(feature = "observability")]
        let (topic, optype) = (request.topic_key.clone(), request.optype);

        let response: TopicResponse = self
            .requestor
            .call_kind(connection, Message::request(request))
            .await?;

        if !response.rcode.is_fine() {
            #[cfg(feature = "observability")]
            warn!(
                topic = %topic,
                optype = %optype,
                rcode = %response.rcode,
                reason = response.rcode.reason(),
                "Topic request failed"
            );
            return Err(RpcError::Remote {
                rcode: response.rcode,
            });
        }

        #[cfg(feature = "observability")]
        debug!(topic = %topic, optype = %optype, "Topic request succeeded");

        Ok(())
    }

    /// Creates `name` on the server. Creating an existing topic succeeds.
    ///
    /// # Errors
    ///
    /// Any request error or non-fine response code.
    pub async fn create(&self, connection: &ConnectionRef, name: &str) -> Result<()> {
        self.common_request(connection, TopicRequest::create(name)).await
    }

    /// Removes `name` on the server.
    ///
    /// # Errors
    ///
    /// Any request error or non-fine response code.
    pub async fn remove(&self, connection: &ConnectionRef, name: &str) -> Result<()> {
        self.common_request(connection, TopicRequest::remove(name)).await
    }

    /// Subscribes to `name`; `callback` receives every later publish.
    ///
    /// The callback is installed before the request is sent so no publish is
    /// missed, and uninstalled again if the subscription fails.
    ///
    /// # Errors
    ///
    /// [`RpcError::Remote`] with a not-found-topic code if the topic does not
    /// exist, or any request error.
    pub async fn subscribe<F>(&self, connection: &ConnectionRef, name: &str, callback: F) -> Result<()>
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        self.callbacks
            .lock()
            .insert(name.to_string(), Arc::new(callback));

        let result = self
            .common_request(connection, TopicRequest::subscribe(name))
            .await;
        if result.is_err() {
            self.callbacks.lock().remove(name);
        } else {
            #[cfg(feature = "observability")]
            info!(topic = %name, "Subscribed");
        }
        result
    }

    /// Unsubscribes from `name` and drops its callback.
    ///
    /// # Errors
    ///
    /// Any request error or non-fine response code.
    pub async fn cancel(&self, connection: &ConnectionRef, name: &str) -> Result<()> {
        self.callbacks.lock().remove(name);
        self.common_request(connection, TopicRequest::cancel(name)).await
    }

    /// Publishes `content` to every subscriber of `name`.
    ///
    /// # Errors
    ///
    /// [`RpcError::Remote`] with a not-found-topic code if the topic does not
    /// exist, or any request error.
    pub async fn publish(&self, connection: &ConnectionRef, name: &str, content: &str) -> Result<()> {
        self.common_request(connection, TopicRequest::publish(name, content))
            .await
    }

    /// Delivers a publish pushed by the server to its subscription callback.
    pub fn handle_publish(&self, _connection: &ConnectionRef, request: TopicRequest) {
        if request.optype != TopicOptype::Publish {
            #[cfg(feature = "observability")]
            warn!(topic = %request.topic_key, optype = %request.optype, "Ignoring pushed topic request");
            return;
        }

        let callback = self.callbacks.lock().get(&request.topic_key).cloned();
        match (callback, request.topic_msg) {
            (Some(callback), Some(content)) => callback(&request.topic_key, &content),
            (None, _) => {
                #[cfg(feature = "observability")]
                warn!(topic = %request.topic_key, "Publish for topic without subscription");
            }
            (Some(_), None) => {
                #[cfg(feature = "observability")]
                warn!(topic = %request.topic_key, "Publish without content");
            }
        }
    }

    /// Returns the topics with an installed callback, sorted.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<String> {
        let mut names: Vec<_> = self.callbacks.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Registers this manager as the pushed-publish handler on `dispatcher`.
    pub fn attach(self: &Arc<Self>, dispatcher: &Dispatcher) {
        let topics = self.clone();
        dispatcher.register_typed::<TopicRequest, _>(move |connection, _id, request| {
            topics.handle_publish(connection, request);
        });
    }
}

impl std::fmt::Debug for TopicManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicManager")
            .field("subscriptions", &self.subscriptions())
            .finish()
    }
}
