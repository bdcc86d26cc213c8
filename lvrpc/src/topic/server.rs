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


//! Server side of topic pub/sub.
//!
//! Membership is kept in two mirrored tables: topic name to [`Topic`], and
//! connection to subscriber. Closing a connection walks only the topics its
//! subscriber belongs to.
//!
//! Lock order is manager index, then topic, then subscriber.

use crate::connection::{ConnectionId, ConnectionRef};
use crate::dispatcher::Dispatcher;
use crate::message::{Message, Optype, RCode, TopicOptype, TopicRequest, TopicResponse};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

#[cfg(feature = "observability")]
use tracing::{debug, info, warn};

/// A connection subscribed to one or more topics.
struct Subscriber {
    connection: ConnectionRef,
    topics: Mutex<BTreeSet<String>>,
}

/// A named topic and its current subscribers.
///
/// A topic outlives its subscribers; it is only destroyed by an explicit
/// remove.
struct Topic {
    subscribers: Mutex<BTreeMap<ConnectionId, Arc<Subscriber>>>,
}

impl Topic {
    fn new() -> Self {
        Self {
            subscribers: Mutex::new(BTreeMap::new()),
        }
    }

    fn connections(&self) -> Vec<ConnectionRef> {
        self.subscribers
            .lock()
            .values()
            .map(|subscriber| subscriber.connection.clone())
            .collect()
    }
}

#[derive(Default)]
struct TopicIndex {
    topics: HashMap<String, Arc<Topic>>,
    subscribers: HashMap<ConnectionId, Arc<Subscriber>>,
}

/// Topic registry answering create, remove, subscribe, cancel and publish.
///
/// # Examples
///
/// ```rust
/// use lvrpc::dispatcher::Dispatcher;
/// use lvrpc::topic::server::TopicManager;
/// use std::sync::Arc;
///
/// let topics = Arc::new(TopicManager::new());
/// let dispatcher = Dispatcher::new();
/// topics.attach(&dispatcher);
/// assert!(topics.topic_names().is_empty());
/// ```
#[derive(Default)]
pub struct TopicManager {
    index: Mutex<TopicIndex>,
}

impl TopicManager {
    /// Creates a manager with no topics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a topic request from `connection` and replies to it.
    ///
    /// A publish also forwards the request, id included, to every subscriber.
    /// An unrecognized optype is answered with an invalid-optype code.
    pub fn handle_topic_request(
        &self,
        connection: &ConnectionRef,
        request_id: &str,
        request: TopicRequest,
    ) {
        let rcode = if !request.validate() {
            #[cfg(feature = "observability")]
            warn!(
                connection_id = %connection.id(),
                request_id = %request_id,
                topic = %request.topic_key,
                "Invalid topic request"
            );
            RCode::InvalidMsg
        } else {
            match request.optype {
                Optype::Known(TopicOptype::Create) => self.create(&request.topic_key),
                Optype::Known(TopicOptype::Remove) => self.remove(&request.topic_key),
                Optype::Known(TopicOptype::Subscribe) => {
                    self.subscribe(connection, &request.topic_key)
                }
                Optype::Known(TopicOptype::Cancel) => self.cancel(connection, &request.topic_key),
                Optype::Known(TopicOptype::Publish) => self.publish(request_id, &request),
                Optype::Unrecognized(_raw) => {
                    #[cfg(feature = "observability")]
                    warn!(
                        connection_id = %connection.id(),
                        request_id = %request_id,
                        topic = %request.topic_key,
                        optype = _raw,
                        "Unsupported topic optype"
                    );
                    RCode::InvalidOpType
                }
            }
        };

        let response = Message::new(request_id, TopicResponse::new(rcode));
        if let Err(_e) = connection.send(&response) {
            #[cfg(feature = "observability")]
            warn!(
                connection_id = %connection.id(),
                request_id = %request_id,
                error = %_e,
                "Failed to send topic response"
            );
        }
    }

    fn create(&self, name: &str) -> RCode {
        let mut index = self.index.lock();
        if index.topics.contains_key(name) {
            #[cfg(feature = "observability")]
            warn!(topic = %name, "Topic already exists");
        } else {
            index.topics.insert(name.to_string(), Arc::new(Topic::new()));

            #[cfg(feature = "observability")]
            info!(topic = %name, "Topic created");
        }
        RCode::Fine
    }

    fn remove(&self, name: &str) -> RCode {
        let mut index = self.index.lock();
        match index.topics.remove(name) {
            Some(topic) => {
                let subscribers = std::mem::take(&mut *topic.subscribers.lock());
                for subscriber in subscribers.values() {
                    subscriber.topics.lock().remove(name);
                }

                #[cfg(feature = "observability")]
                info!(topic = %name, detached = subscribers.len(), "Topic removed");
            }
            None => {
                #[cfg(feature = "observability")]
                warn!(topic = %name, "Removing unknown topic");
            }
        }
        RCode::Fine
    }

    fn subscribe(&self, connection: &ConnectionRef, name: &str) -> RCode {
        let mut index = self.index.lock();
        let Some(topic) = index.topics.get(name).cloned() else {
            #[cfg(feature = "observability")]
            warn!(connection_id = %connection.id(), topic = %name, "Subscribe to unknown topic");
            return RCode::NotFoundTopic;
        };

        let subscriber = index
            .subscribers
            .entry(connection.id())
            .or_insert_with(|| {
                Arc::new(Subscriber {
                    connection: connection.clone(),
                    topics: Mutex::new(BTreeSet::new()),
                })
            })
            .clone();

        topic
            .subscribers
            .lock()
            .insert(connection.id(), subscriber.clone());
        subscriber.topics.lock().insert(name.to_string());

        #[cfg(feature = "observability")]
        debug!(connection_id = %connection.id(), topic = %name, "Subscribed");

        RCode::Fine
    }

    fn cancel(&self, connection: &ConnectionRef, name: &str) -> RCode {
        let index = self.index.lock();
        if let Some(topic) = index.topics.get(name) {
            topic.subscribers.lock().remove(&connection.id());
        }
        if let Some(subscriber) = index.subscribers.get(&connection.id()) {
            subscriber.topics.lock().remove(name);
        }

        #[cfg(feature = "observability")]
        debug!(connection_id = %connection.id(), topic = %name, "Subscription cancelled");

        RCode::Fine
    }

    fn publish(&self, request_id: &str, request: &TopicRequest) -> RCode {
        let Some(topic) = self.index.lock().topics.get(&request.topic_key).cloned() else {
            #[cfg(feature = "observability")]
            warn!(topic = %request.topic_key, "Publish to unknown topic");
            return RCode::NotFoundTopic;
        };

        let targets = topic.connections();

        #[cfg(feature = "observability")]
        debug!(
            request_id = %request_id,
            topic = %request.topic_key,
            subscribers = targets.len(),
            "Publishing"
        );

        let forwarded = Message::new(request_id, request.clone());
        for connection in targets {
            if let Err(_e) = connection.send(&forwarded) {
                #[cfg(feature = "observability")]
                warn!(
                    connection_id = %connection.id(),
                    topic = %request.topic_key,
                    error = %_e,
                    "Failed to deliver publish"
                );
            }
        }
        RCode::Fine
    }

    /// Detaches `connection` from every topic it subscribed to.
    pub fn handle_connection_shutdown(&self, connection: &ConnectionRef) {
        let mut index = self.index.lock();
        let Some(subscriber) = index.subscribers.remove(&connection.id()) else {
            return;
        };

        let names = std::mem::take(&mut *subscriber.topics.lock());
        for name in &names {
            if let Some(topic) = index.topics.get(name) {
                topic.subscribers.lock().remove(&connection.id());
            }
        }

        #[cfg(feature = "observability")]
        debug!(connection_id = %connection.id(), topics = names.len(), "Subscriber removed");
    }

    /// Returns the names of every existing topic, sorted.
    #[must_use]
    pub fn topic_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.index.lock().topics.keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the number of subscribers of `name`, or `None` if it does not exist.
    #[must_use]
    pub fn subscriber_count(&self, name: &str) -> Option<usize> {
        let topic = self.index.lock().topics.get(name).cloned()?;
        let count = topic.subscribers.lock().len();
        Some(count)
    }

    /// Registers the topic request and close handlers on `dispatcher`.
    pub fn attach(self: &Arc<Self>, dispatcher: &Dispatcher) {
        let topics = self.clone();
        dispatcher.register_typed::<TopicRequest, _>(move |connection, id, request| {
            topics.handle_topic_request(connection, id, request);
        });

        let topics = self.clone();
        dispatcher.on_close(move |connection| topics.handle_connection_shutdown(connection));
    }
}

impl std::fmt::Debug for TopicManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let index = self.index.lock();
        f.debug_struct("TopicManager")
            .field("topics", &index.topics.len())
            .field("subscribers", &index.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Connection;
    use crate::endpoint::EndpointConfig;
    use crate::message::{Body, MessageType};
    use std::time::Duration;

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
        for message_type in [MessageType::ReqTopic, MessageType::RespTopic] {
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

    impl Peer {
        async fn take(&self, count: usize) -> Vec<Message> {
            tokio::time::timeout(Duration::from_secs(5), async {
                loop {
                    if self.inbox.lock().len() >= count {
                        return std::mem::take(&mut *self.inbox.lock());
                    }
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            })
            .await
            .unwrap()
        }

        async fn settle(&self) -> Vec<Message> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            std::mem::take(&mut *self.inbox.lock())
        }
    }

    fn rcode(message: &Message) -> RCode {
        match message.body() {
            Body::TopicResponse(response) => response.rcode,
            other => panic!("expected topic response, got {other:?}"),
        }
    }

    fn publishes(messages: &[Message]) -> Vec<String> {
        messages
            .iter()
            .filter_map(|message| match message.body() {
                Body::TopicRequest(request) => request.topic_msg.clone(),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_fan_out_and_cancel() {
        let topics = TopicManager::new();
        let publisher = peer();
        let s1 = peer();
        let s2 = peer();

        topics.handle_topic_request(&publisher.connection, "c", TopicRequest::create("t"));
        topics.handle_topic_request(&s1.connection, "s1", TopicRequest::subscribe("t"));
        topics.handle_topic_request(&s2.connection, "s2", TopicRequest::subscribe("t"));
        assert_eq!(rcode(&publisher.take(1).await[0]), RCode::Fine);
        s1.take(1).await;
        s2.take(1).await;
        assert_eq!(topics.subscriber_count("t"), Some(2));

        topics.handle_topic_request(&publisher.connection, "p1", TopicRequest::publish("t", "M"));
        assert_eq!(rcode(&publisher.take(1).await[0]), RCode::Fine);
        let delivered = s1.take(1).await;
        assert_eq!(delivered[0].id(), "p1");
        assert_eq!(delivered[0].body(), &Body::TopicRequest(TopicRequest::publish("t", "M")));
        assert_eq!(publishes(&s2.take(1).await), ["M"]);

        topics.handle_topic_request(&s2.connection, "x", TopicRequest::cancel("t"));
        s2.take(1).await;
        topics.handle_topic_request(&publisher.connection, "p2", TopicRequest::publish("t", "N"));
        assert_eq!(publishes(&s1.take(1).await), ["N"]);
        assert!(publishes(&s2.settle().await).is_empty());
    }

    #[tokio::test]
    async fn test_unknown_topic_is_reported() {
        let topics = TopicManager::new();
        let client = peer();

        topics.handle_topic_request(&client.connection, "1", TopicRequest::subscribe("nope"));
        topics.handle_topic_request(&client.connection, "2", TopicRequest::publish("nope", "x"));
        topics.handle_topic_request(&client.connection, "3", TopicRequest::cancel("nope"));
        topics.handle_topic_request(&client.connection, "4", TopicRequest::remove("nope"));

        let codes: Vec<_> = client.take(4).await.iter().map(rcode).collect();
        assert_eq!(
            codes,
            [RCode::NotFoundTopic, RCode::NotFoundTopic, RCode::Fine, RCode::Fine]
        );
    }

    #[tokio::test]
    async fn test_publish_without_content_is_invalid() {
        let topics = TopicManager::new();
        let client = peer();
        topics.handle_topic_request(&client.connection, "c", TopicRequest::create("t"));

        let mut request = TopicRequest::publish("t", "x");
        request.topic_msg = None;
        topics.handle_topic_request(&client.connection, "p", request);

        let codes: Vec<_> = client.take(2).await.iter().map(rcode).collect();
        assert_eq!(codes, [RCode::Fine, RCode::InvalidMsg]);
    }

    #[tokio::test]
    async fn test_unrecognized_optype_is_answered() {
        let topics = TopicManager::new();
        let client = peer();

        let mut request = TopicRequest::create("t");
        request.optype = Optype::Unrecognized(9);
        topics.handle_topic_request(&client.connection, "bad", request);
        topics.handle_topic_request(&client.connection, "ok", TopicRequest::create("t"));

        let replies = client.take(2).await;
        assert_eq!(replies[0].id(), "bad");
        assert_eq!(rcode(&replies[0]), RCode::InvalidOpType);
        assert_eq!(rcode(&replies[1]), RCode::Fine);
        assert!(client.connection.is_connected());
        assert_eq!(topics.topic_names(), ["t"]);
    }

    #[tokio::test]
    async fn test_connection_shutdown_detaches_from_every_topic() {
        let topics = TopicManager::new();
        let publisher = peer();
        let dropped = peer();
        let kept = peer();

        for name in ["a", "b"] {
            topics.handle_topic_request(&publisher.connection, "c", TopicRequest::create(name));
            topics.handle_topic_request(&dropped.connection, "s", TopicRequest::subscribe(name));
            topics.handle_topic_request(&kept.connection, "s", TopicRequest::subscribe(name));
        }
        publisher.take(2).await;
        dropped.take(2).await;
        kept.take(2).await;

        topics.handle_connection_shutdown(&dropped.connection);
        assert_eq!(topics.subscriber_count("a"), Some(1));
        assert_eq!(topics.subscriber_count("b"), Some(1));

        topics.handle_topic_request(&publisher.connection, "pa", TopicRequest::publish("a", "A"));
        topics.handle_topic_request(&publisher.connection, "pb", TopicRequest::publish("b", "B"));
        assert_eq!(publishes(&kept.take(2).await), ["A", "B"]);
        assert!(dropped.settle().await.is_empty());
    }

    #[tokio::test]
    async fn test_topic_survives_without_subscribers_until_removed() {
        let topics = TopicManager::new();
        let client = peer();

        topics.handle_topic_request(&client.connection, "1", TopicRequest::create("t"));
        topics.handle_topic_request(&client.connection, "2", TopicRequest::subscribe("t"));
        topics.handle_topic_request(&client.connection, "3", TopicRequest::cancel("t"));
        client.take(3).await;
        assert_eq!(topics.subscriber_count("t"), Some(0));
        assert_eq!(topics.topic_names(), ["t"]);

        topics.handle_topic_request(&client.connection, "4", TopicRequest::subscribe("t"));
        topics.handle_topic_request(&client.connection, "5", TopicRequest::remove("t"));
        client.take(2).await;
        assert_eq!(topics.subscriber_count("t"), None);

        // The subscriber record no longer references the removed topic.
        topics.handle_connection_shutdown(&client.connection);
        assert!(topics.topic_names().is_empty());
    }
}
