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


//! Publish/subscribe across real TCP connections.
//!
//! These tests verify:
//! - Publishes fan out to every subscriber, including the publisher
//! - Cancelled subscribers stop receiving
//! - Closing a client detaches it from every topic
//! - Operations on missing topics fail with `NotFoundTopic`

use lvrpc::RpcError;
use lvrpc::endpoint::{EndpointConfig, ServerHandle, TopicClient, TopicServer};
use lvrpc::message::RCode;
use lvrpc::topic::server::TopicManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};

async fn server() -> (ServerHandle, Arc<TopicManager>) {
    let server = TopicServer::bind("127.0.0.1:0", EndpointConfig::default())
        .await
        .unwrap();
    let topics = server.topics().clone();
    (server.spawn(), topics)
}

async fn client(server: &ServerHandle) -> TopicClient {
    TopicClient::connect(&server.local_addr().to_string(), EndpointConfig::default())
        .await
        .unwrap()
}

/// Subscribes `client` to `name`, returning a receiver of `(topic, content)`.
async fn subscribe(client: &TopicClient, name: &str) -> UnboundedReceiver<(String, String)> {
    let (tx, rx) = mpsc::unbounded_channel();
    client
        .subscribe(name, move |topic, content| {
            let _ = tx.send((topic.to_string(), content.to_string()));
        })
        .await
        .unwrap();
    rx
}

async fn next(rx: &mut UnboundedReceiver<(String, String)>) -> (String, String) {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no publish received")
        .expect("subscription dropped")
}

async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn test_publish_fans_out_to_every_subscriber() {
    let (server, topics) = server().await;
    let alice = client(&server).await;
    let bob = client(&server).await;

    alice.create("news").await.unwrap();
    let mut alice_rx = subscribe(&alice, "news").await;
    let mut bob_rx = subscribe(&bob, "news").await;
    assert_eq!(topics.subscriber_count("news"), Some(2));

    alice.publish("news", "hello").await.unwrap();
    let expected = ("news".to_string(), "hello".to_string());
    assert_eq!(next(&mut alice_rx).await, expected);
    assert_eq!(next(&mut bob_rx).await, expected);

    bob.publish("news", "again").await.unwrap();
    assert_eq!(next(&mut alice_rx).await.1, "again");
    assert_eq!(next(&mut bob_rx).await.1, "again");
}

#[tokio::test]
async fn test_cancelled_subscriber_stops_receiving() {
    let (server, topics) = server().await;
    let alice = client(&server).await;
    let bob = client(&server).await;

    alice.create("news").await.unwrap();
    let mut alice_rx = subscribe(&alice, "news").await;
    let mut bob_rx = subscribe(&bob, "news").await;

    bob.cancel("news").await.unwrap();
    assert_eq!(topics.subscriber_count("news"), Some(1));

    alice.publish("news", "only alice").await.unwrap();
    assert_eq!(next(&mut alice_rx).await.1, "only alice");

    assert!(bob_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_client_shutdown_detaches_from_every_topic() {
    let (server, topics) = server().await;
    let alice = client(&server).await;
    let bob = client(&server).await;

    for name in ["a", "b"] {
        alice.create(name).await.unwrap();
        let _rx = subscribe(&alice, name).await;
        let _rx = subscribe(&bob, name).await;
    }
    assert_eq!(topics.subscriber_count("a"), Some(2));

    bob.shutdown();
    eventually(|| topics.subscriber_count("a") == Some(1) && topics.subscriber_count("b") == Some(1)).await;
    assert_eq!(topics.topic_names(), vec!["a".to_string(), "b".to_string()]);
}

#[tokio::test]
async fn test_missing_topic_is_reported() {
    let (server, _topics) = server().await;
    let alice = client(&server).await;

    let err = alice.publish("nowhere", "x").await.unwrap_err();
    assert!(
        matches!(err, RpcError::Remote { rcode: RCode::NotFoundTopic }),
        "{err}"
    );

    let (tx, _rx) = mpsc::unbounded_channel::<String>();
    let err = alice
        .subscribe("nowhere", move |_, content| {
            let _ = tx.send(content.to_string());
        })
        .await
        .unwrap_err();
    assert_eq!(err.rcode(), RCode::NotFoundTopic);

    // Removing an absent topic is not an error.
    alice.remove("nowhere").await.unwrap();
}

#[tokio::test]
async fn test_removed_topic_rejects_publishes() {
    let (server, topics) = server().await;
    let alice = client(&server).await;

    alice.create("news").await.unwrap();
    let _rx = subscribe(&alice, "news").await;
    alice.remove("news").await.unwrap();
    assert!(topics.topic_names().is_empty());

    let err = alice.publish("news", "late").await.unwrap_err();
    assert_eq!(err.rcode(), RCode::NotFoundTopic);
}
