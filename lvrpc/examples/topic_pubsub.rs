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


//! # Topic Publish/Subscribe
//!
//! Starts a topic server in-process, subscribes two clients to `news`, and
//! publishes from a third. After one subscriber cancels, only the other
//! keeps receiving.
//!
//! ```text
//! cargo run --example topic_pubsub
//! ```

use lvrpc::endpoint::{EndpointConfig, TopicClient, TopicServer};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let server = TopicServer::bind("127.0.0.1:0", EndpointConfig::default()).await?;
    let topics = server.topics().clone();
    let handle = server.spawn();
    let addr = handle.local_addr().to_string();
    println!("=== Topic Pub/Sub ===");
    println!("Topic server on {addr}\n");

    let publisher = TopicClient::connect(&addr, EndpointConfig::default()).await?;
    publisher.create("news").await?;

    let alice = TopicClient::connect(&addr, EndpointConfig::default()).await?;
    alice
        .subscribe("news", |topic, content| println!("  alice <- [{topic}] {content}"))
        .await?;

    let bob = TopicClient::connect(&addr, EndpointConfig::default()).await?;
    bob.subscribe("news", |topic, content| println!("  bob   <- [{topic}] {content}"))
        .await?;

    println!("Publishing to {} subscribers", topics.subscriber_count("news").unwrap_or(0));
    publisher.publish("news", "first edition").await?;
    tokio::time::sleep(Duration::from_millis(100)).await;

    bob.cancel("news").await?;
    println!("\nbob cancelled; publishing again");
    publisher.publish("news", "second edition").await?;
    tokio::time::sleep(Duration::from_millis(100)).await;

    match publisher.publish("sports", "no such topic").await {
        Ok(()) => println!("\nunexpected: published to a missing topic"),
        Err(e) => println!("\npublishing to a missing topic fails: {e}"),
    }

    handle.shutdown();
    Ok(())
}
