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


//! # Registry Server
//!
//! Runs a service registry that RPC servers announce their methods to and
//! RPC clients discover providers from.
//!
//! ```text
//! cargo run --example registry_server -- 127.0.0.1:8080
//! ```

use lvrpc::endpoint::{EndpointConfig, RegistryServer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:8080".to_string());

    let server = RegistryServer::bind(addr, EndpointConfig::default()).await?;
    println!("=== Registry Server ===");
    println!("Listening on {}", server.local_addr());

    server.run().await;
    Ok(())
}
