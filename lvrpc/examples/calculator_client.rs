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


//! # Calculator Client
//!
//! Calls the calculator server using all three calling conventions.
//!
//! ```text
//! # connect straight to the server
//! cargo run --example calculator_client -- 127.0.0.1:9090
//! # find the server through the registry
//! cargo run --example calculator_client -- --registry 127.0.0.1:8080
//! ```

use lvrpc::endpoint::{EndpointConfig, RpcClient};
use serde_json::json;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = EndpointConfig::default().with_request_timeout(Some(Duration::from_secs(5)));

    let client = match args.as_slice() {
        [flag, registry] if flag == "--registry" => {
            println!("Discovering providers through {registry}");
            RpcClient::with_discovery(registry, config).await?
        }
        [addr] => RpcClient::connect(addr, config).await?,
        _ => RpcClient::connect("127.0.0.1:9090", config).await?,
    };

    println!("=== Calculator Client ===\n");

    // Awaited call.
    let sum = client.call("add", json!({"num1": 20, "num2": 30})).await?;
    println!("add(20, 30) = {sum}");

    // Future-based call.
    let pending = client
        .call_async("mul", json!({"num1": 6, "num2": 7}))
        .await?;
    println!("mul(6, 7) = {}", pending.await?);

    // Callback-based call.
    let (tx, rx) = tokio::sync::oneshot::channel();
    client
        .call_with_callback("sub", json!({"num1": 10, "num2": 4}), move |outcome| {
            let _ = tx.send(outcome);
        })
        .await?;
    println!("sub(10, 4) = {}", rx.await??);

    // Application errors come back as remote errors.
    match client.call("div", json!({"num1": 1, "num2": 0})).await {
        Ok(value) => println!("div(1, 0) = {value}"),
        Err(e) => println!("div(1, 0) failed: {e}"),
    }
    match client.call("pow", json!({"num1": 2, "num2": 8})).await {
        Ok(value) => println!("pow(2, 8) = {value}"),
        Err(e) => println!("pow(2, 8) failed: {e}"),
    }

    client.shutdown();
    Ok(())
}
