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


//! # Calculator Server
//!
//! Serves `add`, `sub`, `mul` and `div` over RPC. With a registry address it
//! also announces every method, so clients can find it through discovery.
//!
//! ```text
//! cargo run --example calculator_server -- 127.0.0.1:9090
//! cargo run --example calculator_server -- 127.0.0.1:9090 127.0.0.1:8080
//! ```

use lvrpc::endpoint::{EndpointConfig, RpcServer};
use lvrpc::rpc::{ParamType, ServiceDescriptor};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

/// Describes a two-operand integer method.
fn binary(
    method: &str,
    op: impl Fn(i64, i64) -> Option<i64> + Send + Sync + 'static,
) -> lvrpc::Result<ServiceDescriptor> {
    ServiceDescriptor::builder(method)
        .param("num1", ParamType::Integral)
        .param("num2", ParamType::Integral)
        .returns(ParamType::Integral)
        .handler(move |params: &Value| {
            let a = params["num1"].as_i64().ok_or("num1 is not an integer")?;
            let b = params["num2"].as_i64().ok_or("num2 is not an integer")?;
            op(a, b)
                .map(|result| json!(result))
                .ok_or_else(|| format!("cannot compute {a} and {b}"))
        })
        .build()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let addr = args.next().unwrap_or_else(|| "127.0.0.1:9090".to_string());
    let registry = args.next();

    let mut server = RpcServer::bind(addr, EndpointConfig::default()).await?;
    server.register_service(binary("add", i64::checked_add)?);
    server.register_service(binary("sub", i64::checked_sub)?);
    server.register_service(binary("mul", i64::checked_mul)?);
    server.register_service(binary("div", i64::checked_div)?);

    if let Some(registry) = &registry {
        server.enable_registry(registry.clone(), None);
    }

    let handle = server.spawn().await?;
    println!("=== Calculator Server ===");
    println!("Listening on {}", handle.local_addr());
    if let Some(registry) = registry {
        println!("Announced to registry at {registry}");
    }

    std::future::pending::<()>().await;
    Ok(())
}
