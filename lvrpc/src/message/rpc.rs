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


//! RPC call bodies.

use super::RCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of a [`MessageType::ReqRpc`](super::MessageType::ReqRpc) message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Name of the method to invoke.
    pub method: String,
    /// Named arguments; must be a JSON object.
    #[serde(default)]
    pub parameters: Value,
}

impl RpcRequest {
    /// Creates a request for `method` with the given parameter object.
    pub fn new(method: impl Into<String>, parameters: Value) -> Self {
        Self {
            method: method.into(),
            parameters,
        }
    }

    /// Returns `true` if the parameters are a JSON object.
    #[must_use]
    pub fn validate(&self) -> bool {
        self.parameters.is_object()
    }
}

/// Body of a [`MessageType::RespRpc`](super::MessageType::RespRpc) message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    /// Outcome of the call.
    pub rcode: RCode,
    /// The method's return value; `null` unless `rcode` is fine.
    #[serde(default)]
    pub result: Value,
}

impl RpcResponse {
    /// Creates a successful response carrying `result`.
    pub fn ok(result: Value) -> Self {
        Self {
            rcode: RCode::Fine,
            result,
        }
    }

    /// Creates a failed response with a `null` result.
    pub fn error(rcode: RCode) -> Self {
        Self {
            rcode,
            result: Value::Null,
        }
    }

    /// Always `true`: the rcode is typed, and any result value is accepted.
    #[must_use]
    pub fn validate(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_requires_object_parameters() {
        assert!(RpcRequest::new("add", json!({"num1": 1})).validate());
        assert!(!RpcRequest::new("add", json!([1, 2])).validate());
        assert!(!RpcRequest::new("add", Value::Null).validate());
    }

    #[test]
    fn test_request_wire_keys() {
        let parsed: RpcRequest =
            serde_json::from_str(r#"{"method":"add","parameters":{"num1":20,"num2":30}}"#)
                .unwrap();
        assert_eq!(parsed.method, "add");
        assert_eq!(parsed.parameters["num2"], 30);
    }

    #[test]
    fn test_response_wire_keys() {
        let json = serde_json::to_value(RpcResponse::ok(json!(50))).unwrap();
        assert_eq!(json, json!({"rcode": 0, "result": 50}));

        let parsed: RpcResponse = serde_json::from_str(r#"{"rcode":6}"#).unwrap();
        assert_eq!(parsed, RpcResponse::error(RCode::NotFoundService));
    }
}
