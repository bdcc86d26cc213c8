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


//! Service registry bodies.

use super::{HostAddr, Optype, RCode, ServiceOptype};
use serde::{Deserialize, Serialize};

/// Body of a [`MessageType::ReqService`](super::MessageType::ReqService) message.
///
/// Sent by providers (register) and consumers (discover), and pushed by the
/// registry to consumers (online/offline).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRequest {
    /// Method the request concerns.
    pub method: String,
    /// Operation to perform.
    pub optype: Optype<ServiceOptype>,
    /// Provider address; required for every operation except discover.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<HostAddr>,
}

impl ServiceRequest {
    fn with_op(method: impl Into<String>, optype: ServiceOptype, host: Option<HostAddr>) -> Self {
        Self {
            method: method.into(),
            optype: optype.into(),
            host,
        }
    }

    /// Builds a register request announcing `host` as a provider of `method`.
    pub fn register(method: impl Into<String>, host: HostAddr) -> Self {
        Self::with_op(method, ServiceOptype::Register, Some(host))
    }

    /// Builds a discover request for `method`.
    pub fn discover(method: impl Into<String>) -> Self {
        Self::with_op(method, ServiceOptype::Discover, None)
    }

    /// Builds an online notification.
    pub fn online(method: impl Into<String>, host: HostAddr) -> Self {
        Self::with_op(method, ServiceOptype::Online, Some(host))
    }

    /// Builds an offline notification.
    pub fn offline(method: impl Into<String>, host: HostAddr) -> Self {
        Self::with_op(method, ServiceOptype::Offline, Some(host))
    }

    /// Returns `false` if a register, online or offline request lacks a host.
    #[must_use]
    pub fn validate(&self) -> bool {
        match self.optype {
            Optype::Known(ServiceOptype::Register | ServiceOptype::Online | ServiceOptype::Offline) => {
                self.host.is_some()
            }
            _ => true,
        }
    }
}

/// Body of a [`MessageType::RespService`](super::MessageType::RespService) message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceResponse {
    /// Outcome of the operation.
    pub rcode: RCode,
    /// Operation this response answers.
    pub optype: ServiceOptype,
    /// Method the request concerned.
    #[serde(default)]
    pub method: String,
    /// Provider list; present only in discover responses.
    #[serde(
        rename = "host",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub hosts: Option<Vec<HostAddr>>,
}

impl ServiceResponse {
    /// Creates a response without a provider list.
    pub fn new(rcode: RCode, optype: ServiceOptype, method: impl Into<String>) -> Self {
        Self {
            rcode,
            optype,
            method: method.into(),
            hosts: None,
        }
    }

    /// Creates a discover response carrying `hosts`.
    pub fn discovered(rcode: RCode, method: impl Into<String>, hosts: Vec<HostAddr>) -> Self {
        Self {
            hosts: Some(hosts),
            ..Self::new(rcode, ServiceOptype::Discover, method)
        }
    }

    /// Always `true`: rcode and optype are typed.
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
    fn test_host_required_for_announcements() {
        assert!(ServiceRequest::discover("add").validate());
        assert!(ServiceRequest::register("add", HostAddr::new("h", 1)).validate());

        let mut request = ServiceRequest::offline("add", HostAddr::new("h", 1));
        request.host = None;
        assert!(!request.validate());
    }

    #[test]
    fn test_unknown_optype_still_decodes() {
        let parsed: ServiceRequest = serde_json::from_str(r#"{"method":"add","optype":9}"#).unwrap();
        assert_eq!(parsed.optype, Optype::Unrecognized(9));
        assert_eq!(parsed.optype.known(), None);
        assert!(parsed.validate());
    }

    #[test]
    fn test_response_host_list_uses_host_key() {
        let response = ServiceResponse::discovered(
            RCode::Fine,
            "add",
            vec![HostAddr::new("a", 1), HostAddr::new("b", 2)],
        );
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(
            json,
            json!({
                "rcode": 0,
                "optype": 1,
                "method": "add",
                "host": [{"ip": "a", "port": 1}, {"ip": "b", "port": 2}],
            })
        );
    }

    #[test]
    fn test_register_response_omits_hosts() {
        let json =
            serde_json::to_value(ServiceResponse::new(RCode::Fine, ServiceOptype::Register, "add"))
                .unwrap();
        assert!(json.get("host").is_none());
    }
}
