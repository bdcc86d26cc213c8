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


//! Provider address carried by service registry messages.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;

/// Network address of an RPC provider, serialized as `{"ip": .., "port": ..}`.
///
/// # Examples
///
/// ```rust
/// use lvrpc::message::HostAddr;
///
/// let host = HostAddr::new("127.0.0.1", 9090);
/// assert_eq!(host.to_string(), "127.0.0.1:9090");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HostAddr {
    /// IP address or host name.
    pub ip: String,
    /// TCP port.
    pub port: u16,
}

impl HostAddr {
    /// Creates a host address.
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        Self {
            ip: ip.into(),
            port,
        }
    }
}

impl From<SocketAddr> for HostAddr {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

impl fmt::Display for HostAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}
