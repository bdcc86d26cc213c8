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


//! Round-robin selection over a method's provider hosts.

use crate::message::HostAddr;
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct HostRing {
    hosts: Vec<HostAddr>,
    cursor: usize,
}

/// Ordered provider list for one method plus a round-robin cursor.
///
/// The cursor is reduced modulo the current length under the same lock that
/// guards mutation, so removals never skip past the end and an empty list
/// yields `None` instead of dividing by zero.
///
/// # Examples
///
/// ```rust
/// use lvrpc::message::HostAddr;
/// use lvrpc::registry::HostManager;
///
/// let a = HostAddr::new("10.0.0.1", 9000);
/// let b = HostAddr::new("10.0.0.2", 9000);
/// let hosts = HostManager::new([a.clone(), b.clone()]);
///
/// assert_eq!(hosts.choose(), Some(a.clone()));
/// assert_eq!(hosts.choose(), Some(b));
/// assert_eq!(hosts.choose(), Some(a));
/// ```
#[derive(Debug, Default)]
pub struct HostManager {
    ring: Mutex<HostRing>,
}

impl HostManager {
    /// Creates a manager over `hosts`, dropping duplicates.
    pub fn new(hosts: impl IntoIterator<Item = HostAddr>) -> Self {
        let manager = Self::default();
        manager.extend(hosts);
        manager
    }

    /// Appends `host` unless already present. Returns `true` if it was added.
    pub fn append(&self, host: HostAddr) -> bool {
        let mut ring = self.ring.lock();
        if ring.hosts.contains(&host) {
            return false;
        }
        ring.hosts.push(host);
        true
    }

    /// Appends every host not already present.
    pub fn extend(&self, hosts: impl IntoIterator<Item = HostAddr>) {
        let mut ring = self.ring.lock();
        for host in hosts {
            if !ring.hosts.contains(&host) {
                ring.hosts.push(host);
            }
        }
    }

    /// Removes `host`. Returns `true` if it was present.
    pub fn remove(&self, host: &HostAddr) -> bool {
        let mut ring = self.ring.lock();
        let before = ring.hosts.len();
        ring.hosts.retain(|h| h != host);
        ring.hosts.len() != before
    }

    /// Returns the next host in round-robin order, or `None` if empty.
    #[must_use]
    pub fn choose(&self) -> Option<HostAddr> {
        let mut ring = self.ring.lock();
        if ring.hosts.is_empty() {
            return None;
        }
        let index = ring.cursor % ring.hosts.len();
        ring.cursor = index + 1;
        Some(ring.hosts[index].clone())
    }

    /// Returns the number of hosts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.lock().hosts.len()
    }

    /// Returns `true` if there are no hosts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.lock().hosts.is_empty()
    }

    /// Returns a snapshot of the hosts in selection order.
    #[must_use]
    pub fn hosts(&self) -> Vec<HostAddr> {
        self.ring.lock().hosts.clone()
    }
}
