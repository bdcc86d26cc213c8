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


//! Service registry: provider registration, discovery and online/offline
//! notification.
//!
//! - [`ProviderDiscovererManager`] is the registry itself
//! - [`Provider`] announces methods to a registry
//! - [`Discoverer`] looks providers up and keeps a [`HostManager`] per method

mod discoverer;
mod host;
mod provider;
mod server;

pub use self::discoverer::{Discoverer, OfflineCallback};
pub use self::host::HostManager;
pub use self::provider::Provider;
pub use self::server::{DiscovererManager, ProviderDiscovererManager, ProviderManager, ProviderRecord};
