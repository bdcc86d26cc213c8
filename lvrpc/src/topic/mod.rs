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


//! Topic-based publish/subscribe.
//!
//! [`server::TopicManager`] owns topic membership and fans publishes out;
//! [`client::TopicManager`] issues topic operations and runs subscription
//! callbacks for publishes the server pushes.

pub mod client;
pub mod server;

pub use self::client::PublishCallback;
