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


//! Topic operation bodies.

use super::{Optype, RCode, TopicOptype};
use serde::{Deserialize, Serialize};

/// Body of a [`MessageType::ReqTopic`](super::MessageType::ReqTopic) message.
///
/// The server forwards publish requests verbatim to subscribers, so the same
/// body is also what a subscriber receives.
///
/// # Examples
///
/// ```rust
/// use lvrpc::message::{TopicOptype, TopicRequest};
///
/// let request = TopicRequest::publish("news", "hello");
/// assert_eq!(request.optype, TopicOptype::Publish);
/// assert!(request.validate());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicRequest {
    /// Topic name.
    pub topic_key: String,
    /// Operation to perform.
    pub optype: Optype<TopicOptype>,
    /// Published content, present only for [`TopicOptype::Publish`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_msg: Option<String>,
}

impl TopicRequest {
    fn with_op(topic_key: impl Into<String>, optype: TopicOptype) -> Self {
        Self {
            topic_key: topic_key.into(),
            optype: optype.into(),
            topic_msg: None,
        }
    }

    /// Builds a create request.
    pub fn create(topic_key: impl Into<String>) -> Self {
        Self::with_op(topic_key, TopicOptype::Create)
    }

    /// Builds a remove request.
    pub fn remove(topic_key: impl Into<String>) -> Self {
        Self::with_op(topic_key, TopicOptype::Remove)
    }

    /// Builds a subscribe request.
    pub fn subscribe(topic_key: impl Into<String>) -> Self {
        Self::with_op(topic_key, TopicOptype::Subscribe)
    }

    /// Builds an unsubscribe request.
    pub fn cancel(topic_key: impl Into<String>) -> Self {
        Self::with_op(topic_key, TopicOptype::Cancel)
    }

    /// Builds a publish request carrying `content`.
    pub fn publish(topic_key: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            topic_msg: Some(content.into()),
            ..Self::with_op(topic_key, TopicOptype::Publish)
        }
    }

    /// Returns `false` for a publish without content.
    #[must_use]
    pub fn validate(&self) -> bool {
        self.optype != TopicOptype::Publish || self.topic_msg.is_some()
    }
}

/// Body of a [`MessageType::RespTopic`](super::MessageType::RespTopic) message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicResponse {
    /// Outcome of the operation.
    pub rcode: RCode,
}

impl TopicResponse {
    /// Creates a response with the given code.
    pub const fn new(rcode: RCode) -> Self {
        Self { rcode }
    }

    /// Always `true`: the rcode is typed.
    #[must_use]
    pub fn validate(&self) -> bool {
        true
    }
}
