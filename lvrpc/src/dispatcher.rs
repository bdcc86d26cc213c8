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


//! Routing of inbound messages by [`MessageType`].
//!
//! A [`Dispatcher`] is the [`ConnectionHandler`] installed on every
//! connection. It holds at most one handler per message type; the first
//! registration wins. A message whose type has no handler is a protocol
//! violation and shuts the connection down.

use crate::connection::{ConnectionHandler, ConnectionRef};
use crate::message::{Message, MessageKind, MessageType};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "observability")]
use tracing::{debug, error, warn};

type MessageHandler = Arc<dyn Fn(&ConnectionRef, Message) + Send + Sync>;
type CloseHook = Arc<dyn Fn(&ConnectionRef) + Send + Sync>;

/// Message-type to handler table.
///
/// Handlers run on the connection's read task, outside the table lock, so a
/// handler may itself register handlers or dispatch.
///
/// # Examples
///
/// ```rust
/// use lvrpc::dispatcher::Dispatcher;
/// use lvrpc::message::{MessageType, TopicRequest};
///
/// let dispatcher = Dispatcher::new();
/// assert!(dispatcher.register_typed::<TopicRequest, _>(|_connection, id, request| {
///     println!("{id}: {:?} {}", request.optype, request.topic_key);
/// }));
///
/// // A second handler for the same type is refused.
/// assert!(!dispatcher.register(MessageType::ReqTopic, |_connection, _message| {}));
/// ```
#[derive(Default)]
pub struct Dispatcher {
    handlers: Mutex<HashMap<MessageType, MessageHandler>>,
    close_hooks: Mutex<Vec<CloseHook>>,
}

impl Dispatcher {
    /// Creates an empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `message_type`.
    ///
    /// Returns `false`, leaving the existing handler in place, if the type
    /// already has one.
    pub fn register<F>(&self, message_type: MessageType, handler: F) -> bool
    where
        F: Fn(&ConnectionRef, Message) + Send + Sync + 'static,
    {
        let mut handlers = self.handlers.lock();
        if handlers.contains_key(&message_type) {
            #[cfg(feature = "observability")]
            warn!(message_type = %message_type, "Handler already registered, ignoring");
            return false;
        }
        handlers.insert(message_type, Arc::new(handler));

        #[cfg(feature = "observability")]
        debug!(message_type = %message_type, "Registered handler");

        true
    }

    /// Registers a handler receiving the request id and the typed body `T`.
    ///
    /// Returns `false` if `T`'s message type already has a handler.
    pub fn register_typed<T, F>(&self, handler: F) -> bool
    where
        T: MessageKind,
        F: Fn(&ConnectionRef, &str, T) + Send + Sync + 'static,
    {
        self.register(T::MESSAGE_TYPE, move |connection, message| {
            let (id, body) = message.into_parts();
            match T::from_body(body) {
                Ok(body) => handler(connection, &id, body),
                Err(_other) => {
                    // The table is keyed by `T::MESSAGE_TYPE`, so only a `T` can arrive here.
                    #[cfg(feature = "observability")]
                    error!(
                        expected = %T::MESSAGE_TYPE,
                        actual = %_other.message_type(),
                        "Dispatched message does not match handler kind"
                    );
                    debug_assert_eq!(_other.message_type(), T::MESSAGE_TYPE);
                }
            }
        })
    }

    /// Removes the handler for `message_type`, returning whether one existed.
    pub fn unregister(&self, message_type: MessageType) -> bool {
        self.handlers.lock().remove(&message_type).is_some()
    }

    /// Returns `true` if `message_type` has a handler.
    #[must_use]
    pub fn has_handler(&self, message_type: MessageType) -> bool {
        self.handlers.lock().contains_key(&message_type)
    }

    /// Adds a hook run once for every connection that closes.
    ///
    /// Hooks run in registration order on the closing connection's read task,
    /// after its last message was dispatched.
    pub fn on_close<F>(&self, hook: F)
    where
        F: Fn(&ConnectionRef) + Send + Sync + 'static,
    {
        self.close_hooks.lock().push(Arc::new(hook));
    }

    /// Routes `message` to the handler registered for its type.
    ///
    /// Shuts `connection` down if no handler exists.
    pub fn dispatch(&self, connection: &ConnectionRef, message: Message) {
        let message_type = message.message_type();
        let handler = self.handlers.lock().get(&message_type).cloned();

        match handler {
            Some(handler) => handler(connection, message),
            None => {
                #[cfg(feature = "observability")]
                warn!(
                    connection_id = %connection.id(),
                    message_type = %message_type,
                    "No handler for message type, shutting down connection"
                );
                connection.shutdown();
            }
        }
    }
}

impl ConnectionHandler for Dispatcher {
    fn on_message(&self, connection: &ConnectionRef, message: Message) {
        self.dispatch(connection, message);
    }

    fn on_closed(&self, connection: &ConnectionRef) {
        let hooks = self.close_hooks.lock().clone();
        for hook in hooks {
            hook(connection);
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.handlers.lock().keys().copied().collect();
        types.sort();
        f.debug_struct("Dispatcher")
            .field("handlers", &types)
            .field("close_hooks", &self.close_hooks.lock().len())
            .finish()
    }
}
