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


//! Connections: one framed, bidirectional message stream per socket.
//!
//! [`Connection::spawn`] starts two tasks per socket:
//!
//! - a **write task** draining an unbounded queue of encoded frames into the
//!   write half, so [`Connection::send`] never blocks
//! - a **read task** buffering the read half, decoding every complete frame
//!   and handing it to a [`ConnectionHandler`]
//!
//! Frames are delivered one at a time from the read task, in arrival order.
//! When the read task stops (peer hang-up, I/O error, protocol violation or
//! local [`shutdown`](Connection::shutdown)) it calls
//! [`ConnectionHandler::on_closed`] exactly once, after the last delivered
//! message.

use crate::endpoint::EndpointConfig;
use crate::error::Result;
use crate::message::Message;
use crate::protocol::LengthValueCodec;
use crate::transport::{TcpTransport, TransportError};
use bytes::{Bytes, BytesMut};
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};

#[cfg(feature = "observability")]
use tracing::{debug, error, info};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[cfg(test)]
    pub(crate) const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Connection({})", self.0)
    }
}

/// Shared, non-owning handle to a connection.
///
/// Tables keyed by connection hold these; the socket itself is owned by the
/// connection's I/O tasks.
pub type ConnectionRef = Arc<Connection>;

/// Receives connection lifecycle events and inbound messages.
///
/// All methods are called from the connection's read task. They must not
/// block; awaiting a response from inside [`on_message`](Self::on_message)
/// is impossible by construction since the methods are synchronous.
pub trait ConnectionHandler: Send + Sync + 'static {
    /// Called once, before any message is delivered.
    fn on_connected(&self, _connection: &ConnectionRef) {}

    /// Called for every decoded message.
    fn on_message(&self, connection: &ConnectionRef, message: Message);

    /// Called once, after the last message has been delivered.
    fn on_closed(&self, _connection: &ConnectionRef) {}
}

/// A framed message stream over one socket.
///
/// # Examples
///
/// ```rust,no_run
/// use lvrpc::connection::{Connection, ConnectionHandler, ConnectionRef};
/// use lvrpc::endpoint::EndpointConfig;
/// use lvrpc::message::{Message, TopicRequest};
/// use lvrpc::transport::TcpTransport;
/// use std::sync::Arc;
///
/// struct Printer;
///
/// impl ConnectionHandler for Printer {
///     fn on_message(&self, _connection: &ConnectionRef, message: Message) {
///         println!("received {:?}", message);
///     }
/// }
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = EndpointConfig::default();
/// let transport = TcpTransport::connect("127.0.0.1:9000", &config).await?;
/// let connection = Connection::spawn_tcp(transport, &config, Arc::new(Printer));
///
/// connection.send(&Message::request(TopicRequest::create("news")))?;
/// connection.shutdown();
/// # Ok(())
/// # }
/// ```
pub struct Connection {
    id: ConnectionId,
    peer_addr: Option<SocketAddr>,
    codec: LengthValueCodec,
    outgoing: mpsc::UnboundedSender<Bytes>,
    connected: AtomicBool,
    closed: watch::Sender<bool>,
}

impl Connection {
    /// Starts the I/O tasks for a pair of stream halves.
    ///
    /// `handler.on_connected` runs before this returns.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn spawn<R, W>(
        read_half: R,
        write_half: W,
        peer_addr: Option<SocketAddr>,
        config: &EndpointConfig,
        handler: Arc<dyn ConnectionHandler>,
    ) -> ConnectionRef
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (closed_tx, closed_rx) = watch::channel(false);

        let connection = Arc::new(Connection {
            id: ConnectionId::next(),
            peer_addr,
            codec: LengthValueCodec::new(config.max_frame_size),
            outgoing: outgoing_tx,
            connected: AtomicBool::new(true),
            closed: closed_tx,
        });

        #[cfg(feature = "observability")]
        info!(connection_id = %connection.id, peer_addr = ?peer_addr, "Connection established");

        tokio::spawn(Self::write_task(
            connection.clone(),
            write_half,
            outgoing_rx,
            closed_rx.clone(),
        ));

        handler.on_connected(&connection);

        tokio::spawn(Self::read_task(
            connection.clone(),
            read_half,
            handler,
            closed_rx,
            config.read_buffer_size,
        ));

        connection
    }

    /// Starts the I/O tasks for a connected TCP socket.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn spawn_tcp(
        transport: TcpTransport,
        config: &EndpointConfig,
        handler: Arc<dyn ConnectionHandler>,
    ) -> ConnectionRef {
        let peer_addr = transport.peer_addr();
        let (read_half, write_half) = transport.into_split();
        Self::spawn(read_half, write_half, Some(peer_addr), config, handler)
    }

    /// Returns this connection's identifier.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the remote address, if known.
    #[must_use]
    pub const fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Returns `true` until the connection starts shutting down.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Encodes `message` and queues it for writing.
    ///
    /// Nothing is queued if encoding fails. There is no retry.
    ///
    /// # Errors
    ///
    /// - [`RpcError::Protocol`](crate::RpcError::Protocol) if the message
    ///   cannot be encoded
    /// - [`RpcError::Transport`](crate::RpcError::Transport) with
    ///   [`TransportError::Closed`] if the connection is shut down
    pub fn send(&self, message: &Message) -> Result<()> {
        if !self.is_connected() {
            return Err(TransportError::Closed.into());
        }

        let frame = self.codec.encode(message)?;

        #[cfg(feature = "observability")]
        debug!(
            connection_id = %self.id,
            request_id = %message.id(),
            message_type = %message.message_type(),
            frame_size = frame.len(),
            "Sending message"
        );

        self.outgoing
            .send(frame)
            .map_err(|_| TransportError::Closed)?;
        Ok(())
    }

    /// Starts closing the connection. Idempotent.
    ///
    /// Frames already queued are still written before the write half closes.
    pub fn shutdown(&self) {
        if self.connected.swap(false, Ordering::AcqRel) {
            #[cfg(feature = "observability")]
            info!(connection_id = %self.id, "Shutting down connection");

            self.closed.send_replace(true);
        }
    }

    /// Resolves once the connection has started shutting down.
    pub async fn closed(&self) {
        let mut closed = self.closed.subscribe();
        while !*closed.borrow_and_update() {
            if closed.changed().await.is_err() {
                break;
            }
        }
    }

    /// Write task: drains queued frames into the socket.
    async fn write_task<W>(
        connection: ConnectionRef,
        mut write_half: W,
        mut outgoing: mpsc::UnboundedReceiver<Bytes>,
        mut closed: watch::Receiver<bool>,
    ) where
        W: AsyncWrite + Unpin,
    {
        loop {
            tokio::select! {
                biased;
                frame = outgoing.recv() => {
                    let Some(frame) = frame else { break };
                    if let Err(_e) = write_half.write_all(&frame).await {
                        #[cfg(feature = "observability")]
                        error!(connection_id = %connection.id, error = %_e, "Failed to write frame");

                        connection.shutdown();
                        break;
                    }
                }
                _ = closed.changed() => {
                    while let Ok(frame) = outgoing.try_recv() {
                        if write_half.write_all(&frame).await.is_err() {
                            break;
                        }
                    }
                    break;
                }
            }
        }

        let _ = write_half.shutdown().await;

        #[cfg(feature = "observability")]
        debug!(connection_id = %connection.id, "Write task stopped");
    }

    /// Read task: decodes frames and delivers them to the handler.
    async fn read_task<R>(
        connection: ConnectionRef,
        mut read_half: R,
        handler: Arc<dyn ConnectionHandler>,
        mut closed: watch::Receiver<bool>,
        buffer_size: usize,
    ) where
        R: AsyncRead + Unpin,
    {
        let mut buffer = BytesMut::with_capacity(buffer_size);

        'read: loop {
            buffer.reserve(buffer_size);
            tokio::select! {
                _ = closed.changed() => break,
                read = read_half.read_buf(&mut buffer) => match read {
                    Ok(0) => {
                        #[cfg(feature = "observability")]
                        info!(connection_id = %connection.id, "Peer closed connection");
                        break;
                    }
                    Ok(_n) => {
                        #[cfg(feature = "observability")]
                        debug!(connection_id = %connection.id, bytes = _n, "Read from socket");
                    }
                    Err(_e) => {
                        #[cfg(feature = "observability")]
                        error!(connection_id = %connection.id, error = %_e, "Socket read failed");
                        break;
                    }
                },
            }

            loop {
                match connection.codec.decode_next(&mut buffer) {
                    Ok(Some(message)) => {
                        #[cfg(feature = "observability")]
                        debug!(
                            connection_id = %connection.id,
                            request_id = %message.id(),
                            message_type = %message.message_type(),
                            "Received message"
                        );

                        handler.on_message(&connection, message);
                        if !connection.is_connected() {
                            break 'read;
                        }
                    }
                    Ok(None) => break,
                    Err(_e) => {
                        #[cfg(feature = "observability")]
                        error!(
                            connection_id = %connection.id,
                            error = %_e,
                            "Protocol violation, closing connection"
                        );
                        break 'read;
                    }
                }
            }
        }

        connection.shutdown();
        handler.on_closed(&connection);

        #[cfg(feature = "observability")]
        info!(connection_id = %connection.id, "Connection closed");
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .field("connected", &self.is_connected())
            .finish()
    }
}
