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


//! TCP sockets for connections.
//!
//! [`TcpTransport`] is one connected socket, [`TcpAcceptor`] a bound
//! listener producing them. Socket options from [`EndpointConfig`] are
//! applied as sockets are created, so
//! [`Connection::spawn_tcp`](crate::connection::Connection::spawn_tcp) only
//! has to split the stream.

use crate::endpoint::EndpointConfig;
use crate::transport::TransportError;
use std::net::SocketAddr;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

#[cfg(feature = "observability")]
use tracing::{debug, info, warn};

/// A connected TCP socket.
///
/// # Examples
///
/// ```rust,no_run
/// use lvrpc::endpoint::EndpointConfig;
/// use lvrpc::transport::{TcpAcceptor, TcpTransport};
///
/// # async fn example() -> Result<(), lvrpc::transport::TransportError> {
/// let config = EndpointConfig::default();
/// let acceptor = TcpAcceptor::bind("127.0.0.1:0", &config).await?;
///
/// let client = TcpTransport::connect(&acceptor.local_addr().to_string(), &config).await?;
/// let server = acceptor.accept().await?;
/// assert_eq!(server.peer_addr(), client.local_addr());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TcpTransport {
    stream: TcpStream,
    local_addr: SocketAddr,
    peer_addr: SocketAddr,
}

impl TcpTransport {
    fn configure(stream: TcpStream, nodelay: bool) -> Result<Self, TransportError> {
        if let Err(_e) = stream.set_nodelay(nodelay) {
            #[cfg(feature = "observability")]
            warn!(error = %_e, "Failed to set TCP_NODELAY");
        }
        Ok(Self {
            local_addr: stream.local_addr()?,
            peer_addr: stream.peer_addr()?,
            stream,
        })
    }

    /// Connects to `addr`, giving up after `config.connect_timeout`.
    ///
    /// # Errors
    ///
    /// - [`TransportError::ConnectTimeout`] if the timeout elapses
    /// - [`TransportError::ConnectionFailed`] if the peer refuses or is unreachable
    pub async fn connect(addr: &str, config: &EndpointConfig) -> Result<Self, TransportError> {
        #[cfg(feature = "observability")]
        debug!(address = %addr, "Connecting");

        let stream = tokio::time::timeout(config.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| TransportError::ConnectTimeout {
                address: addr.to_string(),
                duration: config.connect_timeout,
            })?
            .map_err(|source| TransportError::ConnectionFailed {
                address: addr.to_string(),
                source,
            })?;
        let transport = Self::configure(stream, config.tcp_nodelay)?;

        #[cfg(feature = "observability")]
        info!(
            local_addr = %transport.local_addr,
            peer_addr = %transport.peer_addr,
            "Connected"
        );

        Ok(transport)
    }

    /// Returns the local address of the socket.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the remote address of the socket.
    #[must_use]
    pub const fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Splits the socket into independently owned read and write halves.
    #[must_use]
    pub fn into_split(self) -> (OwnedReadHalf, OwnedWriteHalf) {
        self.stream.into_split()
    }
}

/// A bound TCP listener.
#[derive(Debug)]
pub struct TcpAcceptor {
    listener: TcpListener,
    local_addr: SocketAddr,
    nodelay: bool,
}

impl TcpAcceptor {
    /// Binds to `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::BindFailed`] if the address cannot be bound.
    pub async fn bind(addr: &str, config: &EndpointConfig) -> Result<Self, TransportError> {
        let bind_failed = |source| TransportError::BindFailed {
            address: addr.to_string(),
            source,
        };
        let listener = TcpListener::bind(addr).await.map_err(bind_failed)?;
        let local_addr = listener.local_addr().map_err(bind_failed)?;

        #[cfg(feature = "observability")]
        info!(%local_addr, "Listening");

        Ok(Self {
            listener,
            local_addr,
            nodelay: config.tcp_nodelay,
        })
    }

    /// Returns the bound address.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Waits for the next inbound connection.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::AcceptFailed`] if accepting fails.
    pub async fn accept(&self) -> Result<TcpTransport, TransportError> {
        let (stream, _peer_addr) = self
            .listener
            .accept()
            .await
            .map_err(|source| TransportError::AcceptFailed { source })?;

        #[cfg(feature = "observability")]
        debug!(local_addr = %self.local_addr, peer_addr = %_peer_addr, "Accepted");

        TcpTransport::configure(stream, self.nodelay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_connect_accept_and_exchange_bytes() {
        let config = EndpointConfig::default();
        let acceptor = TcpAcceptor::bind("127.0.0.1:0", &config).await.unwrap();
        let addr = acceptor.local_addr();

        let server = tokio::spawn(async move {
            let transport = acceptor.accept().await.unwrap();
            let (mut read, mut write) = transport.into_split();
            let mut buffer = [0u8; 16];
            let n = read.read(&mut buffer).await.unwrap();
            write.write_all(&buffer[..n]).await.unwrap();
            n
        });

        let client = TcpTransport::connect(&addr.to_string(), &config).await.unwrap();
        assert_eq!(client.peer_addr(), addr);
        let (mut read, mut write) = client.into_split();
        write.write_all(b"frame").await.unwrap();

        let mut buffer = [0u8; 16];
        let n = read.read(&mut buffer).await.unwrap();
        assert_eq!(&buffer[..n], b"frame");
        assert_eq!(server.await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let config = EndpointConfig::default();
        let acceptor = TcpAcceptor::bind("127.0.0.1:0", &config).await.unwrap();
        let addr = acceptor.local_addr();
        drop(acceptor);

        let result = TcpTransport::connect(&addr.to_string(), &config).await;
        assert!(matches!(result, Err(TransportError::ConnectionFailed { .. })));
    }

    #[tokio::test]
    async fn test_connect_times_out() {
        // Reserved TEST-NET-1 address; connects hang until the timeout.
        let config = EndpointConfig::default().with_connect_timeout(Duration::from_millis(50));
        let result = TcpTransport::connect("192.0.2.1:9", &config).await;
        assert!(matches!(
            result,
            Err(TransportError::ConnectTimeout { .. } | TransportError::ConnectionFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_bind_invalid_address() {
        let result = TcpAcceptor::bind("not an address", &EndpointConfig::default()).await;
        assert!(matches!(result, Err(TransportError::BindFailed { .. })));
    }
}
