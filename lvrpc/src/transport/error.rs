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


//! Transport layer error types.
//!
//! Raised while opening sockets or writing to a connection that is gone.
//! Failures on an established connection's read side are not surfaced as
//! errors; they close the connection and abandon its pending requests.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur in the transport layer.
///
/// # Examples
///
/// ```rust
/// use lvrpc::transport::TransportError;
/// use std::io;
///
/// let error = TransportError::ConnectionFailed {
///     address: "127.0.0.1:8080".to_string(),
///     source: io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
/// };
/// assert!(error.is_recoverable());
/// assert!(!TransportError::Closed.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum TransportError {
    /// The remote endpoint refused or could not be reached.
    #[error("failed to connect to {address}: {source}")]
    ConnectionFailed {
        /// The address being connected to
        address: String,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Connecting did not finish within the configured timeout.
    #[error("connecting to {address} timed out after {duration:?}")]
    ConnectTimeout {
        /// The address being connected to
        address: String,
        /// The timeout that elapsed
        duration: Duration,
    },

    /// The listen address could not be bound.
    #[error("failed to bind to {address}: {source}")]
    BindFailed {
        /// The address that failed to bind
        address: String,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Accepting an inbound connection failed.
    #[error("failed to accept connection: {source}")]
    AcceptFailed {
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// An [`EndpointConfig`](crate::endpoint::EndpointConfig) value is out of range.
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration {
        /// Which setting is wrong
        reason: String,
    },

    /// The connection has already been shut down.
    #[error("connection is closed")]
    Closed,

    /// Any other socket failure.
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl TransportError {
    /// Returns `true` if opening a new connection may succeed where this one
    /// failed.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            TransportError::ConnectionFailed { .. } | TransportError::ConnectTimeout { .. } => true,
            TransportError::AcceptFailed { source } | TransportError::Io { source } => matches!(
                source.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
            ),
            TransportError::BindFailed { .. }
            | TransportError::InvalidConfiguration { .. }
            | TransportError::Closed => false,
        }
    }

    /// Returns `true` if the connection this error came from is unusable.
    ///
    /// Errors raised before a connection exists return `false`.
    #[must_use]
    pub fn should_close_transport(&self) -> bool {
        matches!(self, TransportError::Closed | TransportError::Io { .. })
    }
}

impl From<io::Error> for TransportError {
    fn from(error: io::Error) -> Self {
        TransportError::Io { source: error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn io_error(kind: io::ErrorKind) -> io::Error {
        io::Error::new(kind, "test")
    }

    #[test]
    fn test_connect_failures_are_recoverable() {
        let refused = TransportError::ConnectionFailed {
            address: "127.0.0.1:8080".to_string(),
            source: io_error(io::ErrorKind::ConnectionRefused),
        };
        let timed_out = TransportError::ConnectTimeout {
            address: "127.0.0.1:8080".to_string(),
            duration: Duration::from_secs(1),
        };
        for error in [refused, timed_out] {
            assert!(error.is_recoverable());
            assert!(!error.should_close_transport());
        }
    }

    #[test]
    fn test_closed_is_final() {
        assert!(!TransportError::Closed.is_recoverable());
        assert!(TransportError::Closed.should_close_transport());
    }

    #[test]
    fn test_transient_accept_failure_is_recoverable() {
        let error = TransportError::AcceptFailed {
            source: io_error(io::ErrorKind::Interrupted),
        };
        assert!(error.is_recoverable());

        let error = TransportError::AcceptFailed {
            source: io_error(io::ErrorKind::PermissionDenied),
        };
        assert!(!error.is_recoverable());
    }

    #[test]
    fn test_io_error_conversion() {
        let error = TransportError::from(io_error(io::ErrorKind::BrokenPipe));
        assert!(matches!(error, TransportError::Io { .. }));
        assert!(error.should_close_transport());
        assert!(error.to_string().starts_with("I/O error"));
    }

    #[test]
    fn test_bind_failed_is_final() {
        let error = TransportError::BindFailed {
            address: "0.0.0.0:1".to_string(),
            source: io_error(io::ErrorKind::PermissionDenied),
        };
        assert!(!error.is_recoverable());
        assert!(!error.should_close_transport());
    }
}
