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


//! Configuration types for endpoints.

use crate::protocol::{DEFAULT_MAX_FRAME_SIZE, FRAME_HEADER_SIZE};
use crate::transport::TransportError;
use std::time::Duration;

/// Configuration shared by servers and clients.
///
/// # Examples
///
/// ```rust
/// use lvrpc::endpoint::EndpointConfig;
/// use std::time::Duration;
///
/// // Use default configuration
/// let config = EndpointConfig::default();
/// assert_eq!(config.max_frame_size, 65536);
///
/// // Customize configuration
/// let config = EndpointConfig::default()
///     .with_request_timeout(Some(Duration::from_secs(5)))
///     .with_request_ttl(Some(Duration::from_secs(60)));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Maximum frame size in bytes, length prefix included.
    ///
    /// Frames larger than this are rejected and the connection is closed.
    ///
    /// Default: 65536
    pub max_frame_size: usize,

    /// Timeout applied to awaited requests.
    ///
    /// `None` waits indefinitely.
    ///
    /// Default: 30 seconds
    pub request_timeout: Option<Duration>,

    /// Age after which a pending request is abandoned by the reaper.
    ///
    /// Covers callback-mode requests, which no caller awaits. `None`
    /// disables the reaper.
    ///
    /// Default: None
    pub request_ttl: Option<Duration>,

    /// How often the reaper scans for expired requests.
    ///
    /// Default: 1 second
    pub reap_interval: Duration,

    /// Timeout for establishing outbound connections.
    ///
    /// Default: 10 seconds
    pub connect_timeout: Duration,

    /// Initial capacity of each connection's read buffer.
    ///
    /// Default: 4096
    pub read_buffer_size: usize,

    /// Whether to set `TCP_NODELAY` on every socket.
    ///
    /// Default: true
    pub tcp_nodelay: bool,
}

impl EndpointConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum frame size.
    #[must_use]
    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the pending request TTL.
    #[must_use]
    pub fn with_request_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.request_ttl = ttl;
        self
    }

    /// Sets the reaper interval.
    #[must_use]
    pub fn with_reap_interval(mut self, interval: Duration) -> Self {
        self.reap_interval = interval;
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the read buffer size.
    #[must_use]
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Enables or disables `TCP_NODELAY`.
    #[must_use]
    pub fn with_tcp_nodelay(mut self, nodelay: bool) -> Self {
        self.tcp_nodelay = nodelay;
        self
    }

    /// Checks the configuration for values no endpoint can run with.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidConfiguration`] describing the first
    /// offending field.
    pub fn validate(&self) -> Result<(), TransportError> {
        if self.max_frame_size <= FRAME_HEADER_SIZE {
            return Err(TransportError::InvalidConfiguration {
                reason: format!(
                    "max_frame_size {} must exceed the {}-byte frame header",
                    self.max_frame_size, FRAME_HEADER_SIZE
                ),
            });
        }
        if self.max_frame_size > u32::MAX as usize {
            return Err(TransportError::InvalidConfiguration {
                reason: format!("max_frame_size {} exceeds u32 range", self.max_frame_size),
            });
        }
        if self.read_buffer_size == 0 {
            return Err(TransportError::InvalidConfiguration {
                reason: "read_buffer_size must be non-zero".to_string(),
            });
        }
        if self.reap_interval.is_zero() {
            return Err(TransportError::InvalidConfiguration {
                reason: "reap_interval must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            request_timeout: Some(Duration::from_secs(30)),
            request_ttl: None,
            reap_interval: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(10),
            read_buffer_size: 4096,
            tcp_nodelay: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EndpointConfig::default();
        assert_eq!(config.max_frame_size, 65536);
        assert_eq!(config.request_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.request_ttl, None);
        assert!(config.tcp_nodelay);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_methods() {
        let config = EndpointConfig::new()
            .with_max_frame_size(1024)
            .with_request_timeout(None)
            .with_request_ttl(Some(Duration::from_secs(2)))
            .with_reap_interval(Duration::from_millis(100))
            .with_connect_timeout(Duration::from_secs(1))
            .with_read_buffer_size(512)
            .with_tcp_nodelay(false);

        assert_eq!(config.max_frame_size, 1024);
        assert_eq!(config.request_timeout, None);
        assert_eq!(config.request_ttl, Some(Duration::from_secs(2)));
        assert_eq!(config.reap_interval, Duration::from_millis(100));
        assert_eq!(config.connect_timeout, Duration::from_secs(1));
        assert_eq!(config.read_buffer_size, 512);
        assert!(!config.tcp_nodelay);
    }

    #[test]
    fn test_validate_rejects_tiny_frames() {
        let config = EndpointConfig::default().with_max_frame_size(12);
        assert!(matches!(
            config.validate(),
            Err(TransportError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_buffer() {
        let config = EndpointConfig::default().with_read_buffer_size(0);
        assert!(config.validate().is_err());
    }
}
