// Copyright 2024-2026 Farlight Networks, LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Controller configuration.

use flowctl_transport::{ReconnectPolicy, SocketConfig, DEFAULT_READ_BUFFER_SIZE};
use flowctl_wire::Version;
use serde::Deserialize;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

/// Well-known control channel port.
pub const DEFAULT_PORT: u16 = 6653;

/// Default part limit for one multipart reply.
pub const DEFAULT_MAX_MULTIPART_PARTS: usize = 1024;

/// Configuration for a session manager and the connections it drives.
///
/// Deserializes with every field optional, so a file only needs the
/// values it changes. Durations use serde's `{ secs, nanos }` form.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Protocol versions this controller speaks.
    ///
    /// The hello carries the highest one; a bitmap is added when 1.3 is
    /// present.
    pub versions: Vec<Version>,

    /// Address the TCP listener binds.
    pub listen_addr: SocketAddr,

    /// Timeout for application requests.
    ///
    /// A request whose reply has not arrived within this duration is
    /// reported as a [`SessionEvent::RequestTimeout`](crate::SessionEvent).
    pub request_timeout: Duration,

    /// Timeout for each handshake request (features, config, discovery).
    ///
    /// Expiry drops the connection.
    pub handshake_timeout: Duration,

    /// Time allowed for the peer's hello after the link comes up.
    pub hello_timeout: Duration,

    /// Interval between keep-alive echo requests on established
    /// connections. Disabled when `None`.
    pub echo_interval: Option<Duration>,

    /// Outbound buffers allowed to wait per socket before sends are
    /// dropped.
    pub queue_capacity: usize,

    /// Redial actively connected datapaths after a failure.
    pub reconnect: bool,

    /// First reconnect delay; doubled per attempt up to 16 times this.
    pub reconnect_interval: Duration,

    /// Capacity of the session event channel.
    pub event_capacity: usize,

    /// Size of each socket read.
    pub read_buffer_size: usize,

    /// Parts a single multipart reply may span before it is rejected.
    pub max_multipart_parts: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            versions: Version::ALL.to_vec(),
            listen_addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            request_timeout: Duration::from_secs(5),
            handshake_timeout: Duration::from_secs(5),
            hello_timeout: Duration::from_secs(5),
            echo_interval: None,
            queue_capacity: flowctl_transport::DEFAULT_QUEUE_CAPACITY,
            reconnect: true,
            reconnect_interval: Duration::from_secs(1),
            event_capacity: 256,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            max_multipart_parts: DEFAULT_MAX_MULTIPART_PARTS,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the supported protocol versions.
    #[must_use]
    pub fn with_versions(mut self, versions: &[Version]) -> Self {
        self.versions = versions.to_vec();
        self
    }

    /// Sets the listen address.
    #[must_use]
    pub const fn with_listen_addr(mut self, addr: SocketAddr) -> Self {
        self.listen_addr = addr;
        self
    }

    /// Sets the application request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the per-step handshake timeout.
    #[must_use]
    pub const fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Sets the hello timeout.
    #[must_use]
    pub const fn with_hello_timeout(mut self, timeout: Duration) -> Self {
        self.hello_timeout = timeout;
        self
    }

    /// Enables keep-alive echoes at `interval`.
    #[must_use]
    pub const fn with_echo_interval(mut self, interval: Duration) -> Self {
        self.echo_interval = Some(interval);
        self
    }

    /// Sets the outbound queue capacity.
    #[must_use]
    pub const fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Enables or disables reconnecting.
    #[must_use]
    pub const fn with_reconnect(mut self, enabled: bool) -> Self {
        self.reconnect = enabled;
        self
    }

    /// Sets the base reconnect interval.
    #[must_use]
    pub const fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// Sets the session event channel capacity.
    #[must_use]
    pub const fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Sets the part limit for multipart replies.
    #[must_use]
    pub const fn with_max_multipart_parts(mut self, parts: usize) -> Self {
        self.max_multipart_parts = parts;
        self
    }

    /// Returns the highest configured version.
    #[must_use]
    pub fn highest_version(&self) -> Option<Version> {
        self.versions.iter().copied().max()
    }

    /// Socket settings for a connection. Reconnect only applies to
    /// sockets that dial.
    #[must_use]
    pub fn socket_config(&self, dialing: bool) -> SocketConfig {
        let reconnect = if dialing && self.reconnect {
            ReconnectPolicy::enabled(self.reconnect_interval)
        } else {
            ReconnectPolicy::disabled()
        };
        SocketConfig::new()
            .with_queue_capacity(self.queue_capacity)
            .with_reconnect(reconnect)
            .with_read_buffer_size(self.read_buffer_size)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.versions.is_empty() {
            return Err(ConfigError::NoSupportedVersions);
        }

        for (name, value) in [
            ("request_timeout", self.request_timeout),
            ("handshake_timeout", self.handshake_timeout),
            ("hello_timeout", self.hello_timeout),
            ("reconnect_interval", self.reconnect_interval),
        ] {
            if value.is_zero() {
                return Err(ConfigError::InvalidTimeout(name));
            }
        }
        if self.echo_interval.is_some_and(|d| d.is_zero()) {
            return Err(ConfigError::InvalidTimeout("echo_interval"));
        }

        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidLimit("queue_capacity must be > 0"));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::InvalidLimit("event_capacity must be > 0"));
        }
        if self.read_buffer_size == 0 {
            return Err(ConfigError::InvalidLimit("read_buffer_size must be > 0"));
        }
        if self.max_multipart_parts == 0 {
            return Err(ConfigError::InvalidLimit("max_multipart_parts must be > 0"));
        }

        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No supported protocol versions specified.
    #[error("at least one protocol version must be supported")]
    NoSupportedVersions,

    /// A timeout or interval is zero.
    #[error("{0} must be non-zero")]
    InvalidTimeout(&'static str),

    /// Invalid limit value.
    #[error("invalid limit: {0}")]
    InvalidLimit(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.highest_version(), Some(Version::V1_3));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.queue_capacity, 16);
        assert_eq!(config.listen_addr.port(), DEFAULT_PORT);
    }

    #[test]
    fn config_builder() {
        let config = Config::new()
            .with_versions(&[Version::V1_0])
            .with_request_timeout(Duration::from_secs(2))
            .with_echo_interval(Duration::from_secs(15))
            .with_reconnect(false);

        assert_eq!(config.versions, vec![Version::V1_0]);
        assert_eq!(config.request_timeout, Duration::from_secs(2));
        assert_eq!(config.echo_interval, Some(Duration::from_secs(15)));
        assert!(!config.reconnect);
    }

    #[test]
    fn socket_config_only_reconnects_when_dialing() {
        let config = Config::new().with_reconnect_interval(Duration::from_millis(250));
        let dialing = config.socket_config(true);
        assert!(dialing.reconnect.enabled);
        assert_eq!(dialing.reconnect.base_interval, Duration::from_millis(250));
        assert!(!config.socket_config(false).reconnect.enabled);
        assert!(!config.with_reconnect(false).socket_config(true).reconnect.enabled);
    }

    #[test]
    fn empty_versions_is_invalid() {
        let config = Config::new().with_versions(&[]);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NoSupportedVersions)
        ));
    }

    #[test]
    fn zero_values_are_invalid() {
        let config = Config::new().with_queue_capacity(0);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidLimit(_))));

        let config = Config::new().with_handshake_timeout(Duration::ZERO);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTimeout("handshake_timeout"))
        ));

        let config = Config::new().with_echo_interval(Duration::ZERO);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTimeout("echo_interval"))
        ));

        let config = Config::new().with_max_multipart_parts(0);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidLimit(_))));
    }

    #[test]
    fn loads_from_toml() {
        let config: Config = toml::from_str(
            r#"
            versions = ["1.0", "1.3"]
            listen_addr = "127.0.0.1:6633"
            queue_capacity = 64
            reconnect = false
            request_timeout = { secs = 2, nanos = 0 }
            echo_interval = { secs = 10, nanos = 0 }
            "#,
        )
        .expect("config should parse");

        assert_eq!(config.versions, vec![Version::V1_0, Version::V1_3]);
        assert_eq!(config.listen_addr, "127.0.0.1:6633".parse().expect("addr"));
        assert_eq!(config.queue_capacity, 64);
        assert!(!config.reconnect);
        assert_eq!(config.request_timeout, Duration::from_secs(2));
        assert_eq!(config.echo_interval, Some(Duration::from_secs(10)));
        assert_eq!(config.hello_timeout, Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }
}
