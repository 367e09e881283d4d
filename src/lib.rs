//! # PINGER concurrent ping sessions
//!
//! This crate runs any number of independent ICMP echo sessions side by side and reports what
//! happens to every probe through a listener interface. It consists of these components:
//! - The `Pinger`, which hands out session identifiers, spawns one thread per session and keeps a
//!   `SessionRegistry` of the sessions that can still be cancelled
//! - The `Session`, which resolves its host, opens a `Channel` on the `Transport` and runs the
//!   probe loop until it is cancelled
//! - The `PingListener` callbacks, which receive the lifecycle and probe events of every session
//!
//! The ICMP traffic itself and the name lookups are collaborators behind the `Transport` and
//! `Resolver` traits. By default the `Pinger` talks to the network through `pnet` and resolves
//! names through the system resolver, but both can be swapped out.
//!
//! ```no_run
//! use pinger::{LogListener, Pinger};
//!
//! let pinger = Pinger::new();
//! pinger.set_listener(LogListener);
//! let id = pinger.start("example.com");
//! std::thread::sleep(std::time::Duration::from_secs(5));
//! pinger.cancel(id);
//! ```

#[macro_use]
extern crate clap;
#[macro_use]
extern crate log;

use std::fmt;
use std::time::Duration;

pub mod cancel;
pub mod cli;
pub mod error;
pub mod icmp;
pub mod logger;
pub mod observer;
pub mod pinger;
pub mod registry;
pub mod resolver;
pub mod session;
pub mod summary;
pub mod transport;

#[cfg(test)]
mod testing;

pub use error::PingError;
pub use icmp::IcmpTransport;
pub use observer::{ChannelListener, Listeners, LogListener, PingEvent, PingInfo, PingListener};
pub use pinger::{Pinger, Stopper};
pub use resolver::{Resolver, SystemResolver};
pub use transport::{Channel, ProbeOutcome, Transport, SEND_ERROR, SEND_TIMEOUT};

/// Time to wait for an echo reply, unless configured otherwise
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Pause between two probes, unless configured otherwise
pub const DEFAULT_SLEEP: Duration = Duration::from_millis(1000);

/// Time to live for outgoing echo requests, unless configured otherwise
pub const DEFAULT_TTL: u8 = 48;

/// Payload size of an echo request in bytes, unless configured otherwise
pub const DEFAULT_SIZE: usize = 32;

/// Identifier of a ping session
///
/// Identifiers are handed out by the `Pinger` in increasing order, starting at 1. They are never
/// reused during the lifetime of the `Pinger` that created them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PingId(u64);

impl From<u64> for PingId {
    fn from(value: u64) -> Self {
        PingId(value)
    }
}

impl From<PingId> for u64 {
    fn from(id: PingId) -> u64 {
        id.0
    }
}

impl fmt::Display for PingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Session configuration
///
/// A `PingConfig` is consumed by the session it starts and never changes afterwards. Use
/// `PingConfig::new` to get the defaults and the `with_*` methods to adjust them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingConfig {
    pub(crate) host: String,
    pub(crate) timeout: Duration,
    pub(crate) sleep: Duration,
    pub(crate) ttl: u8,
    pub(crate) size: usize,
    pub(crate) pattern: Vec<u8>,
}

impl PingConfig {
    /// Configuration for pinging `host` with default settings
    ///
    /// The host may either be a host name or an IPv4 address in dotted notation.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            timeout: DEFAULT_TIMEOUT,
            sleep: DEFAULT_SLEEP,
            ttl: DEFAULT_TTL,
            size: DEFAULT_SIZE,
            pattern: Vec::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_sleep(mut self, sleep: Duration) -> Self {
        self.sleep = sleep;
        self
    }

    pub fn with_ttl(mut self, ttl: u8) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    /// Fill the payload by repeating `pattern`
    ///
    /// An empty pattern leaves the payload zeroed.
    pub fn with_pattern(mut self, pattern: impl Into<Vec<u8>>) -> Self {
        self.pattern = pattern.into();
        self
    }

    pub fn get_host(&self) -> &str {
        &self.host
    }

    pub fn get_timeout(&self) -> Duration {
        self.timeout
    }

    pub fn get_sleep(&self) -> Duration {
        self.sleep
    }

    pub fn get_ttl(&self) -> u8 {
        self.ttl
    }

    pub fn get_size(&self) -> usize {
        self.size
    }

    pub fn get_pattern(&self) -> &[u8] {
        &self.pattern
    }

    /// Check that the configuration can be used to start a session
    ///
    /// # Errors
    ///
    /// Returns `PingError::InvalidConfig` if the host is empty, the timeout is zero or the time to
    /// live is zero.
    pub fn validate(&self) -> Result<(), PingError> {
        if self.host.trim().is_empty() {
            return Err(PingError::InvalidConfig("host must not be empty".to_string()));
        }
        if self.timeout == Duration::from_millis(0) {
            return Err(PingError::InvalidConfig("timeout must be positive".to_string()));
        }
        if self.ttl == 0 {
            return Err(PingError::InvalidConfig("ttl must be between 1 and 255".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = PingConfig::new("127.0.0.1");
        assert_eq!(config.get_host(), "127.0.0.1");
        assert_eq!(config.get_timeout(), Duration::from_millis(1000));
        assert_eq!(config.get_sleep(), Duration::from_millis(1000));
        assert_eq!(config.get_ttl(), 48);
        assert_eq!(config.get_size(), 32);
        assert!(config.get_pattern().is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn custom_config() {
        let config = PingConfig::new("example.com")
            .with_timeout(Duration::from_millis(500))
            .with_sleep(Duration::from_millis(100))
            .with_ttl(64)
            .with_size(16)
            .with_pattern(vec![0xde, 0xad]);

        assert_eq!(config.get_timeout(), Duration::from_millis(500));
        assert_eq!(config.get_sleep(), Duration::from_millis(100));
        assert_eq!(config.get_ttl(), 64);
        assert_eq!(config.get_size(), 16);
        assert_eq!(config.get_pattern(), &[0xde, 0xad]);
    }

    #[test]
    fn reject_invalid_config() {
        let zero_ttl = PingConfig::new("127.0.0.1").with_ttl(0);
        assert!(matches!(zero_ttl.validate(), Err(PingError::InvalidConfig(_))));

        let zero_timeout = PingConfig::new("127.0.0.1").with_timeout(Duration::from_millis(0));
        assert!(matches!(zero_timeout.validate(), Err(PingError::InvalidConfig(_))));

        let no_host = PingConfig::new("  ");
        assert!(matches!(no_host.validate(), Err(PingError::InvalidConfig(_))));

        // A zero sized payload is a valid echo request
        assert!(PingConfig::new("127.0.0.1").with_size(0).validate().is_ok());
    }

    #[test]
    fn ping_id_conversions() {
        let id = PingId::from(7);
        assert_eq!(u64::from(id), 7);
        assert_eq!(id.to_string(), "7");
        assert!(PingId::from(1) < PingId::from(2));
    }
}
