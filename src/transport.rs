use std::net::Ipv4Addr;
use std::time::Duration;

use crate::cancel::CancelToken;
use crate::PingError;

/// Failure code for an echo request that could not be sent
pub const SEND_ERROR: i32 = -1;

/// Failure code for an echo request that was not answered in time
pub const SEND_TIMEOUT: i32 = -2;

/// Result of a single probe
///
/// Every probe produces exactly one outcome. Outcomes can be converted to and from the integer
/// failure codes used by native ICMP helpers: a non-negative code is the round-trip time in
/// milliseconds, `SEND_ERROR` and `SEND_TIMEOUT` are the two failures.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Echo reply received after the given round-trip time
    Success(Duration),
    SendError,
    Timeout,
}

impl ProbeOutcome {
    /// Integer code of this outcome
    ///
    /// Round-trip times that do not fit into an `i32` saturate.
    pub fn code(&self) -> i32 {
        match self {
            Self::Success(rtt) => {
                let millis = rtt.as_millis();
                if millis > i32::max_value() as u128 {
                    i32::max_value()
                } else {
                    millis as i32
                }
            }
            Self::SendError => SEND_ERROR,
            Self::Timeout => SEND_TIMEOUT,
        }
    }
}

impl From<i32> for ProbeOutcome {
    /// Classify an integer code
    ///
    /// Negative codes other than `SEND_TIMEOUT` count as send errors.
    fn from(code: i32) -> Self {
        match code {
            SEND_TIMEOUT => Self::Timeout,
            code if code >= 0 => Self::Success(Duration::from_millis(code as u64)),
            _ => Self::SendError,
        }
    }
}

/// Factory for host-bound ICMP channels
///
/// The transport is shared between all sessions of a `Pinger`, each session opens its own
/// channel.
pub trait Transport: Send + Sync + 'static {
    type Channel: Channel;

    /// Open a channel to `addr`
    ///
    /// Echo requests sent through the channel carry the given time to live, and the channel waits
    /// at most `timeout` for each reply.
    ///
    /// # Errors
    ///
    /// Returns `PingError::Socket` if the channel cannot be opened. The session treats this as a
    /// fatal error.
    fn open(&self, addr: Ipv4Addr, timeout: Duration, ttl: u8) -> Result<Self::Channel, PingError>;
}

/// An open ICMP channel to a single host
pub trait Channel: Send {
    /// Send one echo request and wait for the matching reply
    ///
    /// The payload is `size` bytes long and filled by repeating `pattern`.
    ///
    /// # Errors
    ///
    /// Returns `PingError::Interrupted` if `cancel` fired while waiting. Any other error is a
    /// fault of this probe only and the session carries on with the next one.
    fn send(
        &mut self,
        sequence: u16,
        size: usize,
        pattern: &[u8],
        cancel: &CancelToken,
    ) -> Result<ProbeOutcome, PingError>;

    /// Release the channel
    fn close(self)
    where
        Self: Sized;
}
