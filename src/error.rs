use std::io;
use thiserror::Error;

/// Everything that can go wrong while running a ping session
///
/// None of these errors reach the caller of `Pinger::start`. They are delivered to the listeners
/// through `PingListener::on_exception`, flagged as fatal if the session could not be set up.
#[derive(Debug, Error)]
pub enum PingError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("could not resolve host {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("host {0} has no IPv4 address")]
    NoIpv4Address(String),

    #[error("could not open ICMP socket: {0}")]
    Socket(#[source] io::Error),

    #[error("could not spawn session thread: {0}")]
    Spawn(#[source] io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The session was cancelled while the transport was waiting for a reply
    #[error("interrupted by cancellation")]
    Interrupted,
}

impl PingError {
    /// Return `true` if this error signals cancellation rather than a failure
    pub fn is_interrupted(&self) -> bool {
        matches!(self, PingError::Interrupted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn display_and_source() {
        let err = PingError::Resolve {
            host: "nowhere".to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "no such host"),
        };
        assert_eq!(err.to_string(), "could not resolve host nowhere: no such host");
        assert!(err.source().is_some());
        assert!(!err.is_interrupted());
    }

    #[test]
    fn io_errors_convert() {
        let err: PingError = io::Error::new(io::ErrorKind::Other, "boom").into();
        assert!(matches!(err, PingError::Io(_)));
        assert!(PingError::Interrupted.is_interrupted());
    }
}
