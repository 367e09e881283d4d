//! Stand-ins for the network collaborators
//!
//! Sessions built from these run without sockets or name servers, so their event sequences are
//! fully deterministic.

use crossbeam::channel::Receiver;
use std::io;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::cancel::CancelToken;
use crate::observer::PingEvent;
use crate::resolver::Resolver;
use crate::transport::{Channel, ProbeOutcome, Transport};
use crate::PingError;

/// Upper bound for anything a test waits for
pub(crate) const PATIENCE: Duration = Duration::from_secs(5);

type Script = dyn Fn(u16) -> Result<ProbeOutcome, PingError> + Send + Sync;

/// Transport answering every probe from a script
pub(crate) struct StubTransport {
    // `None` blocks every probe until the session is cancelled
    script: Option<Arc<Script>>,
    fail_open: bool,
    opened: AtomicUsize,
    closed: Arc<AtomicUsize>,
}

impl StubTransport {
    /// Answer probe `sequence` with `script(sequence)`
    pub(crate) fn scripted<F>(script: F) -> Self
    where
        F: Fn(u16) -> Result<ProbeOutcome, PingError> + Send + Sync + 'static,
    {
        Self {
            script: Some(Arc::new(script)),
            fail_open: false,
            opened: AtomicUsize::new(0),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Every probe succeeds with a round-trip time of `code` milliseconds
    pub(crate) fn steady(code: i32) -> Self {
        Self::scripted(move |_| Ok(ProbeOutcome::from(code)))
    }

    /// Every probe waits for a reply that never comes
    pub(crate) fn blocking() -> Self {
        Self {
            script: None,
            ..Self::steady(0)
        }
    }

    /// Channels cannot be opened at all
    pub(crate) fn failing_open() -> Self {
        Self {
            fail_open: true,
            ..Self::steady(0)
        }
    }

    pub(crate) fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub(crate) fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

pub(crate) struct StubChannel {
    script: Option<Arc<Script>>,
    closed: Arc<AtomicUsize>,
}

impl Transport for StubTransport {
    type Channel = StubChannel;

    fn open(&self, _addr: Ipv4Addr, _timeout: Duration, _ttl: u8) -> Result<StubChannel, PingError> {
        if self.fail_open {
            return Err(PingError::Socket(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "raw sockets not permitted",
            )));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(StubChannel {
            script: self.script.clone(),
            closed: self.closed.clone(),
        })
    }
}

impl Channel for StubChannel {
    fn send(
        &mut self,
        sequence: u16,
        _size: usize,
        _pattern: &[u8],
        cancel: &CancelToken,
    ) -> Result<ProbeOutcome, PingError> {
        match &self.script {
            Some(script) => script(sequence),
            None => {
                while !cancel.sleep(Duration::from_millis(10)) {}
                Err(PingError::Interrupted)
            }
        }
    }

    fn close(self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Resolver accepting IPv4 literals and `localhost`
#[derive(Debug, Default)]
pub(crate) struct StubResolver {
    pub(crate) fail_forward: bool,
    pub(crate) fail_reverse: bool,
}

impl Resolver for StubResolver {
    fn resolve(&self, host: &str) -> Result<Ipv4Addr, PingError> {
        let addr = match host {
            _ if self.fail_forward => None,
            "localhost" => Some(Ipv4Addr::LOCALHOST),
            _ => host.parse().ok(),
        };
        addr.ok_or_else(|| PingError::Resolve {
            host: host.to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "unknown host"),
        })
    }

    fn reverse(&self, addr: Ipv4Addr) -> Result<String, PingError> {
        if self.fail_reverse {
            return Err(PingError::Resolve {
                host: addr.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "no PTR record"),
            });
        }
        if addr.is_loopback() {
            Ok("localhost".to_string())
        } else {
            Ok(format!("host-{}.example", addr))
        }
    }
}

/// Next event, or panic if none arrives in time
pub(crate) fn wait_for(rx: &Receiver<PingEvent>) -> PingEvent {
    rx.recv_timeout(PATIENCE)
        .expect("Timed out waiting for a session event")
}

/// Poll `condition` until it holds, or panic
pub(crate) fn wait_until<F: Fn() -> bool>(condition: F) {
    let deadline = Instant::now() + PATIENCE;
    while !condition() {
        assert!(Instant::now() < deadline, "Timed out waiting for condition");
        thread::sleep(Duration::from_millis(5));
    }
}
