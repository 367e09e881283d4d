use std::sync::{Arc, Weak};

use crate::cancel::CancelToken;
use crate::observer::{Listeners, PingInfo, PingListener};
use crate::registry::SessionRegistry;
use crate::resolver::Resolver;
use crate::transport::{Channel, ProbeOutcome, Transport};
use crate::{PingConfig, PingError, PingId};

/// Sequence number of the first probe of every session
pub const FIRST_SEQUENCE: u16 = 1;

/// Sequence number following `sequence`
///
/// Sequence numbers are 16 bits wide on the wire, 65535 is followed by 0.
pub fn next_sequence(sequence: u16) -> u16 {
    sequence.wrapping_add(1)
}

/// State of the probe loop
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Cancelled,
    Terminated,
}

/// One ping run against one host
///
/// A `Session` is created by the `Pinger` and moved onto its own thread, where `run` drives it
/// from name resolution to termination. The session owns everything it needs, it only reaches
/// back to the registry to deregister itself when it is done.
pub(crate) struct Session<T: Transport, R: Resolver> {
    id: PingId,
    config: PingConfig,
    transport: Arc<T>,
    resolver: Arc<R>,
    listeners: Listeners,
    cancel: CancelToken,
    registry: Weak<SessionRegistry>,
}

impl<T: Transport, R: Resolver> Session<T, R> {
    pub(crate) fn new(
        id: PingId,
        config: PingConfig,
        transport: Arc<T>,
        resolver: Arc<R>,
        listeners: Listeners,
        cancel: CancelToken,
        registry: Weak<SessionRegistry>,
    ) -> Self {
        Self {
            id,
            config,
            transport,
            resolver,
            listeners,
            cancel,
            registry,
        }
    }

    /// Session body
    ///
    /// Resolves the host, opens the channel and runs the probe loop until cancelled. Setup
    /// failures are reported as a single fatal exception. Whatever the outcome, the session
    /// removes itself from the registry before returning.
    pub(crate) fn run(self) {
        trace!("Session {} started for host {}", self.id, self.config.host);

        let state = match self.set_up() {
            Ok((info, channel)) => self.probe(info, channel),
            Err((info, e)) => {
                error!("Session {} could not be set up: {}", self.id, e);
                self.listeners.on_exception(&info, &e, true);
                LoopState::Terminated
            }
        };
        debug_assert_eq!(state, LoopState::Terminated);

        if let Some(registry) = self.registry.upgrade() {
            registry.deregister(self.id);
        }

        trace!("Session {} terminated", self.id);
    }

    /// Resolve the host and open the channel
    ///
    /// On failure the partially filled `PingInfo` is returned along with the error, so it can
    /// still be reported to the listeners.
    fn set_up(&self) -> Result<(Arc<PingInfo>, T::Channel), (Arc<PingInfo>, PingError)> {
        let info = PingInfo::unresolved(self.id, &self.config);

        let addr = match self.resolver.resolve(&self.config.host) {
            Ok(addr) => addr,
            Err(e) => return Err((Arc::new(info), e)),
        };

        // Without a registered name the address itself stands in for it
        let reverse_dns = self.resolver.reverse(addr).unwrap_or_else(|e| {
            warn!("Reverse lookup of {} failed: {}", addr, e);
            addr.to_string()
        });

        let info = Arc::new(info.resolved(addr, reverse_dns));

        info!(
            "Session {}: opening channel to {} ({}) with ttl {}",
            self.id,
            info.get_reverse_dns(),
            addr,
            self.config.ttl
        );

        match self.transport.open(addr, self.config.timeout, self.config.ttl) {
            Ok(channel) => Ok((info, channel)),
            Err(e) => Err((info, e)),
        }
    }

    /// Probe loop
    ///
    /// Sends one probe per iteration and sleeps in between. The loop only ends on cancellation,
    /// which is observed while sleeping and while the channel waits for a reply. Faults of a
    /// single probe are reported as non-fatal exceptions and the loop carries on.
    fn probe(&self, info: Arc<PingInfo>, mut channel: T::Channel) -> LoopState {
        let mut state = LoopState::Running;
        let mut sequence = FIRST_SEQUENCE;

        self.listeners.on_start(&info);

        while state == LoopState::Running {
            match channel.send(sequence, self.config.size, &self.config.pattern, &self.cancel) {
                Ok(outcome) => self.report(&info, sequence, outcome),

                // Cancelled mid-probe, this sequence number gets no outcome
                Err(ref e) if e.is_interrupted() => {
                    state = LoopState::Cancelled;
                    break;
                }

                Err(e) => {
                    warn!("Session {}: icmp_seq={} failed: {}", self.id, sequence, e);
                    self.listeners.on_exception(&info, &e, false);
                }
            }

            if self.cancel.sleep(self.config.sleep) {
                state = LoopState::Cancelled;
            }
            sequence = next_sequence(sequence);
        }

        debug!("Session {} cancelled in state {:?}", self.id, state);

        // Listeners learn about the stop before the channel is released
        self.listeners.on_stop(&info);
        channel.close();

        LoopState::Terminated
    }

    fn report(&self, info: &Arc<PingInfo>, sequence: u16, outcome: ProbeOutcome) {
        match outcome {
            ProbeOutcome::Success(rtt) => self.listeners.on_reply_received(info, sequence, rtt),
            ProbeOutcome::SendError => self.listeners.on_send_error(info, sequence),
            ProbeOutcome::Timeout => self.listeners.on_timeout(info, sequence),
        }
    }
}
