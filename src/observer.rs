//! Listener protocol for session events
//!
//! Every session reports to the listeners that were registered when it started. Per session the
//! events arrive in this order:
//! - `on_start` once, after the host was resolved and the channel was opened
//! - one of `on_reply_received`, `on_send_error`, `on_timeout` per probe, interleaved with
//!   non-fatal `on_exception` calls for probes that failed outright
//! - `on_stop` once, after the session was cancelled
//!
//! A session that cannot be set up reports a single fatal `on_exception` instead and nothing
//! else. Listeners are called from the session threads, so one listener may be called from
//! several threads at once.

use crossbeam::channel::{self, Receiver, Sender};
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use crate::{PingConfig, PingError, PingId};

/// Description of a running session
///
/// The same snapshot is passed to every event of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingInfo {
    id: PingId,
    remote_host: String,
    remote_ip: Option<Ipv4Addr>,
    reverse_dns: String,
    size: usize,
    timeout: Duration,
    ttl: u8,
}

impl PingInfo {
    /// Snapshot of a session whose host has not been resolved
    pub(crate) fn unresolved(id: PingId, config: &PingConfig) -> Self {
        Self {
            id,
            remote_host: config.host.clone(),
            remote_ip: None,
            reverse_dns: String::new(),
            size: config.size,
            timeout: config.timeout,
            ttl: config.ttl,
        }
    }

    /// Complete the snapshot with the results of the name lookups
    pub(crate) fn resolved(self, remote_ip: Ipv4Addr, reverse_dns: String) -> Self {
        Self {
            remote_ip: Some(remote_ip),
            reverse_dns,
            ..self
        }
    }

    pub fn get_id(&self) -> PingId {
        self.id
    }

    /// The host as it was passed to `Pinger::start`
    pub fn get_remote_host(&self) -> &str {
        &self.remote_host
    }

    /// The address being pinged, `None` if resolution failed
    pub fn get_remote_ip(&self) -> Option<Ipv4Addr> {
        self.remote_ip
    }

    /// The name registered for the remote address, empty if resolution failed
    pub fn get_reverse_dns(&self) -> &str {
        &self.reverse_dns
    }

    pub fn get_size(&self) -> usize {
        self.size
    }

    pub fn get_timeout(&self) -> Duration {
        self.timeout
    }

    pub fn get_ttl(&self) -> u8 {
        self.ttl
    }
}

/// Receiver of session events
///
/// All methods do nothing by default, so implementors only pick the events they care about.
pub trait PingListener: Send + Sync {
    fn on_start(&self, _info: &Arc<PingInfo>) {}

    fn on_stop(&self, _info: &Arc<PingInfo>) {}

    fn on_send_error(&self, _info: &Arc<PingInfo>, _sequence: u16) {}

    fn on_reply_received(&self, _info: &Arc<PingInfo>, _sequence: u16, _rtt: Duration) {}

    fn on_timeout(&self, _info: &Arc<PingInfo>, _sequence: u16) {}

    /// A fatal exception ends the session before it started, a non-fatal one only affects the
    /// current probe.
    fn on_exception(&self, _info: &Arc<PingInfo>, _error: &PingError, _fatal: bool) {}
}

impl<L: PingListener + ?Sized> PingListener for Arc<L> {
    fn on_start(&self, info: &Arc<PingInfo>) {
        (**self).on_start(info)
    }

    fn on_stop(&self, info: &Arc<PingInfo>) {
        (**self).on_stop(info)
    }

    fn on_send_error(&self, info: &Arc<PingInfo>, sequence: u16) {
        (**self).on_send_error(info, sequence)
    }

    fn on_reply_received(&self, info: &Arc<PingInfo>, sequence: u16, rtt: Duration) {
        (**self).on_reply_received(info, sequence, rtt)
    }

    fn on_timeout(&self, info: &Arc<PingInfo>, sequence: u16) {
        (**self).on_timeout(info, sequence)
    }

    fn on_exception(&self, info: &Arc<PingInfo>, error: &PingError, fatal: bool) {
        (**self).on_exception(info, error, fatal)
    }
}

/// Set of subscribed listeners
///
/// Cloning is cheap, the listeners themselves are shared. A session keeps the clone it was
/// started with, so changing the subscriptions of a `Pinger` only affects later sessions.
#[derive(Clone, Default)]
pub struct Listeners(Vec<Arc<dyn PingListener>>);

impl Listeners {
    /// Drop all subscriptions and subscribe `listener` alone
    pub fn replace(&mut self, listener: Arc<dyn PingListener>) {
        self.0.clear();
        self.0.push(listener);
    }

    pub fn push(&mut self, listener: Arc<dyn PingListener>) {
        self.0.push(listener);
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.0.len())
            .finish()
    }
}

impl PingListener for Listeners {
    fn on_start(&self, info: &Arc<PingInfo>) {
        self.0.iter().for_each(|l| l.on_start(info));
    }

    fn on_stop(&self, info: &Arc<PingInfo>) {
        self.0.iter().for_each(|l| l.on_stop(info));
    }

    fn on_send_error(&self, info: &Arc<PingInfo>, sequence: u16) {
        self.0.iter().for_each(|l| l.on_send_error(info, sequence));
    }

    fn on_reply_received(&self, info: &Arc<PingInfo>, sequence: u16, rtt: Duration) {
        self.0
            .iter()
            .for_each(|l| l.on_reply_received(info, sequence, rtt));
    }

    fn on_timeout(&self, info: &Arc<PingInfo>, sequence: u16) {
        self.0.iter().for_each(|l| l.on_timeout(info, sequence));
    }

    fn on_exception(&self, info: &Arc<PingInfo>, error: &PingError, fatal: bool) {
        self.0
            .iter()
            .for_each(|l| l.on_exception(info, error, fatal));
    }
}

/// Owned copy of a listener call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PingEvent {
    Start(Arc<PingInfo>),
    Stop(Arc<PingInfo>),
    SendError {
        info: Arc<PingInfo>,
        sequence: u16,
    },
    Reply {
        info: Arc<PingInfo>,
        sequence: u16,
        rtt: Duration,
    },
    Timeout {
        info: Arc<PingInfo>,
        sequence: u16,
    },
    /// The error is kept in its rendered form
    Exception {
        info: Arc<PingInfo>,
        error: String,
        fatal: bool,
    },
}

impl PingEvent {
    pub fn info(&self) -> &Arc<PingInfo> {
        match self {
            Self::Start(info) | Self::Stop(info) => info,
            Self::SendError { info, .. }
            | Self::Reply { info, .. }
            | Self::Timeout { info, .. }
            | Self::Exception { info, .. } => info,
        }
    }

    /// Identifier of the session that produced this event
    pub fn id(&self) -> PingId {
        self.info().get_id()
    }

    /// Sequence number of the probe, for probe outcomes only
    pub fn sequence(&self) -> Option<u16> {
        match self {
            Self::SendError { sequence, .. }
            | Self::Reply { sequence, .. }
            | Self::Timeout { sequence, .. } => Some(*sequence),
            _ => None,
        }
    }
}

/// Listener forwarding every event into a channel
///
/// Useful to consume events on a thread of your choice. Events are dropped silently once the
/// receiving end is gone.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    tx: Sender<PingEvent>,
}

impl ChannelListener {
    /// Create a listener and the receiving end of its unbounded channel
    pub fn new() -> (Self, Receiver<PingEvent>) {
        let (tx, rx) = channel::unbounded();
        (Self { tx }, rx)
    }

    fn forward(&self, event: PingEvent) {
        let _ = self.tx.send(event);
    }
}

impl PingListener for ChannelListener {
    fn on_start(&self, info: &Arc<PingInfo>) {
        self.forward(PingEvent::Start(info.clone()));
    }

    fn on_stop(&self, info: &Arc<PingInfo>) {
        self.forward(PingEvent::Stop(info.clone()));
    }

    fn on_send_error(&self, info: &Arc<PingInfo>, sequence: u16) {
        self.forward(PingEvent::SendError {
            info: info.clone(),
            sequence,
        });
    }

    fn on_reply_received(&self, info: &Arc<PingInfo>, sequence: u16, rtt: Duration) {
        self.forward(PingEvent::Reply {
            info: info.clone(),
            sequence,
            rtt,
        });
    }

    fn on_timeout(&self, info: &Arc<PingInfo>, sequence: u16) {
        self.forward(PingEvent::Timeout {
            info: info.clone(),
            sequence,
        });
    }

    fn on_exception(&self, info: &Arc<PingInfo>, error: &PingError, fatal: bool) {
        self.forward(PingEvent::Exception {
            info: info.clone(),
            error: error.to_string(),
            fatal,
        });
    }
}

/// Listener writing every event to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogListener;

impl PingListener for LogListener {
    fn on_start(&self, info: &Arc<PingInfo>) {
        info!(
            "ping {} ({}) {} bytes of data",
            info.get_reverse_dns(),
            display_ip(info),
            info.get_size()
        );
    }

    fn on_stop(&self, info: &Arc<PingInfo>) {
        info!("ping {} complete", info.get_remote_host());
    }

    fn on_send_error(&self, info: &Arc<PingInfo>, sequence: u16) {
        warn!("{}: icmp_seq={} could not be sent", display_ip(info), sequence);
    }

    fn on_reply_received(&self, info: &Arc<PingInfo>, sequence: u16, rtt: Duration) {
        info!(
            "{} bytes from {}: icmp_seq={} ttl={} time={:.3}ms",
            info.get_size(),
            display_ip(info),
            sequence,
            info.get_ttl(),
            rtt.as_secs_f64() * 1000f64
        );
    }

    fn on_timeout(&self, info: &Arc<PingInfo>, sequence: u16) {
        info!("{}: icmp_seq={} timed out", display_ip(info), sequence);
    }

    fn on_exception(&self, info: &Arc<PingInfo>, error: &PingError, fatal: bool) {
        if fatal {
            error!("ping {} failed: {}", info.get_remote_host(), error);
        } else {
            warn!("ping {}: {}", info.get_remote_host(), error);
        }
    }
}

fn display_ip(info: &PingInfo) -> String {
    info.get_remote_ip()
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| info.get_remote_host().to_string())
}
