use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::observer::{PingInfo, PingListener};
use crate::PingId;

/// Probe counts and round-trip times of one session
#[derive(Debug, Clone, Default)]
struct Tally {
    target: String,
    sent: usize,
    rtts: Vec<Duration>,
}

/// Summary statistics of one session
///
/// Times are reported in milliseconds, loss in percent.
#[derive(Debug, Clone, PartialEq)]
pub struct Stats {
    pub sent: usize,
    pub received: usize,
    pub loss: f64,
    pub min: f64,
    pub avg: f64,
    pub max: f64,
    pub stdev: f64,
}

impl Tally {
    /// Condense the recorded probes into statistics
    ///
    /// Returns `None` if no probe has been sent at all.
    fn stats(&self) -> Option<Stats> {
        if self.sent == 0 {
            return None;
        }

        let received = self.rtts.len();
        let loss = (self.sent - received) as f64 * 100f64 / self.sent as f64;

        let millis: Vec<f64> = self
            .rtts
            .iter()
            .map(|rtt| rtt.as_secs_f64() * 1000f64)
            .collect();
        let (min, max, total) = millis.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, 0f64),
            |(min, max, total), &x| (min.min(x), max.max(x), total + x),
        );

        if received == 0 {
            return Some(Stats {
                sent: self.sent,
                received,
                loss,
                min: 0f64,
                avg: 0f64,
                max: 0f64,
                stdev: 0f64,
            });
        }

        let avg = total / received as f64;

        // Bessel-corrected sample standard deviation, undefined for a single sample
        let stdev = if received > 1 {
            let sse: f64 = millis.iter().map(|x| (x - avg).powi(2)).sum();
            (sse / (received as f64 - 1f64)).sqrt()
        } else {
            0f64
        };

        Some(Stats {
            sent: self.sent,
            received,
            loss,
            min,
            avg,
            max,
            stdev,
        })
    }
}

/// Listener collecting per-session statistics
///
/// Send errors and timeouts count as lost probes. A probe interrupted by cancellation has no
/// outcome and is not counted.
#[derive(Debug, Default)]
pub struct Summary {
    sessions: Mutex<BTreeMap<PingId, Tally>>,
}

impl Summary {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<PingId, Tally>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, info: &PingInfo, rtt: Option<Duration>) {
        let mut sessions = self.lock();
        let tally = sessions.entry(info.get_id()).or_default();
        tally.sent += 1;
        if let Some(rtt) = rtt {
            tally.rtts.push(rtt);
        }
    }

    /// Statistics of session `id`, `None` if it never sent a probe
    pub fn stats(&self, id: PingId) -> Option<Stats> {
        self.lock().get(&id).and_then(Tally::stats)
    }

    /// Print summary statistics for every session that was started
    pub fn tally(&self) {
        for (id, tally) in self.lock().iter() {
            println!("--- {} ping summary statistics (session {}) ---", tally.target, id);

            let stats = match tally.stats() {
                Some(stats) => stats,
                None => {
                    println!("no packets transmitted");
                    continue;
                }
            };

            println!(
                "{} packets transmitted, {} packets received, {:.2}% packet loss",
                stats.sent, stats.received, stats.loss
            );
            if stats.received > 0 {
                println!(
                    "Time in transit min/avg/max/stdev: {:.3}/{:.3}/{:.3}/{:.3} ms",
                    stats.min, stats.avg, stats.max, stats.stdev
                );
            }
        }
    }
}

impl PingListener for Summary {
    fn on_start(&self, info: &Arc<PingInfo>) {
        let target = match info.get_remote_ip() {
            Some(ip) => format!("{} ({})", info.get_remote_host(), ip),
            None => info.get_remote_host().to_string(),
        };
        self.lock().entry(info.get_id()).or_default().target = target;
    }

    fn on_send_error(&self, info: &Arc<PingInfo>, _sequence: u16) {
        self.record(info, None);
    }

    fn on_reply_received(&self, info: &Arc<PingInfo>, _sequence: u16, rtt: Duration) {
        self.record(info, Some(rtt));
    }

    fn on_timeout(&self, info: &Arc<PingInfo>, _sequence: u16) {
        self.record(info, None);
    }
}
