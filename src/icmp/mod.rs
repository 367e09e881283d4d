//! ICMPv4 transport on top of [`pnet`](pnet)
//!
//! Every channel owns a layer 4 ICMP transport channel, i.e. a raw socket. Raw sockets see every
//! ICMP packet that arrives at the host, so each channel stamps its requests with a random
//! identifier and only accepts echo replies carrying that identifier and the expected sequence
//! number from the expected address.
//!
//! [pnet]: https://docs.rs/pnet/0.25.0/pnet/

use pnet::transport::{TransportReceiver, TransportSender};
use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, Instant};

use crate::cancel::CancelToken;
use crate::transport::{Channel, ProbeOutcome, Transport};
use crate::PingError;
use reply::ReplyPacket;
use request::RequestPacket;

mod reply;
mod request;

/// Default size of the transport channel buffer in bytes
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Interval in which a waiting channel checks for cancellation
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// `Transport` sending real echo requests
#[derive(Debug, Clone)]
pub struct IcmpTransport {
    buffer_size: usize,
}

impl IcmpTransport {
    pub fn new() -> Self {
        Self::with_buffer_size(DEFAULT_BUFFER_SIZE)
    }

    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self { buffer_size }
    }
}

impl Default for IcmpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for IcmpTransport {
    type Channel = IcmpChannel;

    /// Open new channel for packet transmission
    ///
    /// # Errors
    ///
    /// Errors during the construction of the pnet [`transport_channel`](tc) or while setting the
    /// time to live are returned as `PingError::Socket`. Without the privilege to open raw sockets
    /// this always fails.
    ///
    /// [tc]: https://docs.rs/pnet/0.25.0/pnet/transport/fn.transport_channel.html
    fn open(&self, addr: Ipv4Addr, timeout: Duration, ttl: u8) -> Result<IcmpChannel, PingError> {
        use pnet::packet::ip::IpNextHeaderProtocols::Icmp;
        use pnet::transport::{self, TransportChannelType::*, TransportProtocol::*};

        trace!("Opening transport channel to {}", addr);

        let (mut tx, rx) = transport::transport_channel(self.buffer_size, Layer4(Ipv4(Icmp)))
            .map_err(PingError::Socket)?;
        tx.set_ttl(ttl).map_err(PingError::Socket)?;

        Ok(IcmpChannel {
            tx,
            rx,
            addr,
            timeout,
            identifier: rand::random::<u16>(),
        })
    }
}

/// Open raw ICMP channel to one host
pub struct IcmpChannel {
    tx: TransportSender,
    rx: TransportReceiver,
    addr: Ipv4Addr,
    timeout: Duration,
    identifier: u16,
}

impl Channel for IcmpChannel {
    /// Send one echo request and wait for its reply
    ///
    /// The round-trip time is taken right before the request is handed to the `TransportSender`
    /// and right after the reply came out of the `TransportReceiver`. Packets that do not answer
    /// this request are skipped. The wait is split into slices of at most 100 ms, so that
    /// cancellation is noticed while waiting for slow hosts.
    fn send(
        &mut self,
        sequence: u16,
        size: usize,
        pattern: &[u8],
        cancel: &CancelToken,
    ) -> Result<ProbeOutcome, PingError> {
        use pnet::transport::icmp_packet_iter;

        let mut packet = RequestPacket::new(size)?;
        packet.set_header_and_payload(self.identifier, sequence, pattern);
        packet.set_checksum();

        let target = IpAddr::V4(self.addr);

        // Stop time and send packet out into the aether
        let start = Instant::now();
        if let Err(e) = self.tx.send_to(packet, target) {
            debug!("Sending icmp_seq={} to {} failed: {}", sequence, target, e);
            return Ok(ProbeOutcome::SendError);
        }

        // A timeout beyond the range of `Instant` never runs out
        let deadline = start.checked_add(self.timeout);
        let mut incoming = icmp_packet_iter(&mut self.rx);
        loop {
            let now = Instant::now();
            if deadline.map_or(false, |deadline| now >= deadline) {
                return Ok(ProbeOutcome::Timeout);
            }
            if cancel.is_cancelled() {
                return Err(PingError::Interrupted);
            }

            let wait = remaining(deadline, now);
            if let Some((reply, from)) = incoming.next_with_timeout(wait)? {
                let arrival = Instant::now();
                if from == target && ReplyPacket::from(reply).answers(self.identifier, sequence) {
                    return Ok(ProbeOutcome::Success(arrival.duration_since(start)));
                }
            }
        }
    }

    /// Release the channel
    ///
    /// The underlying socket is closed when the pnet sender and receiver are dropped.
    fn close(self) {
        trace!("Closing transport channel to {}", self.addr);
    }
}

/// Time to wait for the next packet before looking at the clock and the cancel token again
fn remaining(deadline: Option<Instant>, now: Instant) -> Duration {
    match deadline {
        Some(deadline) => deadline.saturating_duration_since(now).min(POLL_INTERVAL),
        None => POLL_INTERVAL,
    }
}
