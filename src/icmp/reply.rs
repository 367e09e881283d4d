use pnet::packet::icmp::{Icmp, IcmpPacket, IcmpTypes};
use pnet::packet::FromPacket;

/// A ping after receipt
///
/// The reply packet does not own the entire packet, but only retains the information needed to
/// tell whether it answers a request sent through a particular channel: the type field, the
/// identifier and the sequence number.
#[derive(Debug, PartialEq, Eq)]
pub(super) struct ReplyPacket {
    echo_reply: bool,
    id: u16,
    seq: u16,
}

impl ReplyPacket {
    /// Return `true` if this is the echo reply to the request `(id, seq)`
    pub fn answers(&self, id: u16, seq: u16) -> bool {
        self.echo_reply && self.id == id && self.seq == seq
    }
}

impl From<IcmpPacket<'_>> for ReplyPacket {
    fn from(packet: IcmpPacket) -> Self {
        let raw_packet = packet.from_packet();
        Self::from(raw_packet)
    }
}

impl From<Icmp> for ReplyPacket {
    /// Parse an incoming [`Icmp`](icmp) packet into a `ReplyPacket`
    ///
    /// [`pnet`](pnet) maps the type and code fields, identifier and sequence number are the first
    /// four bytes of the payload. Truncated packets never match any request.
    ///
    /// [icmp]: https://docs.rs/pnet/0.25.0/pnet/packet/icmp/struct.Icmp.html
    /// [pnet]: https://docs.rs/pnet/0.25.0/pnet/
    fn from(packet: Icmp) -> Self {
        let payload = &packet.payload;
        if payload.len() < 4 {
            return Self {
                echo_reply: false,
                id: 0,
                seq: 0,
            };
        }

        Self {
            echo_reply: packet.icmp_type == IcmpTypes::EchoReply,
            id: u16::from_be_bytes([payload[0], payload[1]]),
            seq: u16::from_be_bytes([payload[2], payload[3]]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pnet::packet::icmp::IcmpCode;

    fn icmp(icmp_type: pnet::packet::icmp::IcmpType, payload: Vec<u8>) -> Icmp {
        Icmp {
            icmp_type,
            icmp_code: IcmpCode::new(0),
            checksum: 0u16,
            payload,
        }
    }

    #[test]
    fn parse_echo_reply() {
        let mut payload = vec![0u8; 28];
        payload[..4].copy_from_slice(&[0x12, 0x34, 0x00, 0x07]);

        let packet = ReplyPacket::from(icmp(IcmpTypes::EchoReply, payload));

        assert!(packet.answers(0x1234, 7));
        assert!(!packet.answers(0x1234, 8));
        assert!(!packet.answers(0x4321, 7));
    }

    #[test]
    fn ignore_other_types() {
        let payload = vec![0u8; 28];

        // Our own request echoed back by the raw socket is not an answer
        let request = ReplyPacket::from(icmp(IcmpTypes::EchoRequest, payload.clone()));
        assert!(!request.answers(0, 0));

        let unreachable = ReplyPacket::from(icmp(IcmpTypes::DestinationUnreachable, payload));
        assert!(!unreachable.answers(0, 0));
    }

    #[test]
    fn ignore_truncated_packets() {
        let packet = ReplyPacket::from(icmp(IcmpTypes::EchoReply, vec![0u8; 2]));
        assert!(!packet.answers(0, 0));
    }
}
