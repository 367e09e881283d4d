use pnet::packet::{
    icmp::{echo_request::MutableEchoRequestPacket, IcmpTypes},
    Packet,
};
use pnet::util::checksum;
use std::io;

/// Size of the echo request header in bytes
pub(super) const HEADER_SIZE: usize = 8;

/// A ping packet before send-out
///
/// Low-level abstraction for outgoing ICMPv4 echo request messages. The packet owns its buffer
/// and is consumed by the `TransportSender` when it is sent.
#[derive(Debug)]
pub(super) struct RequestPacket(MutableEchoRequestPacket<'static>);

impl RequestPacket {
    /// Create new echo request packet with room for `size` bytes of payload
    ///
    /// # Errors
    ///
    /// The function could theoretically return an error, if the provided buffer were smaller than
    /// the minimum required size. As the function automatically adds extra space for the header,
    /// this should never occur.
    pub fn new(size: usize) -> Result<Self, io::Error> {
        let mut pkg = MutableEchoRequestPacket::owned(vec![0; size + HEADER_SIZE])
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "icmp packet"))?;
        pkg.set_icmp_type(IcmpTypes::EchoRequest);
        Ok(Self(pkg))
    }

    /// Populate the header fields and the payload
    ///
    /// The identifier tells replies to this channel apart from replies to other channels, the
    /// sequence number associates a reply with its request. The payload repeats `pattern` for as
    /// long as there is room, a trailing partial copy included.
    pub fn set_header_and_payload(&mut self, id: u16, sequence: u16, pattern: &[u8]) {
        let size = self.0.payload().len();
        self.0.set_identifier(id);
        self.0.set_sequence_number(sequence);
        self.0.set_payload(&fill_payload(size, pattern));
    }

    /// Set the checksum field of the packet
    ///
    /// The checksum is the 16-bit one's complement of the one's complement sum of the packet,
    /// with the checksum field itself skipped.
    pub fn set_checksum(&mut self) {
        let sum = checksum(self.0.packet(), 1);
        self.0.set_checksum(sum);
    }
}

/// Payload of `size` bytes made of repetitions of `pattern`
///
/// Without a pattern the payload is all zeros.
pub(super) fn fill_payload(size: usize, pattern: &[u8]) -> Vec<u8> {
    if pattern.is_empty() {
        return vec![0u8; size];
    }
    pattern.iter().copied().cycle().take(size).collect()
}

impl Packet for RequestPacket {
    fn packet(&self) -> &[u8] {
        self.0.packet()
    }

    fn payload(&self) -> &[u8] {
        self.0.payload()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_echo_request_packet() {
        let mut pkg = RequestPacket::new(20).expect("Failed creating a new echo request packet");

        let id = 0x0102u16;
        let seq = 0x0304u16;
        pkg.set_header_and_payload(id, seq, &[0xab]);
        pkg.set_checksum();

        let packet = pkg.packet();

        // Type 8 is an echo request, code is always zero
        assert_eq!(packet[0], 8);
        assert_eq!(packet[1], 0);

        // The 5 - 6th byte are reserved for the identifier
        assert_eq!(&packet[4..6], &[0x01, 0x02]);

        // The 7 - 8th byte are reserved for the sequence number
        assert_eq!(&packet[6..8], &[0x03, 0x04]);

        // 20 bytes payload + 8 bytes header
        assert_eq!(packet.len(), 28);
        assert!(pkg.payload().iter().all(|&b| b == 0xab));
    }

    #[test]
    fn checksum_verifies() {
        let mut pkg = RequestPacket::new(11).unwrap();
        pkg.set_header_and_payload(7, 1, &[1, 2, 3]);
        pkg.set_checksum();

        // The checksum field is skipped, so recomputing reproduces the stored value
        let stored = u16::from_be_bytes([pkg.packet()[2], pkg.packet()[3]]);
        assert_eq!(checksum(pkg.packet(), 1), stored);
    }

    #[test]
    fn payload_repeats_pattern() {
        assert_eq!(fill_payload(7, &[1, 2, 3]), vec![1, 2, 3, 1, 2, 3, 1]);
        assert_eq!(fill_payload(2, &[1, 2, 3]), vec![1, 2]);
        assert_eq!(fill_payload(4, &[]), vec![0, 0, 0, 0]);
        assert!(fill_payload(0, &[9]).is_empty());
    }

    #[test]
    fn empty_payload() {
        let mut pkg = RequestPacket::new(0).unwrap();
        pkg.set_header_and_payload(1, 1, &[]);
        assert_eq!(pkg.packet().len(), HEADER_SIZE);
    }
}
