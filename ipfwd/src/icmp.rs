use crate::config::RouterConfig;
use ipfwd_packets::{EthernetFrame, IcmpPacket, IcmpType, Ipv4Packet, MacAddr};

/// Builds the ICMP messages the node answers with. Every message is a bare ICMP header in a bare
/// IPv4 header, sent back where the offending packet came from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct IcmpGenerator {
    ttl: u8,
    identification: u16,
}

impl IcmpGenerator {
    pub fn new(ttl: u8, identification: u16) -> Self {
        IcmpGenerator {
            ttl,
            identification,
        }
    }

    pub fn from_config(config: &RouterConfig) -> Self {
        IcmpGenerator::new(config.icmp_ttl, config.icmp_identification)
    }

    pub fn time_exceeded(
        &self,
        original: &Ipv4Packet,
        original_src: MacAddr,
        local: MacAddr,
    ) -> EthernetFrame {
        self.message(IcmpType::TimeExceeded, [0; 4], original, original_src, local)
    }

    pub fn destination_unreachable(
        &self,
        original: &Ipv4Packet,
        original_src: MacAddr,
        local: MacAddr,
    ) -> EthernetFrame {
        self.message(
            IcmpType::DestinationUnreachable,
            [0; 4],
            original,
            original_src,
            local,
        )
    }

    /// Answers `request`, echoing its identifier and sequence number.
    pub fn echo_reply(
        &self,
        original: &Ipv4Packet,
        request: &IcmpPacket,
        original_src: MacAddr,
        local: MacAddr,
    ) -> EthernetFrame {
        self.message(
            IcmpType::EchoReply,
            request.rest_of_header(),
            original,
            original_src,
            local,
        )
    }

    fn message(
        &self,
        msg_type: IcmpType,
        rest_of_header: [u8; 4],
        original: &Ipv4Packet,
        original_src: MacAddr,
        local: MacAddr,
    ) -> EthernetFrame {
        let mut icmp = IcmpPacket::empty();
        icmp.set_msg_type(msg_type);
        icmp.set_code(0);
        icmp.set_rest_of_header(rest_of_header);
        icmp.set_checksum();

        let mut ip = Ipv4Packet::encap_icmp(icmp);
        ip.set_src_addr(original.dest_addr());
        ip.set_dest_addr(original.src_addr());
        ip.set_ttl(self.ttl);
        ip.set_identification(self.identification);
        ip.set_checksum();

        let mut frame = EthernetFrame::encap_ipv4(ip);
        frame.set_dest_mac(original_src);
        frame.set_src_mac(local);
        frame
    }
}

impl Default for IcmpGenerator {
    fn default() -> Self {
        IcmpGenerator::from_config(&RouterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipfwd_packets::{IpProtocol, ETHERNET_HEADER_LEN, ICMP_HEADER_LEN, IPV4_HEADER_LEN};
    use std::convert::TryFrom;
    use std::net::Ipv4Addr;

    const PEER: MacAddr = MacAddr {
        bytes: [0xde, 0xad, 0xbe, 0xef, 0, 1],
    };
    const LOCAL: MacAddr = MacAddr {
        bytes: [2, 0, 0, 0, 0, 1],
    };

    fn original() -> Ipv4Packet {
        let mut packet = Ipv4Packet::empty();
        packet.set_src_addr(Ipv4Addr::new(192, 168, 1, 10));
        packet.set_dest_addr(Ipv4Addr::new(10, 9, 9, 9));
        packet.set_ttl(1);
        packet.set_protocol(IpProtocol::UDP);
        packet.set_payload(&[1, 2, 3, 4, 5, 6, 7, 8]);
        packet.set_checksum();
        packet
    }

    fn open(frame: EthernetFrame) -> (Ipv4Packet, IcmpPacket) {
        let ip = Ipv4Packet::try_from(frame).unwrap();
        let icmp = IcmpPacket::try_from(ip.clone()).unwrap();
        (ip, icmp)
    }

    #[test]
    fn time_exceeded_goes_back_to_the_sender() {
        let frame = IcmpGenerator::default().time_exceeded(&original(), PEER, LOCAL);
        assert_eq!(
            frame.data.len(),
            ETHERNET_HEADER_LEN + IPV4_HEADER_LEN + ICMP_HEADER_LEN
        );
        assert_eq!(frame.dest_mac(), PEER);
        assert_eq!(frame.src_mac(), LOCAL);

        let (ip, icmp) = open(frame);
        assert_eq!(ip.src_addr(), Ipv4Addr::new(10, 9, 9, 9));
        assert_eq!(ip.dest_addr(), Ipv4Addr::new(192, 168, 1, 10));
        assert_eq!(ip.protocol(), IpProtocol::ICMP);
        assert_eq!(ip.ttl(), 64);
        assert_eq!(ip.identification(), 1);
        assert_eq!(ip.total_len() as usize, IPV4_HEADER_LEN + ICMP_HEADER_LEN);
        assert!(ip.validate_checksum());

        assert_eq!(icmp.msg_type(), IcmpType::TimeExceeded as u8);
        assert_eq!(icmp.code(), 0);
        assert_eq!(icmp.rest_of_header(), [0; 4]);
        assert!(icmp.validate_checksum());
    }

    #[test]
    fn destination_unreachable() {
        let frame = IcmpGenerator::new(32, 7).destination_unreachable(&original(), PEER, LOCAL);
        let (ip, icmp) = open(frame);
        assert_eq!(ip.ttl(), 32);
        assert_eq!(ip.identification(), 7);
        assert!(ip.validate_checksum());
        assert_eq!(icmp.msg_type(), IcmpType::DestinationUnreachable as u8);
        assert!(icmp.validate_checksum());
    }

    #[test]
    fn echo_reply_keeps_identifier_and_sequence() {
        let mut request = IcmpPacket::empty();
        request.set_msg_type(IcmpType::EchoRequest);
        request.set_rest_of_header([0x12, 0x34, 0, 9]);
        request.set_checksum();

        let frame = IcmpGenerator::default().echo_reply(&original(), &request, PEER, LOCAL);
        let (_, icmp) = open(frame);
        assert_eq!(icmp.msg_type(), IcmpType::EchoReply as u8);
        assert_eq!(icmp.rest_of_header(), [0x12, 0x34, 0, 9]);
        assert!(icmp.validate_checksum());
    }
}
