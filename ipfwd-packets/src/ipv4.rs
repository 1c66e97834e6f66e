use crate::*;
use std::borrow::Cow;
use std::convert::{TryFrom, TryInto};
use std::net::Ipv4Addr;

pub const IPV4_HEADER_LEN: usize = 20;

const TTL_PROTOCOL_WORD: usize = 8;
const CHECKSUM_FIELD: usize = 10;

#[derive(Clone, Debug)]
pub struct Ipv4Packet {
    pub data: PacketData,
    pub layer2_offset: Option<usize>,
    pub layer3_offset: usize,
    pub payload_offset: usize,
}

impl Ipv4Packet {
    pub fn from_buffer(
        data: PacketData,
        layer2_offset: Option<usize>,
        layer3_offset: usize,
    ) -> Result<Ipv4Packet, &'static str> {
        // Header of Ethernet Frame: 14 bytes
        // Header of IPv4 Frame: 20 bytes
        if data.len() < layer3_offset + IPV4_HEADER_LEN {
            return Err("Data is too short to be an IPv4 Packet");
        }

        // Check version number
        let version: u8 = (data[layer3_offset] & 0xF0) >> 4;
        if version != 4 {
            return Err("Packet has incorrect version, is not Ipv4Packet");
        }

        // This is the header length in 32bit words
        let ihl = (data[layer3_offset] & 0x0F) as usize;
        if ihl < 5 {
            return Err("Packet has invalid header length field");
        }
        let payload_offset = layer3_offset + (ihl * 4);
        if data.len() < payload_offset {
            return Err("Packet is shorter than its header length field");
        }

        // TotalLen is the 3rd and 4th byte of the IP Header. Link layers may pad short packets,
        // so the buffer is allowed to run past it, never to fall short of it.
        let total_len = u16::from_be_bytes(
            data[layer3_offset + 2..=layer3_offset + 3]
                .try_into()
                .unwrap(),
        ) as usize;
        if total_len < ihl * 4 || data.len() < layer3_offset + total_len {
            return Err("Packet has invalid total length field");
        }

        Ok(Ipv4Packet {
            data,
            layer2_offset,
            layer3_offset,
            payload_offset,
        })
    }

    /// A bare 20 byte header with no payload and every other field zeroed.
    pub fn empty() -> Ipv4Packet {
        let mut data = vec![0; IPV4_HEADER_LEN];
        data[0] = 0x45;
        data[3] = IPV4_HEADER_LEN as u8;
        Ipv4Packet::from_buffer(data, None, 0).unwrap()
    }

    pub fn encap_icmp(icmp: IcmpPacket) -> Ipv4Packet {
        let mut packet = Ipv4Packet::empty();
        packet.set_protocol(IpProtocol::ICMP);
        packet.set_payload(&icmp.data[icmp.layer4_offset..]);
        packet
    }

    pub fn src_addr(&self) -> Ipv4Addr {
        let data: [u8; 4] = self.data[self.layer3_offset + 12..self.layer3_offset + 16]
            .try_into()
            .unwrap();
        Ipv4Addr::from(data)
    }

    pub fn set_src_addr(&mut self, addr: Ipv4Addr) {
        self.data[self.layer3_offset + 12..self.layer3_offset + 16].copy_from_slice(&addr.octets());
    }

    pub fn dest_addr(&self) -> Ipv4Addr {
        let data: [u8; 4] = self.data[self.layer3_offset + 16..self.layer3_offset + 20]
            .try_into()
            .unwrap();
        Ipv4Addr::from(data)
    }

    pub fn set_dest_addr(&mut self, addr: Ipv4Addr) {
        self.data[self.layer3_offset + 16..self.layer3_offset + 20].copy_from_slice(&addr.octets());
    }

    pub fn ihl(&self) -> u8 {
        self.data[self.layer3_offset] & 0x0F
    }

    pub fn header(&self) -> &[u8] {
        &self.data[self.layer3_offset..self.payload_offset]
    }

    /// The payload as delimited by the total length field, without any link layer padding.
    pub fn payload(&self) -> Cow<[u8]> {
        let end = self.layer3_offset + self.total_len() as usize;
        Cow::from(&self.data[self.payload_offset..end])
    }

    /// Replaces the payload and updates the total length field. The checksum is left alone.
    pub fn set_payload(&mut self, payload: &[u8]) {
        let payload_len = payload.len();

        self.data.truncate(self.payload_offset);

        let header_len = self.payload_offset - self.layer3_offset;
        self.set_total_len((payload_len + header_len) as u16);

        self.data.reserve_exact(payload_len);
        self.data.extend(payload);
    }

    pub fn protocol(&self) -> IpProtocol {
        IpProtocol::from(self.data[self.layer3_offset + 9])
    }

    pub fn set_protocol(&mut self, protocol: IpProtocol) {
        self.data[self.layer3_offset + 9] = u8::from(protocol);
    }

    pub fn total_len(&self) -> u16 {
        u16::from_be_bytes(
            self.data[self.layer3_offset + 2..=self.layer3_offset + 3]
                .try_into()
                .unwrap(),
        )
    }

    pub fn set_total_len(&mut self, total_len: u16) {
        self.data[self.layer3_offset + 2..=self.layer3_offset + 3]
            .copy_from_slice(&total_len.to_be_bytes());
    }

    pub fn ttl(&self) -> u8 {
        self.data[self.layer3_offset + TTL_PROTOCOL_WORD]
    }

    pub fn set_ttl(&mut self, ttl: u8) {
        self.data[self.layer3_offset + TTL_PROTOCOL_WORD] = ttl;
    }

    pub fn identification(&self) -> u16 {
        u16::from_be_bytes(
            self.data[self.layer3_offset + 4..=self.layer3_offset + 5]
                .try_into()
                .unwrap(),
        )
    }

    pub fn set_identification(&mut self, id: u16) {
        self.data[self.layer3_offset + 4..=self.layer3_offset + 5]
            .copy_from_slice(&id.to_be_bytes());
    }

    pub fn checksum(&self) -> u16 {
        let start = self.layer3_offset + CHECKSUM_FIELD;
        u16::from_be_bytes([self.data[start], self.data[start + 1]])
    }

    fn write_checksum(&mut self, checksum: u16) {
        let start = self.layer3_offset + CHECKSUM_FIELD;
        self.data[start..start + 2].copy_from_slice(&checksum.to_be_bytes());
    }

    /// A header is intact iff the checksum over all of it, checksum field included, is zero.
    pub fn validate_checksum(&self) -> bool {
        internet_checksum(self.header()) == 0
    }

    /// Calculates what the checksum should be set to given the current header
    pub fn calculate_checksum(&self) -> u16 {
        let header = self.header();
        let field = CHECKSUM_FIELD;
        let sum = ones_complement_add(
            ones_complement_sum(&header[..field]),
            ones_complement_sum(&header[field + 2..]),
        );
        !sum
    }

    /// Sets checksum field to valid value
    pub fn set_checksum(&mut self) {
        let new_checksum = self.calculate_checksum();
        self.write_checksum(new_checksum);
    }

    /// Decrements the TTL by one and patches the header checksum incrementally instead of
    /// rescanning the header. The TTL shares its 16 bit word with the protocol field. Returns the
    /// new TTL; a TTL of zero is left untouched.
    pub fn decrement_ttl(&mut self) -> u8 {
        let old_ttl = self.ttl();
        if old_ttl == 0 {
            return 0;
        }
        let protocol = u8::from(self.protocol());
        let old_word = u16::from_be_bytes([old_ttl, protocol]);
        let new_word = u16::from_be_bytes([old_ttl - 1, protocol]);

        self.set_ttl(old_ttl - 1);
        let checksum = incremental_checksum_update(self.checksum(), old_word, new_word);
        self.write_checksum(checksum);
        old_ttl - 1
    }
}

/// Ipv4Packets are considered the same if they have the same data from the layer 3
/// header and onward. This function does not consider the data before the start of
/// the IPv4 header.
impl PartialEq for Ipv4Packet {
    fn eq(&self, other: &Self) -> bool {
        self.data[self.layer3_offset..] == other.data[other.layer3_offset..]
    }
}

impl Eq for Ipv4Packet {}

impl TryFrom<EthernetFrame> for Ipv4Packet {
    type Error = &'static str;

    fn try_from(frame: EthernetFrame) -> Result<Self, Self::Error> {
        if frame.ether_type() != IPV4_ETHER_TYPE {
            return Err("Frame does not have IPv4 ether type");
        }
        Ipv4Packet::from_buffer(frame.data, Some(0), frame.payload_offset)
    }
}

impl TryFrom<IcmpPacket> for Ipv4Packet {
    type Error = &'static str;

    fn try_from(icmp: IcmpPacket) -> Result<Self, Self::Error> {
        if let Some(layer3_offset) = icmp.layer3_offset {
            Ipv4Packet::from_buffer(icmp.data, icmp.layer2_offset, layer3_offset)
        } else {
            Err("ICMP Packet does not contain an IP Packet")
        }
    }
}
