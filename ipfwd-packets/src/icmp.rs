use crate::*;
use std::borrow::Cow;
use std::convert::{TryFrom, TryInto};

/// Type, code, checksum and the four "rest of header" bytes.
pub const ICMP_HEADER_LEN: usize = 8;

/// ICMP message types the node produces or recognizes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IcmpType {
    EchoReply = 0,
    DestinationUnreachable = 3,
    EchoRequest = 8,
    TimeExceeded = 11,
}

#[derive(Clone, Debug)]
pub struct IcmpPacket {
    pub data: PacketData,
    pub layer2_offset: Option<usize>,
    pub layer3_offset: Option<usize>,
    pub layer4_offset: usize,
}

impl IcmpPacket {
    pub fn from_buffer(
        data: PacketData,
        layer2_offset: Option<usize>,
        layer3_offset: Option<usize>,
        layer4_offset: usize,
    ) -> Result<IcmpPacket, &'static str> {
        if data.len() < layer4_offset + ICMP_HEADER_LEN {
            return Err("Data is too short to contain an ICMP header");
        }

        if let Some(layer3_offset) = layer3_offset {
            if data.len() <= layer3_offset + 9 || (data[layer3_offset] & 0xF0) != 0x40 {
                return Err("ICMP Packet is not carried by IPv4");
            }
            if IpProtocol::from(data[layer3_offset + 9]) != IpProtocol::ICMP {
                return Err("Protocol is incorrect, since it isn't ICMP");
            }
        }

        Ok(IcmpPacket {
            data,
            layer2_offset,
            layer3_offset,
            layer4_offset,
        })
    }

    /// Make an empty ICMP header, with no layer 3 header nor data.
    pub fn empty() -> IcmpPacket {
        IcmpPacket::from_buffer(vec![0; ICMP_HEADER_LEN], None, None, 0).unwrap()
    }

    pub fn msg_type(&self) -> u8 {
        self.data[self.layer4_offset]
    }

    pub fn set_msg_type(&mut self, msg_type: IcmpType) {
        self.data[self.layer4_offset] = msg_type as u8;
    }

    pub fn is_echo_request(&self) -> bool {
        self.msg_type() == IcmpType::EchoRequest as u8
    }

    pub fn code(&self) -> u8 {
        self.data[self.layer4_offset + 1]
    }

    pub fn set_code(&mut self, code: u8) {
        self.data[self.layer4_offset + 1] = code;
    }

    pub fn checksum(&self) -> u16 {
        u16::from_be_bytes(
            self.data[self.layer4_offset + 2..=self.layer4_offset + 3]
                .try_into()
                .unwrap(),
        )
    }

    /// Bytes 4 to 8 of the header. Identifier and sequence number for echo messages, unused
    /// for the errors generated here.
    pub fn rest_of_header(&self) -> [u8; 4] {
        self.data[self.layer4_offset + 4..self.layer4_offset + 8]
            .try_into()
            .unwrap()
    }

    pub fn set_rest_of_header(&mut self, rest: [u8; 4]) {
        self.data[self.layer4_offset + 4..self.layer4_offset + 8].copy_from_slice(&rest);
    }

    /// Header and data, everything the ICMP checksum covers.
    pub fn message(&self) -> &[u8] {
        &self.data[self.layer4_offset..]
    }

    pub fn payload(&self) -> Cow<[u8]> {
        Cow::from(&self.data[self.layer4_offset + ICMP_HEADER_LEN..])
    }

    pub fn validate_checksum(&self) -> bool {
        internet_checksum(self.message()) == 0
    }

    /// Zeroes the checksum field and fills it with the checksum over the whole message.
    pub fn set_checksum(&mut self) {
        let field = self.layer4_offset + 2;
        self.data[field..field + 2].copy_from_slice(&[0, 0]);
        let checksum = internet_checksum(self.message());
        self.data[field..field + 2].copy_from_slice(&checksum.to_be_bytes());
    }
}

impl PartialEq for IcmpPacket {
    fn eq(&self, other: &Self) -> bool {
        self.message() == other.message()
    }
}

impl Eq for IcmpPacket {}

impl TryFrom<Ipv4Packet> for IcmpPacket {
    type Error = &'static str;

    fn try_from(packet: Ipv4Packet) -> Result<Self, Self::Error> {
        // Drop link layer padding so the checksum only covers the ICMP message.
        let end = packet.layer3_offset + packet.total_len() as usize;
        let mut data = packet.data;
        data.truncate(end);
        IcmpPacket::from_buffer(
            data,
            packet.layer2_offset,
            Some(packet.layer3_offset),
            packet.payload_offset,
        )
    }
}
