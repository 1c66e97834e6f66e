//! Classifiers look at a packet by reference and decide which path it takes through the
//! engine. They never modify the packet.

use ipfwd_packets::{EthernetFrame, ARP_ETHER_TYPE, IPV4_ETHER_TYPE};

pub trait Classifier {
    type Packet;
    type Class: Sized;

    fn classify(&self, packet: &Self::Packet) -> Self::Class;
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EtherClass {
    Ipv4,
    Arp,
    Other(u16),
}

/// Sorts Ethernet frames by the EtherType field.
#[derive(Clone, Copy, Debug, Default)]
pub struct ClassifyEtherType;

impl Classifier for ClassifyEtherType {
    type Packet = EthernetFrame;
    type Class = EtherClass;

    fn classify(&self, frame: &Self::Packet) -> Self::Class {
        match frame.ether_type() {
            IPV4_ETHER_TYPE => EtherClass::Ipv4,
            ARP_ETHER_TYPE => EtherClass::Arp,
            other => EtherClass::Other(other),
        }
    }
}
