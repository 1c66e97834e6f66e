//! The boundary between the forwarding engine and the network interfaces.
//!
//! The engine only ever talks to a [`LinkLayer`]: it pulls one received frame at a time and
//! pushes complete Ethernet frames out of a numbered interface. `AfPacketLinks` binds real NICs,
//! `ChannelLinks` stands in for them with crossbeam channels.

use crate::errors::LinkError;
use ipfwd_packets::MacAddr;
use std::fmt;
use std::net::Ipv4Addr;

mod channel;
pub use self::channel::*;

#[cfg(target_os = "linux")]
mod packet_socket;
#[cfg(target_os = "linux")]
pub use self::packet_socket::*;

/// Index of an interface, in the order the interfaces were handed to the link layer.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct InterfaceId(pub usize);

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "if{}", self.0)
    }
}

/// The addresses the node owns on one interface.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct InterfaceAddrs {
    pub mac: MacAddr,
    pub ip: Ipv4Addr,
}

impl InterfaceAddrs {
    pub fn new(mac: MacAddr, ip: Ipv4Addr) -> Self {
        InterfaceAddrs { mac, ip }
    }
}

pub trait LinkLayer {
    /// Blocks until a frame arrives on any interface. `LinkError::Closed` means no more frames
    /// will ever arrive.
    fn receive(&mut self) -> Result<(InterfaceId, Vec<u8>), LinkError>;

    /// Sends a complete Ethernet frame out of `iface`.
    fn transmit(&mut self, iface: InterfaceId, frame: &[u8]) -> Result<(), LinkError>;

    fn link_addr(&self, iface: InterfaceId) -> Result<MacAddr, LinkError>;

    fn protocol_addr(&self, iface: InterfaceId) -> Result<Ipv4Addr, LinkError>;

    fn interface_count(&self) -> usize;
}

/// Looks up an interface's addresses, shared by the link layer implementations.
fn addrs_of(addrs: &[InterfaceAddrs], iface: InterfaceId) -> Result<&InterfaceAddrs, LinkError> {
    addrs
        .get(iface.0)
        .ok_or(LinkError::UnknownInterface(iface))
}
