use super::{addrs_of, InterfaceAddrs, InterfaceId, LinkLayer};
use crate::errors::LinkError;
use afpacket::{poll_readable, BoundSocket, Socket};
use ipfwd_packets::MacAddr;
use std::collections::VecDeque;
use std::ffi::CString;
use std::net::Ipv4Addr;
use tracing::{debug, info};

/// Large enough for any frame the kernel hands an `AF_PACKET` socket, offloads included.
const RECV_BUFFER_LEN: usize = 65536;

/// Raw `AF_PACKET` sockets, one per NIC, multiplexed with `poll(2)`.
pub struct AfPacketLinks {
    sockets: Vec<BoundSocket>,
    addrs: Vec<InterfaceAddrs>,
    ready: VecDeque<usize>,
    buffer: Vec<u8>,
}

impl AfPacketLinks {
    /// Binds a socket to each named interface and reads its hardware and IPv4 addresses. The
    /// position of a name in `names` becomes its `InterfaceId`.
    pub fn open<S: AsRef<str>>(names: &[S], promiscuous: bool) -> Result<Self, LinkError> {
        let mut sockets = Vec::with_capacity(names.len());
        let mut addrs = Vec::with_capacity(names.len());
        for (index, name) in names.iter().enumerate() {
            let name = name.as_ref();
            let c_name =
                CString::new(name).map_err(|_| LinkError::BadInterfaceName(name.to_owned()))?;
            let mut socket = Socket::new()?.bind(&c_name)?;
            if promiscuous {
                socket.set_promiscuous(true)?;
            }
            let iface_addrs =
                InterfaceAddrs::new(MacAddr::new(socket.hardware_addr()?), socket.ipv4_addr()?);
            info!(
                "{} is {}: {} {}",
                InterfaceId(index),
                name,
                iface_addrs.mac,
                iface_addrs.ip
            );
            sockets.push(socket);
            addrs.push(iface_addrs);
        }
        Ok(AfPacketLinks {
            sockets,
            addrs,
            ready: VecDeque::new(),
            buffer: vec![0; RECV_BUFFER_LEN],
        })
    }
}

impl LinkLayer for AfPacketLinks {
    fn receive(&mut self) -> Result<(InterfaceId, Vec<u8>), LinkError> {
        loop {
            while let Some(index) = self.ready.pop_front() {
                let (len, addr) = self.sockets[index].recv(&mut self.buffer)?;
                if addr.is_outgoing() {
                    continue;
                }
                return Ok((InterfaceId(index), self.buffer[..len].to_vec()));
            }
            let ready = poll_readable(&self.sockets, None)?;
            debug!("{} interface(s) readable", ready.len());
            self.ready.extend(ready);
        }
    }

    fn transmit(&mut self, iface: InterfaceId, frame: &[u8]) -> Result<(), LinkError> {
        let socket = self
            .sockets
            .get_mut(iface.0)
            .ok_or(LinkError::UnknownInterface(iface))?;
        socket.send(frame)?;
        Ok(())
    }

    fn link_addr(&self, iface: InterfaceId) -> Result<MacAddr, LinkError> {
        addrs_of(&self.addrs, iface).map(|addrs| addrs.mac)
    }

    fn protocol_addr(&self, iface: InterfaceId) -> Result<Ipv4Addr, LinkError> {
        addrs_of(&self.addrs, iface).map(|addrs| addrs.ip)
    }

    fn interface_count(&self) -> usize {
        self.sockets.len()
    }
}
