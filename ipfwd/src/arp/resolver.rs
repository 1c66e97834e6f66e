use super::{ArpTable, PendingFrame, PendingFrames};
use crate::errors::LinkError;
use crate::link::{InterfaceId, LinkLayer};
use ipfwd_packets::{ArpFrame, ArpOp, EthernetFrame, MacAddr};
use std::net::Ipv4Addr;
use tracing::{debug, info, warn};

/// What became of a frame handed to `ArpResolver::resolve`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Resolution {
    /// The next hop was known and the frame went out.
    Sent,
    /// A request went out and the frame now waits behind `depth - 1` others.
    Queued { depth: usize },
    /// A request went out but the next hop's queue was full, so the frame was dropped.
    Overflow,
}

/// Owns the ARP cache and the frames waiting on it, and speaks ARP on the node's behalf.
#[derive(Debug, Default)]
pub struct ArpResolver {
    table: ArpTable,
    pending: PendingFrames,
}

impl ArpResolver {
    pub fn new(pending_limit: Option<usize>) -> Self {
        ArpResolver {
            table: ArpTable::new(),
            pending: PendingFrames::new(pending_limit),
        }
    }

    pub fn table(&self) -> &ArpTable {
        &self.table
    }

    pub fn pending(&self) -> &PendingFrames {
        &self.pending
    }

    ///
    /// Delivers `frame` to `next_hop` out of `egress`. With the next hop cached the destination
    /// address is filled in and the frame sent right away. Otherwise a broadcast request for the
    /// next hop is sent and the frame is buffered until the reply arrives. Every buffered frame
    /// sends its own request.
    ///
    pub fn resolve<L: LinkLayer>(
        &mut self,
        links: &mut L,
        next_hop: Ipv4Addr,
        egress: InterfaceId,
        mut frame: EthernetFrame,
    ) -> Result<Resolution, LinkError> {
        if let Some(mac) = self.table.get(next_hop) {
            frame.set_dest_mac(mac);
            links.transmit(egress, &frame.data)?;
            return Ok(Resolution::Sent);
        }

        let request = request_frame(
            links.link_addr(egress)?,
            links.protocol_addr(egress)?,
            next_hop,
        );
        links.transmit(egress, &request.frame_ref().data)?;
        debug!("Sent ARP request for {} on {}", next_hop, egress);

        match self
            .pending
            .enqueue(next_hop, PendingFrame::new(frame, egress))
        {
            Ok(depth) => Ok(Resolution::Queued { depth }),
            Err(_) => {
                warn!(
                    "Pending queue for {} is full ({:?} frames), dropping frame",
                    next_hop,
                    self.pending.limit()
                );
                Ok(Resolution::Overflow)
            }
        }
    }

    /// Answers a request that arrived on `iface` when it asks for that interface's own address.
    /// Returns whether a reply was sent.
    pub fn answer_request<L: LinkLayer>(
        &self,
        links: &mut L,
        iface: InterfaceId,
        requester_mac: MacAddr,
        requester_ip: Ipv4Addr,
        target_ip: Ipv4Addr,
    ) -> Result<bool, LinkError> {
        let local_ip = links.protocol_addr(iface)?;
        if target_ip != local_ip {
            debug!("ARP request on {} for {} is not for us", iface, target_ip);
            return Ok(false);
        }
        let reply = reply_frame(links.link_addr(iface)?, local_ip, requester_mac, requester_ip);
        links.transmit(iface, &reply.frame_ref().data)?;
        debug!("Answered ARP request from {} ({}) on {}", requester_ip, requester_mac, iface);
        Ok(true)
    }

    ///
    /// Records `addr` at `mac` from an ARP reply, then sends every frame buffered for `addr` in
    /// the order it arrived and forgets the queue. Returns the number of frames sent.
    ///
    pub fn learn<L: LinkLayer>(
        &mut self,
        links: &mut L,
        addr: Ipv4Addr,
        mac: MacAddr,
    ) -> Result<usize, LinkError> {
        if let Some(previous) = self.table.insert(addr, mac) {
            if previous != mac {
                info!("{} moved from {} to {}", addr, previous, mac);
            }
        } else {
            info!("Resolved {} to {}", addr, mac);
        }

        let queue = match self.pending.take(addr) {
            Some(queue) => queue,
            None => return Ok(0),
        };
        let flushed = queue.len();
        for PendingFrame { mut frame, egress } in queue {
            frame.set_dest_mac(mac);
            links.transmit(egress, &frame.data)?;
        }
        if flushed > 0 {
            info!("Flushed {} frames waiting on {}", flushed, addr);
        }
        Ok(flushed)
    }
}

/// A broadcast who-has for `target_ip`, sent from the egress interface's addresses.
pub fn request_frame(sender_mac: MacAddr, sender_ip: Ipv4Addr, target_ip: Ipv4Addr) -> ArpFrame {
    let mut request = ArpFrame::ethernet_ipv4(ArpOp::Request);
    request.set_sender_hardware_addr(sender_mac);
    request.set_sender_protocol_addr(sender_ip);
    request.set_target_hardware_addr(MacAddr::ZERO);
    request.set_target_protocol_addr(target_ip);

    let frame = request.frame_mut();
    frame.set_dest_mac(MacAddr::BROADCAST);
    frame.set_src_mac(sender_mac);
    request
}

/// The is-at answer to a requester, unicast back to it.
pub fn reply_frame(
    local_mac: MacAddr,
    local_ip: Ipv4Addr,
    requester_mac: MacAddr,
    requester_ip: Ipv4Addr,
) -> ArpFrame {
    let mut reply = ArpFrame::ethernet_ipv4(ArpOp::Reply);
    reply.set_sender_hardware_addr(local_mac);
    reply.set_sender_protocol_addr(local_ip);
    reply.set_target_hardware_addr(requester_mac);
    reply.set_target_protocol_addr(requester_ip);

    let frame = reply.frame_mut();
    frame.set_dest_mac(requester_mac);
    frame.set_src_mac(local_mac);
    reply
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{ChannelLinks, InterfaceAddrs};
    use crossbeam::channel::Receiver;
    use std::convert::TryFrom;

    const LOCAL_MAC: MacAddr = MacAddr {
        bytes: [2, 0, 0, 0, 0, 1],
    };
    const PEER_MAC: MacAddr = MacAddr {
        bytes: [2, 0, 0, 0, 0, 0x99],
    };

    fn local_ip() -> Ipv4Addr {
        Ipv4Addr::new(10, 0, 0, 1)
    }

    fn links() -> (ChannelLinks, Vec<Receiver<Vec<u8>>>) {
        let (links, _ingress, egress) =
            ChannelLinks::pair(vec![InterfaceAddrs::new(LOCAL_MAC, local_ip())]);
        (links, egress)
    }

    fn data_frame(tag: u8) -> EthernetFrame {
        let mut frame = EthernetFrame::empty();
        frame.set_src_mac(LOCAL_MAC);
        frame.set_payload(&[tag; 4]);
        frame
    }

    #[test]
    fn request_frame_layout() {
        let request = request_frame(LOCAL_MAC, local_ip(), Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(
            request.frame_ref().data,
            vec![
                0xff, 0xff, 0xff, 0xff, 0xff, 0xff, // broadcast
                2, 0, 0, 0, 0, 1, // local mac
                0x08, 0x06, // ARP
                0, 1, 0x08, 0x00, 6, 4, 0, 1, // ethernet/ipv4 request
                2, 0, 0, 0, 0, 1, 10, 0, 0, 1, // sender
                0, 0, 0, 0, 0, 0, 10, 0, 0, 2, // target
            ]
        );
    }

    #[test]
    fn reply_frame_addresses() {
        let reply = reply_frame(LOCAL_MAC, local_ip(), PEER_MAC, Ipv4Addr::new(10, 0, 0, 9));
        assert_eq!(reply.op(), Some(ArpOp::Reply));
        assert_eq!(reply.frame_ref().dest_mac(), PEER_MAC);
        assert_eq!(reply.frame_ref().src_mac(), LOCAL_MAC);
        assert_eq!(reply.sender_mac_addr().unwrap(), LOCAL_MAC);
        assert_eq!(reply.sender_ipv4_addr().unwrap(), local_ip());
        assert_eq!(reply.target_mac_addr().unwrap(), PEER_MAC);
        assert_eq!(reply.target_ipv4_addr().unwrap(), Ipv4Addr::new(10, 0, 0, 9));
    }

    #[test]
    fn unresolved_next_hop_requests_and_buffers() {
        let (mut links, egress) = links();
        let mut resolver = ArpResolver::new(None);
        let hop = Ipv4Addr::new(10, 0, 0, 2);

        assert_eq!(
            resolver.resolve(&mut links, hop, InterfaceId(0), data_frame(1)).unwrap(),
            Resolution::Queued { depth: 1 }
        );
        assert_eq!(
            resolver.resolve(&mut links, hop, InterfaceId(0), data_frame(2)).unwrap(),
            Resolution::Queued { depth: 2 }
        );

        for _ in 0..2 {
            let sent = EthernetFrame::from_buffer(egress[0].try_recv().unwrap()).unwrap();
            let request = ArpFrame::try_from(sent).unwrap();
            assert_eq!(request.op(), Some(ArpOp::Request));
            assert_eq!(request.target_ipv4_addr().unwrap(), hop);
        }
        assert!(egress[0].try_recv().is_err());
        assert_eq!(resolver.pending().depth(hop), 2);
        assert!(!resolver.table().contains_key(hop));
    }

    #[test]
    fn learn_flushes_in_order() {
        let (mut links, egress) = links();
        let mut resolver = ArpResolver::new(None);
        let hop = Ipv4Addr::new(10, 0, 0, 2);
        for tag in 1..=3 {
            resolver
                .resolve(&mut links, hop, InterfaceId(0), data_frame(tag))
                .unwrap();
        }
        while egress[0].try_recv().is_ok() {}

        assert_eq!(resolver.learn(&mut links, hop, PEER_MAC).unwrap(), 3);
        for tag in 1..=3 {
            let mut expected = data_frame(tag);
            expected.set_dest_mac(PEER_MAC);
            assert_eq!(egress[0].try_recv().unwrap(), expected.data);
        }
        assert!(egress[0].try_recv().is_err());
        assert!(!resolver.pending().contains_key(hop));
        assert_eq!(resolver.table().get(hop), Some(PEER_MAC));
    }

    #[test]
    fn cached_next_hop_sends_without_request() {
        let (mut links, egress) = links();
        let mut resolver = ArpResolver::new(None);
        let hop = Ipv4Addr::new(10, 0, 0, 2);
        assert_eq!(resolver.learn(&mut links, hop, PEER_MAC).unwrap(), 0);

        for _ in 0..2 {
            assert_eq!(
                resolver.resolve(&mut links, hop, InterfaceId(0), data_frame(7)).unwrap(),
                Resolution::Sent
            );
            let sent = EthernetFrame::from_buffer(egress[0].try_recv().unwrap()).unwrap();
            assert_eq!(sent.dest_mac(), PEER_MAC);
            assert_eq!(sent.ether_type(), 0);
        }
        assert!(egress[0].try_recv().is_err());
    }

    #[test]
    fn overflow_still_requests() {
        let (mut links, egress) = links();
        let mut resolver = ArpResolver::new(Some(1));
        let hop = Ipv4Addr::new(10, 0, 0, 2);

        resolver
            .resolve(&mut links, hop, InterfaceId(0), data_frame(1))
            .unwrap();
        assert_eq!(
            resolver.resolve(&mut links, hop, InterfaceId(0), data_frame(2)).unwrap(),
            Resolution::Overflow
        );
        assert_eq!(egress[0].try_iter().count(), 2);
        assert_eq!(resolver.pending().depth(hop), 1);
    }

    #[test]
    fn answers_only_requests_for_our_address() {
        let (mut links, egress) = links();
        let resolver = ArpResolver::new(None);
        let peer_ip = Ipv4Addr::new(10, 0, 0, 9);

        let elsewhere = Ipv4Addr::new(10, 0, 0, 3);
        assert!(!resolver
            .answer_request(&mut links, InterfaceId(0), PEER_MAC, peer_ip, elsewhere)
            .unwrap());
        assert!(egress[0].try_recv().is_err());

        assert!(resolver
            .answer_request(&mut links, InterfaceId(0), PEER_MAC, peer_ip, local_ip())
            .unwrap());
        let sent = egress[0].try_recv().unwrap();
        assert_eq!(
            sent,
            reply_frame(LOCAL_MAC, local_ip(), PEER_MAC, peer_ip)
                .frame()
                .data
        );
        assert!(resolver.table().is_empty());
    }
}
