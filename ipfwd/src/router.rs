use crate::arp::{ArpResolver, ArpTable, PendingFrames, Resolution};
use crate::classifier::{Classifier, ClassifyEtherType, EtherClass};
use crate::config::RouterConfig;
use crate::errors::{LinkError, RouterError};
use crate::icmp::IcmpGenerator;
use crate::link::{InterfaceId, LinkLayer};
use crate::route::RouteTable;
use ipfwd_packets::{ArpFrame, ArpOp, EthernetFrame, IcmpPacket, IpProtocol, Ipv4Packet, MacAddr};
use std::convert::TryFrom;
use std::net::Ipv4Addr;
use tracing::{debug, info, warn};

/// Why a frame was discarded without any reply.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DropReason {
    /// Too short, or an IPv4 header that does not parse.
    Malformed,
    BadChecksum,
    UnknownEtherType(u16),
    /// ARP for something other than Ethernet and IPv4.
    UnsupportedArp,
    UnknownArpOp(u16),
    /// An ARP request for an address that is not the receiving interface's.
    NotForUs,
    /// The next hop's pending queue was full. The ARP request was still sent.
    QueueFull,
}

/// What the engine did with one received frame.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Verdict {
    Forwarded {
        egress: InterfaceId,
        next_hop: Ipv4Addr,
    },
    /// Buffered behind an ARP request for `next_hop`.
    Queued {
        egress: InterfaceId,
        next_hop: Ipv4Addr,
        depth: usize,
    },
    TimeExceeded,
    Unreachable,
    EchoReplied,
    ArpReplied,
    /// An ARP reply taught us `addr`, releasing `flushed` buffered frames.
    ArpResolved {
        addr: Ipv4Addr,
        flushed: usize,
    },
    Dropped(DropReason),
}

/// The forwarding engine. Frames are handled one at a time and to completion, so the route
/// table, ARP cache and pending store need no locking.
pub struct Router<L: LinkLayer> {
    links: L,
    routes: RouteTable,
    resolver: ArpResolver,
    icmp: IcmpGenerator,
    classifier: ClassifyEtherType,
    config: RouterConfig,
}

impl<L: LinkLayer> Router<L> {
    /// Fails if a route leaves through an interface the link layer does not have.
    pub fn new(links: L, routes: RouteTable, config: RouterConfig) -> Result<Self, RouterError> {
        let interfaces = links.interface_count();
        for (route, entry) in routes.iter().enumerate() {
            if entry.interface.0 >= interfaces {
                return Err(RouterError::UnknownInterface {
                    route,
                    iface: entry.interface,
                });
            }
        }
        info!(
            "Forwarding between {} interfaces with {} routes",
            interfaces,
            routes.len()
        );

        Ok(Router {
            links,
            routes,
            resolver: ArpResolver::new(config.pending_limit),
            icmp: IcmpGenerator::from_config(&config),
            classifier: ClassifyEtherType,
            config,
        })
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn arp_table(&self) -> &ArpTable {
        self.resolver.table()
    }

    pub fn pending(&self) -> &PendingFrames {
        self.resolver.pending()
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn links(&self) -> &L {
        &self.links
    }

    /// Receives and handles frames until the link layer closes or fails.
    pub fn run(&mut self) -> Result<(), RouterError> {
        loop {
            let (iface, data) = match self.links.receive() {
                Ok(received) => received,
                Err(LinkError::Closed) => {
                    info!("Link layer closed, stopping");
                    return Ok(());
                }
                Err(error) => return Err(error.into()),
            };
            let verdict = self.handle_frame(iface, data)?;
            debug!(%iface, ?verdict, "handled frame");
        }
    }

    /// Runs one frame received on `iface` through the engine. Errors are link layer failures
    /// only; anything wrong with the frame itself shows up in the verdict.
    pub fn handle_frame(
        &mut self,
        iface: InterfaceId,
        data: Vec<u8>,
    ) -> Result<Verdict, RouterError> {
        if iface.0 >= self.links.interface_count() {
            return Err(LinkError::UnknownInterface(iface).into());
        }
        let frame = match EthernetFrame::from_buffer(data) {
            Ok(frame) => frame,
            Err(reason) => return Ok(malformed(iface, reason)),
        };

        match self.classifier.classify(&frame) {
            EtherClass::Ipv4 => self.handle_ipv4(iface, frame),
            EtherClass::Arp => self.handle_arp(iface, frame),
            EtherClass::Other(ether_type) => {
                debug!("Ignoring EtherType {:#06x} on {}", ether_type, iface);
                Ok(Verdict::Dropped(DropReason::UnknownEtherType(ether_type)))
            }
        }
    }

    fn handle_ipv4(
        &mut self,
        iface: InterfaceId,
        frame: EthernetFrame,
    ) -> Result<Verdict, RouterError> {
        let sender = frame.src_mac();
        let mut packet = match Ipv4Packet::try_from(frame) {
            Ok(packet) => packet,
            Err(reason) => return Ok(malformed(iface, reason)),
        };
        if !packet.validate_checksum() {
            debug!("Bad header checksum from {} on {}", packet.src_addr(), iface);
            return Ok(Verdict::Dropped(DropReason::BadChecksum));
        }

        let local_mac = self.links.link_addr(iface)?;
        if packet.ttl() <= 1 {
            debug!("TTL expired for {} -> {}", packet.src_addr(), packet.dest_addr());
            let reply = self.icmp.time_exceeded(&packet, sender, local_mac);
            self.links.transmit(iface, &reply.data)?;
            return Ok(Verdict::TimeExceeded);
        }
        packet.decrement_ttl();

        let route = match self.routes.lookup(packet.dest_addr()) {
            Some(route) => route,
            None => {
                debug!("No route to {}", packet.dest_addr());
                let reply = self.icmp.destination_unreachable(&packet, sender, local_mac);
                self.links.transmit(iface, &reply.data)?;
                return Ok(Verdict::Unreachable);
            }
        };

        if packet.dest_addr() == self.links.protocol_addr(iface)? {
            if let Some(request) = echo_request(&packet) {
                debug!("Echo request from {} on {}", packet.src_addr(), iface);
                let reply = self.icmp.echo_reply(&packet, &request, sender, local_mac);
                self.links.transmit(iface, &reply.data)?;
                return Ok(Verdict::EchoReplied);
            }
        }

        let mut frame = match EthernetFrame::try_from(packet) {
            Ok(frame) => frame,
            Err(reason) => return Ok(malformed(iface, reason)),
        };
        frame.set_src_mac(self.links.link_addr(route.interface)?);

        let egress = route.interface;
        let next_hop = route.next_hop;
        let verdict = match self
            .resolver
            .resolve(&mut self.links, next_hop, egress, frame)?
        {
            Resolution::Sent => Verdict::Forwarded { egress, next_hop },
            Resolution::Queued { depth } => Verdict::Queued {
                egress,
                next_hop,
                depth,
            },
            Resolution::Overflow => Verdict::Dropped(DropReason::QueueFull),
        };
        Ok(verdict)
    }

    fn handle_arp(
        &mut self,
        iface: InterfaceId,
        frame: EthernetFrame,
    ) -> Result<Verdict, RouterError> {
        let arp = match ArpFrame::try_from(frame) {
            Ok(arp) => arp,
            Err(reason) => return Ok(malformed(iface, reason)),
        };
        if !arp.is_ethernet_ipv4() {
            debug!(
                "Ignoring ARP for hardware {:#06x} protocol {:#06x} on {}",
                arp.hardware_type(),
                arp.protocol_type(),
                iface
            );
            return Ok(Verdict::Dropped(DropReason::UnsupportedArp));
        }
        let (sender_mac, sender_ip, target_ip) = match arp_addrs(&arp) {
            Ok(addrs) => addrs,
            Err(reason) => return Ok(malformed(iface, reason)),
        };

        let verdict = match arp.op() {
            Some(ArpOp::Request) => {
                let replied = self.resolver.answer_request(
                    &mut self.links,
                    iface,
                    sender_mac,
                    sender_ip,
                    target_ip,
                )?;
                if replied {
                    Verdict::ArpReplied
                } else {
                    Verdict::Dropped(DropReason::NotForUs)
                }
            }
            Some(ArpOp::Reply) => {
                let flushed = self.resolver.learn(&mut self.links, sender_ip, sender_mac)?;
                Verdict::ArpResolved {
                    addr: sender_ip,
                    flushed,
                }
            }
            None => {
                debug!("Ignoring ARP opcode {} on {}", arp.opcode(), iface);
                Verdict::Dropped(DropReason::UnknownArpOp(arp.opcode()))
            }
        };
        Ok(verdict)
    }
}

fn malformed(iface: InterfaceId, reason: &str) -> Verdict {
    warn!("Dropping malformed frame on {}: {}", iface, reason);
    Verdict::Dropped(DropReason::Malformed)
}

/// The ICMP echo request carried by `packet`, if that is what it carries.
fn echo_request(packet: &Ipv4Packet) -> Option<IcmpPacket> {
    if packet.protocol() != IpProtocol::ICMP {
        return None;
    }
    IcmpPacket::try_from(packet.clone())
        .ok()
        .filter(IcmpPacket::is_echo_request)
}

fn arp_addrs(arp: &ArpFrame) -> Result<(MacAddr, Ipv4Addr, Ipv4Addr), &'static str> {
    Ok((
        arp.sender_mac_addr()?,
        arp.sender_ipv4_addr()?,
        arp.target_ipv4_addr()?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{ChannelLinks, InterfaceAddrs};
    use crate::route::RouteEntry;

    fn links() -> ChannelLinks {
        let (links, _ingress, _egress) = ChannelLinks::pair(vec![
            InterfaceAddrs::new(MacAddr::new([2, 0, 0, 0, 0, 1]), Ipv4Addr::new(10, 0, 0, 1)),
            InterfaceAddrs::new(MacAddr::new([2, 0, 0, 0, 0, 2]), Ipv4Addr::new(10, 0, 1, 1)),
        ]);
        links
    }

    #[test]
    fn rejects_routes_through_missing_interfaces() {
        let routes = RouteTable::new(vec![
            RouteEntry::new(
                Ipv4Addr::new(10, 0, 0, 0),
                Ipv4Addr::new(255, 255, 255, 0),
                Ipv4Addr::new(10, 0, 0, 2),
                InterfaceId(1),
            ),
            RouteEntry::new(
                Ipv4Addr::new(10, 0, 2, 0),
                Ipv4Addr::new(255, 255, 255, 0),
                Ipv4Addr::new(10, 0, 2, 2),
                InterfaceId(2),
            ),
        ])
        .unwrap();

        match Router::new(links(), routes, RouterConfig::default()) {
            Err(RouterError::UnknownInterface { route, iface }) => {
                assert_eq!(route, 1);
                assert_eq!(iface, InterfaceId(2));
            }
            Err(other) => panic!("Expected UnknownInterface, got {:?}", other),
            Ok(_) => panic!("Expected UnknownInterface, got a router"),
        }
    }

    #[test]
    fn frames_from_unknown_interfaces_are_errors() {
        let mut router =
            Router::new(links(), RouteTable::default(), RouterConfig::default()).unwrap();
        match router.handle_frame(InterfaceId(9), vec![0; 64]) {
            Err(RouterError::Link(LinkError::UnknownInterface(InterfaceId(9)))) => {}
            other => panic!("Expected an unknown interface error, got {:?}", other),
        }
    }

    #[test]
    fn runt_frames_are_malformed() {
        let mut router =
            Router::new(links(), RouteTable::default(), RouterConfig::default()).unwrap();
        assert_eq!(
            router.handle_frame(InterfaceId(0), vec![0; 13]).unwrap(),
            Verdict::Dropped(DropReason::Malformed)
        );
    }

    #[test]
    fn config_reaches_the_pending_store() {
        let config = RouterConfig::default().pending_limit(Some(4));
        let router = Router::new(links(), RouteTable::default(), config).unwrap();
        assert_eq!(router.pending().limit(), Some(4));
        assert_eq!(router.config(), &config);
        assert!(router.arp_table().is_empty());
        assert!(router.routes().is_empty());
    }
}
