use super::{addrs_of, InterfaceAddrs, InterfaceId, LinkLayer};
use crate::errors::LinkError;
use crossbeam::channel::{unbounded, Receiver, Sender};
use ipfwd_packets::MacAddr;
use std::net::Ipv4Addr;

/// A link layer made of channels: every interface shares one ingress channel tagged with the
/// interface id and has its own egress channel.
pub struct ChannelLinks {
    ingress: Receiver<(InterfaceId, Vec<u8>)>,
    egress: Vec<Sender<Vec<u8>>>,
    addrs: Vec<InterfaceAddrs>,
}

impl ChannelLinks {
    pub fn new(
        ingress: Receiver<(InterfaceId, Vec<u8>)>,
        egress: Vec<Sender<Vec<u8>>>,
        addrs: Vec<InterfaceAddrs>,
    ) -> Self {
        assert_eq!(
            egress.len(),
            addrs.len(),
            "Every interface needs exactly one egress channel"
        );
        ChannelLinks {
            ingress,
            egress,
            addrs,
        }
    }

    /// Builds unbounded channels for the given interfaces. Returns the link layer, the sender
    /// that feeds it frames, and one receiver per interface for what it transmits.
    pub fn pair(
        addrs: Vec<InterfaceAddrs>,
    ) -> (
        ChannelLinks,
        Sender<(InterfaceId, Vec<u8>)>,
        Vec<Receiver<Vec<u8>>>,
    ) {
        let (ingress_sender, ingress_receiver) = unbounded();
        let (egress_senders, egress_receivers): (Vec<_>, Vec<_>) =
            addrs.iter().map(|_| unbounded()).unzip();
        (
            ChannelLinks::new(ingress_receiver, egress_senders, addrs),
            ingress_sender,
            egress_receivers,
        )
    }
}

impl LinkLayer for ChannelLinks {
    fn receive(&mut self) -> Result<(InterfaceId, Vec<u8>), LinkError> {
        self.ingress.recv().map_err(|_| LinkError::Closed)
    }

    fn transmit(&mut self, iface: InterfaceId, frame: &[u8]) -> Result<(), LinkError> {
        self.egress
            .get(iface.0)
            .ok_or(LinkError::UnknownInterface(iface))?
            .send(frame.to_vec())
            .map_err(|_| LinkError::Closed)
    }

    fn link_addr(&self, iface: InterfaceId) -> Result<MacAddr, LinkError> {
        addrs_of(&self.addrs, iface).map(|addrs| addrs.mac)
    }

    fn protocol_addr(&self, iface: InterfaceId) -> Result<Ipv4Addr, LinkError> {
        addrs_of(&self.addrs, iface).map(|addrs| addrs.ip)
    }

    fn interface_count(&self) -> usize {
        self.addrs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn links() -> (
        ChannelLinks,
        Sender<(InterfaceId, Vec<u8>)>,
        Vec<Receiver<Vec<u8>>>,
    ) {
        ChannelLinks::pair(vec![
            InterfaceAddrs::new(MacAddr::new([2, 0, 0, 0, 0, 1]), Ipv4Addr::new(10, 0, 0, 1)),
            InterfaceAddrs::new(MacAddr::new([2, 0, 0, 0, 0, 2]), Ipv4Addr::new(10, 0, 1, 1)),
        ])
    }

    #[test]
    fn receive_preserves_interface_and_order() {
        let (mut links, ingress, _egress) = links();
        ingress.send((InterfaceId(1), vec![1, 2, 3])).unwrap();
        ingress.send((InterfaceId(0), vec![4])).unwrap();

        assert_eq!(links.receive().unwrap(), (InterfaceId(1), vec![1, 2, 3]));
        assert_eq!(links.receive().unwrap(), (InterfaceId(0), vec![4]));
    }

    #[test]
    fn receive_reports_closed_once_senders_are_gone() {
        let (mut links, ingress, _egress) = links();
        drop(ingress);
        match links.receive() {
            Err(LinkError::Closed) => {}
            other => panic!("Expected Closed, got {:?}", other),
        }
    }

    #[test]
    fn transmit_goes_to_the_named_interface() {
        let (mut links, _ingress, egress) = links();
        links.transmit(InterfaceId(1), &[9, 9]).unwrap();

        assert!(egress[0].try_recv().is_err());
        assert_eq!(egress[1].try_recv().unwrap(), vec![9, 9]);
    }

    #[test]
    fn unknown_interface_is_an_error() {
        let (mut links, _ingress, _egress) = links();
        match links.transmit(InterfaceId(2), &[0]) {
            Err(LinkError::UnknownInterface(InterfaceId(2))) => {}
            other => panic!("Expected UnknownInterface, got {:?}", other),
        }
        assert!(links.link_addr(InterfaceId(2)).is_err());
        assert!(links.protocol_addr(InterfaceId(5)).is_err());
    }

    #[test]
    fn addresses_and_count() {
        let (links, _ingress, _egress) = links();
        assert_eq!(links.interface_count(), 2);
        assert_eq!(
            links.link_addr(InterfaceId(1)).unwrap(),
            MacAddr::new([2, 0, 0, 0, 0, 2])
        );
        assert_eq!(
            links.protocol_addr(InterfaceId(0)).unwrap(),
            Ipv4Addr::new(10, 0, 0, 1)
        );
    }
}
