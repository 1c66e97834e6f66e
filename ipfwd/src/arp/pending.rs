use crate::link::InterfaceId;
use ipfwd_packets::EthernetFrame;
use std::collections::{HashMap, VecDeque};
use std::net::Ipv4Addr;

/// A forwarded frame waiting for its next hop's link address. The source address is already
/// rewritten; only the destination is missing.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PendingFrame {
    pub frame: EthernetFrame,
    pub egress: InterfaceId,
}

impl PendingFrame {
    pub fn new(frame: EthernetFrame, egress: InterfaceId) -> Self {
        PendingFrame { frame, egress }
    }
}

/// FIFO queues of frames keyed by the unresolved next hop they wait on.
#[derive(Clone, Debug, Default)]
pub struct PendingFrames {
    queues: HashMap<Ipv4Addr, VecDeque<PendingFrame>>,
    limit: Option<usize>,
}

impl PendingFrames {
    /// `limit` bounds each next hop's queue. `None` lets queues grow without bound.
    pub fn new(limit: Option<usize>) -> Self {
        PendingFrames {
            queues: HashMap::new(),
            limit,
        }
    }

    /// Appends `pending` to the queue for `next_hop`, creating the queue if needed, and returns
    /// the new depth. A full queue hands the frame back.
    pub fn enqueue(
        &mut self,
        next_hop: Ipv4Addr,
        pending: PendingFrame,
    ) -> Result<usize, PendingFrame> {
        let queue = self.queues.entry(next_hop).or_insert_with(VecDeque::new);
        if let Some(limit) = self.limit {
            if queue.len() >= limit {
                return Err(pending);
            }
        }
        queue.push_back(pending);
        Ok(queue.len())
    }

    /// Removes the whole entry for `next_hop`, handing back its frames in arrival order.
    pub fn take(&mut self, next_hop: Ipv4Addr) -> Option<VecDeque<PendingFrame>> {
        self.queues.remove(&next_hop)
    }

    pub fn contains_key(&self, next_hop: Ipv4Addr) -> bool {
        self.queues.contains_key(&next_hop)
    }

    /// Number of frames waiting on `next_hop`.
    pub fn depth(&self, next_hop: Ipv4Addr) -> usize {
        self.queues.get(&next_hop).map_or(0, VecDeque::len)
    }

    /// Number of next hops with a queue.
    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }
}
