use crate::errors::RouteError;
use crate::link::InterfaceId;
use std::net::Ipv4Addr;

/// Upper bound on the number of routes a table may hold.
pub const MAX_ROUTES: usize = 100_000;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RouteEntry {
    pub prefix: Ipv4Addr,
    pub mask: Ipv4Addr,
    pub next_hop: Ipv4Addr,
    pub interface: InterfaceId,
}

impl RouteEntry {
    pub fn new(
        prefix: Ipv4Addr,
        mask: Ipv4Addr,
        next_hop: Ipv4Addr,
        interface: InterfaceId,
    ) -> Self {
        RouteEntry {
            prefix,
            mask,
            next_hop,
            interface,
        }
    }

    /// Whether `dest` falls inside this route's prefix under its mask.
    pub fn matches(&self, dest: Ipv4Addr) -> bool {
        let mask = u32::from(self.mask);
        u32::from(self.prefix) & mask == u32::from(dest) & mask
    }
}

/// An ordered list of routes. Lookup is a linear scan; among matching entries the numerically
/// largest mask wins, and the earliest entry wins a tie.
#[derive(Clone, Debug, Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    pub fn new(entries: Vec<RouteEntry>) -> Result<Self, RouteError> {
        if entries.len() > MAX_ROUTES {
            return Err(RouteError::Capacity { limit: MAX_ROUTES });
        }
        Ok(RouteTable { entries })
    }

    pub fn lookup(&self, dest: Ipv4Addr) -> Option<RouteEntry> {
        let mut best: Option<&RouteEntry> = None;
        for entry in self.entries.iter().filter(|entry| entry.matches(dest)) {
            match best {
                Some(current) if u32::from(current.mask) >= u32::from(entry.mask) => {}
                _ => best = Some(entry),
            }
        }
        best.copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{thread_rng, Rng};

    fn route(prefix: [u8; 4], mask: [u8; 4], next_hop: [u8; 4], iface: usize) -> RouteEntry {
        RouteEntry::new(
            prefix.into(),
            mask.into(),
            next_hop.into(),
            InterfaceId(iface),
        )
    }

    #[test]
    fn longest_prefix_wins() {
        let table = RouteTable::new(vec![
            route([10, 0, 0, 0], [255, 255, 0, 0], [10, 0, 0, 254], 0),
            route([10, 0, 1, 0], [255, 255, 255, 0], [10, 0, 1, 254], 1),
        ])
        .unwrap();

        let hit = table.lookup(Ipv4Addr::new(10, 0, 1, 5)).unwrap();
        assert_eq!(hit.next_hop, Ipv4Addr::new(10, 0, 1, 254));
        assert_eq!(hit.interface, InterfaceId(1));

        let hit = table.lookup(Ipv4Addr::new(10, 0, 2, 5)).unwrap();
        assert_eq!(hit.interface, InterfaceId(0));
    }

    #[test]
    fn order_does_not_beat_mask_length() {
        let table = RouteTable::new(vec![
            route([10, 0, 1, 0], [255, 255, 255, 0], [10, 0, 1, 254], 1),
            route([10, 0, 0, 0], [255, 255, 0, 0], [10, 0, 0, 254], 0),
        ])
        .unwrap();
        assert_eq!(
            table.lookup(Ipv4Addr::new(10, 0, 1, 5)).unwrap().interface,
            InterfaceId(1)
        );
    }

    #[test]
    fn first_entry_wins_a_tie() {
        let table = RouteTable::new(vec![
            route([192, 168, 0, 0], [255, 255, 255, 0], [192, 168, 0, 1], 0),
            route([192, 168, 0, 0], [255, 255, 255, 0], [192, 168, 0, 2], 1),
        ])
        .unwrap();
        assert_eq!(
            table.lookup(Ipv4Addr::new(192, 168, 0, 77)).unwrap().next_hop,
            Ipv4Addr::new(192, 168, 0, 1)
        );
    }

    #[test]
    fn no_match() {
        let table = RouteTable::new(vec![route(
            [10, 0, 0, 0],
            [255, 0, 0, 0],
            [10, 0, 0, 1],
            0,
        )])
        .unwrap();
        assert_eq!(table.lookup(Ipv4Addr::new(11, 0, 0, 1)), None);
        assert_eq!(RouteTable::default().lookup(Ipv4Addr::new(10, 0, 0, 1)), None);
    }

    #[test]
    fn default_route_matches_everything() {
        let table = RouteTable::new(vec![
            route([0, 0, 0, 0], [0, 0, 0, 0], [172, 16, 0, 1], 2),
            route([10, 0, 0, 0], [255, 0, 0, 0], [10, 0, 0, 1], 0),
        ])
        .unwrap();
        assert_eq!(
            table.lookup(Ipv4Addr::new(8, 8, 8, 8)).unwrap().interface,
            InterfaceId(2)
        );
        assert_eq!(
            table.lookup(Ipv4Addr::new(10, 9, 9, 9)).unwrap().interface,
            InterfaceId(0)
        );
    }

    #[test]
    fn prefix_bits_outside_the_mask_are_ignored() {
        let table = RouteTable::new(vec![route(
            [10, 0, 1, 77],
            [255, 255, 255, 0],
            [10, 0, 1, 1],
            0,
        )])
        .unwrap();
        assert!(table.lookup(Ipv4Addr::new(10, 0, 1, 200)).is_some());
    }

    #[test]
    fn too_many_routes() {
        let entries = vec![route([10, 0, 0, 0], [255, 0, 0, 0], [10, 0, 0, 1], 0); MAX_ROUTES + 1];
        match RouteTable::new(entries) {
            Err(RouteError::Capacity { limit }) => assert_eq!(limit, MAX_ROUTES),
            other => panic!("Expected a capacity error, got {:?}", other),
        }
    }

    #[test]
    fn random_lookups_pick_a_longest_match() {
        let mut rng = thread_rng();
        for _ in 0..100 {
            let entries: Vec<RouteEntry> = (0..50)
                .map(|i| {
                    let len: u32 = rng.gen_range(0, 33);
                    let mask = if len == 0 { 0 } else { !0u32 << (32 - len) };
                    RouteEntry::new(
                        Ipv4Addr::from(rng.gen::<u32>() & mask),
                        Ipv4Addr::from(mask),
                        Ipv4Addr::from(rng.gen::<u32>()),
                        InterfaceId(i),
                    )
                })
                .collect();
            let table = RouteTable::new(entries.clone()).unwrap();

            for _ in 0..100 {
                let dest = Ipv4Addr::from(rng.gen::<u32>());
                let longest = entries
                    .iter()
                    .filter(|entry| entry.matches(dest))
                    .map(|entry| u32::from(entry.mask))
                    .max();
                match table.lookup(dest) {
                    Some(hit) => {
                        assert!(hit.matches(dest));
                        assert_eq!(Some(u32::from(hit.mask)), longest);
                        let first = entries
                            .iter()
                            .find(|entry| entry.matches(dest) && entry.mask == hit.mask)
                            .unwrap();
                        assert_eq!(first.interface, hit.interface);
                    }
                    None => assert_eq!(longest, None),
                }
            }
        }
    }
}
