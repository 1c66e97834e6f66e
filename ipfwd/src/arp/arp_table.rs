use ipfwd_packets::MacAddr;
use std::collections::HashMap;
use std::net::Ipv4Addr;

/// Mappings between IPv4 addresses and 48-bit Ethernet addresses, written only from ARP replies.
#[derive(Clone, Debug, Default)]
pub struct ArpTable {
    ipv4_mac_translations: HashMap<Ipv4Addr, MacAddr>,
}

impl ArpTable {
    pub fn new() -> Self {
        ArpTable {
            ipv4_mac_translations: HashMap::new(),
        }
    }

    pub fn contains_key(&self, addr: Ipv4Addr) -> bool {
        self.ipv4_mac_translations.contains_key(&addr)
    }

    pub fn get(&self, addr: Ipv4Addr) -> Option<MacAddr> {
        self.ipv4_mac_translations.get(&addr).copied()
    }

    /// Records a translation, returning the one it replaced.
    pub fn insert(&mut self, addr: Ipv4Addr, mac: MacAddr) -> Option<MacAddr> {
        self.ipv4_mac_translations.insert(addr, mac)
    }

    pub fn len(&self) -> usize {
        self.ipv4_mac_translations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ipv4_mac_translations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_overwrite() {
        let mut table = ArpTable::new();
        let addr = Ipv4Addr::new(10, 0, 0, 2);
        let first = MacAddr::new([0xa, 0, 0, 0, 0, 1]);
        let second = MacAddr::new([0xa, 0, 0, 0, 0, 2]);

        assert!(table.is_empty());
        assert_eq!(table.get(addr), None);
        assert_eq!(table.insert(addr, first), None);
        assert!(table.contains_key(addr));
        assert_eq!(table.insert(addr, second), Some(first));
        assert_eq!(table.get(addr), Some(second));
        assert_eq!(table.len(), 1);
    }
}
