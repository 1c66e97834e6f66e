/// Tunables of the forwarding engine. Every setter consumes and returns the config so they
/// chain off `RouterConfig::default()`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RouterConfig {
    /// TTL of the ICMP messages the node generates.
    pub icmp_ttl: u8,
    /// IP identification of the ICMP messages the node generates.
    pub icmp_identification: u16,
    /// Most frames buffered per unresolved next hop. `None` buffers without bound.
    pub pending_limit: Option<usize>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        RouterConfig {
            icmp_ttl: 64,
            icmp_identification: 1,
            pending_limit: None,
        }
    }
}

impl RouterConfig {
    pub fn icmp_ttl(self, icmp_ttl: u8) -> Self {
        RouterConfig { icmp_ttl, ..self }
    }

    pub fn icmp_identification(self, icmp_identification: u16) -> Self {
        RouterConfig {
            icmp_identification,
            ..self
        }
    }

    pub fn pending_limit(self, pending_limit: Option<usize>) -> Self {
        RouterConfig {
            pending_limit,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RouterConfig::default();
        assert_eq!(config.icmp_ttl, 64);
        assert_eq!(config.icmp_identification, 1);
        assert_eq!(config.pending_limit, None);
    }

    #[test]
    fn setters_chain() {
        let config = RouterConfig::default()
            .icmp_ttl(128)
            .pending_limit(Some(8))
            .icmp_identification(0xbeef);
        assert_eq!(
            config,
            RouterConfig {
                icmp_ttl: 128,
                icmp_identification: 0xbeef,
                pending_limit: Some(8),
            }
        );
    }
}
