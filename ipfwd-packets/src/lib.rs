//! Wire formats handled by the forwarding node. Every packet type wraps an owned `Vec<u8>` and
//! exposes getters/setters over the fixed header layout, in network byte order. Constructors
//! check buffer lengths up front so the accessors never index out of bounds.

mod types;
pub use self::types::*;

mod checksum;
pub use self::checksum::*;

mod ethernet;
pub use self::ethernet::*;

mod ipv4;
pub use self::ipv4::*;

mod arp;
pub use self::arp::*;

mod icmp;
pub use self::icmp::*;
