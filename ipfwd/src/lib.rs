//! A static IPv4 forwarding node.
//!
//! Frames come in through a [`link::LinkLayer`], one at a time. IPv4 packets are checked,
//! aged, routed by longest prefix match and sent to their next hop once ARP knows its link
//! address; the node answers with ICMP when a packet expires, has no route, or pings the node
//! itself. ARP requests for the node's own addresses are answered and ARP replies release any
//! frames waiting on the sender.

pub mod arp;
pub mod classifier;
pub mod config;
pub mod errors;
pub mod icmp;
pub mod link;
pub mod logging;
pub mod route;

mod router;
pub use self::router::*;

pub use self::config::RouterConfig;
pub use self::errors::{LinkError, RouteError, RouterError};
