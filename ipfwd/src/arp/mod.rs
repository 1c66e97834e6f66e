//! Address resolution for next hops.
//!
//! Per next hop the resolver moves through three states: nothing known, a request sent with
//! frames waiting in `PendingFrames`, and resolved in the `ArpTable`. A next hop leaves the
//! pending store in the same step that writes it into the table. Entries never expire and a
//! request that is never answered keeps its frames buffered, unless `pending_limit` bounds them.

mod arp_table;
pub use self::arp_table::ArpTable;

mod pending;
pub use self::pending::*;

mod resolver;
pub use self::resolver::*;
