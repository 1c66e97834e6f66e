//! Static routes and longest-prefix-match lookup.

mod loader;
mod table;

pub use self::table::*;
