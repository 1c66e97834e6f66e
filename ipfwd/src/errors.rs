use crate::link::InterfaceId;
use failure::Fail;
use std::io;

/// Problems loading the route table. All of them are fatal at startup.
#[derive(Debug, Fail)]
pub enum RouteError {
    #[fail(display = "could not read route table: {}", _0)]
    Io(#[cause] io::Error),

    #[fail(display = "route table line {}: {}", line, reason)]
    Parse { line: usize, reason: String },

    #[fail(display = "route table holds more than {} entries", limit)]
    Capacity { limit: usize },
}

/// Failures of the link layer. Any of these ends the forwarding loop.
#[derive(Debug, Fail)]
pub enum LinkError {
    #[fail(display = "link I/O failed: {}", _0)]
    Io(#[cause] io::Error),

    #[fail(display = "{:?} is not a usable interface name", _0)]
    BadInterfaceName(String),

    #[fail(display = "no such interface: {}", _0)]
    UnknownInterface(InterfaceId),

    #[fail(display = "link layer closed")]
    Closed,
}

impl From<io::Error> for LinkError {
    fn from(error: io::Error) -> Self {
        LinkError::Io(error)
    }
}

#[derive(Debug, Fail)]
pub enum RouterError {
    #[fail(display = "{}", _0)]
    Route(#[cause] RouteError),

    #[fail(display = "{}", _0)]
    Link(#[cause] LinkError),

    #[fail(
        display = "route {} uses interface {}, which the link layer does not have",
        route, iface
    )]
    UnknownInterface { route: usize, iface: InterfaceId },
}

impl From<RouteError> for RouterError {
    fn from(error: RouteError) -> Self {
        RouterError::Route(error)
    }
}

impl From<LinkError> for RouterError {
    fn from(error: LinkError) -> Self {
        RouterError::Link(error)
    }
}
