use super::table::{RouteEntry, RouteTable, MAX_ROUTES};
use crate::errors::RouteError;
use crate::link::InterfaceId;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::net::Ipv4Addr;
use std::path::Path;
use tracing::info;

impl RouteTable {
    /// Reads a route file. Each line holds `prefix mask next_hop interface_index` separated by
    /// whitespace; blank lines and lines starting with `#` are skipped.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<RouteTable, RouteError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(RouteError::Io)?;
        let table = RouteTable::parse(BufReader::new(file))?;
        info!("Loaded {} routes from {}", table.len(), path.display());
        Ok(table)
    }

    pub fn parse<R: BufRead>(reader: R) -> Result<RouteTable, RouteError> {
        let mut entries = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line.map_err(RouteError::Io)?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if entries.len() == MAX_ROUTES {
                return Err(RouteError::Capacity { limit: MAX_ROUTES });
            }
            let entry = parse_line(line).map_err(|reason| RouteError::Parse {
                line: index + 1,
                reason,
            })?;
            entries.push(entry);
        }
        RouteTable::new(entries)
    }
}

fn parse_line(line: &str) -> Result<RouteEntry, String> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 4 {
        return Err(format!("expected 4 fields, found {}", fields.len()));
    }
    let interface = fields[3]
        .parse::<usize>()
        .map_err(|_| format!("invalid interface index {:?}", fields[3]))?;
    Ok(RouteEntry::new(
        parse_addr("prefix", fields[0])?,
        parse_addr("mask", fields[1])?,
        parse_addr("next hop", fields[2])?,
        InterfaceId(interface),
    ))
}

fn parse_addr(what: &str, field: &str) -> Result<Ipv4Addr, String> {
    field
        .parse()
        .map_err(|_| format!("invalid {} {:?}", what, field))
}
