use clap::{value_t, App, Arg};
use failure::Error;
use ipfwd::link::AfPacketLinks;
use ipfwd::logging::{level_for_verbosity, StderrSubscriber};
use ipfwd::route::RouteTable;
use ipfwd::{Router, RouterConfig};
use std::process;
use tracing::error;

fn main() {
    let matches = App::new("ipfwd")
        .version("0.1")
        .author("ipfwd contributors")
        .about("Forward IPv4 between interfaces using a static route table")
        .arg(
            Arg::with_name("route_table")
                .value_name("ROUTE_TABLE")
                .help("File with one `prefix mask next_hop interface_index` route per line")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("interfaces")
                .value_name("INTERFACE")
                .help("Interfaces to forward between; the first is index 0")
                .required(true)
                .multiple(true)
                .index(2),
        )
        .arg(
            Arg::with_name("max_pending")
                .long("max-pending")
                .value_name("N")
                .help("Buffer at most N frames per unresolved next hop")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("icmp_ttl")
                .long("icmp-ttl")
                .value_name("TTL")
                .help("TTL of generated ICMP messages")
                .default_value("64")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("promiscuous")
                .long("promiscuous")
                .help("Put the interfaces in promiscuous mode"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .multiple(true)
                .help("Log more; repeat for more detail"),
        )
        .get_matches();

    let mut config = RouterConfig::default()
        .icmp_ttl(value_t!(matches, "icmp_ttl", u8).unwrap_or_else(|e| e.exit()));
    if matches.is_present("max_pending") {
        let limit = value_t!(matches, "max_pending", usize).unwrap_or_else(|e| e.exit());
        config = config.pending_limit(Some(limit));
    }
    let route_table = matches.value_of("route_table").unwrap_or_default();
    let interfaces: Vec<&str> = matches
        .values_of("interfaces")
        .map(|values| values.collect())
        .unwrap_or_default();
    let promiscuous = matches.is_present("promiscuous");
    let level = level_for_verbosity(matches.occurrences_of("verbose"));

    if let Err(e) = tracing::subscriber::set_global_default(StderrSubscriber::new(level)) {
        eprintln!("ipfwd: could not install logger: {}", e);
    }

    if let Err(e) = run(route_table, &interfaces, promiscuous, config) {
        error!("{}", e);
        for cause in e.iter_causes() {
            error!("caused by: {}", cause);
        }
        process::exit(1);
    }
}

fn run(
    route_table: &str,
    interfaces: &[&str],
    promiscuous: bool,
    config: RouterConfig,
) -> Result<(), Error> {
    let routes = RouteTable::from_file(route_table)?;
    let links = AfPacketLinks::open(interfaces, promiscuous)?;
    let mut router = Router::new(links, routes, config)?;
    router.run()?;
    Ok(())
}
