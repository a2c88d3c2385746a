//! Run a fair-queueing UDP router.
//!
//! Datagrams arriving on `--port` are queued per flow and forwarded to
//! `--receiver-ip:--receiver-port` under the chosen discipline, capped at `--bandwidth` KiB/s.
//!
//! # Usage
//!
//! ```sh
//! cargo run --release --bin fairq-router -- --algorithm wfq --bandwidth 500 --extended-header
//! ```
//!
//! Counters are logged every `--stats-interval` seconds and once more on Ctrl-C.

use std::{
    net::{IpAddr, SocketAddr},
    time::Duration,
};

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use tracing::info;

use fairq::{wire::Format, Algorithm, Router, RouterError, RouterOptions, SchedulerConfig};
use fairq_sched::{DEFAULT_BASE_QUANTUM, DEFAULT_FIFO_CAPACITY, DEFAULT_FLOW_CAPACITY};

fn command() -> Command {
    Command::new("fairq-router")
        .about("forward UDP datagrams per flow under FIFO, RR, DRR or WFQ scheduling")
        .arg(
            Arg::new("algorithm")
                .long("algorithm")
                .default_value("fifo")
                .value_parser(value_parser!(Algorithm))
                .help("Scheduling discipline: fifo, rr, drr or wfq"),
        )
        .arg(
            Arg::new("bandwidth")
                .long("bandwidth")
                .default_value("1000")
                .value_parser(value_parser!(u64))
                .help("Egress bandwidth cap in KiB/s, 0 for unlimited"),
        )
        .arg(
            Arg::new("bind-ip")
                .long("bind-ip")
                .default_value("0.0.0.0")
                .value_parser(value_parser!(IpAddr)),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .default_value("9000")
                .value_parser(value_parser!(u16))
                .help("Ingress port"),
        )
        .arg(
            Arg::new("receiver-ip")
                .long("receiver-ip")
                .default_value("127.0.0.1")
                .value_parser(value_parser!(IpAddr)),
        )
        .arg(
            Arg::new("receiver-port")
                .long("receiver-port")
                .default_value("9001")
                .value_parser(value_parser!(u16)),
        )
        .arg(
            Arg::new("flow-capacity")
                .long("flow-capacity")
                .value_parser(value_parser!(usize))
                .help("Queue capacity per flow, in datagrams"),
        )
        .arg(
            Arg::new("fifo-capacity")
                .long("fifo-capacity")
                .value_parser(value_parser!(usize))
                .help("Capacity of the shared FIFO queue, in datagrams"),
        )
        .arg(
            Arg::new("quantum")
                .long("quantum")
                .value_parser(value_parser!(u32))
                .help("DRR base quantum in bytes, multiplied by the flow weight"),
        )
        .arg(
            Arg::new("extended-header")
                .long("extended-header")
                .action(ArgAction::SetTrue)
                .help("Expect the 24-byte header with 32-bit fields and a sequence number"),
        )
        .arg(
            Arg::new("adopt-weight-changes")
                .long("adopt-weight-changes")
                .action(ArgAction::SetTrue)
                .help("Let known flows pick up the weight of their latest datagram"),
        )
        .arg(
            Arg::new("stats-interval")
                .long("stats-interval")
                .default_value("5")
                .value_parser(value_parser!(u64))
                .help("Seconds between statistics reports, 0 to disable"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .default_value("info")
                .value_parser(value_parser!(tracing::Level)),
        )
}

fn options(matches: &ArgMatches) -> RouterOptions {
    let scheduler = SchedulerConfig::new(
        matches.get_one::<Algorithm>("algorithm").copied().unwrap_or_default(),
    )
    .flow_capacity(
        matches.get_one::<usize>("flow-capacity").copied().unwrap_or(DEFAULT_FLOW_CAPACITY),
    )
    .fifo_capacity(
        matches.get_one::<usize>("fifo-capacity").copied().unwrap_or(DEFAULT_FIFO_CAPACITY),
    )
    .base_quantum(matches.get_one::<u32>("quantum").copied().unwrap_or(DEFAULT_BASE_QUANTUM));

    let format =
        if matches.get_flag("extended-header") { Format::Extended } else { Format::Minimal };
    let kib = matches.get_one::<u64>("bandwidth").copied().unwrap_or_default();

    let options = RouterOptions::default()
        .scheduler(scheduler)
        .bandwidth(kib.saturating_mul(1024))
        .format(format)
        .adopt_weight_changes(matches.get_flag("adopt-weight-changes"));

    match matches.get_one::<u64>("stats-interval").copied().unwrap_or_default() {
        0 => options.without_stats_report(),
        secs => options.stats_interval(Duration::from_secs(secs)),
    }
}

#[tokio::main]
async fn main() -> Result<(), RouterError> {
    let matches = command().get_matches();

    // Create logger
    let level =
        matches.get_one::<tracing::Level>("log-level").copied().unwrap_or(tracing::Level::INFO);
    tracing_subscriber::fmt().with_max_level(level).init();

    let ip = |name: &str| matches.get_one::<IpAddr>(name).copied();
    let port = |name: &str| matches.get_one::<u16>(name).copied().unwrap_or_default();

    let destination = SocketAddr::new(
        ip("receiver-ip").unwrap_or(IpAddr::from([127, 0, 0, 1])),
        port("receiver-port"),
    );
    let listen =
        SocketAddr::new(ip("bind-ip").unwrap_or(IpAddr::from([0, 0, 0, 0])), port("port"));

    let mut router = Router::with_options(destination, options(&matches));
    router.bind(listen).await?;

    tokio::signal::ctrl_c().await?;
    info!("Received interrupt, shutting down");

    router.shutdown().await;

    Ok(())
}
