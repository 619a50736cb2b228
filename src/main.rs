use anyhow::{Context, Result};
use clap::Parser;
use std::net::{IpAddr, ToSocketAddrs};
use tokio::sync::mpsc;
use tracing::info;

use hoptrace::cli::Args;
use hoptrace::config::Config;
use hoptrace::error::TraceError;
use hoptrace::export::{export_csv, export_json, format_header, format_hop, format_outcome};
use hoptrace::probe::{UdpProbeSocket, privilege_hint};
use hoptrace::state::{HopResult, Target, TraceRecord};
use hoptrace::trace::TraceEngine;

/// Hops buffered between the trace thread and the printer
const HOP_CHANNEL_CAPACITY: usize = 16;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    init_logging(&args.log_level);

    let resolved = resolve_target(&args.target)
        .with_context(|| format!("Failed to resolve target: {}", args.target))?;
    let config = Config::from(&args);
    let target = Target::new(args.target.clone(), resolved);

    // Open sockets before printing anything; without the raw socket there is no trace
    let socket = match UdpProbeSocket::open() {
        Ok(socket) => socket,
        Err(e @ TraceError::Privilege(_)) => {
            eprintln!("{}\n\n{}", e, privilege_hint());
            std::process::exit(1);
        }
        Err(e) => return Err(e).context("Failed to open probe sockets"),
    };
    let engine = TraceEngine::new(socket, resolved, &config)?;

    // Probing blocks on socket reads, so it gets its own thread; hops stream back here
    let (tx, mut rx) = mpsc::channel::<HopResult>(HOP_CHANNEL_CAPACITY);
    let trace_handle = tokio::task::spawn_blocking(move || {
        let mut engine = engine;
        for hop in engine.by_ref() {
            if tx.blocking_send(hop).is_err() {
                break;
            }
        }
        engine.outcome()
    });

    let streaming = !args.is_batch_mode();
    let mut record = TraceRecord::new(target, config);

    if streaming {
        println!("{}", format_header(&record.target, &record.config));
    }

    while let Some(hop) = rx.recv().await {
        if streaming {
            println!("{}", format_hop(&hop));
        }
        record.push_hop(hop);
    }

    let outcome = trace_handle
        .await
        .context("Trace thread failed")?
        .context("Trace ended before completion")?;
    record.finish(outcome);

    info!(
        reached = outcome.is_reached(),
        hops = record.hops.len(),
        last_responder = ?record.last_responding_hop().and_then(|h| h.address),
        "Trace finished"
    );

    if args.json {
        export_json(&record, std::io::stdout())?;
    } else if args.csv {
        export_csv(&record, std::io::stdout())?;
    }

    if let Some(line) = format_outcome(&outcome) {
        if streaming {
            println!("{}", line);
        } else {
            eprintln!("{}", line);
        }
    }

    Ok(())
}

/// Install the stderr log subscriber
fn init_logging(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(level.to_lowercase())
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Resolve a literal address or hostname to the IPv4 address to trace
fn resolve_target(target: &str) -> Result<IpAddr> {
    // Try parsing as IP address first
    if let Ok(ip) = target.parse::<IpAddr>() {
        if ip.is_ipv6() {
            anyhow::bail!("IPv6 targets are not supported");
        }
        return Ok(ip);
    }

    // Resolve hostname
    let addrs: Vec<IpAddr> = format!("{}:0", target)
        .to_socket_addrs()?
        .map(|s| s.ip())
        .collect();

    if addrs.is_empty() {
        anyhow::bail!("No addresses found for hostname");
    }

    addrs
        .into_iter()
        .find(|ip| ip.is_ipv4())
        .ok_or_else(|| anyhow::anyhow!("No IPv4 addresses found"))
}
