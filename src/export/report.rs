use std::io::Write;

use crate::config::Config;
use crate::state::{HopResult, Target, TraceOutcome, TraceRecord};

/// First line of a text report
pub fn format_header(target: &Target, config: &Config) -> String {
    format!(
        "hoptrace to {} ({}), {} hops max, {} byte packets",
        target.original, target.resolved, config.max_ttl, config.payload_size
    )
}

/// Render one hop: TTL, every attempt, then the responding address
pub fn format_hop(hop: &HopResult) -> String {
    let attempts = hop
        .attempts
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join("  ");

    match hop.address {
        Some(ip) if hop.destination_reached => {
            format!("TTL {:>2}: {}  {} (destination reached)", hop.ttl, attempts, ip)
        }
        Some(ip) => format!("TTL {:>2}: {}  {}", hop.ttl, attempts, ip),
        None => format!("TTL {:>2}: {}  (no response)", hop.ttl, attempts),
    }
}

/// Closing line for outcomes that need one
pub fn format_outcome(outcome: &TraceOutcome) -> Option<String> {
    match outcome {
        TraceOutcome::Reached { .. } => None,
        TraceOutcome::MaxTtlExceeded { max_ttl } => Some(format!(
            "Reached max ttl ({}) without reaching the destination.",
            max_ttl
        )),
    }
}

/// Generate the full text report for a finished trace
pub fn generate_report<W: Write>(record: &TraceRecord, mut writer: W) -> std::io::Result<()> {
    writeln!(writer, "{}", format_header(&record.target, &record.config))?;
    for hop in &record.hops {
        writeln!(writer, "{}", format_hop(hop))?;
    }
    if let Some(line) = record.outcome.as_ref().and_then(format_outcome) {
        writeln!(writer, "{}", line)?;
    }
    Ok(())
}
