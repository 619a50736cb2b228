use anyhow::Result;
use std::io::Write;

use crate::state::TraceRecord;

/// Export a trace to CSV, one row per attempt
pub fn export_csv<W: Write>(record: &TraceRecord, mut writer: W) -> Result<()> {
    writeln!(writer, "target,ttl,attempt,rtt_ms,address,destination_reached")?;

    let target = escape_csv(&record.target.original);
    for hop in &record.hops {
        let address = hop.address.map(|ip| ip.to_string()).unwrap_or_default();

        for (i, attempt) in hop.attempts.iter().enumerate() {
            let rtt = attempt
                .rtt_ms()
                .map(|ms| format!("{:.3}", ms))
                .unwrap_or_default();

            writeln!(
                writer,
                "{},{},{},{},{},{}",
                target,
                hop.ttl,
                i + 1,
                rtt,
                address,
                hop.destination_reached
            )?;
        }
    }

    Ok(())
}

/// Escape a string for CSV (quote if contains comma, quote, or newline)
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::state::{HopResult, Target};
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("simple"), "simple");
        assert_eq!(escape_csv("with,comma"), "\"with,comma\"");
        assert_eq!(escape_csv("with\"quote"), "\"with\"\"quote\"");
    }

    #[test]
    fn test_rows_per_attempt() {
        let target = Target::new("example.net".into(), IpAddr::V4(Ipv4Addr::new(192, 0, 2, 80)));
        let mut record = TraceRecord::new(target, Config::default());

        let mut hop = HopResult::new(1);
        hop.record_reply(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), Duration::from_micros(1500), false);
        hop.record_no_response();
        record.push_hop(hop);

        let mut buf = Vec::new();
        export_csv(&record, &mut buf).unwrap();
        let out = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "target,ttl,attempt,rtt_ms,address,destination_reached");
        assert_eq!(lines[1], "example.net,1,1,1.500,10.0.0.1,false");
        assert_eq!(lines[2], "example.net,1,2,,10.0.0.1,false");
    }
}
