use clap::Parser;
use std::time::Duration;

use crate::config::{
    DEFAULT_MAX_TTL, DEFAULT_PAYLOAD_SIZE, DEFAULT_PORT, DEFAULT_RETRIES, MAX_TIMEOUT,
};

/// Classic UDP traceroute: lists the routers between this host and a target
#[derive(Parser, Debug, Clone)]
#[command(name = "hoptrace")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Target host to trace (IPv4 address or hostname)
    pub target: String,

    /// Maximum TTL (hops)
    #[arg(short = 'm', long = "max-ttl", default_value_t = DEFAULT_MAX_TTL)]
    pub max_ttl: u8,

    /// Destination UDP port (ideally one nothing listens on)
    #[arg(short = 'p', long = "port", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Probe payload size in bytes
    #[arg(long = "packet-size", default_value_t = DEFAULT_PAYLOAD_SIZE)]
    pub packet_size: usize,

    /// Probes per TTL
    #[arg(short = 'q', long = "queries", default_value_t = DEFAULT_RETRIES)]
    pub queries: u8,

    /// Per-probe timeout in seconds
    #[arg(long = "timeout", default_value = "3")]
    pub timeout: f64,

    /// Output JSON after the trace completes
    #[arg(long = "json")]
    pub json: bool,

    /// Output CSV after the trace completes
    #[arg(long = "csv")]
    pub csv: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long = "log-level", default_value = "warn")]
    pub log_level: String,
}

/// Largest payload that still fits an IPv4 datagram with UDP header
const MAX_PAYLOAD_SIZE: usize = 65_507;

impl Args {
    /// Get timeout as Duration, saturated to `0..=MAX_TIMEOUT`
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs_f64(self.timeout.max(0.0).min(MAX_TIMEOUT.as_secs_f64()))
    }

    /// Check if hops are collected and exported at the end
    pub fn is_batch_mode(&self) -> bool {
        self.json || self.csv
    }

    /// Validate arguments
    pub fn validate(&self) -> Result<(), String> {
        if self.json && self.csv {
            return Err("Cannot specify both --json and --csv".into());
        }

        if self.max_ttl == 0 {
            return Err("Max TTL must be at least 1".into());
        }

        if self.queries == 0 {
            return Err("Queries per hop must be at least 1".into());
        }

        const MAX_QUERIES: u8 = 10;
        if self.queries > MAX_QUERIES {
            return Err(format!("Queries per hop cannot exceed {}", MAX_QUERIES));
        }

        if !self.timeout.is_finite() || self.timeout <= 0.0 {
            return Err("Timeout must be positive".into());
        }

        if self.timeout > MAX_TIMEOUT.as_secs_f64() {
            return Err(format!(
                "Timeout cannot exceed {} seconds",
                MAX_TIMEOUT.as_secs()
            ));
        }

        if self.packet_size > MAX_PAYLOAD_SIZE {
            return Err(format!("Packet size cannot exceed {} bytes", MAX_PAYLOAD_SIZE));
        }

        if self.port == 0 {
            return Err("Port must be non-zero".into());
        }

        let level = self.log_level.to_lowercase();
        if !["error", "warn", "info", "debug", "trace"].contains(&level.as_str()) {
            return Err(format!("Unknown log level: {}", self.log_level));
        }

        Ok(())
    }
}
