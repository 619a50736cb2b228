use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::config::Config;
use crate::state::HopResult;

/// Target being traced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    /// Host as given on the command line
    pub original: String,
    pub resolved: IpAddr,
}

impl Target {
    pub fn new(original: String, resolved: IpAddr) -> Self {
        Self { original, resolved }
    }
}

/// How a finished trace ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum TraceOutcome {
    /// The destination answered at this TTL
    Reached { ttl: u8 },
    /// Every TTL up to the limit was probed without reaching the destination
    MaxTtlExceeded { max_ttl: u8 },
}

impl TraceOutcome {
    pub fn is_reached(&self) -> bool {
        matches!(self, TraceOutcome::Reached { .. })
    }
}

/// Hops collected over one run, for the batch exporters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceRecord {
    pub target: Target,
    pub started_at: DateTime<Utc>,
    pub config: Config,
    pub hops: Vec<HopResult>,
    pub outcome: Option<TraceOutcome>,
}

impl TraceRecord {
    pub fn new(target: Target, config: Config) -> Self {
        let capacity = config.max_ttl as usize;
        Self {
            target,
            started_at: Utc::now(),
            config,
            hops: Vec::with_capacity(capacity),
            outcome: None,
        }
    }

    pub fn push_hop(&mut self, hop: HopResult) {
        self.hops.push(hop);
    }

    pub fn finish(&mut self, outcome: TraceOutcome) {
        self.outcome = Some(outcome);
    }

    /// Get the last hop that responded
    pub fn last_responding_hop(&self) -> Option<&HopResult> {
        self.hops.iter().rev().find(|h| h.responded())
    }
}
