//! Error types for hop discovery.

use std::net::IpAddr;
use thiserror::Error;

/// Errors raised while tracing a path.
///
/// Only [`TraceError::Privilege`] (and configuration problems caught before
/// the first probe) stop a trace. Everything that can go wrong inside a single
/// attempt is absorbed into the hop's attempt list.
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("Insufficient permissions to open a raw ICMP socket: {0}")]
    Privilege(#[source] std::io::Error),

    #[error("Failed to create probe socket: {0}")]
    SocketCreation(#[source] std::io::Error),

    #[error("Failed to send probe with TTL {ttl}: {source}")]
    Transmit {
        ttl: u8,
        #[source]
        source: std::io::Error,
    },

    #[error("Receive failed: {0}")]
    Receive(#[source] std::io::Error),

    #[error("Packet too short: expected at least {expected} bytes, got {actual}")]
    MalformedPacket { expected: usize, actual: usize },

    #[error("Not an IPv4 packet (version {0})")]
    NotIpv4(u8),

    #[error("Only IPv4 destinations are supported, got {0}")]
    UnsupportedAddress(IpAddr),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl TraceError {
    /// Returns true for errors that belong to a single attempt.
    ///
    /// These are recorded as an unanswered attempt (or skipped, for packets we
    /// could not parse) and never interrupt the trace.
    pub fn is_per_attempt(&self) -> bool {
        matches!(
            self,
            Self::Transmit { .. }
                | Self::Receive(_)
                | Self::MalformedPacket { .. }
                | Self::NotIpv4(_)
        )
    }

    /// Returns true for packet-level parse failures, which the prober treats
    /// like an unrecognized response.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedPacket { .. } | Self::NotIpv4(_))
    }
}

/// Result type alias for trace operations.
pub type TraceResult<T> = Result<T, TraceError>;
