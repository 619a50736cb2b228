use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use crate::config::duration_serde;

/// One outbound probe datagram
///
/// Built once per attempt by the hop prober and dropped after the send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Probe {
    pub target: IpAddr,
    pub port: u16,
    pub ttl: u8,
    pub payload_size: usize,
}

impl Probe {
    pub fn new(target: IpAddr, port: u16, ttl: u8, payload_size: usize) -> Self {
        Self {
            target,
            port,
            ttl,
            payload_size,
        }
    }
}

/// Outcome of a single send/receive cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Attempt {
    /// A time-exceeded or port-unreachable answered the probe
    Reply {
        #[serde(with = "duration_serde")]
        rtt: Duration,
    },
    /// Timed out, or the probe could not be sent
    NoResponse,
}

impl Attempt {
    pub fn rtt(&self) -> Option<Duration> {
        match self {
            Attempt::Reply { rtt } => Some(*rtt),
            Attempt::NoResponse => None,
        }
    }

    /// RTT in milliseconds, if answered
    pub fn rtt_ms(&self) -> Option<f64> {
        self.rtt().map(|rtt| rtt.as_secs_f64() * 1000.0)
    }
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.rtt_ms() {
            Some(ms) => write!(f, "{:.1} ms", ms),
            None => f.write_str("*"),
        }
    }
}

/// Everything learned about one TTL value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HopResult {
    pub ttl: u8,
    pub attempts: Vec<Attempt>,
    /// Last address that answered for this TTL
    pub address: Option<IpAddr>,
    pub destination_reached: bool,
}

impl HopResult {
    pub fn new(ttl: u8) -> Self {
        Self {
            ttl,
            attempts: Vec::new(),
            address: None,
            destination_reached: false,
        }
    }

    /// Record an answered attempt
    pub fn record_reply(&mut self, responder: IpAddr, rtt: Duration, destination: bool) {
        self.attempts.push(Attempt::Reply { rtt });
        self.address = Some(responder);
        if destination {
            self.destination_reached = true;
        }
    }

    /// Record a timed out (or unsendable) attempt
    pub fn record_no_response(&mut self) {
        self.attempts.push(Attempt::NoResponse);
    }

    /// Number of attempts that got an answer
    pub fn received(&self) -> usize {
        self.attempts.iter().filter(|a| a.rtt().is_some()).count()
    }

    /// True if any attempt got an answer
    pub fn responded(&self) -> bool {
        self.address.is_some()
    }

    /// Mean RTT over answered attempts
    pub fn avg_rtt(&self) -> Option<Duration> {
        let rtts: Vec<Duration> = self.attempts.iter().filter_map(Attempt::rtt).collect();
        if rtts.is_empty() {
            return None;
        }
        Some(rtts.iter().sum::<Duration>() / rtts.len() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_attempt_display() {
        let reply = Attempt::Reply {
            rtt: Duration::from_micros(12_340),
        };
        assert_eq!(reply.to_string(), "12.3 ms");
        assert_eq!(Attempt::NoResponse.to_string(), "*");
    }

    #[test]
    fn test_record_reply_keeps_last_address() {
        let mut hop = HopResult::new(4);
        let first = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        let second = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));

        hop.record_reply(first, Duration::from_millis(3), false);
        hop.record_no_response();
        hop.record_reply(second, Duration::from_millis(5), false);

        assert_eq!(hop.attempts.len(), 3);
        assert_eq!(hop.received(), 2);
        assert_eq!(hop.address, Some(second));
        assert!(!hop.destination_reached);
        assert_eq!(hop.avg_rtt(), Some(Duration::from_millis(4)));
    }

    #[test]
    fn test_destination_flag_is_sticky() {
        let mut hop = HopResult::new(9);
        let dest = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 9));

        hop.record_reply(dest, Duration::from_millis(20), true);
        hop.record_reply(dest, Duration::from_millis(21), false);

        assert!(hop.destination_reached);
    }

    #[test]
    fn test_all_timeouts() {
        let mut hop = HopResult::new(2);
        for _ in 0..3 {
            hop.record_no_response();
        }
        assert!(!hop.responded());
        assert_eq!(hop.received(), 0);
        assert_eq!(hop.avg_rtt(), None);
    }

    #[test]
    fn test_attempt_serializes_with_status_tag() {
        let json = serde_json::to_string(&Attempt::NoResponse).unwrap();
        assert_eq!(json, r#"{"status":"no_response"}"#);

        let json = serde_json::to_string(&Attempt::Reply {
            rtt: Duration::from_millis(1500),
        })
        .unwrap();
        assert_eq!(json, r#"{"status":"reply","rtt":1.5}"#);
    }
}
