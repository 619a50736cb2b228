use std::iter::FusedIterator;
use std::net::IpAddr;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{TraceError, TraceResult};
use crate::probe::ProbeSocket;
use crate::state::{HopResult, TraceOutcome};
use crate::trace::hop::HopProber;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TraceState {
    Probing(u8),
    Done,
    Exhausted,
}

/// Walks TTL values from 1 upward, yielding one [`HopResult`] per TTL.
///
/// The sequence ends after the hop at which the destination answered, or
/// after `max_ttl`. It cannot be restarted.
pub struct TraceEngine<S> {
    prober: HopProber<S>,
    destination: IpAddr,
    max_ttl: u8,
    state: TraceState,
    outcome: Option<TraceOutcome>,
}

impl<S: ProbeSocket> TraceEngine<S> {
    pub fn new(socket: S, destination: IpAddr, config: &Config) -> TraceResult<Self> {
        config.validate()?;
        if !destination.is_ipv4() {
            return Err(TraceError::UnsupportedAddress(destination));
        }

        info!(
            %destination,
            max_ttl = config.max_ttl,
            retries = config.retries,
            timeout_ms = config.timeout.as_millis() as u64,
            "Starting trace"
        );

        Ok(Self {
            prober: HopProber::new(socket, destination, config),
            destination,
            max_ttl: config.max_ttl,
            state: TraceState::Probing(1),
            outcome: None,
        })
    }

    /// How the trace ended, once it has
    pub fn outcome(&self) -> Option<TraceOutcome> {
        self.outcome
    }

    /// Give the socket back
    pub fn into_socket(self) -> S {
        self.prober.into_socket()
    }

    fn advance(&mut self, hop: &HopResult) {
        let ttl = hop.ttl;

        // Port unreachable is the real signal; address equality only backs it up
        let address_matches = hop.address == Some(self.destination);
        if hop.destination_reached || address_matches {
            if !hop.destination_reached {
                debug!(ttl, "Destination address answered without port unreachable");
            }
            info!(ttl, "Destination reached");
            self.state = TraceState::Done;
            self.outcome = Some(TraceOutcome::Reached { ttl });
        } else if ttl >= self.max_ttl {
            info!(max_ttl = self.max_ttl, "Max TTL reached without reaching destination");
            self.state = TraceState::Exhausted;
            self.outcome = Some(TraceOutcome::MaxTtlExceeded {
                max_ttl: self.max_ttl,
            });
        } else {
            self.state = TraceState::Probing(ttl + 1);
        }
    }
}

impl<S: ProbeSocket> Iterator for TraceEngine<S> {
    type Item = HopResult;

    fn next(&mut self) -> Option<HopResult> {
        let TraceState::Probing(ttl) = self.state else {
            return None;
        };

        let hop = self.prober.probe_hop(ttl);
        self.advance(&hop);
        Some(hop)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.state {
            TraceState::Probing(ttl) => (1, Some((self.max_ttl - ttl) as usize + 1)),
            TraceState::Done | TraceState::Exhausted => (0, Some(0)),
        }
    }
}

impl<S: ProbeSocket> FusedIterator for TraceEngine<S> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::testing::*;
    use std::net::{Ipv4Addr, Ipv6Addr};
    use std::time::Duration;

    const DEST: [u8; 4] = [192, 0, 2, 80];

    fn dest() -> IpAddr {
        IpAddr::V4(Ipv4Addr::from(DEST))
    }

    fn config(max_ttl: u8, retries: u8) -> Config {
        Config {
            max_ttl,
            retries,
            timeout: Duration::from_millis(200),
            ..Config::default()
        }
    }

    #[test]
    fn test_reaches_destination() {
        let socket = ScriptedSocket::new([
            time_exceeded([10, 0, 0, 1]),
            time_exceeded([10, 0, 0, 1]),
            Step::Timeout,
            Step::Timeout,
            port_unreachable(DEST),
            port_unreachable(DEST),
        ]);
        let mut engine = TraceEngine::new(socket, dest(), &config(30, 2)).unwrap();

        let hops: Vec<HopResult> = engine.by_ref().collect();

        assert_eq!(hops.iter().map(|h| h.ttl).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(hops[2].destination_reached);
        assert!(hops[..2].iter().all(|h| !h.destination_reached));
        assert_eq!(hops[1].address, None);
        assert_eq!(engine.outcome(), Some(TraceOutcome::Reached { ttl: 3 }));
        assert_eq!(engine.size_hint(), (0, Some(0)));
        assert!(engine.next().is_none());
    }

    #[test]
    fn test_max_ttl_one_exhausts() {
        let socket = ScriptedSocket::new([time_exceeded([10, 0, 0, 1])]);
        let mut engine = TraceEngine::new(socket, dest(), &config(1, 1)).unwrap();

        let hops: Vec<HopResult> = engine.by_ref().collect();

        assert_eq!(hops.len(), 1);
        assert_eq!(engine.outcome(), Some(TraceOutcome::MaxTtlExceeded { max_ttl: 1 }));
    }

    #[test]
    fn test_never_exceeds_max_ttl() {
        // Nothing ever answers
        let mut engine =
            TraceEngine::new(ScriptedSocket::default(), dest(), &config(5, 3)).unwrap();

        let hops: Vec<HopResult> = engine.by_ref().collect();

        assert_eq!(hops.iter().map(|h| h.ttl).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
        assert!(hops.iter().all(|h| h.attempts.len() == 3 && !h.responded()));
        assert_eq!(engine.outcome(), Some(TraceOutcome::MaxTtlExceeded { max_ttl: 5 }));
        assert_eq!(engine.into_socket().sent.len(), 15);
    }

    #[test]
    fn test_address_match_stops_trace() {
        // Destination address shows up in a time exceeded
        let socket = ScriptedSocket::new([time_exceeded([10, 0, 0, 1]), time_exceeded(DEST)]);
        let mut engine = TraceEngine::new(socket, dest(), &config(30, 1)).unwrap();

        let hops: Vec<HopResult> = engine.by_ref().collect();

        assert_eq!(hops.len(), 2);
        assert!(!hops[1].destination_reached);
        assert_eq!(engine.outcome(), Some(TraceOutcome::Reached { ttl: 2 }));
    }

    #[test]
    fn test_outcome_none_while_running() {
        let socket = ScriptedSocket::new([time_exceeded([10, 0, 0, 1])]);
        let mut engine = TraceEngine::new(socket, dest(), &config(30, 1)).unwrap();

        assert_eq!(engine.size_hint(), (1, Some(30)));
        let first = engine.next().unwrap();

        assert_eq!(first.ttl, 1);
        assert!(engine.outcome().is_none());
        assert_eq!(engine.size_hint(), (1, Some(29)));
    }

    #[test]
    fn test_rejects_ipv6_destination() {
        let v6 = IpAddr::V6(Ipv6Addr::LOCALHOST);
        let result = TraceEngine::new(ScriptedSocket::default(), v6, &config(30, 3));
        assert!(matches!(result, Err(TraceError::UnsupportedAddress(_))));
    }

    #[test]
    fn test_rejects_invalid_config() {
        let result = TraceEngine::new(ScriptedSocket::default(), dest(), &config(0, 3));
        assert!(matches!(result, Err(TraceError::InvalidConfig(_))));
    }
}
