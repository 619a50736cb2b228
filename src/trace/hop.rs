use std::net::IpAddr;
use std::time::{Duration, Instant};
use tracing::{debug, error, trace, warn};

use crate::config::{Config, MAX_TIMEOUT};
use crate::error::{TraceError, TraceResult};
use crate::probe::{MTU_SIZE, ProbeSocket, classify};
use crate::state::{HopResult, Probe};

/// An answered attempt
#[derive(Debug, Clone, Copy)]
struct Reply {
    responder: IpAddr,
    rtt: Duration,
    destination: bool,
}

/// Runs the attempts for one TTL value at a time
///
/// Exactly one probe is outstanding at any moment: attempt k+1 is not sent
/// until attempt k has been answered or has timed out.
pub struct HopProber<S> {
    socket: S,
    target: IpAddr,
    port: u16,
    payload_size: usize,
    retry_limit: u8,
    timeout: Duration,
    buffer: Vec<u8>,
}

impl<S: ProbeSocket> HopProber<S> {
    pub fn new(socket: S, target: IpAddr, config: &Config) -> Self {
        Self {
            socket,
            target,
            port: config.port,
            payload_size: config.payload_size,
            retry_limit: config.retries,
            timeout: config.timeout.min(MAX_TIMEOUT),
            buffer: vec![0u8; MTU_SIZE],
        }
    }

    /// Give the socket back
    pub fn into_socket(self) -> S {
        self.socket
    }

    /// Probe one TTL `retry_limit` times and collect the results.
    ///
    /// Every attempt is run even after an answer; the hop keeps the last
    /// responding address.
    pub fn probe_hop(&mut self, ttl: u8) -> HopResult {
        let mut hop = HopResult::new(ttl);

        for attempt in 1..=self.retry_limit {
            let probe = Probe::new(self.target, self.port, ttl, self.payload_size);

            match self.run_attempt(&probe) {
                Ok(Some(reply)) => {
                    debug!(
                        ttl,
                        attempt,
                        responder = %reply.responder,
                        rtt_ms = reply.rtt.as_secs_f64() * 1000.0,
                        destination = reply.destination,
                        "Attempt answered"
                    );
                    hop.record_reply(reply.responder, reply.rtt, reply.destination);
                }
                Ok(None) => {
                    debug!(ttl, attempt, "No response");
                    hop.record_no_response();
                }
                Err(e) if e.is_per_attempt() => {
                    warn!(ttl, attempt, error = %e, "Attempt failed");
                    hop.record_no_response();
                }
                Err(e) => {
                    error!(ttl, attempt, error = %e, "Attempt aborted");
                    hop.record_no_response();
                }
            }
        }

        debug!(
            ttl,
            received = hop.received(),
            avg_rtt = ?hop.avg_rtt(),
            "Hop complete"
        );
        hop
    }

    /// Send one probe and wait for the ICMP message it triggers.
    ///
    /// Packets that do not answer the probe are discarded and the wait resumes
    /// with whatever is left of this attempt's timeout. Send and receive
    /// failures are handed back to [`HopProber::probe_hop`].
    fn run_attempt(&mut self, probe: &Probe) -> TraceResult<Option<Reply>> {
        let start = Instant::now();
        let deadline = start.checked_add(self.timeout).ok_or_else(|| {
            TraceError::InvalidConfig(format!("timeout {:?} overflows the clock", self.timeout))
        })?;

        self.socket.send_probe(probe)?;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }

            let Some(len) = self.socket.recv_response(&mut self.buffer, remaining)? else {
                return Ok(None);
            };
            let received_at = Instant::now();

            let classification = match classify(&self.buffer[..len], received_at) {
                Ok(c) => c,
                Err(e) if e.is_malformed() => {
                    trace!(error = %e, "Discarding malformed packet");
                    continue;
                }
                Err(e) => return Err(e),
            };

            match classification.response() {
                Some(resp) if resp.answers(probe) => {
                    return Ok(Some(Reply {
                        responder: resp.source,
                        rtt: resp.received_at.saturating_duration_since(start),
                        destination: classification.is_destination(),
                    }));
                }
                Some(resp) => {
                    trace!(responder = %resp.source, "Discarding ICMP error for another datagram");
                }
                None => {
                    trace!(?classification, "Discarding unrelated ICMP message");
                }
            }
        }
    }
}
