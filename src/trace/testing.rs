//! Scripted probe socket for driving the prober and engine without a network.

use std::collections::VecDeque;
use std::io::{Error, ErrorKind};
use std::time::Duration;

use crate::error::{TraceError, TraceResult};
use crate::probe::ProbeSocket;
use crate::state::Probe;

/// One scripted socket event, consumed in order
#[derive(Debug, Clone)]
pub enum Step {
    /// Next receive returns these bytes
    Packet(Vec<u8>),
    /// Next receive times out
    Timeout,
    /// Next receive fails
    RecvError,
    /// Next send fails
    SendError,
}

#[derive(Debug, Default)]
pub struct ScriptedSocket {
    steps: VecDeque<Step>,
    pub sent: Vec<Probe>,
}

impl ScriptedSocket {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            sent: Vec::new(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.steps.len()
    }
}

impl ProbeSocket for ScriptedSocket {
    fn send_probe(&mut self, probe: &Probe) -> TraceResult<()> {
        if matches!(self.steps.front(), Some(Step::SendError)) {
            self.steps.pop_front();
            return Err(TraceError::Transmit {
                ttl: probe.ttl,
                source: Error::new(ErrorKind::Other, "network unreachable"),
            });
        }
        self.sent.push(*probe);
        Ok(())
    }

    fn recv_response(&mut self, buffer: &mut [u8], _wait: Duration) -> TraceResult<Option<usize>> {
        match self.steps.pop_front() {
            Some(Step::Packet(bytes)) => {
                let len = bytes.len().min(buffer.len());
                buffer[..len].copy_from_slice(&bytes[..len]);
                Ok(Some(len))
            }
            Some(Step::RecvError) => Err(TraceError::Receive(Error::new(
                ErrorKind::ConnectionReset,
                "reset",
            ))),
            Some(Step::SendError) => panic!("script expected a send, got a receive"),
            Some(Step::Timeout) | None => Ok(None),
        }
    }
}

/// IPv4 header from `source` followed by an ICMP type and code
pub fn icmp_packet(source: [u8; 4], icmp_type: u8, icmp_code: u8) -> Vec<u8> {
    let mut packet = vec![0u8; 28];
    packet[0] = 0x45;
    packet[8] = 64;
    packet[9] = 1;
    packet[12..16].copy_from_slice(&source);
    packet[20] = icmp_type;
    packet[21] = icmp_code;
    packet
}

pub fn time_exceeded(source: [u8; 4]) -> Step {
    Step::Packet(icmp_packet(source, 11, 0))
}

pub fn port_unreachable(source: [u8; 4]) -> Step {
    Step::Packet(icmp_packet(source, 3, 3))
}

pub fn echo_reply(source: [u8; 4]) -> Step {
    Step::Packet(icmp_packet(source, 0, 0))
}
