use socket2::{Domain, Protocol, Socket, Type};
use std::io::Read;
use std::time::Duration;
use tracing::debug;

use crate::error::{TraceError, TraceResult};
use crate::probe::udp::{build_probe_payload, send_udp_probe};
use crate::state::Probe;

/// Receive buffer size (Ethernet MTU)
pub const MTU_SIZE: usize = 1500;
/// Requested kernel receive buffer for the raw socket
const RECV_BUFFER_SIZE: usize = 256 * 1024;

/// The two channels a trace needs: a probe sender and an ICMP listener
///
/// Implementations must apply the probe's TTL and send it as one step, so no
/// other send can observe a half-updated TTL.
pub trait ProbeSocket {
    /// Set the outbound TTL to `probe.ttl` and transmit the probe
    fn send_probe(&mut self, probe: &Probe) -> TraceResult<()>;

    /// Block for at most `wait` for one inbound packet.
    ///
    /// Returns `Ok(None)` when the wait elapses without a packet.
    fn recv_response(&mut self, buffer: &mut [u8], wait: Duration) -> TraceResult<Option<usize>>;
}

impl<S: ProbeSocket + ?Sized> ProbeSocket for &mut S {
    fn send_probe(&mut self, probe: &Probe) -> TraceResult<()> {
        (**self).send_probe(probe)
    }

    fn recv_response(&mut self, buffer: &mut [u8], wait: Duration) -> TraceResult<Option<usize>> {
        (**self).recv_response(buffer, wait)
    }
}

/// UDP sender plus raw ICMPv4 receiver, held for the whole run
///
/// Both sockets are closed when this is dropped.
#[derive(Debug)]
pub struct UdpProbeSocket {
    send: Socket,
    recv: Socket,
}

impl UdpProbeSocket {
    /// Open both sockets. The raw receive socket is opened first so a
    /// permissions problem surfaces before anything else.
    pub fn open() -> TraceResult<Self> {
        let recv = create_raw_icmp_socket().map_err(TraceError::Privilege)?;
        let send = create_udp_send_socket().map_err(TraceError::SocketCreation)?;
        debug!("opened UDP send socket and raw ICMP receive socket");
        Ok(Self { send, recv })
    }
}

impl ProbeSocket for UdpProbeSocket {
    fn send_probe(&mut self, probe: &Probe) -> TraceResult<()> {
        let ttl = probe.ttl;
        set_ttl(&self.send, ttl).map_err(|source| TraceError::Transmit { ttl, source })?;

        let payload = build_probe_payload(probe.payload_size);
        send_udp_probe(&self.send, &payload, probe.target, probe.port)
            .map_err(|source| TraceError::Transmit { ttl, source })?;
        Ok(())
    }

    fn recv_response(&mut self, buffer: &mut [u8], wait: Duration) -> TraceResult<Option<usize>> {
        // A zero read timeout means "block forever" to the OS
        if wait.is_zero() {
            return Ok(None);
        }
        self.recv
            .set_read_timeout(Some(wait))
            .map_err(TraceError::Receive)?;

        match (&self.recv).read(buffer) {
            Ok(len) => Ok(Some(len)),
            Err(e) if is_timeout(&e) => Ok(None),
            Err(e) => Err(TraceError::Receive(e)),
        }
    }
}

/// Create a raw ICMPv4 socket (needs root or CAP_NET_RAW)
pub fn create_raw_icmp_socket() -> std::io::Result<Socket> {
    let socket = Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4))?;
    socket.set_nonblocking(false)?;
    if let Err(e) = socket.set_recv_buffer_size(RECV_BUFFER_SIZE) {
        debug!(error = %e, "could not enlarge ICMP receive buffer");
    }
    Ok(socket)
}

/// Create the DGRAM UDP socket probes are sent from
pub fn create_udp_send_socket() -> std::io::Result<Socket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(false)?;
    Ok(socket)
}

/// Set TTL on a socket
pub fn set_ttl(socket: &Socket, ttl: u8) -> std::io::Result<()> {
    socket.set_ttl(ttl as u32)
}

/// WouldBlock/TimedOut are how an expired read timeout is reported
pub fn is_timeout(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}

/// Remediation text shown when the raw socket cannot be opened
pub fn privilege_hint() -> String {
    let binary_path = std::env::current_exe()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "hoptrace".to_string());

    format!(
        "Raw sockets are required to receive ICMP replies from routers.\n\n\
         Fix options:\n\
         \u{2022} Run with sudo: sudo hoptrace <target>\n\
         \u{2022} Add capability: sudo setcap cap_net_raw+ep {}",
        binary_path
    )
}
