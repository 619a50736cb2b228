use socket2::{SockAddr, Socket};
use std::net::{IpAddr, SocketAddr};

/// UDP header size (fixed)
pub const UDP_HEADER_SIZE: usize = 8;
/// Byte used to fill probe payloads
pub const FILLER_BYTE: u8 = b'x';

/// Build a probe payload of `size` filler bytes
///
/// The payload carries no correlation data; only one probe is ever in flight.
pub fn build_probe_payload(size: usize) -> Vec<u8> {
    vec![FILLER_BYTE; size]
}

/// Send a UDP probe to target
pub fn send_udp_probe(socket: &Socket, payload: &[u8], target: IpAddr, port: u16) -> std::io::Result<usize> {
    let addr = SocketAddr::new(target, port);
    let sock_addr = SockAddr::from(addr);
    socket.send_to(payload, &sock_addr)
}
