use pnet::packet::icmp::destination_unreachable::IcmpCodes;
use pnet::packet::icmp::{IcmpCode, IcmpType, IcmpTypes};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::udp::UdpPacket;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Instant;

use crate::error::{TraceError, TraceResult};
use crate::state::Probe;

/// Minimum IPv4 header length
pub const IPV4_HEADER_SIZE: usize = 20;
/// ICMP header size (type, code, checksum, rest-of-header)
pub const ICMP_HEADER_SIZE: usize = 8;

/// Original datagram quoted inside an ICMP error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotedProbe {
    pub destination: Ipv4Addr,
    pub port: u16,
}

/// An ICMP message that answers a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawResponse {
    pub source: IpAddr,
    pub icmp_type: u8,
    pub icmp_code: u8,
    pub received_at: Instant,
    /// Destination of the datagram that triggered the error, when quoted in full
    pub quoted: Option<QuotedProbe>,
}

impl RawResponse {
    /// Check whether this error was triggered by `probe`.
    ///
    /// Responses that do not quote the original datagram are accepted.
    pub fn answers(&self, probe: &Probe) -> bool {
        match self.quoted {
            Some(quoted) => {
                IpAddr::V4(quoted.destination) == probe.target && quoted.port == probe.port
            }
            None => true,
        }
    }
}

/// What an inbound packet means for the probe in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Time exceeded in transit: an intermediate router
    HopRelay(RawResponse),
    /// Port unreachable: the destination itself
    PortUnreachable(RawResponse),
    /// Any other ICMP message; discarded by the prober
    Unrecognized { icmp_type: u8, icmp_code: u8 },
}

impl Classification {
    /// The response, if this packet resolves an attempt
    pub fn response(&self) -> Option<&RawResponse> {
        match self {
            Classification::HopRelay(resp) | Classification::PortUnreachable(resp) => Some(resp),
            Classification::Unrecognized { .. } => None,
        }
    }

    pub fn is_destination(&self) -> bool {
        matches!(self, Classification::PortUnreachable(_))
    }
}

/// Classify a packet read from the raw ICMP socket.
///
/// The packet starts with the IPv4 header; the responder address is its source
/// field and the ICMP type and code follow the header immediately. Packets too
/// short to hold both fail with [`TraceError::MalformedPacket`].
pub fn classify(data: &[u8], received_at: Instant) -> TraceResult<Classification> {
    let ip_packet = Ipv4Packet::new(data).ok_or(TraceError::MalformedPacket {
        expected: IPV4_HEADER_SIZE + 2,
        actual: data.len(),
    })?;

    let version = ip_packet.get_version();
    if version != 4 {
        return Err(TraceError::NotIpv4(version));
    }

    // IHL is in 32-bit words; values under 5 fall back to the minimum header
    let header_len = (ip_packet.get_header_length() as usize * 4).max(IPV4_HEADER_SIZE);
    if data.len() < header_len + 2 {
        return Err(TraceError::MalformedPacket {
            expected: header_len + 2,
            actual: data.len(),
        });
    }

    let source = IpAddr::V4(ip_packet.get_source());
    let icmp_type = IcmpType::new(data[header_len]);
    let icmp_code = IcmpCode::new(data[header_len + 1]);

    let response = |quoted| RawResponse {
        source,
        icmp_type: icmp_type.0,
        icmp_code: icmp_code.0,
        received_at,
        quoted,
    };

    let classification = match (icmp_type, icmp_code) {
        (IcmpTypes::TimeExceeded, _) => {
            Classification::HopRelay(response(parse_quoted_probe(&data[header_len..])))
        }
        (IcmpTypes::DestinationUnreachable, IcmpCodes::DestinationPortUnreachable) => {
            Classification::PortUnreachable(response(parse_quoted_probe(&data[header_len..])))
        }
        _ => Classification::Unrecognized {
            icmp_type: icmp_type.0,
            icmp_code: icmp_code.0,
        },
    };

    Ok(classification)
}

/// Extract destination address and port of the UDP datagram quoted in an
/// ICMP error. `icmp_data` starts at the ICMP header.
fn parse_quoted_probe(icmp_data: &[u8]) -> Option<QuotedProbe> {
    let quoted = icmp_data.get(ICMP_HEADER_SIZE..)?;
    let inner_ip = Ipv4Packet::new(quoted)?;

    if inner_ip.get_version() != 4
        || inner_ip.get_next_level_protocol() != IpNextHeaderProtocols::Udp
    {
        return None;
    }

    let inner_header_len = inner_ip.get_header_length() as usize * 4;
    if inner_header_len < IPV4_HEADER_SIZE {
        return None;
    }

    let udp = UdpPacket::new(quoted.get(inner_header_len..)?)?;
    Some(QuotedProbe {
        destination: inner_ip.get_destination(),
        port: udp.get_destination(),
    })
}
