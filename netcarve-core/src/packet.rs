//! Packet data model shared by every analysis stage.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

use bytes::Bytes;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::artifact::Artifact;
use crate::files::FileReference;
use crate::flow::FlowKey;
use crate::indicator::{Severity, SuspiciousIndicator};
use crate::protocol::tcp::{self, TcpFlags};
use crate::protocol::udp;

/// Opaque packet identity, unique within one analysis session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PacketId(pub u64);

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pkt-{}", self.0)
    }
}

/// Transport protocol of a packet, as read from the IP header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Transport {
    Tcp,
    Udp,
    /// Any other IP protocol number.
    Ip(u8),
    /// The protocol field could not be read.
    #[default]
    Unknown,
}

impl Transport {
    pub fn from_ip_protocol(protocol: u8) -> Self {
        match protocol {
            tcp::IP_PROTO_TCP => Transport::Tcp,
            udp::IP_PROTO_UDP => Transport::Udp,
            other => Transport::Ip(other),
        }
    }

    /// Label used in protocol lists and flow keys (`TCP`, `UDP`, `IP-47`, `unknown`).
    pub fn label(&self) -> CompactString {
        match self {
            Transport::Tcp => CompactString::const_new("TCP"),
            Transport::Udp => CompactString::const_new("UDP"),
            Transport::Ip(n) => compact_str::format_compact!("IP-{n}"),
            Transport::Unknown => CompactString::const_new("unknown"),
        }
    }

    /// Whether the protocol carries ports.
    pub fn has_ports(&self) -> bool {
        matches!(self, Transport::Tcp | Transport::Udp)
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl Serialize for Transport {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.label())
    }
}

/// TCP header metadata carried on a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TcpMeta {
    pub flags: TcpFlags,
    pub seq: u32,
    pub ack: u32,
}

/// Protocol labels detected on a packet, in detection order.
pub type ProtocolLabels = SmallVec<[CompactString; 4]>;

/// A decoded and enriched packet.
///
/// Built by the header extractor, completed by the enrichment stages and never
/// changed afterwards, except for the flow identifier which is written once by
/// the flow aggregator.
#[derive(Debug, Clone, Serialize)]
pub struct ParsedPacket {
    pub id: PacketId,
    /// Capture timestamp in epoch milliseconds.
    pub timestamp_ms: i64,
    pub src_ip: IpAddr,
    pub dst_ip: IpAddr,
    pub src_port: u16,
    pub dst_port: u16,
    pub transport: Transport,
    /// Frame length in bytes.
    pub length: usize,
    pub tcp: Option<TcpMeta>,
    pub protocols: ProtocolLabels,
    pub artifacts: Vec<Artifact>,
    pub files: Vec<FileReference>,
    pub indicators: Vec<SuspiciousIndicator>,
    /// Full frame bytes.
    #[serde(skip)]
    pub data: Bytes,
    /// Offset of the transport payload inside `data`.
    #[serde(skip)]
    pub payload_offset: usize,
    flow_id: Option<FlowKey>,
}

impl ParsedPacket {
    /// Create a packet with only identity, timing and frame data set.
    pub fn new(id: PacketId, timestamp_ms: i64, data: Bytes) -> Self {
        let unspecified = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
        Self {
            id,
            timestamp_ms,
            src_ip: unspecified,
            dst_ip: unspecified,
            src_port: 0,
            dst_port: 0,
            transport: Transport::Unknown,
            length: data.len(),
            tcp: None,
            protocols: SmallVec::new(),
            artifacts: Vec::new(),
            files: Vec::new(),
            indicators: Vec::new(),
            data,
            payload_offset: 0,
            flow_id: None,
        }
    }

    /// Transport payload bytes (everything after the transport header).
    pub fn payload(&self) -> &[u8] {
        self.data.get(self.payload_offset..).unwrap_or(&[])
    }

    /// Transport payload as a cheaply cloned buffer.
    pub fn payload_bytes(&self) -> Bytes {
        if self.payload_offset >= self.data.len() {
            Bytes::new()
        } else {
            self.data.slice(self.payload_offset..)
        }
    }

    /// Flow this packet was assigned to, once aggregation ran.
    pub fn flow_id(&self) -> Option<&FlowKey> {
        self.flow_id.as_ref()
    }

    /// Written by the flow aggregator only.
    pub(crate) fn set_flow_id(&mut self, key: FlowKey) {
        self.flow_id = Some(key);
    }

    /// Whether a protocol label is present (case-insensitive).
    pub fn has_protocol(&self, label: &str) -> bool {
        self.protocols.iter().any(|p| p.eq_ignore_ascii_case(label))
    }

    /// TCP flags, when the packet is TCP and the flag byte was readable.
    pub fn tcp_flags(&self) -> Option<TcpFlags> {
        self.tcp.map(|t| t.flags)
    }

    /// Highest indicator severity attached to this packet.
    pub fn max_severity(&self) -> Option<Severity> {
        self.indicators.iter().map(|i| i.severity).max()
    }

    /// `ip:port` rendering of the source endpoint.
    pub fn source(&self) -> String {
        endpoint(self.src_ip, self.src_port, self.transport)
    }

    /// `ip:port` rendering of the destination endpoint.
    pub fn destination(&self) -> String {
        endpoint(self.dst_ip, self.dst_port, self.transport)
    }
}

fn endpoint(ip: IpAddr, port: u16, transport: Transport) -> String {
    match (ip, transport.has_ports()) {
        (IpAddr::V6(v6), true) => format!("[{v6}]:{port}"),
        (ip, true) => format!("{ip}:{port}"),
        (ip, false) => ip.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_labels() {
        assert_eq!(Transport::Tcp.label(), "TCP");
        assert_eq!(Transport::Udp.label(), "UDP");
        assert_eq!(Transport::Ip(47).label(), "IP-47");
        assert_eq!(Transport::Unknown.label(), "unknown");
        assert_eq!(Transport::from_ip_protocol(6), Transport::Tcp);
        assert_eq!(Transport::from_ip_protocol(1), Transport::Ip(1));
    }

    #[test]
    fn test_transport_from_protocol_constants() {
        assert_eq!(Transport::from_ip_protocol(tcp::IP_PROTO_TCP), Transport::Tcp);
        assert_eq!(Transport::from_ip_protocol(udp::IP_PROTO_UDP), Transport::Udp);
        assert_eq!(Transport::from_ip_protocol(17), Transport::Udp);
        assert_eq!(Transport::from_ip_protocol(47), Transport::Ip(47));
    }

    #[test]
    fn test_new_packet_defaults() {
        let packet = ParsedPacket::new(PacketId(7), 1_000, Bytes::from_static(b"abc"));
        assert_eq!(packet.length, 3);
        assert_eq!(packet.src_ip, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(packet.transport, Transport::Unknown);
        assert!(packet.flow_id().is_none());
        assert_eq!(packet.payload(), b"abc");
    }

    #[test]
    fn test_payload_offset_past_end() {
        let mut packet = ParsedPacket::new(PacketId(1), 0, Bytes::from_static(b"abc"));
        packet.payload_offset = 10;
        assert!(packet.payload().is_empty());
        assert!(packet.payload_bytes().is_empty());
    }

    #[test]
    fn test_endpoint_rendering() {
        let mut packet = ParsedPacket::new(PacketId(1), 0, Bytes::new());
        packet.src_ip = "10.0.0.1".parse().unwrap();
        packet.src_port = 80;
        assert_eq!(packet.source(), "10.0.0.1");
        packet.transport = Transport::Tcp;
        assert_eq!(packet.source(), "10.0.0.1:80");
        packet.src_ip = "::1".parse().unwrap();
        assert_eq!(packet.source(), "[::1]:80");
    }
}
