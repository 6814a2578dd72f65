//! Header extraction and protocol classification.
//!
//! Headers are read at fixed offsets from the start of each frame: a
//! configurable link-layer header, then IPv4 (or IPv6 when the version nibble
//! says so), then TCP or UDP. Extraction is best-effort. Each field read
//! returns a [`HeaderError`] when the frame ends first, and the field keeps its
//! default instead of failing the packet.

pub mod classify;
pub mod ipv4;
pub mod ipv6;
pub mod tcp;
pub mod text;
pub mod udp;

use std::net::{IpAddr, Ipv4Addr};

use bytes::Bytes;
use smallvec::SmallVec;
use tracing::trace;

use crate::error::HeaderError;
use crate::packet::{PacketId, ParsedPacket, TcpMeta, Transport};
use crate::pcap::RawPacketRecord;

pub use classify::classify;

/// Header underruns recorded while extracting one frame.
pub type Underruns = SmallVec<[HeaderError; 2]>;

/// Read one byte at `offset`.
pub(crate) fn read_u8(data: &[u8], offset: usize, layer: &'static str) -> Result<u8, HeaderError> {
    read_array::<1>(data, offset, layer).map(|b| b[0])
}

/// Read a big-endian u16 at `offset`.
pub(crate) fn read_u16(data: &[u8], offset: usize, layer: &'static str) -> Result<u16, HeaderError> {
    read_array(data, offset, layer).map(u16::from_be_bytes)
}

/// Read a big-endian u32 at `offset`.
pub(crate) fn read_u32(data: &[u8], offset: usize, layer: &'static str) -> Result<u32, HeaderError> {
    read_array(data, offset, layer).map(u32::from_be_bytes)
}

pub(crate) fn read_array<const N: usize>(
    data: &[u8],
    offset: usize,
    layer: &'static str,
) -> Result<[u8; N], HeaderError> {
    data.get(offset..offset + N)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or(HeaderError {
            layer,
            needed: offset + N,
            have: data.len(),
        })
}

/// Keep a field value, or record why it could not be read.
pub(crate) fn field<T>(result: Result<T, HeaderError>, underruns: &mut Underruns) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            if !underruns.contains(&e) {
                underruns.push(e);
            }
            None
        }
    }
}

/// Network-layer fields. Unreadable fields stay `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkFields {
    pub version: u8,
    /// Bytes from the start of the IP header to the transport header.
    pub header_len: usize,
    pub protocol: Option<u8>,
    pub src: Option<IpAddr>,
    pub dst: Option<IpAddr>,
}

/// Transport-layer fields. Unreadable ports are zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransportFields {
    pub src_port: u16,
    pub dst_port: u16,
    pub tcp: Option<TcpMeta>,
    /// Bytes from the start of the transport header to its payload.
    pub header_len: usize,
}

/// Everything the header extractor learned about one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketHeaders {
    pub ip_version: Option<u8>,
    pub src_ip: IpAddr,
    pub dst_ip: IpAddr,
    pub transport: Transport,
    pub src_port: u16,
    pub dst_port: u16,
    pub tcp: Option<TcpMeta>,
    /// Offset of the transport payload inside the frame.
    pub payload_offset: usize,
    pub underruns: Underruns,
}

impl Default for PacketHeaders {
    fn default() -> Self {
        let unspecified = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
        Self {
            ip_version: None,
            src_ip: unspecified,
            dst_ip: unspecified,
            transport: Transport::Unknown,
            src_port: 0,
            dst_port: 0,
            tcp: None,
            payload_offset: 0,
            underruns: SmallVec::new(),
        }
    }
}

impl PacketHeaders {
    /// Copy the extracted fields onto a packet.
    pub fn apply(&self, packet: &mut ParsedPacket) {
        packet.src_ip = self.src_ip;
        packet.dst_ip = self.dst_ip;
        packet.transport = self.transport;
        packet.src_port = self.src_port;
        packet.dst_port = self.dst_port;
        packet.tcp = self.tcp;
        packet.payload_offset = self.payload_offset;
    }
}

/// Fixed-offset header reader.
#[derive(Debug, Clone, Copy)]
pub struct HeaderExtractor {
    link_header_len: usize,
}

impl Default for HeaderExtractor {
    fn default() -> Self {
        Self::new(14)
    }
}

impl HeaderExtractor {
    pub fn new(link_header_len: usize) -> Self {
        Self { link_header_len }
    }

    pub fn link_header_len(&self) -> usize {
        self.link_header_len
    }

    /// Read the network and transport headers of one frame.
    pub fn extract(&self, frame: &[u8]) -> PacketHeaders {
        let mut headers = PacketHeaders::default();
        let ip_start = self.link_header_len;
        let ip = frame.get(ip_start..).unwrap_or(&[]);

        let network = match ip.first().map(|b| b >> 4) {
            Some(6) => ipv6::parse(ip, &mut headers.underruns),
            _ => ipv4::parse(ip, &mut headers.underruns),
        };

        headers.ip_version = ip.first().map(|_| network.version);
        if let Some(src) = network.src {
            headers.src_ip = src;
        }
        if let Some(dst) = network.dst {
            headers.dst_ip = dst;
        }
        headers.transport = network
            .protocol
            .map(Transport::from_ip_protocol)
            .unwrap_or(Transport::Unknown);

        let transport_start = ip_start + network.header_len;
        let segment = frame.get(transport_start..).unwrap_or(&[]);

        let fields = match headers.transport {
            Transport::Tcp => tcp::parse(segment, &mut headers.underruns),
            Transport::Udp => udp::parse(segment, &mut headers.underruns),
            _ => TransportFields::default(),
        };

        headers.src_port = fields.src_port;
        headers.dst_port = fields.dst_port;
        headers.tcp = fields.tcp;
        headers.payload_offset = (transport_start + fields.header_len).min(frame.len());

        if !headers.underruns.is_empty() {
            trace!(underruns = ?headers.underruns, len = frame.len(), "short frame");
        }

        headers
    }

    /// Build a packet from a capture record, with headers filled in.
    pub fn packet_from_record(&self, id: PacketId, record: &RawPacketRecord) -> ParsedPacket {
        self.packet_from_frame(id, record.timestamp_ms(), record.data.clone())
    }

    /// Build a packet from raw frame bytes, with headers filled in.
    pub fn packet_from_frame(&self, id: PacketId, timestamp_ms: i64, frame: Bytes) -> ParsedPacket {
        let headers = self.extract(&frame);
        let mut packet = ParsedPacket::new(id, timestamp_ms, frame);
        headers.apply(&mut packet);
        packet
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::tcp::TcpFlags;
    use crate::test_utils::{EthernetBuilder, Ipv4Builder, TcpBuilder, UdpBuilder};

    fn tcp_frame(flags: u8, payload: &[u8]) -> Vec<u8> {
        let tcp = TcpBuilder::new()
            .src_port(12345)
            .dst_port(80)
            .seq(1000)
            .ack_num(2000)
            .flags(flags)
            .payload(payload.to_vec())
            .build();
        let ip = Ipv4Builder::new()
            .src_ip([10, 0, 0, 1])
            .dst_ip([10, 0, 0, 2])
            .tcp()
            .payload(tcp)
            .build();
        EthernetBuilder::new().payload(ip).build()
    }

    // Test 1: full TCP frame
    #[test]
    fn test_extract_tcp() {
        let frame = tcp_frame(0x12, b"hello");
        let headers = HeaderExtractor::default().extract(&frame);

        assert_eq!(headers.ip_version, Some(4));
        assert_eq!(headers.src_ip, "10.0.0.1".parse::<IpAddr>().unwrap());
        assert_eq!(headers.dst_ip, "10.0.0.2".parse::<IpAddr>().unwrap());
        assert_eq!(headers.transport, Transport::Tcp);
        assert_eq!(headers.src_port, 12345);
        assert_eq!(headers.dst_port, 80);

        let tcp = headers.tcp.unwrap();
        assert_eq!(tcp.flags, TcpFlags(0x12));
        assert_eq!(tcp.seq, 1000);
        assert_eq!(tcp.ack, 2000);
        assert_eq!(&frame[headers.payload_offset..], b"hello");
        assert!(headers.underruns.is_empty());
    }

    // Test 2: UDP frame
    #[test]
    fn test_extract_udp() {
        let udp = UdpBuilder::new()
            .src_port(5353)
            .dst_port(53)
            .payload(vec![1, 2, 3])
            .build();
        let ip = Ipv4Builder::new().udp().payload(udp).build();
        let frame = EthernetBuilder::new().payload(ip).build();

        let headers = HeaderExtractor::default().extract(&frame);
        assert_eq!(headers.transport, Transport::Udp);
        assert_eq!(headers.src_port, 5353);
        assert_eq!(headers.dst_port, 53);
        assert!(headers.tcp.is_none());
        assert_eq!(&frame[headers.payload_offset..], &[1, 2, 3]);
    }

    // Test 3: other IP protocols carry no ports
    #[test]
    fn test_extract_other_protocol() {
        let ip = Ipv4Builder::new().protocol(47).payload(vec![0; 8]).build();
        let frame = EthernetBuilder::new().payload(ip).build();

        let headers = HeaderExtractor::default().extract(&frame);
        assert_eq!(headers.transport, Transport::Ip(47));
        assert_eq!(headers.transport.label(), "IP-47");
        assert_eq!(headers.src_port, 0);
        assert_eq!(headers.dst_port, 0);
    }

    // Test 4: frame ends inside the IP header
    #[test]
    fn test_short_ip_header_defaults() {
        let frame = tcp_frame(0x02, b"");
        let short = &frame[..14 + 12];

        let headers = HeaderExtractor::default().extract(short);
        // Protocol byte (offset 9) is readable, addresses are not
        assert_eq!(headers.transport, Transport::Tcp);
        assert_eq!(headers.src_ip, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(headers.dst_ip, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(headers.src_port, 0);
        assert!(!headers.underruns.is_empty());
        assert_eq!(headers.payload_offset, short.len());
    }

    // Test 5: frame shorter than the link header
    #[test]
    fn test_frame_shorter_than_link_header() {
        let headers = HeaderExtractor::default().extract(&[0u8; 6]);
        assert_eq!(headers.ip_version, None);
        assert_eq!(headers.transport, Transport::Unknown);
        assert_eq!(headers.payload_offset, 6);
    }

    // Test 6: TCP header cut after the ports
    #[test]
    fn test_partial_tcp_header() {
        let frame = tcp_frame(0x18, b"");
        let short = &frame[..14 + 20 + 6];

        let headers = HeaderExtractor::default().extract(short);
        assert_eq!(headers.src_port, 12345);
        assert_eq!(headers.dst_port, 80);
        assert!(headers.tcp.is_none());
    }

    // Test 7: zero-length link header (raw IP captures)
    #[test]
    fn test_raw_ip_link() {
        let frame = tcp_frame(0x02, b"x");
        let headers = HeaderExtractor::new(0).extract(&frame[14..]);
        assert_eq!(headers.src_port, 12345);
    }

    #[test]
    fn test_packet_from_frame() {
        let frame = tcp_frame(0x18, b"GET / HTTP/1.1\r\n\r\n");
        let packet =
            HeaderExtractor::default().packet_from_frame(PacketId(3), 42, Bytes::from(frame.clone()));
        assert_eq!(packet.id, PacketId(3));
        assert_eq!(packet.length, frame.len());
        assert_eq!(packet.payload(), b"GET / HTTP/1.1\r\n\r\n");
    }
}
