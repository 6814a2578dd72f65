//! Test utilities.
//!
//! Builders for frames and capture files, plus a helper that turns a built
//! frame into a header-extracted packet.

use bytes::Bytes;

use crate::packet::{PacketId, ParsedPacket};
use crate::protocol::HeaderExtractor;

/// Builder for constructing Ethernet frames.
#[derive(Debug, Clone)]
pub struct EthernetBuilder {
    src_mac: [u8; 6],
    dst_mac: [u8; 6],
    ethertype: u16,
    payload: Vec<u8>,
}

impl Default for EthernetBuilder {
    fn default() -> Self {
        Self {
            src_mac: [0x00, 0x11, 0x22, 0x33, 0x44, 0x55],
            dst_mac: [0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb],
            ethertype: 0x0800, // IPv4
            payload: Vec::new(),
        }
    }
}

impl EthernetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(14 + self.payload.len());
        frame.extend_from_slice(&self.dst_mac);
        frame.extend_from_slice(&self.src_mac);
        frame.extend_from_slice(&self.ethertype.to_be_bytes());
        frame.extend_from_slice(&self.payload);
        frame
    }
}

/// Builder for constructing IPv4 headers.
#[derive(Debug, Clone)]
pub struct Ipv4Builder {
    ttl: u8,
    protocol: u8,
    src_ip: [u8; 4],
    dst_ip: [u8; 4],
    payload: Vec<u8>,
}

impl Default for Ipv4Builder {
    fn default() -> Self {
        Self {
            ttl: 64,
            protocol: 6, // TCP
            src_ip: [192, 168, 1, 1],
            dst_ip: [192, 168, 1, 2],
            payload: Vec::new(),
        }
    }
}

impl Ipv4Builder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn protocol(mut self, protocol: u8) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn tcp(self) -> Self {
        self.protocol(6)
    }

    pub fn udp(self) -> Self {
        self.protocol(17)
    }

    pub fn src_ip(mut self, ip: [u8; 4]) -> Self {
        self.src_ip = ip;
        self
    }

    pub fn dst_ip(mut self, ip: [u8; 4]) -> Self {
        self.dst_ip = ip;
        self
    }

    pub fn payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let total_length = (20 + self.payload.len()) as u16;
        let mut header = Vec::with_capacity(20 + self.payload.len());

        header.push(0x45); // Version 4, IHL 5
        header.push(0x00);
        header.extend_from_slice(&total_length.to_be_bytes());
        header.extend_from_slice(&[0x00, 0x01]); // Identification
        header.extend_from_slice(&[0x40, 0x00]); // Don't fragment
        header.push(self.ttl);
        header.push(self.protocol);
        header.extend_from_slice(&[0x00, 0x00]); // Checksum (not calculated)
        header.extend_from_slice(&self.src_ip);
        header.extend_from_slice(&self.dst_ip);
        header.extend_from_slice(&self.payload);

        header
    }
}

/// Builder for constructing TCP headers.
#[derive(Debug, Clone)]
pub struct TcpBuilder {
    src_port: u16,
    dst_port: u16,
    seq: u32,
    ack: u32,
    flags: u8,
    payload: Vec<u8>,
}

impl Default for TcpBuilder {
    fn default() -> Self {
        Self {
            src_port: 12345,
            dst_port: 80,
            seq: 1,
            ack: 0,
            flags: 0x02, // SYN
            payload: Vec::new(),
        }
    }
}

impl TcpBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn src_port(mut self, port: u16) -> Self {
        self.src_port = port;
        self
    }

    pub fn dst_port(mut self, port: u16) -> Self {
        self.dst_port = port;
        self
    }

    pub fn seq(mut self, seq: u32) -> Self {
        self.seq = seq;
        self
    }

    pub fn ack_num(mut self, ack: u32) -> Self {
        self.ack = ack;
        self
    }

    pub fn flags(mut self, flags: u8) -> Self {
        self.flags = flags;
        self
    }

    pub fn syn_ack(self) -> Self {
        self.flags(0x12)
    }

    pub fn payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut header = Vec::with_capacity(20 + self.payload.len());

        header.extend_from_slice(&self.src_port.to_be_bytes());
        header.extend_from_slice(&self.dst_port.to_be_bytes());
        header.extend_from_slice(&self.seq.to_be_bytes());
        header.extend_from_slice(&self.ack.to_be_bytes());
        header.push(5 << 4); // Data offset 5 words
        header.push(self.flags);
        header.extend_from_slice(&65535u16.to_be_bytes()); // Window
        header.extend_from_slice(&[0x00, 0x00]); // Checksum
        header.extend_from_slice(&[0x00, 0x00]); // Urgent pointer
        header.extend_from_slice(&self.payload);

        header
    }
}

/// Builder for constructing UDP headers.
#[derive(Debug, Clone)]
pub struct UdpBuilder {
    src_port: u16,
    dst_port: u16,
    payload: Vec<u8>,
}

impl Default for UdpBuilder {
    fn default() -> Self {
        Self {
            src_port: 12345,
            dst_port: 53,
            payload: Vec::new(),
        }
    }
}

impl UdpBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn src_port(mut self, port: u16) -> Self {
        self.src_port = port;
        self
    }

    pub fn dst_port(mut self, port: u16) -> Self {
        self.dst_port = port;
        self
    }

    pub fn payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let length = (8 + self.payload.len()) as u16;
        let mut header = Vec::with_capacity(8 + self.payload.len());
        header.extend_from_slice(&self.src_port.to_be_bytes());
        header.extend_from_slice(&self.dst_port.to_be_bytes());
        header.extend_from_slice(&length.to_be_bytes());
        header.extend_from_slice(&[0x00, 0x00]); // Checksum
        header.extend_from_slice(&self.payload);
        header
    }
}

/// Builder for classic capture files held in memory.
#[derive(Debug, Clone, Default)]
pub struct PcapBuilder {
    big_endian: bool,
    nanosecond: bool,
    records: Vec<(u32, u32, Vec<u8>)>,
}

impl PcapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn big_endian(mut self) -> Self {
        self.big_endian = true;
        self
    }

    pub fn nanosecond(mut self) -> Self {
        self.nanosecond = true;
        self
    }

    pub fn record(mut self, ts_sec: u32, ts_frac: u32, data: &[u8]) -> Self {
        self.records.push((ts_sec, ts_frac, data.to_vec()));
        self
    }

    fn u16(&self, v: u16) -> [u8; 2] {
        if self.big_endian {
            v.to_be_bytes()
        } else {
            v.to_le_bytes()
        }
    }

    fn u32(&self, v: u32) -> [u8; 4] {
        if self.big_endian {
            v.to_be_bytes()
        } else {
            v.to_le_bytes()
        }
    }

    pub fn build(self) -> Vec<u8> {
        let magic: u32 = if self.nanosecond { 0xa1b23c4d } else { 0xa1b2c3d4 };
        let mut data = Vec::new();
        data.extend_from_slice(&self.u32(magic));
        data.extend_from_slice(&self.u16(2)); // Version major
        data.extend_from_slice(&self.u16(4)); // Version minor
        data.extend_from_slice(&self.u32(0)); // Thiszone
        data.extend_from_slice(&self.u32(0)); // Sigfigs
        data.extend_from_slice(&self.u32(65535)); // Snaplen
        data.extend_from_slice(&self.u32(1)); // Ethernet

        for (ts_sec, ts_frac, frame) in &self.records {
            let len = frame.len() as u32;
            data.extend_from_slice(&self.u32(*ts_sec));
            data.extend_from_slice(&self.u32(*ts_frac));
            data.extend_from_slice(&self.u32(len));
            data.extend_from_slice(&self.u32(len));
            data.extend_from_slice(frame);
        }

        data
    }
}

/// Ethernet + IPv4 + TCP frame.
pub fn tcp_frame(
    src: ([u8; 4], u16),
    dst: ([u8; 4], u16),
    flags: u8,
    seq: u32,
    payload: &[u8],
) -> Vec<u8> {
    let tcp = TcpBuilder::new()
        .src_port(src.1)
        .dst_port(dst.1)
        .seq(seq)
        .flags(flags)
        .payload(payload.to_vec())
        .build();
    let ip = Ipv4Builder::new()
        .src_ip(src.0)
        .dst_ip(dst.0)
        .tcp()
        .payload(tcp)
        .build();
    EthernetBuilder::new().payload(ip).build()
}

/// Header-extracted TCP packet.
pub fn tcp_packet(
    id: u64,
    timestamp_ms: i64,
    src: ([u8; 4], u16),
    dst: ([u8; 4], u16),
    flags: u8,
    payload: &[u8],
) -> ParsedPacket {
    let frame = tcp_frame(src, dst, flags, 1, payload);
    HeaderExtractor::default().packet_from_frame(PacketId(id), timestamp_ms, Bytes::from(frame))
}

/// Header-extracted UDP packet.
pub fn udp_packet(
    id: u64,
    timestamp_ms: i64,
    src: ([u8; 4], u16),
    dst: ([u8; 4], u16),
    payload: &[u8],
) -> ParsedPacket {
    let udp = UdpBuilder::new()
        .src_port(src.1)
        .dst_port(dst.1)
        .payload(payload.to_vec())
        .build();
    let ip = Ipv4Builder::new()
        .src_ip(src.0)
        .dst_ip(dst.0)
        .udp()
        .payload(udp)
        .build();
    let frame = EthernetBuilder::new().payload(ip).build();
    HeaderExtractor::default().packet_from_frame(PacketId(id), timestamp_ms, Bytes::from(frame))
}
