//! Shared helpers for integration tests.
//!
//! Frames are encoded with etherparse so the engine is checked against an
//! independent encoder, then wrapped in a classic little-endian capture.

#![allow(dead_code)]

use etherparse::PacketBuilder;

pub const SYN: u8 = 0x02;
pub const PSH_ACK: u8 = 0x18;
pub const SYN_ACK: u8 = 0x12;

/// Ethernet + IPv4 + TCP frame with an explicit flag byte.
pub fn tcp_frame(src: ([u8; 4], u16), dst: ([u8; 4], u16), seq: u32, flags: u8, payload: &[u8]) -> Vec<u8> {
    let builder = PacketBuilder::ethernet2([0x02, 0, 0, 0, 0, 1], [0x02, 0, 0, 0, 0, 2])
        .ipv4(src.0, dst.0, 64)
        .tcp(src.1, dst.1, seq, 65535);
    let mut buf = Vec::with_capacity(builder.size(payload.len()));
    builder.write(&mut buf, payload).unwrap();
    // eth(14) + ipv4(20) + flags offset(13)
    buf[14 + 20 + 13] = flags;
    buf
}

/// Ethernet + IPv6 + TCP frame.
pub fn tcp6_frame(src: ([u8; 16], u16), dst: ([u8; 16], u16), payload: &[u8]) -> Vec<u8> {
    let builder = PacketBuilder::ethernet2([0x02, 0, 0, 0, 0, 1], [0x02, 0, 0, 0, 0, 2])
        .ipv6(src.0, dst.0, 64)
        .tcp(src.1, dst.1, 1, 65535)
        .psh();
    let mut buf = Vec::new();
    builder.write(&mut buf, payload).unwrap();
    buf
}

/// Ethernet + IPv4 + UDP frame.
pub fn udp_frame(src: ([u8; 4], u16), dst: ([u8; 4], u16), payload: &[u8]) -> Vec<u8> {
    let builder = PacketBuilder::ethernet2([0x02, 0, 0, 0, 0, 1], [0x02, 0, 0, 0, 0, 2])
        .ipv4(src.0, dst.0, 64)
        .udp(src.1, dst.1);
    let mut buf = Vec::new();
    builder.write(&mut buf, payload).unwrap();
    buf
}

/// Classic little-endian microsecond capture.
#[derive(Debug, Default)]
pub struct Capture {
    records: Vec<(u32, u32, Vec<u8>)>,
}

impl Capture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a frame captured at `ts_ms` epoch milliseconds.
    pub fn frame(mut self, ts_ms: u64, frame: Vec<u8>) -> Self {
        let sec = (ts_ms / 1000) as u32;
        let usec = ((ts_ms % 1000) * 1000) as u32;
        self.records.push((sec, usec, frame));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&0xa1b2c3d4u32.to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes());
        out.extend_from_slice(&4u16.to_le_bytes());
        out.extend_from_slice(&0i32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&65535u32.to_le_bytes());
        out.extend_from_slice(&1u32.to_le_bytes()); // Ethernet
        for (sec, usec, frame) in &self.records {
            let len = frame.len() as u32;
            out.extend_from_slice(&sec.to_le_bytes());
            out.extend_from_slice(&usec.to_le_bytes());
            out.extend_from_slice(&len.to_le_bytes());
            out.extend_from_slice(&len.to_le_bytes());
            out.extend_from_slice(frame);
        }
        out
    }
}
