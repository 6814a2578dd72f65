//! TCP header fields and flag decoding.

use std::fmt;

use serde::ser::SerializeSeq;
use serde::Serialize;
use smallvec::SmallVec;

use super::{field, read_u16, read_u32, read_u8, TransportFields, Underruns};
use crate::packet::TcpMeta;

/// IP protocol number for TCP.
pub const IP_PROTO_TCP: u8 = 6;

/// TCP header length without options.
pub const MIN_HEADER_LEN: usize = 20;

const LAYER: &str = "TCP";

/// TCP flags bit positions.
pub mod flags {
    pub const FIN: u8 = 0x01;
    pub const SYN: u8 = 0x02;
    pub const RST: u8 = 0x04;
    pub const PSH: u8 = 0x08;
    pub const ACK: u8 = 0x10;
    pub const URG: u8 = 0x20;
    pub const ECE: u8 = 0x40;
    pub const CWR: u8 = 0x80;
}

const FLAG_NAMES: [(u8, &str); 8] = [
    (flags::FIN, "FIN"),
    (flags::SYN, "SYN"),
    (flags::RST, "RST"),
    (flags::PSH, "PSH"),
    (flags::ACK, "ACK"),
    (flags::URG, "URG"),
    (flags::ECE, "ECE"),
    (flags::CWR, "CWR"),
];

/// The TCP flag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TcpFlags(pub u8);

impl TcpFlags {
    pub fn contains(&self, mask: u8) -> bool {
        self.0 & mask == mask
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Names of the set bits, lowest bit first.
    pub fn names(&self) -> SmallVec<[&'static str; 8]> {
        FLAG_NAMES
            .iter()
            .filter(|(bit, _)| self.0 & bit != 0)
            .map(|(_, name)| *name)
            .collect()
    }
}

impl fmt::Display for TcpFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.names().join(","))
    }
}

impl Serialize for TcpFlags {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let names = self.names();
        let mut seq = s.serialize_seq(Some(names.len()))?;
        for name in names {
            seq.serialize_element(name)?;
        }
        seq.end()
    }
}

/// Read ports, sequence numbers and flags from a TCP header.
pub fn parse(segment: &[u8], underruns: &mut Underruns) -> TransportFields {
    let src_port = field(read_u16(segment, 0, LAYER), underruns).unwrap_or(0);
    let dst_port = field(read_u16(segment, 2, LAYER), underruns).unwrap_or(0);
    let seq = field(read_u32(segment, 4, LAYER), underruns);
    let ack = field(read_u32(segment, 8, LAYER), underruns);
    let header_len = field(read_u8(segment, 12, LAYER), underruns)
        .map(|b| usize::from(b >> 4) * 4)
        .filter(|len| *len >= MIN_HEADER_LEN)
        .unwrap_or(MIN_HEADER_LEN);
    let flags = field(read_u8(segment, 13, LAYER), underruns);

    TransportFields {
        src_port,
        dst_port,
        tcp: flags.map(|f| TcpMeta {
            flags: TcpFlags(f),
            seq: seq.unwrap_or(0),
            ack: ack.unwrap_or(0),
        }),
        header_len,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TcpBuilder;

    // Test 1: flag names decode lowest bit first
    #[test]
    fn test_flag_names() {
        assert_eq!(TcpFlags(0x02).names().as_slice(), &["SYN"]);
        assert_eq!(TcpFlags(0x12).names().as_slice(), &["SYN", "ACK"]);
        assert_eq!(TcpFlags(0x11).names().as_slice(), &["FIN", "ACK"]);
        assert_eq!(TcpFlags(0x29).names().as_slice(), &["FIN", "PSH", "URG"]);
        assert!(TcpFlags(0).names().is_empty());
        assert_eq!(TcpFlags(0xff).names().len(), 8);
    }

    #[test]
    fn test_flag_display_and_contains() {
        let f = TcpFlags(flags::SYN | flags::ACK);
        assert_eq!(f.to_string(), "SYN,ACK");
        assert!(f.contains(flags::SYN));
        assert!(!f.contains(flags::SYN | flags::FIN));
    }

    // Test 2: header fields
    #[test]
    fn test_parse_tcp_header() {
        let segment = TcpBuilder::new()
            .src_port(443)
            .dst_port(50000)
            .seq(0xdeadbeef)
            .ack_num(7)
            .syn_ack()
            .build();
        let fields = parse(&segment, &mut Underruns::new());

        assert_eq!(fields.src_port, 443);
        assert_eq!(fields.dst_port, 50000);
        assert_eq!(fields.header_len, 20);
        let tcp = fields.tcp.unwrap();
        assert_eq!(tcp.seq, 0xdeadbeef);
        assert_eq!(tcp.ack, 7);
        assert_eq!(tcp.flags, TcpFlags(0x12));
    }

    #[test]
    fn test_data_offset_with_options() {
        let mut segment = TcpBuilder::new().payload(vec![0; 12]).build();
        segment[12] = 0x80; // 32-byte header
        let fields = parse(&segment, &mut Underruns::new());
        assert_eq!(fields.header_len, 32);
    }

    #[test]
    fn test_serialize_flags() {
        let json = serde_json::to_string(&TcpFlags(0x18)).unwrap();
        assert_eq!(json, r#"["PSH","ACK"]"#);
    }
}
