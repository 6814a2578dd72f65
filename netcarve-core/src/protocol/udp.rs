//! UDP header fields.

use super::{field, read_u16, TransportFields, Underruns};

/// IP protocol number for UDP.
pub const IP_PROTO_UDP: u8 = 17;

/// UDP header length.
pub const HEADER_LEN: usize = 8;

pub fn parse(segment: &[u8], underruns: &mut Underruns) -> TransportFields {
    TransportFields {
        src_port: field(read_u16(segment, 0, "UDP"), underruns).unwrap_or(0),
        dst_port: field(read_u16(segment, 2, "UDP"), underruns).unwrap_or(0),
        tcp: None,
        header_len: HEADER_LEN,
    }
}
