//! IPv4 header fields.

use std::net::{IpAddr, Ipv4Addr};

use super::{field, read_array, read_u8, NetworkFields, Underruns};

/// IPv4 header length without options.
pub const MIN_HEADER_LEN: usize = 20;

const LAYER: &str = "IPv4";

/// Read the IPv4 fields the analysis needs.
///
/// The header length comes from the IHL nibble. A missing or undersized IHL
/// falls back to the option-less 20 bytes.
pub fn parse(ip: &[u8], underruns: &mut Underruns) -> NetworkFields {
    let header_len = field(read_u8(ip, 0, LAYER), underruns)
        .map(|b| usize::from(b & 0x0f) * 4)
        .filter(|len| *len >= MIN_HEADER_LEN)
        .unwrap_or(MIN_HEADER_LEN);

    let protocol = field(read_u8(ip, 9, LAYER), underruns);
    let src = field(read_array::<4>(ip, 12, LAYER), underruns).map(|a| IpAddr::V4(Ipv4Addr::from(a)));
    let dst = field(read_array::<4>(ip, 16, LAYER), underruns).map(|a| IpAddr::V4(Ipv4Addr::from(a)));

    NetworkFields {
        version: 4,
        header_len,
        protocol,
        src,
        dst,
    }
}
