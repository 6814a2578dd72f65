//! IPv6 header fields.
//!
//! Only the fixed header is read. Extension headers are not walked, so the
//! transport is whatever the fixed header's next-header field names.

use std::net::IpAddr;

use etherparse::Ipv6HeaderSlice;

use super::{NetworkFields, Underruns};
use crate::error::HeaderError;

/// Fixed IPv6 header length.
pub const HEADER_LEN: usize = 40;

pub fn parse(ip: &[u8], underruns: &mut Underruns) -> NetworkFields {
    match Ipv6HeaderSlice::from_slice(ip) {
        Ok(header) => NetworkFields {
            version: 6,
            header_len: HEADER_LEN,
            protocol: Some(header.next_header().0),
            src: Some(IpAddr::V6(header.source_addr())),
            dst: Some(IpAddr::V6(header.destination_addr())),
        },
        Err(_) => {
            underruns.push(HeaderError {
                layer: "IPv6",
                needed: HEADER_LEN,
                have: ip.len(),
            });
            NetworkFields {
                version: 6,
                header_len: HEADER_LEN,
                protocol: None,
                src: None,
                dst: None,
            }
        }
    }
}
