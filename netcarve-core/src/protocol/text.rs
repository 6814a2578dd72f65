//! Text-mode input.
//!
//! A buffer that is not a capture is treated as a single application payload,
//! such as a pasted HTTP request or an FTP control exchange. The endpoints are
//! placeholders from the documentation ranges, and the ports are chosen from
//! the protocol the text looks like.

use std::net::{IpAddr, Ipv4Addr};

use bytes::Bytes;

use crate::packet::{PacketId, ParsedPacket, Transport};

/// Placeholder client address (TEST-NET-1).
pub const TEXT_CLIENT: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1));

/// Placeholder server address (TEST-NET-1).
pub const TEXT_SERVER: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 2));

/// Ephemeral port used for the placeholder client.
pub const TEXT_CLIENT_PORT: u16 = 49152;

const HTTP_MARKERS: &[&str] = &[
    "GET ", "POST ", "PUT ", "DELETE ", "HEAD ", "OPTIONS ", "PATCH ", "HTTP/1.", "HTTP/2",
];

const FTP_MARKERS: &[&str] = &[
    "USER ", "PASS ", "STOR ", "RETR ", "PORT ", "PASV", "EPRT ", "EPSV", "227 ",
];

/// Server port implied by the text content, if any.
fn infer_server_port(text: &str) -> Option<u16> {
    let head = text.trim_start().as_bytes();
    let starts_with_any = |markers: &[&str]| {
        markers.iter().any(|m| {
            head.get(..m.len())
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case(m.as_bytes()))
        })
    };

    if starts_with_any(HTTP_MARKERS) {
        Some(80)
    } else if starts_with_any(FTP_MARKERS) {
        Some(21)
    } else {
        None
    }
}

/// Build the single packet produced by text-mode input.
pub fn packet_from_text(id: PacketId, timestamp_ms: i64, text: &str) -> ParsedPacket {
    let mut packet = ParsedPacket::new(id, timestamp_ms, Bytes::copy_from_slice(text.as_bytes()));
    packet.src_ip = TEXT_CLIENT;
    packet.dst_ip = TEXT_SERVER;
    packet.transport = Transport::Tcp;

    if let Some(port) = infer_server_port(text) {
        packet.src_port = TEXT_CLIENT_PORT;
        packet.dst_port = port;
    }

    packet
}
