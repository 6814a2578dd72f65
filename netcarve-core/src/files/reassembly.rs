//! File content reassembly.
//!
//! Gathers the packets carrying a detected file's bytes, orders them by
//! timestamp, strips HTTP framing and hashes the result. A reference without
//! a source packet is refused outright: nothing is guessed.

use bytes::Bytes;
use tracing::{debug, warn};

use super::http::{decode_chunked, parse_response_head};
use super::{FileReference, FileSource};
use crate::digest::{sha1_hex, sha256_hex};
use crate::error::ReassemblyError;
use crate::flow::{Endpoint, FlowKey};
use crate::packet::{ParsedPacket, Transport};

/// Reassemble `file` from `packets` into a completed copy.
///
/// The input reference is never modified. On error the caller keeps it as is.
pub fn reassemble_file(packets: &[ParsedPacket], file: &FileReference) -> Result<FileReference, ReassemblyError> {
    let source_id = file
        .source_packet_id
        .ok_or_else(|| ReassemblyError::MissingSourcePacket {
            file_id: file.id.clone(),
        })?;
    let source = packets
        .iter()
        .find(|p| p.id == source_id)
        .ok_or_else(|| ReassemblyError::SourcePacketNotFound {
            file_id: file.id.clone(),
            packet_id: source_id.0,
        })?;

    let data = match file.source {
        FileSource::Ftp => ftp_data(packets, file, source),
        FileSource::HttpResponse => http_body(packets, source, endpoint(source, true), true),
        FileSource::HttpRequest => http_body(packets, source, endpoint(source, false), false),
    };

    let mut data = data.filter(|d| !d.is_empty()).ok_or_else(|| ReassemblyError::NoData {
        file_id: file.id.clone(),
    })?;
    if let Some(size) = file.size.and_then(|s| usize::try_from(s).ok()) {
        data.truncate(size);
    }

    let mut done = file.clone();
    done.hash = sha256_hex(&data);
    done.secondary_hash = Some(sha1_hex(&data));
    if done.size.is_none() {
        done.size = Some(data.len() as u64);
    }
    done.data = Some(Bytes::from(data));
    debug!(file = %done.id, bytes = ?done.size, "file reassembled");
    Ok(done)
}

/// Reassemble, or log why not and return the reference unchanged.
///
/// Missing source linkage is logged as a warning. A transfer whose bytes were
/// simply not captured is only a debug event.
pub fn reassemble_or_keep(packets: &[ParsedPacket], file: &FileReference) -> FileReference {
    match reassemble_file(packets, file) {
        Ok(done) => done,
        Err(e @ ReassemblyError::NoData { .. }) => {
            debug!(file = %file.id, error = %e, "no data captured for file");
            file.clone()
        }
        Err(e) => {
            warn!(file = %file.id, error = %e, "file left incomplete");
            file.clone()
        }
    }
}

fn endpoint(packet: &ParsedPacket, source_side: bool) -> Endpoint {
    if source_side {
        Endpoint {
            ip: packet.src_ip,
            port: packet.src_port,
        }
    } else {
        Endpoint {
            ip: packet.dst_ip,
            port: packet.dst_port,
        }
    }
}

/// Payload-bearing packets at or after `source`, stable-sorted by timestamp.
fn ordered_after<'a>(
    packets: &'a [ParsedPacket],
    source: &ParsedPacket,
    keep: impl Fn(&ParsedPacket) -> bool,
) -> Vec<&'a ParsedPacket> {
    let mut selected: Vec<&ParsedPacket> = packets
        .iter()
        .filter(|p| p.timestamp_ms >= source.timestamp_ms && !p.payload().is_empty() && keep(*p))
        .collect();
    selected.sort_by_key(|p| p.timestamp_ms);
    selected
}

/// Bytes of the FTP data connection on the announced port.
fn ftp_data(packets: &[ParsedPacket], file: &FileReference, source: &ParsedPacket) -> Option<Vec<u8>> {
    let port = file.ftp_data_port?;
    let control = (source.src_port, source.dst_port);
    let hosts = (source.src_ip, source.dst_ip);
    let segments = ordered_after(packets, source, |p| {
        p.transport == Transport::Tcp
            && ((p.src_ip, p.dst_ip) == hosts || (p.dst_ip, p.src_ip) == hosts)
            && (p.src_port == port || p.dst_port == port)
            && (p.src_port, p.dst_port) != control
            && (p.dst_port, p.src_port) != control
    });
    Some(segments.iter().flat_map(|p| p.payload().iter().copied()).collect())
}

/// Response body sent by `sender` on the source packet's flow.
///
/// The walk starts at the first segment carrying a response head and stops
/// at the next one, or once the declared length is reached.
fn http_body(packets: &[ParsedPacket], source: &ParsedPacket, sender: Endpoint, from_source: bool) -> Option<Vec<u8>> {
    let flow = FlowKey::from_packet(source);
    let segments = ordered_after(packets, source, |p| {
        flow.matches(p) && p.src_ip == sender.ip && p.src_port == sender.port
    });

    let mut iter = segments.into_iter();
    let head_packet = if from_source {
        // The source packet leads; equal timestamps may have put others first.
        let mut rest: Vec<_> = iter.collect();
        let at = rest.iter().position(|p| p.id == source.id)?;
        let first = rest.remove(at);
        iter = rest.into_iter();
        first
    } else {
        iter.find(|p| p.payload().starts_with(b"HTTP/"))?
    };

    let head = parse_response_head(head_packet.payload())?;
    let header_len = head.header_len?;
    let declared = head.content_length().and_then(|n| usize::try_from(n).ok());

    let mut body = head_packet.payload()[header_len..].to_vec();
    for packet in iter {
        if declared.is_some_and(|n| body.len() >= n) || packet.payload().starts_with(b"HTTP/") {
            break;
        }
        body.extend_from_slice(packet.payload());
    }

    if head.is_chunked() {
        body = decode_chunked(&body);
    }
    if let Some(n) = declared {
        body.truncate(n);
    }
    Some(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::{FileDetector, FtpSessionTracker, FtpTransferType};
    use crate::packet::PacketId;
    use crate::protocol::tcp::flags;
    use crate::test_utils::tcp_packet;

    const CLIENT: ([u8; 4], u16) = ([10, 0, 0, 1], 40000);
    const WEB: ([u8; 4], u16) = ([10, 0, 0, 2], 80);

    const FIRST: &[u8] = b"This is the first part.";
    const SECOND: &[u8] = b"And this is the second part.";

    fn response_packets() -> Vec<ParsedPacket> {
        let mut head = b"HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\nContent-Length: 51\r\n\r\n".to_vec();
        head.extend_from_slice(FIRST);
        vec![
            tcp_packet(1, 100, WEB, CLIENT, flags::PSH | flags::ACK, &head),
            tcp_packet(2, 200, WEB, CLIENT, flags::PSH | flags::ACK, SECOND),
        ]
    }

    fn detect_all(packets: &[ParsedPacket]) -> Vec<FileReference> {
        let detector = FileDetector::default();
        let mut ftp = FtpSessionTracker::new();
        packets.iter().flat_map(|p| detector.detect(p, &mut ftp)).collect()
    }

    fn expected() -> Vec<u8> {
        [FIRST, SECOND].concat()
    }

    // Test 1: two-part HTTP body
    #[test]
    fn test_http_two_parts() {
        let packets = response_packets();
        let files = detect_all(&packets);
        assert_eq!(files.len(), 1);

        let done = reassemble_file(&packets, &files[0]).unwrap();
        assert_eq!(done.data.as_deref(), Some(expected().as_slice()));
        assert_eq!(done.hash, sha256_hex(&expected()));
        assert_eq!(done.secondary_hash.as_deref(), Some(sha1_hex(&expected()).as_str()));
        assert!(done.is_complete());
        assert!(!files[0].is_complete());
    }

    // Test 2: ingestion order does not matter
    #[test]
    fn test_order_independent() {
        let mut packets = response_packets();
        let files = detect_all(&packets);
        packets.reverse();
        let done = reassemble_file(&packets, &files[0]).unwrap();
        assert_eq!(done.data.as_deref(), Some(expected().as_slice()));
    }

    // Test 3: missing source linkage is refused
    #[test]
    fn test_missing_source() {
        let packets = response_packets();
        let mut file = detect_all(&packets).remove(0);
        file.source_packet_id = None;

        let err = reassemble_file(&packets, &file).unwrap_err();
        assert!(matches!(err, ReassemblyError::MissingSourcePacket { .. }));
        let kept = reassemble_or_keep(&packets, &file);
        assert_eq!(kept, file);
        assert!(kept.hash.is_empty());
    }

    // Test 4: source packet absent from the set
    #[test]
    fn test_source_not_in_set() {
        let packets = response_packets();
        let mut file = detect_all(&packets).remove(0);
        file.source_packet_id = Some(PacketId(99));
        assert_eq!(
            reassemble_file(&packets, &file),
            Err(ReassemblyError::SourcePacketNotFound {
                file_id: file.id.clone(),
                packet_id: 99
            })
        );
    }

    // Test 5: FTP data connection on the announced port between the control hosts
    #[test]
    fn test_ftp_data_channel() {
        let client = ([10, 0, 0, 5], 50000);
        let server = ([10, 0, 0, 6], 21);
        let data_src = ([10, 0, 0, 5], 1234);
        let data_dst = ([10, 0, 0, 6], 20);
        let packets = vec![
            tcp_packet(1, 10, client, server, flags::PSH, b"PORT 10,0,0,5,4,210\r\n"),
            tcp_packet(2, 20, client, server, flags::PSH, b"STOR myfile.txt\r\n"),
            tcp_packet(4, 40, data_src, data_dst, flags::PSH, SECOND),
            tcp_packet(3, 30, data_src, data_dst, flags::PSH, FIRST),
            // Same port number between unrelated hosts
            tcp_packet(6, 35, ([10, 0, 0, 77], 1234), ([10, 0, 0, 78], 8443), flags::PSH, b"noise"),
            tcp_packet(5, 50, client, server, flags::PSH, b"QUIT\r\n"),
        ];
        let files = detect_all(&packets);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].ftp_transfer_type, Some(FtpTransferType::Stor));

        let done = reassemble_file(&packets, &files[0]).unwrap();
        assert_eq!(done.data.as_deref(), Some(expected().as_slice()));
        assert_eq!(done.size, Some(51));
    }

    // Test 6: chunked response found from the request
    #[test]
    fn test_request_with_chunked_response() {
        let packets = vec![
            tcp_packet(1, 10, CLIENT, WEB, flags::PSH, b"GET /dl/tool.exe HTTP/1.1\r\nHost: x\r\n\r\n"),
            tcp_packet(
                2,
                20,
                WEB,
                CLIENT,
                flags::PSH,
                b"HTTP/1.1 200 OK\r\nContent-Type: application/x-msdownload\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nMZ\x90\x00\x03\r\n",
            ),
            tcp_packet(3, 30, WEB, CLIENT, flags::PSH, b"2\r\nab\r\n0\r\n\r\n"),
        ];
        let files = detect_all(&packets);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].filename, "tool.exe");

        let done = reassemble_file(&packets, &files[0]).unwrap();
        assert_eq!(done.data.as_deref(), Some(&b"MZ\x90\x00\x03ab"[..]));
        assert_eq!(done.size, Some(7));
    }

    // Test 7: an absurd chunk size leaves the reference incomplete
    #[test]
    fn test_oversized_chunk_kept() {
        let packets = vec![
            tcp_packet(1, 10, CLIENT, WEB, flags::PSH, b"GET /dl/tool.exe HTTP/1.1\r\nHost: x\r\n\r\n"),
            tcp_packet(
                2,
                20,
                WEB,
                CLIENT,
                flags::PSH,
                b"HTTP/1.1 200 OK\r\nContent-Type: application/x-msdownload\r\nTransfer-Encoding: chunked\r\n\r\nffffffffffffffff\r\n",
            ),
        ];
        let files = detect_all(&packets);
        let kept = reassemble_or_keep(&packets, &files[0]);
        assert!(!kept.is_complete());
        assert!(kept.hash.is_empty());
    }

    #[test]
    fn test_no_data() {
        let packets = vec![tcp_packet(1, 10, CLIENT, WEB, flags::PSH, b"GET /a.zip HTTP/1.1\r\n\r\n")];
        let files = detect_all(&packets);
        assert!(matches!(
            reassemble_file(&packets, &files[0]),
            Err(ReassemblyError::NoData { .. })
        ));
    }
}
