//! Direction-tagged stream reassembly for one TCP flow.
//!
//! The first member packet seen fixes the client endpoint. Every later
//! segment is tagged by comparing its source with that endpoint, so
//! direction is never re-derived from flags or ports.

use std::fmt::Write as _;

use bytes::Bytes;
use serde::Serialize;

use crate::flow::{Endpoint, FlowKey};
use crate::packet::{PacketId, ParsedPacket, Transport};

/// Direction of a segment relative to the fixed client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    ToServer,
    ToClient,
}

impl Direction {
    /// Return a string representation of the direction.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::ToServer => "to_server",
            Direction::ToClient => "to_client",
        }
    }

    fn marker(&self) -> &'static str {
        match self {
            Direction::ToServer => ">>",
            Direction::ToClient => "<<",
        }
    }
}

/// One payload-bearing packet of a stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    pub packet_id: PacketId,
    pub timestamp_ms: i64,
    pub direction: Direction,
    #[serde(skip)]
    pub payload: Bytes,
    pub seq: Option<u32>,
    pub length: usize,
}

/// The ordered segments of one flow.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReassembledStream {
    pub flow: FlowKey,
    pub client: Option<Endpoint>,
    pub segments: Vec<Segment>,
    pub total_bytes: usize,
    pub start_ms: i64,
    pub end_ms: i64,
}

impl ReassembledStream {
    fn empty(flow: FlowKey) -> Self {
        Self {
            flow,
            client: None,
            segments: Vec::new(),
            total_bytes: 0,
            start_ms: 0,
            end_ms: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Concatenated payload sent in one direction.
    pub fn direction_bytes(&self, direction: Direction) -> Vec<u8> {
        self.segments
            .iter()
            .filter(|s| s.direction == direction)
            .flat_map(|s| s.payload.iter().copied())
            .collect()
    }

    /// Printable rendering of the conversation, one block per segment.
    ///
    /// Non-printable bytes other than CR, LF and TAB are shown as `.`.
    pub fn conversation(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            let _ = writeln!(
                out,
                "{} {} {} bytes @ {}",
                segment.direction.marker(),
                segment.packet_id,
                segment.length,
                segment.timestamp_ms
            );
            out.extend(segment.payload.iter().map(|&b| match b {
                b'\r' | b'\n' | b'\t' | 0x20..=0x7e => b as char,
                _ => '.',
            }));
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }
        out
    }
}

/// Reassemble the TCP conversation identified by `flow`.
///
/// Segments are sorted by timestamp; equal timestamps keep arrival order.
/// A flow with no TCP member packets yields an empty stream.
pub fn reassemble_stream(packets: &[ParsedPacket], flow: &FlowKey) -> ReassembledStream {
    if flow.transport != Transport::Tcp {
        return ReassembledStream::empty(flow.clone());
    }

    let mut members = packets
        .iter()
        .filter(|p| p.transport == Transport::Tcp && flow.matches(p))
        .peekable();

    let Some(first) = members.peek() else {
        return ReassembledStream::empty(flow.clone());
    };
    let client = Endpoint {
        ip: first.src_ip,
        port: first.src_port,
    };

    let mut segments: Vec<Segment> = members
        .filter(|p| !p.payload().is_empty())
        .map(|p| {
            let source = Endpoint {
                ip: p.src_ip,
                port: p.src_port,
            };
            let payload = p.payload_bytes();
            Segment {
                packet_id: p.id,
                timestamp_ms: p.timestamp_ms,
                direction: if source == client {
                    Direction::ToServer
                } else {
                    Direction::ToClient
                },
                length: payload.len(),
                payload,
                seq: p.tcp.map(|t| t.seq),
            }
        })
        .collect();
    segments.sort_by_key(|s| s.timestamp_ms);

    let total_bytes = segments.iter().map(|s| s.length).sum();
    let start_ms = segments.first().map_or(0, |s| s.timestamp_ms);
    let end_ms = segments.last().map_or(0, |s| s.timestamp_ms);

    ReassembledStream {
        flow: flow.clone(),
        client: Some(client),
        segments,
        total_bytes,
        start_ms,
        end_ms,
    }
}
