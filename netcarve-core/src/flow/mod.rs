//! Bidirectional flow aggregation.
//!
//! Packets are bucketed under a canonical key built from the unordered
//! endpoint pair and the transport protocol, so both directions of a
//! conversation land in the same [`Flow`].

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;

use compact_str::{CompactString, ToCompactString};
use serde::{Serialize, Serializer};
use tracing::debug;

use crate::packet::{PacketId, ParsedPacket, ProtocolLabels, Transport};

/// One side of a flow.
///
/// Endpoints order by the text form of the address, then by port, so
/// `10.0.0.10` sorts before `10.0.0.9`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub ip: IpAddr,
    pub port: u16,
}

impl Ord for Endpoint {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.ip == other.ip {
            return self.port.cmp(&other.port);
        }
        self.ip
            .to_compact_string()
            .cmp(&other.ip.to_compact_string())
            .then(self.port.cmp(&other.port))
    }
}

impl PartialOrd for Endpoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for Endpoint {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ip {
            IpAddr::V6(v6) => write!(f, "[{v6}]:{}", self.port),
            IpAddr::V4(v4) => write!(f, "{v4}:{}", self.port),
        }
    }
}

/// Canonical flow key.
///
/// `a` is the lower endpoint: address text compares first, ports break ties.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FlowKey {
    pub a: Endpoint,
    pub b: Endpoint,
    pub transport: Transport,
}

impl FlowKey {
    /// Create a normalized key from either direction of a conversation.
    pub fn new(src_ip: IpAddr, src_port: u16, dst_ip: IpAddr, dst_port: u16, transport: Transport) -> Self {
        let src = Endpoint { ip: src_ip, port: src_port };
        let dst = Endpoint { ip: dst_ip, port: dst_port };
        let (a, b) = if src <= dst { (src, dst) } else { (dst, src) };
        Self { a, b, transport }
    }

    pub fn from_packet(packet: &ParsedPacket) -> Self {
        Self::new(
            packet.src_ip,
            packet.src_port,
            packet.dst_ip,
            packet.dst_port,
            packet.transport,
        )
    }

    /// Whether `packet` belongs to this flow.
    pub fn matches(&self, packet: &ParsedPacket) -> bool {
        packet.transport == self.transport && {
            let src = Endpoint { ip: packet.src_ip, port: packet.src_port };
            let dst = Endpoint { ip: packet.dst_ip, port: packet.dst_port };
            (src == self.a && dst == self.b) || (src == self.b && dst == self.a)
        }
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.a, self.b, self.transport)
    }
}

impl Serialize for FlowKey {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

/// Aggregated statistics for one bidirectional conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Flow {
    pub key: FlowKey,
    pub start_ms: i64,
    pub end_ms: i64,
    pub duration_ms: i64,
    pub packet_count: usize,
    pub total_bytes: u64,
    /// Member packets in arrival order.
    pub packet_ids: Vec<PacketId>,
    /// Union of member packets' protocol labels, first-seen order.
    pub protocols: ProtocolLabels,
}

impl Flow {
    fn new(key: FlowKey, packet: &ParsedPacket) -> Self {
        Self {
            key,
            start_ms: packet.timestamp_ms,
            end_ms: packet.timestamp_ms,
            duration_ms: 0,
            packet_count: 0,
            total_bytes: 0,
            packet_ids: Vec::new(),
            protocols: ProtocolLabels::new(),
        }
    }

    fn add(&mut self, packet: &ParsedPacket) {
        self.start_ms = self.start_ms.min(packet.timestamp_ms);
        self.end_ms = self.end_ms.max(packet.timestamp_ms);
        self.duration_ms = self.end_ms - self.start_ms;
        self.packet_count += 1;
        self.total_bytes += packet.length as u64;
        self.packet_ids.push(packet.id);
        for label in &packet.protocols {
            if !self.protocols.iter().any(|p| p.eq_ignore_ascii_case(label)) {
                self.protocols.push(CompactString::from(label.as_str()));
            }
        }
    }
}

/// Incremental flow builder.
#[derive(Debug, Default)]
pub struct FlowAggregator {
    index: HashMap<FlowKey, usize>,
    flows: Vec<Flow>,
}

impl FlowAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one packet and return the key of the flow it joined.
    pub fn add(&mut self, packet: &ParsedPacket) -> FlowKey {
        let key = FlowKey::from_packet(packet);
        let idx = match self.index.get(&key) {
            Some(&idx) => idx,
            None => {
                let idx = self.flows.len();
                self.flows.push(Flow::new(key.clone(), packet));
                self.index.insert(key.clone(), idx);
                idx
            }
        };
        self.flows[idx].add(packet);
        key
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    /// Flows sorted by start time. Flows starting together keep first-seen order.
    pub fn finish(self) -> Vec<Flow> {
        let mut flows = self.flows;
        flows.sort_by_key(|f| f.start_ms);
        debug!(flows = flows.len(), "flow aggregation finished");
        flows
    }
}

/// Aggregate packets into flows and record each packet's flow key.
pub fn aggregate(packets: &mut [ParsedPacket]) -> Vec<Flow> {
    let mut aggregator = FlowAggregator::new();
    for packet in packets.iter_mut() {
        let key = aggregator.add(packet);
        packet.set_flow_id(key);
    }
    aggregator.finish()
}
