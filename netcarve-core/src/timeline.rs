//! Timeline events handed to the host for its audit trail.

use compact_str::CompactString;
use serde::Serialize;

use crate::indicator::Severity;
use crate::packet::{PacketId, ParsedPacket};

/// One event per processed packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineEvent {
    pub id: String,
    pub packet_id: PacketId,
    pub timestamp_ms: i64,
    pub source: String,
    pub destination: String,
    /// Most specific protocol label of the packet.
    pub protocol: CompactString,
    pub description: String,
    /// Highest indicator severity, `low` when the packet has none.
    pub severity: Severity,
}

impl TimelineEvent {
    pub fn from_packet(packet: &ParsedPacket) -> Self {
        let protocol = packet
            .protocols
            .last()
            .cloned()
            .unwrap_or_else(|| packet.transport.label());

        let mut description = format!("{} {} bytes", protocol, packet.length);
        if let Some(flags) = packet.tcp_flags().filter(|f| !f.is_empty()) {
            description.push_str(&format!(" [{flags}]"));
        }
        if !packet.files.is_empty() {
            let names: Vec<&str> = packet.files.iter().map(|f| f.filename.as_str()).collect();
            description.push_str(&format!("; file: {}", names.join(", ")));
        }
        match packet.indicators.as_slice() {
            [] => {}
            [only] => description.push_str(&format!("; {}", only.description)),
            many => description.push_str(&format!("; {} indicators", many.len())),
        }

        Self {
            id: format!("evt-{}", packet.id.0),
            packet_id: packet.id,
            timestamp_ms: packet.timestamp_ms,
            source: packet.source(),
            destination: packet.destination(),
            protocol,
            description,
            severity: packet.max_severity().unwrap_or_default(),
        }
    }
}
