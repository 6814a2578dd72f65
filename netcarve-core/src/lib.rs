//! # netcarve-core
//!
//! Network forensics engine for packet captures.
//!
//! This crate turns an untrusted capture buffer into forensically useful
//! structure: enriched packets, bidirectional flows, direction-tagged TCP
//! conversations, carved files with content hashes, and heuristic indicators
//! of compromise. It performs no file or network I/O; hosts hand it bytes.
//!
//! ## Features
//!
//! - **Capture Decoding**: classic capture containers in both byte orders,
//!   microsecond and nanosecond precision, with truncation tolerance
//! - **Header Extraction**: best-effort IPv4/IPv6, TCP and UDP fields that
//!   never read past the frame
//! - **Classification**: port table plus payload sniffing
//! - **Artifacts**: IPs, URLs, emails, credentials, file paths and printable
//!   strings with byte offsets
//! - **Files**: HTTP and FTP transfer detection, reassembly and hashing
//! - **Flows and Streams**: canonical bidirectional flows and ordered
//!   conversations
//! - **Indicators**: injection, traversal, scan and cleartext credential rules
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use netcarve_core::prelude::*;
//!
//! # async fn run(bytes: Vec<u8>) {
//! let mut session = AnalysisSession::new(AnalysisConfig::default());
//! let analysis = session.analyze(&bytes).await;
//!
//! for flow in &analysis.flows {
//!     println!("{} {} packets", flow.key, flow.packet_count);
//! }
//! for file in &analysis.files {
//!     println!("{} {}", file.filename, file.hash);
//! }
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |                        netcarve-core                                |
//! +---------------------------------------------------------------------+
//! |  pcap/       - Capture container decoding                           |
//! |  protocol/   - Header extraction, text input, classification        |
//! |  artifact/   - Pattern battery and printable-string scan            |
//! |  indicator/  - Suspicious-indicator rules                           |
//! |  files/      - HTTP/FTP file detection and reassembly               |
//! |  flow/       - Bidirectional flow aggregation                       |
//! |  stream/     - Direction-tagged stream reassembly                   |
//! |  engine/     - Sessions, batching, timeouts, cancellation           |
//! |  timeline    - Per-packet audit events                              |
//! |  store       - Keyed-record persistence contract                    |
//! |  digest      - Content hashing                                      |
//! +---------------------------------------------------------------------+
//! ```

pub mod artifact;
pub mod config;
pub mod digest;
pub mod engine;
pub mod error;
pub mod files;
pub mod flow;
pub mod indicator;
pub mod packet;
pub mod pcap;
pub mod prelude;
pub mod protocol;
pub mod store;
pub mod stream;
pub mod timeline;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-export commonly used types at crate root for convenience
pub use artifact::{Artifact, ArtifactExtractor, ArtifactKind};
pub use config::AnalysisConfig;
pub use engine::{Analysis, AnalysisSession, AnalysisSummary, CancelHandle};
pub use error::{CaptureError, Error, ExtractionTimeout, HeaderError, ReassemblyError, Result, StoreError};
pub use files::{
    reassemble_file, reassemble_or_keep, FileDetector, FileReference, FileSource, FtpSessionTracker,
    FtpTransferType,
};
pub use flow::{aggregate, Endpoint, Flow, FlowAggregator, FlowKey};
pub use indicator::{IndicatorAnalyzer, IndicatorKind, Severity, SuspiciousIndicator};
pub use packet::{PacketId, ParsedPacket, Transport};
pub use pcap::{decode_capture, CaptureInfo, CaptureReader, InputKind, RawPacketRecord};
pub use protocol::{classify, HeaderExtractor};
pub use store::{MemoryStore, Record, RecordStore};
pub use stream::{reassemble_stream, Direction, ReassembledStream, Segment};
pub use timeline::TimelineEvent;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
