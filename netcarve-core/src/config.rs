//! Analysis configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for an [`AnalysisSession`](crate::engine::AnalysisSession).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Packets enriched per batch before yielding to the host.
    pub batch_size: usize,
    /// Maximum packets enriched concurrently inside one batch.
    pub max_concurrency: usize,
    /// Per-packet budget for artifact extraction.
    #[serde(with = "millis")]
    pub extraction_timeout: Duration,
    /// Bytes skipped before the IP header.
    pub link_header_len: usize,
    /// Minimum printable run kept by the string scan.
    pub min_string_len: usize,
    /// Payload bytes inspected per packet by the artifact and indicator stages.
    pub max_scan_bytes: usize,
    /// Control port of the file-transfer protocol.
    pub ftp_control_port: u16,
    /// Ports treated as HTTP by the file detector.
    pub http_ports: Vec<u16>,
    /// Timestamp given to the packet built from text input.
    pub text_timestamp_ms: i64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            max_concurrency: 8,
            extraction_timeout: Duration::from_millis(250),
            link_header_len: 14, // Ethernet II
            min_string_len: 4,
            max_scan_bytes: 64 * 1024,
            ftp_control_port: 21,
            http_ports: vec![80, 8000, 8080, 8888],
            text_timestamp_ms: 0,
        }
    }
}

impl AnalysisConfig {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn with_extraction_timeout(mut self, timeout: Duration) -> Self {
        self.extraction_timeout = timeout;
        self
    }

    pub fn with_link_header_len(mut self, len: usize) -> Self {
        self.link_header_len = len;
        self
    }

    pub fn with_max_scan_bytes(mut self, max: usize) -> Self {
        self.max_scan_bytes = max;
        self
    }

    pub fn with_text_timestamp_ms(mut self, ts: i64) -> Self {
        self.text_timestamp_ms = ts;
        self
    }

    /// Whether `port` is one of the configured HTTP ports.
    pub fn is_http_port(&self, port: u16) -> bool {
        self.http_ports.contains(&port)
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
