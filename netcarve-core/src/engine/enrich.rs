//! Per-packet enrichment: classification, artifacts, indicators.
//!
//! These stages read one packet and nothing else, so they may run on any
//! thread in any order. Results travel back as an [`Enrichment`] and are
//! written into the packet by index.

use std::time::{Duration, Instant};

use tokio::time::timeout;
use tracing::warn;

use crate::artifact::{Artifact, ArtifactExtractor};
use crate::config::AnalysisConfig;
use crate::error::ExtractionTimeout;
use crate::indicator::{IndicatorAnalyzer, SuspiciousIndicator};
use crate::packet::{ParsedPacket, ProtocolLabels};
use crate::protocol::classify;

/// Output of the per-packet stages.
#[derive(Debug, Default)]
pub(crate) struct Enrichment {
    pub protocols: ProtocolLabels,
    pub artifacts: Vec<Artifact>,
    pub indicators: Vec<SuspiciousIndicator>,
    pub timed_out: bool,
}

impl Enrichment {
    pub fn apply(self, packet: &mut ParsedPacket) {
        packet.protocols = self.protocols;
        packet.artifacts = self.artifacts;
        packet.indicators = self.indicators;
    }
}

/// The stateless stages with their budget.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Stages {
    artifacts: ArtifactExtractor,
    indicators: IndicatorAnalyzer,
    budget: Duration,
}

impl Stages {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            artifacts: ArtifactExtractor::new(config.min_string_len, config.max_scan_bytes),
            indicators: IndicatorAnalyzer::new(config.max_scan_bytes),
            budget: config.extraction_timeout,
        }
    }

    /// Run every stage on the calling thread.
    pub fn run_inline(&self, packet: &ParsedPacket) -> Enrichment {
        let mut probe = packet.clone();
        probe.protocols = classify(packet);

        let deadline = Instant::now() + self.budget;
        let (artifacts, timed_out) = match self
            .artifacts
            .extract_until(packet.id, packet.payload(), packet.payload_offset, Some(deadline))
        {
            Ok(found) => (found, false),
            Err(ExtractionTimeout) => {
                warn!(packet = %packet.id, budget_ms = self.budget.as_millis() as u64, "artifact extraction timed out");
                (Vec::new(), true)
            }
        };
        let indicators = self.indicators.analyze(&probe);

        Enrichment {
            protocols: probe.protocols,
            artifacts,
            indicators,
            timed_out,
        }
    }

    /// Run the stages with the CPU-bound parts on the blocking pool.
    ///
    /// Artifact extraction is bounded twice: the task checks its own deadline
    /// and the wait for it is wrapped in a timeout.
    pub async fn run(self, mut probe: ParsedPacket) -> Enrichment {
        probe.protocols = classify(&probe);

        let id = probe.id;
        let payload = probe.payload_bytes();
        let base = probe.payload_offset;
        let extractor = self.artifacts;
        let deadline = Instant::now() + self.budget;
        let job = tokio::task::spawn_blocking(move || extractor.extract_until(id, &payload, base, Some(deadline)));

        let (artifacts, timed_out) = match timeout(self.budget, job).await {
            Ok(Ok(Ok(found))) => (found, false),
            Ok(Ok(Err(ExtractionTimeout))) | Err(_) => {
                warn!(packet = %id, budget_ms = self.budget.as_millis() as u64, "artifact extraction timed out");
                (Vec::new(), true)
            }
            Ok(Err(e)) => {
                warn!(packet = %id, error = %e, "artifact extraction task failed");
                (Vec::new(), false)
            }
        };

        let protocols = probe.protocols.clone();
        let analyzer = self.indicators;
        let indicators = match tokio::task::spawn_blocking(move || analyzer.analyze(&probe)).await {
            Ok(found) => found,
            Err(e) => {
                warn!(packet = %id, error = %e, "indicator analysis task failed");
                Vec::new()
            }
        };

        Enrichment {
            protocols,
            artifacts,
            indicators,
            timed_out,
        }
    }
}
