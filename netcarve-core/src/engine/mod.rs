//! Analysis sessions.
//!
//! An [`AnalysisSession`] takes one input buffer through the whole pipeline:
//!
//! 1. decode the capture (or wrap text input as a single packet)
//! 2. extract headers
//! 3. enrich packets in batches: classification, artifacts and indicators run
//!    concurrently inside a batch, bounded by a semaphore, then file
//!    detection runs over the batch in capture order
//! 4. aggregate flows, reassemble detected files, emit timeline events
//!
//! Output order always equals capture order. Between batches the session
//! yields to the runtime and checks its [`CancelHandle`]; a cancelled run
//! returns whatever was enriched so far.
//!
//! Malformed input never fails the call. Problems are logged and show up in
//! [`AnalysisSummary`].

mod enrich;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::AnalysisConfig;
use crate::files::{reassemble_or_keep, FileDetector, FileReference, FtpSessionTracker};
use crate::flow::{self, Flow, FlowKey};
use crate::indicator::SuspiciousIndicator;
use crate::packet::{PacketId, ParsedPacket};
use crate::pcap::{decode_capture, CaptureInfo, InputKind};
use crate::protocol::text::packet_from_text;
use crate::protocol::HeaderExtractor;
use crate::stream::{reassemble_stream, ReassembledStream};
use crate::timeline::TimelineEvent;

use enrich::Stages;

/// Cooperative cancellation flag shared with the host.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Takes effect at the next batch boundary of the
    /// run in progress, or of the next run if none is active.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether a request is pending.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Consume a pending request.
    fn take(&self) -> bool {
        self.flag.swap(false, Ordering::Relaxed)
    }
}

/// Counts describing one analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisSummary {
    pub input_kind: InputKind,
    pub packets: usize,
    pub flows: usize,
    /// Packets carrying each protocol label.
    pub protocols: BTreeMap<String, usize>,
    pub artifacts: usize,
    pub files: usize,
    pub files_reassembled: usize,
    pub indicators: usize,
    /// Packets whose artifact extraction ran out of time.
    pub extraction_timeouts: usize,
    /// The capture ended inside a record.
    pub truncated: bool,
    pub cancelled: bool,
}

/// Result of one analysis.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    /// Enriched packets in capture order.
    pub packets: Vec<ParsedPacket>,
    /// Flows sorted by start time.
    pub flows: Vec<Flow>,
    /// Every detected file, completed where reassembly succeeded.
    pub files: Vec<FileReference>,
    /// One event per packet, in capture order.
    pub timeline: Vec<TimelineEvent>,
    pub summary: AnalysisSummary,
    /// Capture header facts; absent for text input.
    pub capture: Option<CaptureInfo>,
}

impl Analysis {
    pub fn packet(&self, id: PacketId) -> Option<&ParsedPacket> {
        self.packets.iter().find(|p| p.id == id)
    }

    /// Direction-tagged conversation of one flow.
    pub fn stream(&self, flow: &FlowKey) -> ReassembledStream {
        reassemble_stream(&self.packets, flow)
    }

    /// Every indicator with the packet it was found on.
    pub fn indicators(&self) -> impl Iterator<Item = (&ParsedPacket, &SuspiciousIndicator)> {
        self.packets
            .iter()
            .flat_map(|p| p.indicators.iter().map(move |i| (p, i)))
    }
}

/// Packets collected while batches complete.
struct Progress {
    input_kind: InputKind,
    capture: Option<CaptureInfo>,
    packets: Vec<ParsedPacket>,
    extraction_timeouts: usize,
    cancelled: bool,
}

/// One analysis context.
///
/// Owns all cross-packet state (the FTP data-port map and the packet id
/// counter), so independent sessions never interfere. Packet ids keep
/// increasing across calls on the same session; the FTP map is reset at the
/// start of every call.
pub struct AnalysisSession {
    config: AnalysisConfig,
    headers: HeaderExtractor,
    stages: Stages,
    files: FileDetector,
    ftp: FtpSessionTracker,
    next_id: u64,
    cancel: CancelHandle,
}

impl Default for AnalysisSession {
    fn default() -> Self {
        Self::new(AnalysisConfig::default())
    }
}

impl AnalysisSession {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            headers: HeaderExtractor::new(config.link_header_len),
            stages: Stages::from_config(&config),
            files: FileDetector::from_config(&config),
            ftp: FtpSessionTracker::new(),
            next_id: 1,
            cancel: CancelHandle::new(),
            config,
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Handle the host can use to stop this session between batches.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    fn next_packet_id(&mut self) -> PacketId {
        let id = PacketId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Decode and header-extract every packet of `input`.
    fn decode(&mut self, input: &[u8]) -> Progress {
        let input_kind = InputKind::detect(input);
        let mut progress = Progress {
            input_kind,
            capture: None,
            packets: Vec::new(),
            extraction_timeouts: 0,
            cancelled: false,
        };

        match input_kind {
            InputKind::Capture => match decode_capture(input) {
                Ok(decoded) => {
                    if let Some(e) = &decoded.info.truncation {
                        warn!(error = %e, "capture truncated; keeping complete records");
                    }
                    for record in &decoded.records {
                        let id = self.next_packet_id();
                        progress.packets.push(self.headers.packet_from_record(id, record));
                    }
                    progress.capture = Some(decoded.info);
                }
                Err(e) => warn!(error = %e, "capture could not be decoded"),
            },
            InputKind::Text => {
                if !input.is_empty() {
                    let text = String::from_utf8_lossy(input);
                    let id = self.next_packet_id();
                    progress.packets.push(packet_from_text(id, self.config.text_timestamp_ms, &text));
                }
            }
        }

        debug!(kind = ?input_kind, packets = progress.packets.len(), "input decoded");
        progress
    }

    /// Sequential file detection over a finished batch, then hand it over.
    fn complete_batch(&mut self, batch: Vec<ParsedPacket>, progress: &mut Progress) {
        for mut packet in batch {
            packet.files = self.files.detect(&packet, &mut self.ftp);
            progress.packets.push(packet);
        }
    }

    /// Analyze `input` on the current tokio runtime.
    pub async fn analyze(&mut self, input: &[u8]) -> Analysis {
        self.ftp.clear();
        let mut decoded = self.decode(input);
        let pending = std::mem::take(&mut decoded.packets);
        let mut progress = decoded;
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));

        let mut pending = pending.into_iter().peekable();
        let mut batch_no = 0usize;
        while pending.peek().is_some() {
            if self.cancel.take() {
                progress.cancelled = true;
                break;
            }

            let mut batch: Vec<ParsedPacket> = pending.by_ref().take(self.config.batch_size.max(1)).collect();
            let handles: Vec<_> = batch
                .iter()
                .map(|packet| {
                    let probe = packet.clone();
                    let stages = self.stages;
                    let semaphore = Arc::clone(&semaphore);
                    tokio::spawn(async move {
                        let _permit = semaphore.acquire_owned().await;
                        stages.run(probe).await
                    })
                })
                .collect();

            for (packet, handle) in batch.iter_mut().zip(handles) {
                match handle.await {
                    Ok(enrichment) => {
                        progress.extraction_timeouts += usize::from(enrichment.timed_out);
                        enrichment.apply(packet);
                    }
                    Err(e) => warn!(packet = %packet.id, error = %e, "enrichment task failed"),
                }
            }

            self.complete_batch(batch, &mut progress);
            batch_no += 1;
            debug!(batch = batch_no, done = progress.packets.len(), "batch enriched");
            tokio::task::yield_now().await;
        }

        self.finish(progress)
    }

    /// Analyze `input` on the calling thread.
    pub fn analyze_blocking(&mut self, input: &[u8]) -> Analysis {
        self.ftp.clear();
        let mut decoded = self.decode(input);
        let pending = std::mem::take(&mut decoded.packets);
        let mut progress = decoded;

        let batch_size = self.config.batch_size.max(1);
        let mut pending = pending.into_iter().peekable();
        while pending.peek().is_some() {
            if self.cancel.take() {
                progress.cancelled = true;
                break;
            }
            let mut batch: Vec<ParsedPacket> = pending.by_ref().take(batch_size).collect();
            for packet in batch.iter_mut() {
                let enrichment = self.stages.run_inline(packet);
                progress.extraction_timeouts += usize::from(enrichment.timed_out);
                enrichment.apply(packet);
            }
            self.complete_batch(batch, &mut progress);
        }

        self.finish(progress)
    }

    fn finish(&self, progress: Progress) -> Analysis {
        // A request arriving after the last batch applies to no later run
        self.cancel.take();

        let Progress {
            input_kind,
            capture,
            mut packets,
            extraction_timeouts,
            cancelled,
        } = progress;

        let flows = flow::aggregate(&mut packets);
        let files: Vec<FileReference> = packets
            .iter()
            .flat_map(|p| p.files.iter())
            .map(|f| reassemble_or_keep(&packets, f))
            .collect();
        let timeline: Vec<TimelineEvent> = packets.iter().map(TimelineEvent::from_packet).collect();

        let mut protocols = BTreeMap::new();
        for label in packets.iter().flat_map(|p| p.protocols.iter()) {
            *protocols.entry(label.to_string()).or_insert(0) += 1;
        }

        let summary = AnalysisSummary {
            input_kind,
            packets: packets.len(),
            flows: flows.len(),
            protocols,
            artifacts: packets.iter().map(|p| p.artifacts.len()).sum(),
            files: files.len(),
            files_reassembled: files.iter().filter(|f| f.is_complete()).count(),
            indicators: packets.iter().map(|p| p.indicators.len()).sum(),
            extraction_timeouts,
            truncated: capture.as_ref().is_some_and(|c| c.truncation.is_some()),
            cancelled,
        };
        info!(
            packets = summary.packets,
            flows = summary.flows,
            files = summary.files,
            indicators = summary.indicators,
            cancelled = summary.cancelled,
            "analysis finished"
        );

        Analysis {
            packets,
            flows,
            files,
            timeline,
            summary,
            capture,
        }
    }
}
