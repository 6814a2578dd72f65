//! Artifact extraction.
//!
//! A payload is scanned by a fixed battery of matchers (IPv4, IPv6, URL,
//! email, credential pairs, file paths) followed by a printable-string scan.
//! Offsets are absolute: the caller passes the logical offset of the payload
//! inside a larger structure and every artifact offset includes it.
//!
//! Two artifacts never share both value and offset. The same value at another
//! offset, or another value at the same offset, is kept.

mod patterns;
mod strings;

use std::collections::HashSet;
use std::time::Instant;

use compact_str::CompactString;
use serde::Serialize;
use tracing::trace;

use crate::error::ExtractionTimeout;
use crate::packet::PacketId;

/// How often the printable scan checks its deadline.
const DEADLINE_CHECK_INTERVAL: usize = 256;

/// Artifact category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Ip,
    Url,
    Email,
    Credential,
    FilePath,
    Other,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Ip => "ip",
            ArtifactKind::Url => "url",
            ArtifactKind::Email => "email",
            ArtifactKind::Credential => "credential",
            ArtifactKind::FilePath => "file_path",
            ArtifactKind::Other => "other",
        }
    }
}

/// A structured value found in a payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub value: CompactString,
    pub packet_id: PacketId,
    /// Absolute byte offset of the match.
    pub offset: usize,
    /// Byte length of the match.
    pub length: usize,
}

/// Runs the matcher battery over payloads.
#[derive(Debug, Clone, Copy)]
pub struct ArtifactExtractor {
    min_string_len: usize,
    max_scan_bytes: usize,
}

impl Default for ArtifactExtractor {
    fn default() -> Self {
        Self::new(4, 64 * 1024)
    }
}

/// Collects artifacts while enforcing the value + offset uniqueness rule.
struct Collector {
    packet_id: PacketId,
    base_offset: usize,
    seen: HashSet<(CompactString, usize)>,
    out: Vec<Artifact>,
}

impl Collector {
    fn push(&mut self, kind: ArtifactKind, raw: &[u8], local_offset: usize) {
        let value = CompactString::from(String::from_utf8_lossy(raw));
        let offset = self.base_offset + local_offset;
        if self.seen.insert((value.clone(), offset)) {
            self.out.push(Artifact {
                kind,
                length: raw.len(),
                value,
                packet_id: self.packet_id,
                offset,
            });
        }
    }
}

fn check(deadline: Option<Instant>) -> Result<(), ExtractionTimeout> {
    match deadline {
        Some(d) if Instant::now() >= d => Err(ExtractionTimeout),
        _ => Ok(()),
    }
}

impl ArtifactExtractor {
    pub fn new(min_string_len: usize, max_scan_bytes: usize) -> Self {
        Self {
            min_string_len: min_string_len.max(1),
            max_scan_bytes,
        }
    }

    /// Extract artifacts with no time limit.
    pub fn extract(&self, packet_id: PacketId, payload: &[u8], base_offset: usize) -> Vec<Artifact> {
        // Without a deadline the only error path is unreachable.
        self.extract_until(packet_id, payload, base_offset, None)
            .unwrap_or_default()
    }

    /// Extract artifacts, giving up once `deadline` passes.
    ///
    /// On timeout nothing is returned: partial results are discarded.
    pub fn extract_until(
        &self,
        packet_id: PacketId,
        payload: &[u8],
        base_offset: usize,
        deadline: Option<Instant>,
    ) -> Result<Vec<Artifact>, ExtractionTimeout> {
        let payload = &payload[..payload.len().min(self.max_scan_bytes)];
        let mut collector = Collector {
            packet_id,
            base_offset,
            seen: HashSet::new(),
            out: Vec::new(),
        };

        if payload.is_empty() {
            return Ok(collector.out);
        }

        for matcher in patterns::matchers() {
            check(deadline)?;
            for caps in matcher.regex.captures_iter(payload) {
                let Some(m) = caps.get(matcher.group) else {
                    continue;
                };
                let mut value = m.as_bytes();
                while let Some((last, rest)) = value.split_last() {
                    if matcher.trim_trailing.contains(last) {
                        value = rest;
                    } else {
                        break;
                    }
                }
                if value.is_empty() {
                    continue;
                }
                let before = m.start().checked_sub(1).map(|i| payload[i]);
                let after = payload.get(m.end()).copied();
                if (matcher.accept)(value, before, after) {
                    collector.push(matcher.kind, value, m.start());
                }
            }
        }

        for (i, run) in strings::printable_runs(payload, self.min_string_len).enumerate() {
            if i % DEADLINE_CHECK_INTERVAL == 0 {
                check(deadline)?;
            }
            collector.push(ArtifactKind::Other, run.bytes, run.offset);
            for token in strings::marked_tokens(run) {
                collector.push(ArtifactKind::Other, token.bytes, token.offset);
            }
        }

        trace!(packet = %packet_id, count = collector.out.len(), "artifacts extracted");
        Ok(collector.out)
    }
}
