//! Error types for netcarve-core.
//!
//! This module provides structured error types for all netcarve-core operations:
//!
//! - [`enum@Error`] - Main error enum that wraps all error types
//! - [`CaptureError`] - Errors from capture container decoding
//! - [`HeaderError`] - Header underruns reported by the header extractor
//! - [`ExtractionTimeout`] - Artifact extraction ran past its budget
//! - [`ReassemblyError`] - File reassembly precondition failures
//! - [`StoreError`] - Failures reported by the persistence collaborator
//!
//! Most of these are recoverable inside an analysis session: they are logged and
//! the affected output is left blank. They are still surfaced as values so that
//! callers driving individual stages can tell the cases apart.

use thiserror::Error;

/// Main error type for netcarve-core operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Error decoding the capture container
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    /// Header field could not be read
    #[error("Header error: {0}")]
    Header(#[from] HeaderError),

    /// Artifact extraction ran out of time
    #[error("Extraction error: {0}")]
    Timeout(#[from] ExtractionTimeout),

    /// File reassembly refused to run
    #[error("Reassembly error: {0}")]
    Reassembly(#[from] ReassemblyError),

    /// Backing store failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors related to capture container decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// Leading bytes are not a recognized capture magic number
    #[error("Unknown capture magic: 0x{magic:08x}")]
    UnknownMagic { magic: u32 },

    /// Buffer is shorter than the global header
    #[error("Capture too short: need {needed} bytes, have {have}")]
    TooShort { needed: usize, have: usize },

    /// Container could not be parsed
    #[error("Invalid capture format: {reason}")]
    InvalidFormat { reason: String },

    /// Record claims more bytes than remain in the buffer
    #[error("Truncated record at frame {frame}: expected {expected} bytes, got {actual}")]
    TruncatedRecord {
        frame: u64,
        expected: usize,
        actual: usize,
    },
}

/// A header field could not be read because the frame ended first.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("{layer}: packet too short (need {needed} bytes, have {have})")]
pub struct HeaderError {
    pub layer: &'static str,
    pub needed: usize,
    pub have: usize,
}

/// Artifact extraction exceeded its deadline. The packet's artifact list is
/// left empty rather than partially filled.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("artifact extraction exceeded its time budget")]
pub struct ExtractionTimeout;

/// Errors related to file reassembly.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReassemblyError {
    /// The file reference has no originating packet
    #[error("File reference {file_id} has no source packet id")]
    MissingSourcePacket { file_id: String },

    /// The originating packet is not part of the supplied packet set
    #[error("Source packet {packet_id} of file {file_id} not found")]
    SourcePacketNotFound { file_id: String, packet_id: u64 },

    /// No packet in the set carries data for the transfer
    #[error("No data packets found for file {file_id}")]
    NoData { file_id: String },
}

/// Errors reported by a record store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store could not be initialized or is offline
    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },

    /// No record with the given id
    #[error("Record not found: {id}")]
    NotFound { id: String },
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
