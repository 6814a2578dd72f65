//! Convenient re-exports for common usage.
//!
//! ```rust,no_run
//! use netcarve_core::prelude::*;
//!
//! let analysis = AnalysisSession::default().analyze_blocking(b"USER anonymous\r\n");
//! assert_eq!(analysis.packets.len(), 1);
//! ```

// Session
pub use crate::config::AnalysisConfig;
pub use crate::engine::{Analysis, AnalysisSession, AnalysisSummary, CancelHandle};

// Data model
pub use crate::artifact::{Artifact, ArtifactKind};
pub use crate::files::{FileReference, FtpTransferType};
pub use crate::flow::{Flow, FlowKey};
pub use crate::indicator::{Severity, SuspiciousIndicator};
pub use crate::packet::{PacketId, ParsedPacket, Transport};
pub use crate::stream::{Direction, ReassembledStream};
pub use crate::timeline::TimelineEvent;

// Collaborators
pub use crate::store::{MemoryStore, Record, RecordStore};

// Error types
pub use crate::error::{Error, Result};
