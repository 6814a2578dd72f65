//! Capture container decoding.
//!
//! Input buffers are either a classic capture container (recognized by one of
//! four magic numbers) or free text. The main types are:
//! - [`CaptureFormat`] - Container byte order and timestamp precision
//! - [`CaptureReader`] - Iterates the records of an in-memory capture
//! - [`RawPacketRecord`] - One captured frame
//! - [`InputKind`] - Which top-level mode an input buffer selects

mod reader;

pub use reader::{decode_capture, CaptureFormat, CaptureInfo, CaptureReader, DecodedCapture, RawPacketRecord};

use serde::Serialize;

/// Size of the classic capture global header.
pub const GLOBAL_HEADER_LEN: usize = 24;

/// Size of a per-record header.
pub const RECORD_HEADER_LEN: usize = 16;

/// Top-level input mode selected from the leading bytes of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Capture,
    Text,
}

impl InputKind {
    /// Buffers shorter than the global header, or without a recognized magic,
    /// are treated as text.
    pub fn detect(data: &[u8]) -> Self {
        if data.len() >= GLOBAL_HEADER_LEN && CaptureFormat::detect(data).is_ok() {
            InputKind::Capture
        } else {
            InputKind::Text
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_buffer_is_text() {
        assert_eq!(InputKind::detect(&[0xd4, 0xc3, 0xb2, 0xa1]), InputKind::Text);
        assert_eq!(InputKind::detect(b""), InputKind::Text);
    }

    #[test]
    fn test_detect_capture() {
        let mut header = vec![0xd4, 0xc3, 0xb2, 0xa1];
        header.resize(GLOBAL_HEADER_LEN, 0);
        assert_eq!(InputKind::detect(&header), InputKind::Capture);
    }

    #[test]
    fn test_http_text_is_text() {
        let text = b"GET https://example.com/files/document.pdf HTTP/1.1";
        assert_eq!(InputKind::detect(text), InputKind::Text);
    }
}
