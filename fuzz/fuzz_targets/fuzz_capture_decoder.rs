//! Fuzz target for capture container decoding.
//!
//! Tests handling of malformed captures including:
//! - Magic detection in both byte orders and precisions
//! - Global header parsing
//! - Record headers with lying lengths
//! - Truncation at every offset

#![no_main]

use libfuzzer_sys::fuzz_target;
use netcarve_core::pcap::decode_capture;

fuzz_target!(|data: &[u8]| {
    if let Ok(decoded) = decode_capture(data) {
        for record in &decoded.records {
            assert!(record.data.len() <= data.len());
        }
    }
});
