//! Fuzz target for header extraction and classification on raw frames.

#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use netcarve_core::protocol::{classify, HeaderExtractor};
use netcarve_core::PacketId;

fuzz_target!(|data: &[u8]| {
    let extractor = HeaderExtractor::default();
    let packet = extractor.packet_from_frame(PacketId(1), 0, Bytes::copy_from_slice(data));
    // Payload slicing must stay inside the frame
    assert!(packet.payload().len() <= data.len());
    let _ = classify(&packet);
});
