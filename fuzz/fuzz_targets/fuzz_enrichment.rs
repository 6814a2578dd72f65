//! Fuzz target for the full analysis chain.
//!
//! Any input, capture or text, must produce an analysis without panicking:
//! classification, artifact extraction, indicators, file detection and
//! reassembly, flows and streams.

#![no_main]

use libfuzzer_sys::fuzz_target;
use netcarve_core::AnalysisSession;

fuzz_target!(|data: &[u8]| {
    let mut session = AnalysisSession::default();
    let analysis = session.analyze_blocking(data);
    assert_eq!(analysis.summary.packets, analysis.packets.len());
    for flow in &analysis.flows {
        let _ = analysis.stream(&flow.key).conversation();
    }
});
