//! Analysis run behind the command line.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use netcarve_core::{Analysis, AnalysisSession, MemoryStore, RecordStore, TimelineEvent};
use tracing::{debug, info};

use super::{Args, OutputFormatter, View};

/// Read the input file, analyze it and write the selected report sections.
pub async fn run(args: &Args) -> Result<Analysis> {
    let config = args.analysis_config()?;
    let input = std::fs::read(&args.file)
        .with_context(|| format!("Failed to read input file: {}", args.file.display()))?;
    debug!(bytes = input.len(), file = %args.file.display(), "input loaded");

    let mut session = AnalysisSession::new(config);
    let analysis = session.analyze(&input).await;

    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            write_report(args, &analysis, &mut writer)?;
            writer.flush()?;
            eprintln!("Wrote report to {}", path.display());
        }
        None => {
            let stdout = io::stdout();
            write_report(args, &analysis, &mut stdout.lock())?;
        }
    }

    if let Some(dir) = &args.carve_dir {
        let written = carve_files(&analysis, dir)?;
        eprintln!("Carved {} files into {}", written, dir.display());
    }

    Ok(analysis)
}

/// Write the sections selected in `args`, in a fixed order.
pub fn write_report<W: Write>(args: &Args, analysis: &Analysis, writer: &mut W) -> Result<()> {
    let formatter = OutputFormatter::new(args.format);

    if args.shows(View::Summary) {
        formatter.write_summary(&analysis.summary, writer)?;
    }
    if args.shows(View::Packets) {
        formatter.write_packets(&analysis.packets, writer)?;
    }
    if args.shows(View::Flows) {
        formatter.write_flows(&analysis.flows, writer)?;
    }
    if args.shows(View::Files) {
        formatter.write_files(&analysis.files, writer)?;
    }
    if args.shows(View::Indicators) {
        formatter.write_indicators(analysis.indicators(), writer)?;
    }
    if args.shows(View::Timeline) {
        let mut store = MemoryStore::<TimelineEvent>::new();
        let stored = store
            .insert_many(analysis.timeline.clone())
            .context("Failed to store timeline")?;
        info!(events = stored, "timeline stored");
        formatter.write_timeline(&store.get_all()?, writer)?;
    }
    Ok(())
}

/// Write every reassembled file body into `dir`, named `<id>_<filename>`.
pub fn carve_files(analysis: &Analysis, dir: &Path) -> Result<usize> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create carve directory: {}", dir.display()))?;

    let mut written = 0;
    for file in &analysis.files {
        let Some(data) = &file.data else { continue };
        let path = dir.join(format!("{}_{}", file.id, file.filename));
        std::fs::write(&path, data)
            .with_context(|| format!("Failed to write carved file: {}", path.display()))?;
        written += 1;
    }
    Ok(written)
}
