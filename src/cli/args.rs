//! Command-line argument definitions.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use netcarve_core::AnalysisConfig;

use super::OutputFormat;

/// Report sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum View {
    /// Session totals
    Summary,
    /// One row per packet
    Packets,
    /// Bidirectional flows
    Flows,
    /// Detected and reassembled files
    Files,
    /// Suspicious indicators
    Indicators,
    /// Per-packet timeline events
    Timeline,
}

/// Analyze a packet capture or text transcript for forensic evidence.
#[derive(Parser, Debug)]
#[command(name = "netcarve")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Capture or text file to analyze
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Output format
    #[arg(long = "format", value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Sections to print, comma separated
    #[arg(
        short = 's',
        long = "show",
        value_enum,
        value_delimiter = ',',
        default_value = "summary,flows,files,indicators"
    )]
    pub show: Vec<View>,

    /// Write the report to a file instead of stdout
    #[arg(short = 'o', long = "output", value_name = "OUTPUT_FILE")]
    pub output: Option<PathBuf>,

    /// Directory to write reassembled file contents into
    #[arg(long = "carve-dir", value_name = "DIR")]
    pub carve_dir: Option<PathBuf>,

    /// Engine configuration as JSON
    #[arg(long = "config", value_name = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Packets per batch
    #[arg(long = "batch-size")]
    pub batch_size: Option<usize>,

    /// Packets enriched concurrently
    #[arg(long = "concurrency")]
    pub concurrency: Option<usize>,

    /// Per-packet artifact extraction budget in milliseconds
    #[arg(long = "timeout-ms")]
    pub timeout_ms: Option<u64>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// Build the engine configuration: JSON file first, then flag overrides.
    pub fn analysis_config(&self) -> Result<AnalysisConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("Invalid config file: {}", path.display()))?
            }
            None => AnalysisConfig::default(),
        };

        if let Some(n) = self.batch_size {
            config = config.with_batch_size(n);
        }
        if let Some(n) = self.concurrency {
            config = config.with_max_concurrency(n);
        }
        if let Some(ms) = self.timeout_ms {
            config = config.with_extraction_timeout(Duration::from_millis(ms));
        }
        Ok(config)
    }

    /// Log filter for the `-v` count.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    pub fn shows(&self, view: View) -> bool {
        self.show.contains(&view)
    }
}
