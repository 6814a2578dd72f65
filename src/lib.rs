//! netcarve - network forensics for packet captures.
//!
//! This library is the command-line front end over [`netcarve_core`]:
//! it reads a capture or text transcript from disk, runs an analysis session
//! and reports flows, carved files and indicators.
//!
//! # Example
//!
//! ```no_run
//! use clap::Parser;
//! use netcarve::cli::{run, Args};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = Args::parse_from(["netcarve", "capture.pcap", "--format", "json"]);
//!     let analysis = run(&args).await?;
//!     eprintln!("{} packets", analysis.summary.packets);
//!     Ok(())
//! }
//! ```

pub mod cli;

pub use netcarve_core::{Analysis, AnalysisConfig, Error, Result};
