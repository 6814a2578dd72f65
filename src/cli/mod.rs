//! Command-line interface module.
//!
//! This module handles:
//! - Argument parsing via clap
//! - Running an analysis over a file on disk
//! - Report formatting (table, JSON Lines) and carving files to disk

mod args;
mod output;
mod report;

pub use args::{Args, View};
pub use output::{OutputFormat, OutputFormatter};
pub use report::{carve_files, run, write_report};
