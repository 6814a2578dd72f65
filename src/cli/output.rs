//! Report formatting.
//!
//! Every section is written either as a fixed-width text table or as JSON
//! Lines, one object per record tagged with its record type.

use std::io::{self, Write};

use clap::ValueEnum;
use netcarve_core::{AnalysisSummary, FileReference, Flow, ParsedPacket, SuspiciousIndicator, TimelineEvent};
use serde::Serialize;

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Fixed-width text tables (default)
    Table,
    /// JSON Lines (one JSON object per record)
    Json,
}

#[derive(Serialize)]
struct Line<'a, T: Serialize> {
    record: &'static str,
    #[serde(flatten)]
    value: &'a T,
}

/// Writes report sections in the configured format.
pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    fn json_line<W: Write, T: Serialize>(writer: &mut W, record: &'static str, value: &T) -> io::Result<()> {
        serde_json::to_writer(&mut *writer, &Line { record, value })?;
        writeln!(writer)
    }

    pub fn write_summary<W: Write>(&self, summary: &AnalysisSummary, writer: &mut W) -> io::Result<()> {
        if self.format == OutputFormat::Json {
            return Self::json_line(writer, "summary", summary);
        }

        writeln!(writer, "Summary")?;
        writeln!(writer, "{:-<50}", "")?;
        writeln!(writer, "{:<22} {:?}", "input", summary.input_kind)?;
        writeln!(writer, "{:<22} {}", "packets", summary.packets)?;
        writeln!(writer, "{:<22} {}", "flows", summary.flows)?;
        writeln!(writer, "{:<22} {}", "artifacts", summary.artifacts)?;
        writeln!(
            writer,
            "{:<22} {} ({} reassembled)",
            "files", summary.files, summary.files_reassembled
        )?;
        writeln!(writer, "{:<22} {}", "indicators", summary.indicators)?;
        if summary.extraction_timeouts > 0 {
            writeln!(writer, "{:<22} {}", "extraction timeouts", summary.extraction_timeouts)?;
        }
        if summary.truncated {
            writeln!(writer, "capture truncated; trailing data ignored")?;
        }
        if summary.cancelled {
            writeln!(writer, "analysis cancelled; results are partial")?;
        }
        for (protocol, count) in &summary.protocols {
            writeln!(writer, "  {protocol:<20} {count}")?;
        }
        writeln!(writer)
    }

    pub fn write_packets<W: Write>(&self, packets: &[ParsedPacket], writer: &mut W) -> io::Result<()> {
        if self.format == OutputFormat::Json {
            for packet in packets {
                Self::json_line(writer, "packet", packet)?;
            }
            return Ok(());
        }

        writeln!(writer, "Packets")?;
        writeln!(
            writer,
            "{:<6} {:<15} {:<24} {:<24} {:<7} {:<20}",
            "id", "time_ms", "source", "destination", "length", "protocols"
        )?;
        writeln!(writer, "{:-<100}", "")?;
        for p in packets {
            writeln!(
                writer,
                "{:<6} {:<15} {:<24} {:<24} {:<7} {}",
                p.id.0,
                p.timestamp_ms,
                p.source(),
                p.destination(),
                p.length,
                p.protocols.join("/")
            )?;
        }
        writeln!(writer)
    }

    pub fn write_flows<W: Write>(&self, flows: &[Flow], writer: &mut W) -> io::Result<()> {
        if self.format == OutputFormat::Json {
            for flow in flows {
                Self::json_line(writer, "flow", flow)?;
            }
            return Ok(());
        }

        writeln!(writer, "Flows")?;
        writeln!(
            writer,
            "{:<52} {:<8} {:<10} {:<10} {}",
            "flow", "packets", "bytes", "duration", "protocols"
        )?;
        writeln!(writer, "{:-<100}", "")?;
        for f in flows {
            writeln!(
                writer,
                "{:<52} {:<8} {:<10} {:<10} {}",
                f.key.to_string(),
                f.packet_count,
                f.total_bytes,
                format!("{}ms", f.duration_ms),
                f.protocols.join("/")
            )?;
        }
        writeln!(writer)
    }

    pub fn write_files<W: Write>(&self, files: &[FileReference], writer: &mut W) -> io::Result<()> {
        if self.format == OutputFormat::Json {
            for file in files {
                Self::json_line(writer, "file", file)?;
            }
            return Ok(());
        }

        writeln!(writer, "Files")?;
        writeln!(
            writer,
            "{:<16} {:<28} {:<10} {:<26} {}",
            "id", "filename", "size", "type", "sha256"
        )?;
        writeln!(writer, "{:-<100}", "")?;
        for file in files {
            let size = file.size.map(|s| s.to_string()).unwrap_or_else(|| "-".into());
            let mime = file.mime_type.as_deref().unwrap_or("-");
            let hash = if file.hash.is_empty() { "-" } else { file.hash.as_str() };
            writeln!(
                writer,
                "{:<16} {:<28} {:<10} {:<26} {}",
                file.id, file.filename, size, mime, hash
            )?;
        }
        writeln!(writer)
    }

    pub fn write_indicators<'a, W, I>(&self, indicators: I, writer: &mut W) -> io::Result<()>
    where
        W: Write,
        I: IntoIterator<Item = (&'a ParsedPacket, &'a SuspiciousIndicator)>,
    {
        #[derive(Serialize)]
        struct Found<'a> {
            packet_id: u64,
            #[serde(flatten)]
            indicator: &'a SuspiciousIndicator,
        }

        if self.format == OutputFormat::Json {
            for (packet, indicator) in indicators {
                let found = Found {
                    packet_id: packet.id.0,
                    indicator,
                };
                Self::json_line(writer, "indicator", &found)?;
            }
            return Ok(());
        }

        writeln!(writer, "Indicators")?;
        writeln!(writer, "{:<6} {:<9} {:<5} {}", "packet", "severity", "conf", "description")?;
        writeln!(writer, "{:-<100}", "")?;
        for (packet, i) in indicators {
            writeln!(
                writer,
                "{:<6} {:<9} {:<5} {} [{}]",
                packet.id.0,
                i.severity,
                i.confidence,
                i.description,
                i.tags.join(",")
            )?;
        }
        writeln!(writer)
    }

    pub fn write_timeline<W: Write>(&self, events: &[TimelineEvent], writer: &mut W) -> io::Result<()> {
        if self.format == OutputFormat::Json {
            for event in events {
                Self::json_line(writer, "event", event)?;
            }
            return Ok(());
        }

        writeln!(writer, "Timeline")?;
        writeln!(writer, "{:<10} {:<15} {:<9} {}", "event", "time_ms", "severity", "description")?;
        writeln!(writer, "{:-<100}", "")?;
        for e in events {
            writeln!(
                writer,
                "{:<10} {:<15} {:<9} {} -> {} {}",
                e.id, e.timestamp_ms, e.severity, e.source, e.destination, e.description
            )?;
        }
        writeln!(writer)
    }
}
