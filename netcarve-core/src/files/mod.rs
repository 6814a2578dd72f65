//! File transfer detection and reassembly.
//!
//! Detection runs once per packet and creates a [`FileReference`] as soon as a
//! transfer signature is seen: an HTTP response announcing a file-like body,
//! an HTTP GET for a path with a file extension, or an FTP `STOR`/`RETR`
//! command. Size and hash may still be unknown at that point.
//!
//! Completion happens later in [`reassembly`], against the full packet set.
//!
//! FTP detection needs cross-packet state (the data port announced by
//! `PORT`/`PASV` before the transfer command). That state lives in a
//! [`FtpSessionTracker`] owned by the caller, one per analysis session.

mod ftp;
mod http;
pub mod reassembly;

use std::fmt;

use bytes::Bytes;
use compact_str::CompactString;
use serde::{Serialize, Serializer};
use tracing::trace;

use crate::config::AnalysisConfig;
use crate::flow::FlowKey;
use crate::packet::{PacketId, ParsedPacket};

pub use ftp::FtpSessionTracker;
pub use http::{decode_chunked, is_file_content_type, parse_content_disposition};
pub use reassembly::{reassemble_file, reassemble_or_keep};

/// FTP transfer command that announced a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FtpTransferType {
    Stor,
    Retr,
}

impl FtpTransferType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FtpTransferType::Stor => "STOR",
            FtpTransferType::Retr => "RETR",
        }
    }

    fn from_command(cmd: &str) -> Option<Self> {
        if cmd.eq_ignore_ascii_case("STOR") {
            Some(FtpTransferType::Stor)
        } else if cmd.eq_ignore_ascii_case("RETR") {
            Some(FtpTransferType::Retr)
        } else {
            None
        }
    }
}

impl fmt::Display for FtpTransferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for FtpTransferType {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

/// Which signature revealed the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileSource {
    /// HTTP response headers with a file-like content type.
    HttpResponse,
    /// HTTP GET whose path ends in a file name.
    HttpRequest,
    /// FTP transfer command on the control channel.
    Ftp,
}

/// A file observed in traffic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileReference {
    pub id: String,
    pub filename: String,
    /// Declared size, when the protocol announced one.
    pub size: Option<u64>,
    pub mime_type: Option<CompactString>,
    /// Packet that first revealed the file.
    pub source_packet_id: Option<PacketId>,
    pub source: FileSource,
    /// Reassembled content.
    #[serde(skip)]
    pub data: Option<Bytes>,
    pub ftp_data_port: Option<u16>,
    pub ftp_transfer_type: Option<FtpTransferType>,
    /// Flow of the packet that revealed the file.
    pub session: Option<FlowKey>,
    /// Hex SHA-256 of `data`; empty until reassembly completes.
    pub hash: String,
    /// Hex SHA-1 of `data`.
    pub secondary_hash: Option<String>,
}

impl FileReference {
    /// New reference revealed by `packet`. The id is assigned by the detector.
    pub fn new(filename: impl Into<String>, source: FileSource, packet: &ParsedPacket) -> Self {
        Self {
            id: String::new(),
            filename: filename.into(),
            size: None,
            mime_type: None,
            source_packet_id: Some(packet.id),
            source,
            data: None,
            ftp_data_port: None,
            ftp_transfer_type: None,
            session: Some(FlowKey::from_packet(packet)),
            hash: String::new(),
            secondary_hash: None,
        }
    }

    /// Whether reassembly has filled in data and hash.
    pub fn is_complete(&self) -> bool {
        self.data.is_some() && !self.hash.is_empty()
    }
}

/// Per-packet file signature detection.
#[derive(Debug, Clone)]
pub struct FileDetector {
    ftp_control_port: u16,
    http_ports: Vec<u16>,
}

impl Default for FileDetector {
    fn default() -> Self {
        Self::from_config(&AnalysisConfig::default())
    }
}

impl FileDetector {
    pub fn new(ftp_control_port: u16, http_ports: Vec<u16>) -> Self {
        Self {
            ftp_control_port,
            http_ports,
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(config.ftp_control_port, config.http_ports.clone())
    }

    pub fn ftp_control_port(&self) -> u16 {
        self.ftp_control_port
    }

    /// Detect file references revealed by `packet`.
    ///
    /// Packets must be fed in capture order: FTP commands only see data ports
    /// announced by earlier packets of the same session.
    pub fn detect(&self, packet: &ParsedPacket, ftp: &mut FtpSessionTracker) -> Vec<FileReference> {
        let payload = packet.payload();
        if payload.is_empty() {
            return Vec::new();
        }

        let mut found = Vec::new();
        if packet.src_port == self.ftp_control_port || packet.dst_port == self.ftp_control_port {
            found.extend(ftp.observe(packet));
        }
        if payload.starts_with(b"HTTP/") {
            found.extend(http::detect_response(packet));
        } else if self.http_ports.contains(&packet.dst_port) {
            found.extend(http::detect_request(packet));
        }

        for (i, file) in found.iter_mut().enumerate() {
            file.id = format!("file-{}-{}", packet.id.0, i + 1);
        }
        if !found.is_empty() {
            trace!(packet = %packet.id, count = found.len(), "file references detected");
        }
        found
    }
}

/// Last path component of `path`, accepting both separators.
pub(crate) fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path).trim()
}

/// Extension of `filename`, without the dot, when it looks like one.
pub(crate) fn extension(filename: &str) -> Option<&str> {
    let (stem, ext) = filename.rsplit_once('.')?;
    let plausible = !stem.is_empty()
        && (1..=5).contains(&ext.len())
        && ext.bytes().all(|b| b.is_ascii_alphanumeric());
    plausible.then_some(ext)
}

const EXTENSIONS: &[(&str, &str)] = &[
    ("pdf", "application/pdf"),
    ("zip", "application/zip"),
    ("gz", "application/gzip"),
    ("tar", "application/x-tar"),
    ("7z", "application/x-7z-compressed"),
    ("rar", "application/vnd.rar"),
    ("exe", "application/x-msdownload"),
    ("dll", "application/x-msdownload"),
    ("msi", "application/x-msi"),
    ("doc", "application/msword"),
    ("docx", "application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
    ("xls", "application/vnd.ms-excel"),
    ("xlsx", "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("mp3", "audio/mpeg"),
    ("mp4", "video/mp4"),
    ("woff", "font/woff"),
    ("woff2", "font/woff2"),
    ("csv", "text/csv"),
    ("txt", "text/plain"),
    ("bin", "application/octet-stream"),
];

/// MIME type guessed from a file name's extension.
pub(crate) fn mime_from_filename(filename: &str) -> Option<CompactString> {
    let ext = extension(filename)?;
    EXTENSIONS
        .iter()
        .find(|(e, _)| e.eq_ignore_ascii_case(ext))
        .map(|(_, mime)| CompactString::from(*mime))
}

/// Extension for a synthesized file name.
pub(crate) fn extension_for_mime(mime: &str) -> &str {
    if let Some((ext, _)) = EXTENSIONS.iter().find(|(_, m)| m.eq_ignore_ascii_case(mime)) {
        return ext;
    }
    match mime.split_once('/') {
        Some((_, subtype)) => {
            let subtype = subtype.rsplit(['.', '-', '+']).next().unwrap_or(subtype);
            if !subtype.is_empty() && subtype.len() <= 5 && subtype.bytes().all(|b| b.is_ascii_alphanumeric()) {
                subtype
            } else {
                "bin"
            }
        }
        None => "bin",
    }
}
