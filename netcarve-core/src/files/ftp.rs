//! FTP control channel tracking.
//!
//! The data port of a transfer is announced before the transfer command:
//!
//! - `PORT h1,h2,h3,h4,p1,p2` (active) and `227 ... (h1,h2,h3,h4,p1,p2)`
//!   (passive) carry the port as `p1 * 256 + p2`.
//! - `EPRT |1|addr|port|` and `229 ... (|||port|)` carry it in decimal.
//!
//! `STOR`/`RETR` then yields a file reference carrying the last announced port
//! for that host pair.

use std::collections::HashMap;
use std::net::IpAddr;

use tracing::trace;

use super::{basename, mime_from_filename, FileReference, FileSource, FtpTransferType};
use crate::packet::ParsedPacket;

/// Per-session map from control connection to announced data port.
///
/// Keyed by the unordered address pair of the control connection. Owned by
/// one analysis session and never shared between captures.
#[derive(Debug, Clone, Default)]
pub struct FtpSessionTracker {
    data_ports: HashMap<(IpAddr, IpAddr), u16>,
}

impl FtpSessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(a: IpAddr, b: IpAddr) -> (IpAddr, IpAddr) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    /// Last data port announced between two hosts.
    pub fn data_port(&self, a: IpAddr, b: IpAddr) -> Option<u16> {
        self.data_ports.get(&Self::key(a, b)).copied()
    }

    pub fn len(&self) -> usize {
        self.data_ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data_ports.is_empty()
    }

    pub fn clear(&mut self) {
        self.data_ports.clear();
    }

    /// Feed one control-channel packet. Returns the files announced by
    /// transfer commands in it.
    pub fn observe(&mut self, packet: &ParsedPacket) -> Vec<FileReference> {
        let key = Self::key(packet.src_ip, packet.dst_ip);
        let text = String::from_utf8_lossy(packet.payload());
        let mut files = Vec::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(port) = announced_port(line) {
                trace!(packet = %packet.id, port, "ftp data port announced");
                self.data_ports.insert(key, port);
                continue;
            }

            let (cmd, arg) = line.split_once(' ').unwrap_or((line, ""));
            let Some(kind) = FtpTransferType::from_command(cmd) else {
                continue;
            };
            let name = basename(arg);
            if name.is_empty() {
                continue;
            }
            let mut file = FileReference::new(name, FileSource::Ftp, packet);
            file.mime_type = mime_from_filename(name);
            file.ftp_data_port = self.data_ports.get(&key).copied();
            file.ftp_transfer_type = Some(kind);
            files.push(file);
        }
        files
    }
}

/// Data port carried by a `PORT`, `EPRT`, `227` or `229` line.
fn announced_port(line: &str) -> Option<u16> {
    let (head, rest) = line.split_once(' ').unwrap_or((line, ""));
    if head.eq_ignore_ascii_case("PORT") {
        parse_sextet(rest.trim())
    } else if head.eq_ignore_ascii_case("EPRT") {
        parse_extended(rest.trim())
    } else if head == "227" || head.starts_with("227-") {
        find_sextet(rest)
    } else if head == "229" || head.starts_with("229-") {
        let open = rest.find('(')?;
        parse_extended(rest[open + 1..].trim_end_matches(')'))
    } else {
        None
    }
}

/// `h1,h2,h3,h4,p1,p2` to `p1 * 256 + p2`.
fn parse_sextet(s: &str) -> Option<u16> {
    let mut numbers = [0u8; 6];
    let mut parts = s.split(',');
    for n in numbers.iter_mut() {
        *n = parts.next()?.trim().parse().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(u16::from(numbers[4]) * 256 + u16::from(numbers[5]))
}

/// First sextet anywhere in a reply text.
fn find_sextet(text: &str) -> Option<u16> {
    text.split(|c: char| !(c.is_ascii_digit() || c == ','))
        .find_map(parse_sextet)
}

/// `<d>proto<d>addr<d>port<d>` with any delimiter `d`.
fn parse_extended(s: &str) -> Option<u16> {
    let delimiter = s.chars().next()?;
    s.split(delimiter).nth(3)?.trim().parse().ok()
}
