//! In-memory reader for classic capture containers.

use bytes::Bytes;
use pcap_parser::traits::PcapReaderIterator;
use pcap_parser::{LegacyPcapReader, PcapBlockOwned, PcapError as ParserError};
use serde::Serialize;
use tracing::{debug, warn};

use super::{GLOBAL_HEADER_LEN, RECORD_HEADER_LEN};
use crate::error::CaptureError;

/// Minimum parser buffer (64KB). Grown to the input size so a record never
/// exceeds the buffer.
const MIN_BUFFER_SIZE: usize = 65536;

/// Byte order and timestamp precision of a classic capture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum CaptureFormat {
    /// Little-endian, microseconds
    LegacyLeMicro,
    /// Big-endian, microseconds
    LegacyBeMicro,
    /// Little-endian, nanoseconds
    LegacyLeNano,
    /// Big-endian, nanoseconds
    LegacyBeNano,
}

impl CaptureFormat {
    /// Detect the container format from its magic number.
    pub fn detect(data: &[u8]) -> Result<Self, CaptureError> {
        let Some(magic) = data.get(..4) else {
            return Err(CaptureError::TooShort {
                needed: 4,
                have: data.len(),
            });
        };

        let magic = u32::from_le_bytes([magic[0], magic[1], magic[2], magic[3]]);

        match magic {
            0xa1b2c3d4 => Ok(CaptureFormat::LegacyLeMicro),
            0xd4c3b2a1 => Ok(CaptureFormat::LegacyBeMicro),
            0xa1b23c4d => Ok(CaptureFormat::LegacyLeNano),
            0x4d3cb2a1 => Ok(CaptureFormat::LegacyBeNano),
            _ => Err(CaptureError::UnknownMagic { magic }),
        }
    }

    pub fn is_big_endian(&self) -> bool {
        matches!(self, CaptureFormat::LegacyBeMicro | CaptureFormat::LegacyBeNano)
    }

    pub fn is_nanosecond(&self) -> bool {
        matches!(self, CaptureFormat::LegacyLeNano | CaptureFormat::LegacyBeNano)
    }

    fn read_u32(&self, bytes: [u8; 4]) -> u32 {
        if self.is_big_endian() {
            u32::from_be_bytes(bytes)
        } else {
            u32::from_le_bytes(bytes)
        }
    }
}

/// Global header facts about a decoded capture.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CaptureInfo {
    pub format: CaptureFormat,
    pub version_major: u16,
    pub version_minor: u16,
    pub snaplen: u32,
    /// Link-layer type (1 = Ethernet).
    pub link_type: i32,
    /// Set when decoding stopped at a record that ran past the buffer.
    #[serde(serialize_with = "truncation_message")]
    pub truncation: Option<CaptureError>,
}

fn truncation_message<S: serde::Serializer>(t: &Option<CaptureError>, s: S) -> Result<S::Ok, S::Error> {
    match t {
        Some(e) => s.collect_str(e),
        None => s.serialize_none(),
    }
}

/// One captured frame.
#[derive(Clone, Debug)]
pub struct RawPacketRecord {
    /// 1-based position in the capture.
    pub frame_number: u64,
    pub ts_sec: u32,
    /// Microseconds or nanoseconds, depending on the container format.
    pub ts_frac: u32,
    pub nanosecond: bool,
    pub captured_length: u32,
    pub original_length: u32,
    pub data: Bytes,
}

impl RawPacketRecord {
    /// Timestamp in epoch milliseconds.
    pub fn timestamp_ms(&self) -> i64 {
        let frac_ms = if self.nanosecond {
            self.ts_frac / 1_000_000
        } else {
            self.ts_frac / 1_000
        };
        i64::from(self.ts_sec) * 1_000 + i64::from(frac_ms)
    }
}

/// Reader over a capture held in memory.
pub struct CaptureReader<'a> {
    input: &'a [u8],
    inner: LegacyPcapReader<&'a [u8]>,
    format: CaptureFormat,
    info: Option<CaptureInfo>,
    frame_number: u64,
    consumed: usize,
    truncation: Option<CaptureError>,
    done: bool,
}

impl<'a> CaptureReader<'a> {
    /// Open a capture. Fails when the buffer is shorter than the global header
    /// or the magic number is not recognized.
    pub fn new(input: &'a [u8]) -> Result<Self, CaptureError> {
        if input.len() < GLOBAL_HEADER_LEN {
            return Err(CaptureError::TooShort {
                needed: GLOBAL_HEADER_LEN,
                have: input.len(),
            });
        }

        let format = CaptureFormat::detect(input)?;
        let capacity = (input.len() + 1).max(MIN_BUFFER_SIZE);
        let inner =
            LegacyPcapReader::new(capacity, input).map_err(|e| CaptureError::InvalidFormat {
                reason: format!("Failed to parse capture header: {}", e),
            })?;

        Ok(Self {
            input,
            inner,
            format,
            info: None,
            frame_number: 0,
            consumed: 0,
            truncation: None,
            done: false,
        })
    }

    pub fn format(&self) -> CaptureFormat {
        self.format
    }

    /// Global header facts, available once the header block was read.
    pub fn info(&self) -> Option<&CaptureInfo> {
        self.info.as_ref()
    }

    /// The truncation that stopped decoding, if any.
    pub fn truncation(&self) -> Option<&CaptureError> {
        self.truncation.as_ref()
    }

    /// Read the next record.
    ///
    /// Returns `None` at the end of the buffer or at the first record that
    /// claims more bytes than remain.
    pub fn next_record(&mut self) -> Option<RawPacketRecord> {
        if self.done {
            return None;
        }

        loop {
            match self.inner.next() {
                Ok((offset, block)) => match block {
                    PcapBlockOwned::Legacy(packet) => {
                        self.frame_number += 1;

                        let record = RawPacketRecord {
                            frame_number: self.frame_number,
                            ts_sec: packet.ts_sec,
                            ts_frac: packet.ts_usec,
                            nanosecond: self.format.is_nanosecond(),
                            captured_length: packet.caplen,
                            original_length: packet.origlen,
                            data: Bytes::copy_from_slice(packet.data),
                        };

                        self.inner.consume(offset);
                        self.consumed += offset;
                        return Some(record);
                    }
                    PcapBlockOwned::LegacyHeader(header) => {
                        self.info = Some(CaptureInfo {
                            format: self.format,
                            version_major: header.version_major,
                            version_minor: header.version_minor,
                            snaplen: header.snaplen,
                            link_type: header.network.0,
                            truncation: None,
                        });
                        self.inner.consume(offset);
                        self.consumed += offset;
                        continue;
                    }
                    _ => {
                        self.inner.consume(offset);
                        self.consumed += offset;
                        continue;
                    }
                },
                Err(ParserError::Eof) => {
                    self.done = true;
                    return None;
                }
                Err(ParserError::Incomplete(_)) => {
                    if let Err(e) = self.inner.refill() {
                        debug!(error = %e, "capture refill failed");
                        self.stop_truncated();
                        return None;
                    }
                    continue;
                }
                Err(ParserError::UnexpectedEof) => {
                    self.stop_truncated();
                    return None;
                }
                Err(e) => {
                    warn!(error = %e, frame = self.frame_number + 1, "capture parse error");
                    self.stop_truncated();
                    return None;
                }
            }
        }
    }

    fn stop_truncated(&mut self) {
        self.done = true;
        let remaining = self.input.get(self.consumed..).unwrap_or(&[]);
        let (expected, actual) = match remaining.get(8..12) {
            Some(caplen) => {
                let caplen = self
                    .format
                    .read_u32([caplen[0], caplen[1], caplen[2], caplen[3]]);
                (
                    RECORD_HEADER_LEN + caplen as usize,
                    remaining.len(),
                )
            }
            None => (RECORD_HEADER_LEN, remaining.len()),
        };
        let truncation = CaptureError::TruncatedRecord {
            frame: self.frame_number + 1,
            expected,
            actual,
        };
        warn!(%truncation, "capture ends mid-record; keeping complete records");
        self.truncation = Some(truncation);
    }
}

impl Iterator for CaptureReader<'_> {
    type Item = RawPacketRecord;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record()
    }
}

/// All complete records of a capture plus its header facts.
#[derive(Clone, Debug)]
pub struct DecodedCapture {
    pub info: CaptureInfo,
    pub records: Vec<RawPacketRecord>,
}

/// Decode every complete record of an in-memory capture.
pub fn decode_capture(input: &[u8]) -> Result<DecodedCapture, CaptureError> {
    let mut reader = CaptureReader::new(input)?;
    let records: Vec<RawPacketRecord> = reader.by_ref().collect();

    let mut info = reader.info.take().ok_or_else(|| CaptureError::InvalidFormat {
        reason: "capture header block was never produced".to_string(),
    })?;
    info.truncation = reader.truncation.take();

    debug!(
        records = records.len(),
        link_type = info.link_type,
        truncated = info.truncation.is_some(),
        "decoded capture"
    );

    Ok(DecodedCapture { info, records })
}
