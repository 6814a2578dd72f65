//! HTTP file signatures.

use compact_str::CompactString;
use httparse::{Request, Response, Status, EMPTY_HEADER};

use super::{basename, extension, extension_for_mime, mime_from_filename, FileReference, FileSource};
use crate::packet::ParsedPacket;

/// Maximum number of headers to parse per message.
const MAX_HEADERS: usize = 64;

/// Parsed response head.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ResponseHead {
    pub status: u16,
    /// Header names lowercased, values trimmed.
    pub headers: Vec<(String, String)>,
    /// Bytes up to and including the blank line, when it was seen.
    pub header_len: Option<usize>,
}

impl ResponseHead {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn content_length(&self) -> Option<u64> {
        self.header("content-length")?.parse().ok()
    }

    pub fn is_chunked(&self) -> bool {
        self.header("transfer-encoding")
            .is_some_and(|v| v.to_ascii_lowercase().contains("chunked"))
    }
}

/// Parse a response head with httparse, falling back to a line scan when the
/// head is cut short or httparse rejects it.
pub(crate) fn parse_response_head(payload: &[u8]) -> Option<ResponseHead> {
    if !payload.starts_with(b"HTTP/") {
        return None;
    }

    let mut headers = [EMPTY_HEADER; MAX_HEADERS];
    let mut response = Response::new(&mut headers);
    if let Ok(Status::Complete(len)) = response.parse(payload) {
        return Some(ResponseHead {
            status: response.code.unwrap_or(0),
            headers: response
                .headers
                .iter()
                .filter(|h| !h.name.is_empty())
                .map(|h| {
                    (
                        h.name.to_ascii_lowercase(),
                        String::from_utf8_lossy(h.value).trim().to_string(),
                    )
                })
                .collect(),
            header_len: Some(len),
        });
    }

    scan_response_head(payload)
}

fn scan_response_head(payload: &[u8]) -> Option<ResponseHead> {
    let mut head = ResponseHead::default();
    let mut pos = 0;
    let mut first = true;
    while pos < payload.len() {
        let line_end = payload[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|p| pos + p);
        let end = line_end.unwrap_or(payload.len());
        let line = String::from_utf8_lossy(&payload[pos..end]);
        let line = line.trim_end_matches('\r');
        pos = end + 1;

        if first {
            first = false;
            head.status = line.split_whitespace().nth(1)?.parse().ok()?;
            continue;
        }
        if line.is_empty() {
            head.header_len = line_end.map(|e| e + 1);
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            head.headers
                .push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
        }
    }
    (!first).then_some(head)
}

/// Whether a content type names a downloadable file rather than page content.
///
/// Images, audio, video, fonts and binary application types qualify. Markup,
/// scripts, style sheets, form data and plain text do not.
pub fn is_file_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    let Some((top, sub)) = essence.split_once('/') else {
        return false;
    };
    match top {
        "image" | "video" | "audio" | "font" => true,
        "application" => !matches!(
            sub,
            "json"
                | "javascript"
                | "ecmascript"
                | "xml"
                | "xhtml+xml"
                | "x-www-form-urlencoded"
                | "x-javascript"
        ) && !sub.ends_with("+json"),
        "text" => !matches!(
            sub,
            "html" | "plain" | "css" | "javascript" | "xml" | "json" | "event-stream"
        ),
        _ => false,
    }
}

/// File name from a `Content-Disposition` value.
///
/// `filename*` (RFC 5987 extended syntax) wins over `filename`. Both are
/// percent-decoded, and only the last path component is kept.
pub fn parse_content_disposition(value: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;
    for param in value.split(';').skip(1) {
        let Some((name, raw)) = param.split_once('=') else {
            continue;
        };
        let name = name.trim();
        let raw = raw.trim().trim_matches('"');
        if name.eq_ignore_ascii_case("filename*") {
            // charset'language'encoded
            let encoded = raw.splitn(3, '\'').nth(2).unwrap_or(raw);
            extended = Some(percent_decode(encoded));
        } else if name.eq_ignore_ascii_case("filename") {
            plain = Some(percent_decode(raw));
        }
    }
    let name = extended.or(plain)?;
    let name = basename(&name);
    (!name.is_empty()).then(|| name.to_string())
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes.get(i + 1..i + 3).and_then(|h| std::str::from_utf8(h).ok());
            if let Some(b) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// File reference for a response announcing a file-like body.
pub(super) fn detect_response(packet: &ParsedPacket) -> Option<FileReference> {
    let head = parse_response_head(packet.payload())?;
    let content_type = head.header("content-type")?;
    if !is_file_content_type(content_type) {
        return None;
    }
    let size = head.content_length().filter(|&n| n > 0)?;
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_ascii_lowercase();

    let filename = head
        .header("content-disposition")
        .and_then(parse_content_disposition)
        .unwrap_or_else(|| format!("download_{}.{}", packet.id.0, extension_for_mime(&mime)));

    let mut file = FileReference::new(filename, FileSource::HttpResponse, packet);
    file.size = Some(size);
    file.mime_type = Some(CompactString::from(mime));
    Some(file)
}

/// File reference for a GET whose target path ends in a file name.
pub(super) fn detect_request(packet: &ParsedPacket) -> Option<FileReference> {
    let target = request_target(packet.payload())?;
    let path = target
        .split(['?', '#'])
        .next()
        .unwrap_or(target.as_str());
    let path = match path.split_once("://") {
        Some((_, rest)) => rest.find('/').map_or("", |i| &rest[i..]),
        None => path,
    };
    let name = basename(path);
    extension(name)?;

    let mut file = FileReference::new(name, FileSource::HttpRequest, packet);
    file.mime_type = mime_from_filename(name);
    Some(file)
}

fn request_target(payload: &[u8]) -> Option<String> {
    let mut headers = [EMPTY_HEADER; MAX_HEADERS];
    let mut request = Request::new(&mut headers);
    // A partial parse still fills method and path once the request line is in.
    let _ = request.parse(payload);
    if let (Some(method), Some(path)) = (request.method, request.path) {
        return method.eq_ignore_ascii_case("GET").then(|| path.to_string());
    }

    let line_end = payload.iter().position(|&b| b == b'\n').unwrap_or(payload.len());
    let line = String::from_utf8_lossy(&payload[..line_end]);
    let mut parts = line.split_whitespace();
    let method = parts.next()?;
    let target = parts.next()?;
    method.eq_ignore_ascii_case("GET").then(|| target.to_string())
}

/// Decode a chunked transfer-encoded body.
///
/// Decoding stops at the terminating zero-size chunk or at the first
/// malformed chunk header; whatever was decoded up to then is returned.
pub fn decode_chunked(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len());
    let mut pos = 0;
    loop {
        let Some(line_len) = body[pos..].windows(2).position(|w| w == b"\r\n") else {
            break;
        };
        let line = String::from_utf8_lossy(&body[pos..pos + line_len]);
        // Chunk extensions follow a semicolon
        let size_part = line.split(';').next().unwrap_or("").trim();
        let Ok(size) = usize::from_str_radix(size_part, 16) else {
            break;
        };
        if size == 0 {
            break;
        }
        let start = pos + line_len + 2;
        // A size running past the buffer means the body was cut short
        let Some(end) = start.checked_add(size).filter(|end| *end <= body.len()) else {
            out.extend_from_slice(&body[start..]);
            break;
        };
        out.extend_from_slice(&body[start..end]);
        pos = (end + 2).min(body.len());
    }
    out
}
