//! Compiled pattern battery for artifact extraction.
//!
//! Patterns run over raw payload bytes so that match offsets are byte offsets
//! into the payload, even when it is not valid UTF-8.

use std::net::Ipv6Addr;
use std::sync::OnceLock;

use regex::bytes::Regex;
use tracing::warn;

use super::ArtifactKind;

/// One pattern of the battery.
pub(crate) struct Matcher {
    pub kind: ArtifactKind,
    pub regex: Regex,
    /// Capture group holding the artifact (0 = whole match).
    pub group: usize,
    /// Post-match filter for patterns that over-approximate.
    pub accept: fn(value: &[u8], before: Option<u8>, after: Option<u8>) -> bool,
    /// Trailing bytes stripped from the value.
    pub trim_trailing: &'static [u8],
}

fn always(_: &[u8], _: Option<u8>, _: Option<u8>) -> bool {
    true
}

/// IPv6 candidates must parse, stand alone, and be more than one bare group.
fn accept_ipv6(value: &[u8], before: Option<u8>, after: Option<u8>) -> bool {
    let is_word = |b: Option<u8>| b.is_some_and(|b| b.is_ascii_alphanumeric() || b == b':' || b == b'.');
    if is_word(before) || is_word(after) {
        return false;
    }
    let Ok(text) = std::str::from_utf8(value) else {
        return false;
    };
    if text.parse::<Ipv6Addr>().is_err() {
        return false;
    }
    let groups = text.split(':').filter(|g| !g.is_empty()).count();
    groups >= 2 || text.starts_with("::")
}

const IPV4: &str = r"\b(?:(?:25[0-5]|2[0-4][0-9]|1[0-9][0-9]|[1-9]?[0-9])\.){3}(?:25[0-5]|2[0-4][0-9]|1[0-9][0-9]|[1-9]?[0-9])\b";

const IPV6: &str = r"(?i)(?:[0-9a-f]{0,4}:){2,7}[0-9a-f]{0,4}";

const URL: &str = r#"(?i)\b(?:https?|ftp|wss?)://[^\s"'<>\x00-\x1f\x7f]+"#;

const EMAIL: &str = r"(?i)\b[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}\b";

const CREDENTIALS: &[&str] = &[
    r#"(?i)\b(?:user(?:name)?|login|pass(?:word|wd)?|pwd|token|api[_-]?key|secret)\s*[=:]\s*[^\s&;,"'<>]+"#,
    r"(?i)\bauthorization:[ \t]*(?:basic|bearer|digest)[ \t]+[A-Za-z0-9+/=._~-]+",
    r"(?m)^(?:USER|PASS) [^\r\n]+",
];

const UNIX_PATH: &str = r#"(?:^|[\s"'=(])(/(?:[A-Za-z0-9._-]+/)+[A-Za-z0-9._-]+)"#;

const WINDOWS_PATH: &str = r"\b[A-Za-z]:\\(?:[A-Za-z0-9._$-]+\\)*[A-Za-z0-9._$-]+";

const URL_TRAILING: &[u8] = b".,;:!?)]}'\"";

fn compile(kind: ArtifactKind, pattern: &str, group: usize) -> Option<Matcher> {
    match Regex::new(pattern) {
        Ok(regex) => Some(Matcher {
            kind,
            regex,
            group,
            accept: always,
            trim_trailing: &[],
        }),
        Err(e) => {
            warn!(?kind, error = %e, "failed to compile artifact pattern");
            None
        }
    }
}

/// The battery, in extraction order: IPv4, IPv6, URL, email, credentials,
/// file paths.
pub(crate) fn matchers() -> &'static [Matcher] {
    static MATCHERS: OnceLock<Vec<Matcher>> = OnceLock::new();
    MATCHERS.get_or_init(|| {
        let mut all = Vec::new();
        all.extend(compile(ArtifactKind::Ip, IPV4, 0));
        all.extend(compile(ArtifactKind::Ip, IPV6, 0).map(|m| Matcher {
            accept: accept_ipv6,
            ..m
        }));
        all.extend(compile(ArtifactKind::Url, URL, 0).map(|m| Matcher {
            trim_trailing: URL_TRAILING,
            ..m
        }));
        all.extend(compile(ArtifactKind::Email, EMAIL, 0));
        for pattern in CREDENTIALS {
            all.extend(compile(ArtifactKind::Credential, pattern, 0));
        }
        all.extend(compile(ArtifactKind::FilePath, UNIX_PATH, 1));
        all.extend(compile(ArtifactKind::FilePath, WINDOWS_PATH, 0));
        all
    })
}
