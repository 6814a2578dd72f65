//! Suspicious-indicator analysis.
//!
//! Two rule families produce findings for a packet:
//! - payload rules, regular expressions over the transport payload, screened
//!   together with a [`RegexSet`] before the individual patterns run
//! - header rules, checks on TCP flag combinations and destination ports
//!
//! Every rule carries a severity, a confidence and classification tags
//! (MITRE ATT&CK technique ids where one applies). Analysis is a pure function
//! of the packet.

use std::fmt;
use std::sync::OnceLock;

use compact_str::CompactString;
use regex::bytes::{Regex, RegexSet};
use serde::Serialize;
use smallvec::SmallVec;
use tracing::warn;

use crate::packet::ParsedPacket;
use crate::protocol::tcp::flags;

/// Maximum evidence snippet length in bytes.
const EVIDENCE_LEN: usize = 80;

/// Finding severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Finding category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    CleartextCredentials,
    SqlInjection,
    CrossSiteScripting,
    CommandInjection,
    PathTraversal,
    SuspiciousExecutable,
    PortScan,
    SuspiciousPort,
    EncodedPayload,
}

/// A heuristic security finding attached to one packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuspiciousIndicator {
    pub kind: IndicatorKind,
    pub severity: Severity,
    pub description: CompactString,
    pub evidence: String,
    /// 0..=100
    pub confidence: u8,
    pub tags: SmallVec<[CompactString; 2]>,
}

struct PayloadRule {
    kind: IndicatorKind,
    severity: Severity,
    confidence: u8,
    description: &'static str,
    tags: &'static [&'static str],
    /// Only applies to packets carrying one of these labels (empty = any).
    protocols: &'static [&'static str],
}

type RuleSpec = (&'static str, PayloadRule);

/// Plaintext protocols on which credentials travel in the clear.
const PLAINTEXT: &[&str] = &["FTP", "Telnet", "HTTP", "SMTP", "POP3", "IMAP", "LDAP"];

fn rule_specs() -> Vec<RuleSpec> {
    use IndicatorKind::*;
    use Severity::*;

    fn rule(
        kind: IndicatorKind,
        severity: Severity,
        confidence: u8,
        description: &'static str,
        tags: &'static [&'static str],
        protocols: &'static [&'static str],
    ) -> PayloadRule {
        PayloadRule {
            kind,
            severity,
            confidence,
            description,
            tags,
            protocols,
        }
    }

    vec![
        (
            r"(?m)^(?:USER|PASS) \S+",
            rule(CleartextCredentials, High, 90, "Cleartext login command", &["T1552"], PLAINTEXT),
        ),
        (
            r"(?i)authorization:[ \t]*basic[ \t]+[A-Za-z0-9+/=]+",
            rule(CleartextCredentials, High, 85, "HTTP Basic credentials", &["T1552"], PLAINTEXT),
        ),
        (
            r"(?i)\b(?:password|passwd|pwd)=[^&\s]+",
            rule(CleartextCredentials, High, 80, "Password in form data", &["T1552"], PLAINTEXT),
        ),
        (
            r"(?i)AUTH (?:LOGIN|PLAIN)\b",
            rule(CleartextCredentials, Medium, 70, "Plaintext SMTP authentication", &["T1552"], PLAINTEXT),
        ),
        (
            r"(?i)union(?:\s|/\*.*?\*/|%20|\+)+(?:all(?:\s|%20|\+)+)?select",
            rule(SqlInjection, Critical, 90, "SQL injection: UNION SELECT", &["T1190"], &[]),
        ),
        (
            r"(?i)(?:'|%27)(?:\s|%20|\+)*or(?:\s|%20|\+)+['\d]+(?:\s|%20)*=(?:\s|%20)*['\d]+",
            rule(SqlInjection, High, 80, "SQL injection: OR tautology", &["T1190"], &[]),
        ),
        (
            r"(?i)(?:sleep|pg_sleep|benchmark)\s*\(\s*\d+|waitfor\s+delay\s+'",
            rule(SqlInjection, High, 75, "SQL injection: time-based probe", &["T1190"], &[]),
        ),
        (
            r"(?i)(?:<|%3c)\s*script[^>]*(?:>|%3e)",
            rule(CrossSiteScripting, High, 85, "XSS: script tag", &["T1189"], &[]),
        ),
        (
            r"(?i)javascript\s*:|\bon(?:error|load|mouseover)\s*=",
            rule(CrossSiteScripting, Medium, 65, "XSS: script handler", &["T1189"], &[]),
        ),
        (
            r"(?:;|\||&&|\$\(|`)\s*(?:cat|id|whoami|uname|wget|curl|nc|bash|sh|python|perl)\b",
            rule(CommandInjection, Critical, 80, "Command injection: shell chaining", &["T1059"], &[]),
        ),
        (
            r"(?i)(?:\.\./|\.\.\\|%2e%2e%2f|%2e%2e/|\.\.%2f){2,}",
            rule(PathTraversal, High, 85, "Path traversal sequence", &["T1083"], &[]),
        ),
        (
            r"(?i)/etc/(?:passwd|shadow)\b|\bwin\.ini\b|\bboot\.ini\b",
            rule(PathTraversal, High, 75, "Sensitive file access", &["T1083"], &[]),
        ),
        (
            r"(?i)\b[\w-]+\.(?:exe|dll|scr|ps1|bat|vbs|hta|msi)\b",
            rule(SuspiciousExecutable, Medium, 60, "Executable file referenced in transfer", &["T1105"], &[]),
        ),
        (
            r"[A-Za-z0-9+/]{120,}={0,2}",
            rule(EncodedPayload, Low, 40, "Long base64 blob", &["T1027", "T1132"], &[]),
        ),
    ]
}

struct PayloadRules {
    set: RegexSet,
    patterns: Vec<Regex>,
    rules: Vec<PayloadRule>,
}

fn payload_rules() -> Option<&'static PayloadRules> {
    static RULES: OnceLock<Option<PayloadRules>> = OnceLock::new();
    RULES
        .get_or_init(|| {
            let specs = rule_specs();
            let sources: Vec<&str> = specs.iter().map(|(p, _)| *p).collect();
            let compiled = RegexSet::new(&sources).and_then(|set| {
                let patterns = sources
                    .iter()
                    .map(|p| Regex::new(p))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((set, patterns))
            });
            match compiled {
                Ok((set, patterns)) => Some(PayloadRules {
                    set,
                    patterns,
                    rules: specs.into_iter().map(|(_, r)| r).collect(),
                }),
                Err(e) => {
                    warn!(error = %e, "failed to compile indicator rules");
                    None
                }
            }
        })
        .as_ref()
}

/// Destination ports commonly used by backdoors and C2 tooling.
const ABUSED_PORTS: &[(u16, &str)] = &[
    (1337, "leet backdoor"),
    (4444, "Metasploit default handler"),
    (5555, "Android debug bridge"),
    (6666, "IRC botnet"),
    (6667, "IRC botnet"),
    (31337, "Back Orifice"),
];

fn evidence(bytes: &[u8]) -> String {
    let cut = &bytes[..bytes.len().min(EVIDENCE_LEN)];
    String::from_utf8_lossy(cut).into_owned()
}

fn tags(list: &[&str]) -> SmallVec<[CompactString; 2]> {
    list.iter().map(|t| CompactString::from(*t)).collect()
}

/// Applies the payload and header rules.
#[derive(Debug, Clone, Copy)]
pub struct IndicatorAnalyzer {
    max_scan_bytes: usize,
}

impl Default for IndicatorAnalyzer {
    fn default() -> Self {
        Self::new(64 * 1024)
    }
}

impl IndicatorAnalyzer {
    pub fn new(max_scan_bytes: usize) -> Self {
        Self { max_scan_bytes }
    }

    /// Findings for one packet. At most one finding per rule.
    pub fn analyze(&self, packet: &ParsedPacket) -> Vec<SuspiciousIndicator> {
        let mut found = Vec::new();
        self.header_rules(packet, &mut found);

        let payload = packet.payload();
        let payload = &payload[..payload.len().min(self.max_scan_bytes)];
        if payload.is_empty() {
            return found;
        }

        let Some(rules) = payload_rules() else {
            return found;
        };

        for idx in rules.set.matches(payload).iter() {
            let rule = &rules.rules[idx];
            if !rule.protocols.is_empty() && !rule.protocols.iter().any(|p| packet.has_protocol(p)) {
                continue;
            }
            let Some(m) = rules.patterns[idx].find(payload) else {
                continue;
            };
            found.push(SuspiciousIndicator {
                kind: rule.kind,
                severity: rule.severity,
                description: CompactString::from(rule.description),
                evidence: evidence(m.as_bytes()),
                confidence: rule.confidence,
                tags: tags(rule.tags),
            });
        }

        found
    }

    fn header_rules(&self, packet: &ParsedPacket, found: &mut Vec<SuspiciousIndicator>) {
        if let Some(tcp) = packet.tcp {
            let f = tcp.flags;
            let scan = if f.is_empty() {
                Some(("TCP NULL scan (no flags set)", 80))
            } else if f.contains(flags::FIN | flags::PSH | flags::URG) && !f.contains(flags::ACK) {
                Some(("TCP XMAS scan (FIN, PSH and URG set)", 85))
            } else if f.contains(flags::SYN | flags::FIN) {
                Some(("TCP SYN+FIN probe", 85))
            } else {
                None
            };
            if let Some((description, confidence)) = scan {
                found.push(SuspiciousIndicator {
                    kind: IndicatorKind::PortScan,
                    severity: Severity::Medium,
                    description: CompactString::from(description),
                    evidence: format!("flags=[{}] {} -> {}", f, packet.source(), packet.destination()),
                    confidence,
                    tags: tags(&["T1046"]),
                });
            }
        }

        if packet.transport.has_ports() {
            if let Some((port, why)) = ABUSED_PORTS.iter().find(|(p, _)| *p == packet.dst_port) {
                found.push(SuspiciousIndicator {
                    kind: IndicatorKind::SuspiciousPort,
                    severity: Severity::Medium,
                    description: compact_str::format_compact!("Connection to port {port} ({why})"),
                    evidence: format!("{} -> {}", packet.source(), packet.destination()),
                    confidence: 50,
                    tags: tags(&["T1571"]),
                });
            }
        }
    }
}
