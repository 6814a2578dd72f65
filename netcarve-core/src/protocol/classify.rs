//! Protocol classification.
//!
//! Labels come from the transport, then well-known ports on either side, then
//! shallow sniffing of the payload's leading bytes. Classification is a pure
//! function of the packet, so running it twice yields the same list.

use compact_str::CompactString;

use crate::packet::{ParsedPacket, ProtocolLabels, Transport};

/// Which transports a port entry applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum On {
    Tcp,
    Udp,
    Both,
}

impl On {
    fn matches(self, transport: Transport) -> bool {
        match self {
            On::Tcp => transport == Transport::Tcp,
            On::Udp => transport == Transport::Udp,
            On::Both => transport.has_ports(),
        }
    }
}

/// Well-known ports.
const PORT_TABLE: &[(u16, On, &str)] = &[
    (20, On::Tcp, "FTP-DATA"),
    (21, On::Tcp, "FTP"),
    (22, On::Tcp, "SSH"),
    (23, On::Tcp, "Telnet"),
    (25, On::Tcp, "SMTP"),
    (53, On::Both, "DNS"),
    (67, On::Udp, "DHCP"),
    (68, On::Udp, "DHCP"),
    (80, On::Tcp, "HTTP"),
    (110, On::Tcp, "POP3"),
    (123, On::Udp, "NTP"),
    (143, On::Tcp, "IMAP"),
    (161, On::Udp, "SNMP"),
    (389, On::Tcp, "LDAP"),
    (443, On::Tcp, "HTTPS"),
    (445, On::Tcp, "SMB"),
    (465, On::Tcp, "SMTPS"),
    (587, On::Tcp, "SMTP"),
    (993, On::Tcp, "IMAPS"),
    (995, On::Tcp, "POP3S"),
    (1433, On::Tcp, "MSSQL"),
    (3306, On::Tcp, "MySQL"),
    (3389, On::Tcp, "RDP"),
    (5432, On::Tcp, "PostgreSQL"),
    (6379, On::Tcp, "Redis"),
    (8000, On::Tcp, "HTTP"),
    (8080, On::Tcp, "HTTP"),
    (8443, On::Tcp, "HTTPS"),
];

const HTTP_METHODS: &[&[u8]] = &[
    b"GET ",
    b"POST ",
    b"PUT ",
    b"DELETE ",
    b"HEAD ",
    b"OPTIONS ",
    b"PATCH ",
    b"CONNECT ",
    b"TRACE ",
];

const FTP_COMMANDS: &[&[u8]] = &[
    b"USER ", b"PASS ", b"STOR ", b"RETR ", b"PORT ", b"PASV", b"EPSV", b"EPRT ", b"LIST", b"CWD ",
    b"TYPE ",
];

const FTP_REPLIES: &[&[u8]] = &[b"227 ", b"229 ", b"150 ", b"226 ", b"230 ", b"331 "];

const SMTP_COMMANDS: &[&[u8]] = &[b"EHLO ", b"HELO ", b"MAIL FROM:", b"RCPT TO:", b"STARTTLS"];

fn starts_with_any(payload: &[u8], prefixes: &[&[u8]]) -> bool {
    prefixes.iter().any(|p| {
        payload
            .get(..p.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(p))
    })
}

/// Label of a well-known port for this transport.
pub fn port_label(port: u16, transport: Transport) -> Option<&'static str> {
    PORT_TABLE
        .iter()
        .find(|(p, on, _)| *p == port && on.matches(transport))
        .map(|(_, _, label)| *label)
}

/// Label suggested by the payload's leading bytes.
pub fn sniff(payload: &[u8], transport: Transport) -> Option<&'static str> {
    if payload.is_empty() {
        return None;
    }

    if starts_with_any(payload, HTTP_METHODS) || payload.starts_with(b"HTTP/") {
        return Some("HTTP");
    }
    if payload.starts_with(b"SSH-") {
        return Some("SSH");
    }
    if transport == Transport::Tcp && is_tls_record(payload) {
        return Some("TLS");
    }
    if starts_with_any(payload, SMTP_COMMANDS) {
        return Some("SMTP");
    }
    if starts_with_any(payload, FTP_COMMANDS) || starts_with_any(payload, FTP_REPLIES) {
        return Some("FTP");
    }
    if transport == Transport::Udp && looks_like_dns(payload) {
        return Some("DNS");
    }

    None
}

/// TLS record header: content type 20..=23, major version 3, minor <= 4.
fn is_tls_record(payload: &[u8]) -> bool {
    matches!(payload, [0x14..=0x17, 0x03, 0x00..=0x04, ..])
}

/// A conservative DNS message shape check.
fn looks_like_dns(payload: &[u8]) -> bool {
    if payload.len() < 12 {
        return false;
    }
    let opcode = (payload[2] >> 3) & 0x0f;
    let qdcount = u16::from_be_bytes([payload[4], payload[5]]);
    let ancount = u16::from_be_bytes([payload[6], payload[7]]);
    let z = payload[3] & 0x40;
    opcode <= 2 && z == 0 && qdcount == 1 && ancount <= 64
}

/// Return the ordered protocol labels for a packet.
pub fn classify(packet: &ParsedPacket) -> ProtocolLabels {
    let mut labels = ProtocolLabels::new();
    let mut push = |label: CompactString| {
        if !labels.iter().any(|l| l.eq_ignore_ascii_case(&label)) {
            labels.push(label);
        }
    };

    push(packet.transport.label());

    if packet.transport.has_ports() {
        // Lower port first: it is the more likely server side.
        let (low, high) = if packet.src_port <= packet.dst_port {
            (packet.src_port, packet.dst_port)
        } else {
            (packet.dst_port, packet.src_port)
        };
        for port in [low, high] {
            if port == 0 {
                continue;
            }
            if let Some(label) = port_label(port, packet.transport) {
                push(CompactString::const_new(label));
            }
        }
    }

    if let Some(label) = sniff(packet.payload(), packet.transport) {
        push(CompactString::const_new(label));
    }

    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::PacketId;
    use bytes::Bytes;

    fn packet(transport: Transport, src_port: u16, dst_port: u16, payload: &'static [u8]) -> ParsedPacket {
        let mut packet = ParsedPacket::new(PacketId(1), 0, Bytes::from_static(payload));
        packet.transport = transport;
        packet.src_port = src_port;
        packet.dst_port = dst_port;
        packet
    }

    // Test 1: transport then port label
    #[test]
    fn test_port_classification() {
        let p = packet(Transport::Tcp, 51000, 22, b"");
        assert_eq!(classify(&p).as_slice(), &["TCP", "SSH"]);

        let p = packet(Transport::Udp, 53, 40000, b"");
        assert_eq!(classify(&p).as_slice(), &["UDP", "DNS"]);
    }

    // Test 2: port label is transport-specific
    #[test]
    fn test_port_transport_mismatch() {
        let p = packet(Transport::Udp, 40000, 80, b"");
        assert_eq!(classify(&p).as_slice(), &["UDP"]);
    }

    // Test 3: sniffing finds HTTP on a non-standard port
    #[test]
    fn test_sniff_http() {
        let p = packet(Transport::Tcp, 40000, 9999, b"GET /index.html HTTP/1.1\r\n");
        assert_eq!(classify(&p).as_slice(), &["TCP", "HTTP"]);

        let p = packet(Transport::Tcp, 80, 40000, b"HTTP/1.1 200 OK\r\n");
        // Port and sniff agree; no duplicate label
        assert_eq!(classify(&p).as_slice(), &["TCP", "HTTP"]);
    }

    #[test]
    fn test_sniff_tls_and_ssh() {
        let p = packet(Transport::Tcp, 40000, 4433, &[0x16, 0x03, 0x01, 0x00, 0x2f]);
        assert_eq!(classify(&p).as_slice(), &["TCP", "TLS"]);

        let p = packet(Transport::Tcp, 40000, 2222, b"SSH-2.0-OpenSSH_9.6\r\n");
        assert_eq!(classify(&p).as_slice(), &["TCP", "SSH"]);
    }

    #[test]
    fn test_sniff_ftp_and_smtp() {
        assert_eq!(sniff(b"STOR myfile.txt\r\n", Transport::Tcp), Some("FTP"));
        assert_eq!(sniff(b"227 Entering Passive Mode", Transport::Tcp), Some("FTP"));
        assert_eq!(sniff(b"EHLO mail.example.com", Transport::Tcp), Some("SMTP"));
    }

    #[test]
    fn test_sniff_dns() {
        let query = [
            0x12, 0x34, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03, b'w',
        ];
        assert_eq!(sniff(&query, Transport::Udp), Some("DNS"));
        assert_eq!(sniff(&query, Transport::Tcp), None);
    }

    #[test]
    fn test_other_ip_protocol() {
        let p = packet(Transport::Ip(1), 0, 0, b"");
        assert_eq!(classify(&p).as_slice(), &["IP-1"]);
    }

    // Test 4: idempotent
    #[test]
    fn test_classify_idempotent() {
        let p = packet(Transport::Tcp, 21, 40000, b"227 Entering Passive Mode (10,0,0,1,4,210)");
        assert_eq!(classify(&p), classify(&p));
    }
}
