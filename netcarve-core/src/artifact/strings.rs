//! Printable-run scan.

/// A printable run or a token split out of one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Run<'a> {
    pub offset: usize,
    pub bytes: &'a [u8],
}

fn is_printable(b: u8) -> bool {
    (0x20..=0x7e).contains(&b)
}

/// Runs of printable ASCII at least `min_len` long. Runs made only of spaces
/// are skipped.
pub(crate) fn printable_runs(payload: &[u8], min_len: usize) -> impl Iterator<Item = Run<'_>> {
    let min_len = min_len.max(1);
    let mut pos = 0;
    std::iter::from_fn(move || {
        while pos < payload.len() {
            let start = pos;
            while pos < payload.len() && is_printable(payload[pos]) {
                pos += 1;
            }
            let end = pos;
            // Skip the non-printable byte that ended the run
            if pos < payload.len() {
                pos += 1;
            }
            let bytes = &payload[start..end];
            if bytes.len() >= min_len {
                return Some(Run { offset: start, bytes });
            }
        }
        None
    })
}

/// Whitespace-separated tokens of a run that carry a digit or underscore.
///
/// These are re-emitted as narrower artifacts on top of the run. Tokens made
/// only of letters are dropped to cut noise from ordinary words.
pub(crate) fn marked_tokens(run: Run<'_>) -> impl Iterator<Item = Run<'_>> {
    let mut pos = 0;
    let bytes = run.bytes;
    std::iter::from_fn(move || {
        while pos < bytes.len() {
            while pos < bytes.len() && bytes[pos] == b' ' {
                pos += 1;
            }
            let start = pos;
            while pos < bytes.len() && bytes[pos] != b' ' {
                pos += 1;
            }
            let token = &bytes[start..pos];
            if token.len() >= 4 && token.iter().any(|b| b.is_ascii_digit() || *b == b'_') {
                return Some(Run {
                    offset: run.offset + start,
                    bytes: token,
                });
            }
        }
        None
    })
}
