//! Debian-style version comparison.
//!
//! This is the authoritative order used when deduplicating packages by name
//! and when deciding whether a repository index changed. The algorithm is
//! the one `dpkg` uses: an optional numeric `epoch:` prefix, an upstream
//! part, and a revision split off at the last `-`. Within each part, runs
//! of digits compare numerically and everything else compares by a
//! modified character order in which `~` sorts before the empty string.

use std::cmp::Ordering;

/// Compare two package versions, returning the usual `Ordering`.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let (epoch_a, rest_a) = split_epoch(a);
    let (epoch_b, rest_b) = split_epoch(b);
    if epoch_a != epoch_b {
        return epoch_a.cmp(&epoch_b);
    }

    let (upstream_a, revision_a) = split_revision(rest_a);
    let (upstream_b, revision_b) = split_revision(rest_b);
    match verrevcmp(upstream_a.as_bytes(), upstream_b.as_bytes()) {
        Ordering::Equal => verrevcmp(revision_a.as_bytes(), revision_b.as_bytes()),
        other => other,
    }
}

/// True if `a` is newer than `b`.
pub fn version_newer(a: &str, b: &str) -> bool {
    compare_versions(a, b) == Ordering::Greater
}

fn split_epoch(version: &str) -> (u64, &str) {
    if let Some(pos) = version.find(':') {
        let prefix = &version[..pos];
        if !prefix.is_empty() && prefix.bytes().all(|c| c.is_ascii_digit()) {
            if let Ok(epoch) = prefix.parse::<u64>() {
                return (epoch, &version[pos + 1..]);
            }
        }
    }
    (0, version)
}

fn split_revision(version: &str) -> (&str, &str) {
    match version.rfind('-') {
        Some(pos) => (&version[..pos], &version[pos + 1..]),
        None => (version, ""),
    }
}

/// Character weight in the dpkg order: `~` sorts before end-of-string,
/// letters before all other non-digits.
fn order(c: u8) -> i32 {
    if c == b'~' {
        -1
    } else if c.is_ascii_digit() {
        0
    } else if c.is_ascii_alphabetic() {
        i32::from(c)
    } else {
        i32::from(c) + 256
    }
}

fn verrevcmp(a: &[u8], b: &[u8]) -> Ordering {
    let mut i = 0;
    let mut j = 0;
    while i < a.len() || j < b.len() {
        // Non-digit span. An exhausted side weighs 0, so `1.0~rc1`
        // compares below `1.0`.
        while (i < a.len() && !a[i].is_ascii_digit()) || (j < b.len() && !b[j].is_ascii_digit()) {
            let wa = if i < a.len() { order(a[i]) } else { 0 };
            let wb = if j < b.len() { order(b[j]) } else { 0 };
            if wa != wb {
                return wa.cmp(&wb);
            }
            i += 1;
            j += 1;
        }

        // Digit span: numeric comparison with leading zeros ignored.
        while i < a.len() && a[i] == b'0' {
            i += 1;
        }
        while j < b.len() && b[j] == b'0' {
            j += 1;
        }
        let mut first_diff = Ordering::Equal;
        while i < a.len() && a[i].is_ascii_digit() && j < b.len() && b[j].is_ascii_digit() {
            if first_diff == Ordering::Equal {
                first_diff = a[i].cmp(&b[j]);
            }
            i += 1;
            j += 1;
        }
        if i < a.len() && a[i].is_ascii_digit() {
            return Ordering::Greater;
        }
        if j < b.len() && b[j].is_ascii_digit() {
            return Ordering::Less;
        }
        if first_diff != Ordering::Equal {
            return first_diff;
        }
    }
    Ordering::Equal
}
