//! Version normalization and comparison.
//!
//! Upstream projects tag releases inconsistently (`v1.2.3`, `1.2.3-beta`,
//! `2.1.0+build5`, `1:4.0-2`), so every version string entering the engine
//! is first passed through [`normalize`] and all ordering decisions go
//! through [`compare`].
//!
//! ## Precedence Rules
//!
//! Comparison implements Debian package version precedence. A version is
//! split into `epoch:upstream-revision` (epoch defaults to 0, revision to
//! the empty string), and each part is compared with the alternating-run
//! algorithm:
//!
//! - Numeric runs compare numerically, ignoring leading zeros
//!   (`1.02` equals `1.2`, `1.10` beats `1.9`).
//! - Non-numeric runs compare character-wise with letters sorting before
//!   all other characters.
//! - `~` sorts before everything, including the end of the string, which
//!   is what makes `1.0~rc1` a pre-release of `1.0`.
//!
//! The resulting order is total (modulo equivalences like leading zeros),
//! which the comparator's test suite checks for antisymmetry.
//!
//! ## The Not-Installed Sentinel
//!
//! The sentinel `0.0.0` means "not installed"; every well-formed non-empty
//! version is newer than it, so a first-time install falls out of the same
//! `is_newer` comparison as an ordinary update.

use regex::Regex;
use std::cmp::Ordering;
use std::sync::OnceLock;

/// The synthetic version recorded for applications that were never installed.
pub const NOT_INSTALLED: &str = "0.0.0";

fn version_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9]+(?:\.[0-9]+)*(?:-[0-9A-Za-z.\-]+)?(?:\+[0-9A-Za-z.\-]+)?").unwrap())
}

fn embedded_version_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // The pre-release tail only continues across dots into numeric
    // segments, so archive suffixes like ".tar.gz" stay out of the match.
    RE.get_or_init(|| Regex::new(r"[0-9]+(?:\.[0-9]+)+(?:[-+][0-9A-Za-z]+(?:\.[0-9]+)*)?").unwrap())
}

/// Strips tag decoration and extracts the leading version expression.
///
/// Removes a leading `v`/`V` and surrounding whitespace, then keeps the
/// longest prefix matching `DIGIT+("."DIGIT+)*(("-"EXT)?("+"EXT)?)?`.
/// Returns the input trimmed when no version prefix is present, so callers
/// can still report the offending string.
pub fn normalize(s: &str) -> String {
    let trimmed = s.trim().trim_start_matches(['v', 'V']);
    match version_prefix_re().find(trimmed) {
        Some(m) => m.as_str().to_string(),
        None => trimmed.to_string(),
    }
}

/// Finds a version expression embedded anywhere in a string.
///
/// Used to pull versions out of artifact filenames like
/// `some-tool_2.14.1_amd64.deb`. Requires at least two numeric components
/// so bare numbers in names do not match.
pub fn extract_embedded(s: &str) -> Option<String> {
    embedded_version_re().find(s).map(|m| m.as_str().to_string())
}

/// Compares two version strings by Debian precedence rules.
pub fn compare(a: &str, b: &str) -> Ordering {
    let (epoch_a, upstream_a, revision_a) = split(a);
    let (epoch_b, upstream_b, revision_b) = split(b);

    epoch_a
        .cmp(&epoch_b)
        .then_with(|| verrevcmp(upstream_a, upstream_b))
        .then_with(|| verrevcmp(revision_a, revision_b))
}

/// Returns true when `candidate` sorts strictly after `current`.
pub fn is_newer(candidate: &str, current: &str) -> bool {
    compare(candidate, current) == Ordering::Greater
}

/// Splits `epoch:upstream-revision` into its three parts.
///
/// Missing epoch defaults to 0; the revision is everything after the last
/// hyphen (so upstream versions may themselves contain hyphens).
fn split(version: &str) -> (u64, &str, &str) {
    let (epoch, rest) = match version.split_once(':') {
        Some((e, rest)) if e.chars().all(|c| c.is_ascii_digit()) && !e.is_empty() => {
            (e.parse().unwrap_or(0), rest)
        }
        _ => (0, version),
    };

    match rest.rsplit_once('-') {
        Some((upstream, revision)) => (epoch, upstream, revision),
        None => (epoch, rest, ""),
    }
}

/// Sort weight of the character at `idx`, or of end-of-string.
///
/// `~` sorts before everything including end-of-string; letters sort before
/// all other characters. Digits and end-of-string share weight 0, which the
/// caller never compares against each other.
fn order_at(v: &[char], idx: usize) -> i32 {
    match v.get(idx) {
        None => 0,
        Some(c) if c.is_ascii_digit() => 0,
        Some(c) if c.is_ascii_alphabetic() => *c as i32,
        Some('~') => -1,
        Some(c) => *c as i32 + 256,
    }
}

/// The dpkg fragment comparison: alternating non-digit and digit runs.
fn verrevcmp(a: &str, b: &str) -> Ordering {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (mut i, mut j) = (0usize, 0usize);

    while i < a.len() || j < b.len() {
        // Non-digit run, character-wise.
        while (i < a.len() && !a[i].is_ascii_digit()) || (j < b.len() && !b[j].is_ascii_digit()) {
            let oa = order_at(&a, i);
            let ob = order_at(&b, j);
            if oa != ob {
                return oa.cmp(&ob);
            }
            i += 1;
            j += 1;
        }

        // Numeric run: skip leading zeros, then compare numerically.
        while a.get(i) == Some(&'0') {
            i += 1;
        }
        while b.get(j) == Some(&'0') {
            j += 1;
        }

        let mut first_diff = Ordering::Equal;
        while a.get(i).is_some_and(|c| c.is_ascii_digit()) && b.get(j).is_some_and(|c| c.is_ascii_digit()) {
            if first_diff == Ordering::Equal {
                first_diff = a[i].cmp(&b[j]);
            }
            i += 1;
            j += 1;
        }
        if a.get(i).is_some_and(|c| c.is_ascii_digit()) {
            return Ordering::Greater;
        }
        if b.get(j).is_some_and(|c| c.is_ascii_digit()) {
            return Ordering::Less;
        }
        if first_diff != Ordering::Equal {
            return first_diff;
        }
    }

    Ordering::Equal
}
