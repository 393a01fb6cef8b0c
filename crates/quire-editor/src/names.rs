//! Identifier generators for new and copied entities.
//!
//! # Design
//! - Pure functions over the sibling names visible at write time.
//! - Numbers only grow: a generator returns one past the largest suffix seen and
//!   never fills gaps left by deletions.
//! - Copying an already-copied entity strips its `_copyN` suffix first so names
//!   do not compound.

use std::sync::LazyLock;

use regex::Regex;

const COPY_MARKER: &str = "_copy";
const ADD_SHORT_PREFIX: &str = "New_";

static SHORT_TERM: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z]{2})(\d{2})$").ok());
static LONG_TERM: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z]+)(\d{4})$").ok());

/// A short identifier with its paired display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamePair {
    /// Directory name / identifier.
    pub short: String,
    /// Title or long name.
    pub long: String,
}

/// `prefix` followed by one more than the largest number any sibling carries
/// after `prefix`; `prefix1` when none match.
#[must_use]
pub fn next_numeric<S: AsRef<str>>(prefix: &str, siblings: &[S]) -> String {
    format!("{prefix}{}", numeric_successor(prefix, "", siblings))
}

/// Next academic term after `current`, falling back to [`next_copy`] when the
/// name is not a recognised term or the successor already exists.
///
/// Short terms (`Sp`, `Su`, `Fa` + two-digit year) cycle `Sp → Su → Fa → Sp`
/// with the year wrapping from 99 to 00. Long terms (`Spring`, `Summer`,
/// `Fall` + four-digit year) follow the same cycle. Seasons match
/// case-insensitively and are emitted in canonical casing.
#[must_use]
pub fn next_term<S: AsRef<str>>(current: &str, siblings: &[S]) -> String {
    match term_successor(current) {
        Some(candidate) if !siblings.iter().any(|name| name.as_ref() == candidate) => candidate,
        _ => next_copy(current, siblings),
    }
}

/// `<base>_copy<n>` where `<base>` is `name` without any `_copyN` suffix and
/// `n` exceeds both that suffix and every sibling's `<base>_copyK`.
#[must_use]
pub fn next_copy<S: AsRef<str>>(name: &str, siblings: &[S]) -> String {
    let (base, start) = split_copy_suffix(name);
    let number = copy_number(base, start, siblings);
    format!("{base}{COPY_MARKER}{number}")
}

/// Names for a freshly added entity: `New_<n>` and `New (<n>)`, with `n` the
/// larger of the two independent successors.
#[must_use]
pub fn add_names<S: AsRef<str>, L: AsRef<str>>(shorts: &[S], longs: &[L]) -> NamePair {
    let short_number = numeric_successor(ADD_SHORT_PREFIX, "", shorts);
    let long_number = numeric_successor("New (", ")", longs);
    let number = short_number.max(long_number);
    NamePair {
        short: format!("{ADD_SHORT_PREFIX}{number}"),
        long: format!("New ({number})"),
    }
}

/// Names for a copy: `<base>_copy<n>` and `<base long> (copy <n>)`, with `n` the
/// larger of the two successors. A missing long name is treated as `Unknown`.
#[must_use]
pub fn copy_names<S: AsRef<str>, L: AsRef<str>>(
    short: &str,
    shorts: &[S],
    long: Option<&str>,
    longs: &[L],
) -> NamePair {
    let (base_short, _) = split_copy_suffix(short);
    let base_long = long.map_or("Unknown", strip_long_copy_suffix);
    let short_number = copy_number(base_short, 1, shorts);
    let long_number = numeric_successor(&format!("{base_long} (copy "), ")", longs);
    let number = short_number.max(long_number);
    NamePair {
        short: format!("{base_short}{COPY_MARKER}{number}"),
        long: format!("{base_long} (copy {number})"),
    }
}

fn term_successor(current: &str) -> Option<String> {
    if let Some(captures) = SHORT_TERM.as_ref().and_then(|re| re.captures(current)) {
        let year: u32 = captures[2].parse().ok()?;
        let (season, carry) = match captures[1].to_ascii_lowercase().as_str() {
            "sp" => ("Su", false),
            "su" => ("Fa", false),
            "fa" => ("Sp", true),
            _ => return None,
        };
        let year = if carry { (year + 1) % 100 } else { year };
        return Some(format!("{season}{year:02}"));
    }
    if let Some(captures) = LONG_TERM.as_ref().and_then(|re| re.captures(current)) {
        let year: u32 = captures[2].parse().ok()?;
        let (season, carry) = match captures[1].to_ascii_lowercase().as_str() {
            "spring" => ("Summer", false),
            "summer" => ("Fall", false),
            "fall" => ("Spring", true),
            _ => return None,
        };
        let year = if carry { year + 1 } else { year };
        return Some(format!("{season}{year}"));
    }
    None
}

fn split_copy_suffix(name: &str) -> (&str, u64) {
    name.rfind(COPY_MARKER)
        .and_then(|index| {
            let digits = &name[index + COPY_MARKER.len()..];
            parse_digits(digits).map(|number| (&name[..index], number.saturating_add(1)))
        })
        .unwrap_or((name, 1))
}

fn strip_long_copy_suffix(long: &str) -> &str {
    long.strip_suffix(')')
        .and_then(|rest| rest.rfind(" (copy ").map(|index| (rest, index)))
        .filter(|(rest, index)| parse_digits(&rest[index + " (copy ".len()..]).is_some())
        .map_or(long, |(rest, index)| &rest[..index])
}

fn copy_number<S: AsRef<str>>(base: &str, start: u64, siblings: &[S]) -> u64 {
    let prefix = format!("{base}{COPY_MARKER}");
    siblings
        .iter()
        .filter_map(|name| name.as_ref().strip_prefix(&prefix).and_then(parse_digits))
        .fold(start, |number, found| {
            if found >= number {
                found.saturating_add(1)
            } else {
                number
            }
        })
}

fn numeric_successor<S: AsRef<str>>(prefix: &str, suffix: &str, siblings: &[S]) -> u64 {
    siblings
        .iter()
        .filter_map(|name| {
            name.as_ref()
                .strip_prefix(prefix)
                .and_then(|rest| rest.strip_suffix(suffix))
                .and_then(parse_digits)
        })
        .max()
        .map_or(1, |max| max.saturating_add(1))
}

fn parse_digits(value: &str) -> Option<u64> {
    if value.is_empty() || !value.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}
