//! Line-level TRACKINFO syntax.
//!
//! Accepted lines:
//! - `FIELD=value` applies to the whole disc block
//! - `FIELD[N]=value` applies to track `N` only
//! - blank lines and lines starting with `#` are skipped
//!
//! Field names consist of ASCII letters, digits and underscores and are
//! upper-cased. No whitelist is enforced here.

use regex::Regex;
use std::sync::OnceLock;

use super::error::{TrackInfoError, TrackInfoResult};

/// One parsed TRACKINFO line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    /// Upper-cased field name.
    pub field: String,
    /// Track index for `FIELD[N]=value` lines; always positive.
    pub index: Option<u32>,
    /// Value with surrounding whitespace removed; may be empty.
    pub value: String,
    /// 1-based line number in the TRACKINFO file.
    pub line: usize,
}

impl Directive {
    /// Returns true if this directive sets `field`.
    pub fn is(&self, field: &str) -> bool {
        self.field == field
    }
}

/// Pattern: `<field>[<index>]=<value>`
///
/// - Group 1: field name
/// - Group 2: optional index digits
/// - Group 3: value (anything, possibly empty)
fn directive_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^([A-Za-z0-9_]+)(?:\[([0-9]+)\])?=(.*)$").unwrap())
}

/// Parse a single line.
///
/// Returns `Ok(None)` for blank and comment lines.
pub fn parse_line(raw: &str, line: usize) -> TrackInfoResult<Option<Directive>> {
    let text = raw.trim();
    if text.is_empty() || text.starts_with('#') {
        return Ok(None);
    }

    let malformed = || TrackInfoError::MalformedDirective {
        line,
        text: text.to_string(),
    };

    let captures = directive_pattern().captures(text).ok_or_else(malformed)?;

    let index = match captures.get(2) {
        Some(digits) => match digits.as_str().parse::<u32>() {
            Ok(0) | Err(_) => return Err(malformed()),
            Ok(n) => Some(n),
        },
        None => None,
    };

    Ok(Some(Directive {
        field: captures[1].to_ascii_uppercase(),
        index,
        value: captures[3].trim().to_string(),
        line,
    }))
}

/// Parse TRACKINFO text into directives, in file order.
pub fn parse_directives(text: &str) -> TrackInfoResult<Vec<Directive>> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut directives = Vec::new();
    for (i, raw) in text.lines().enumerate() {
        if let Some(directive) = parse_line(raw, i + 1)? {
            directives.push(directive);
        }
    }
    Ok(directives)
}
