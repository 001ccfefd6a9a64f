//! Placeholder scanning and rewriting.
//!
//! Native drivers speak exactly one placeholder style each (`?` for MySQL,
//! `$n` for PostgreSQL, `@Pn` for SQL Server). The adapter lets every dialect
//! declare its own [`ParameterType`] instead, so prepared SQL is scanned once
//! for its declared placeholders and rewritten into the native form.
//!
//! Scanning only recognises placeholders; it skips quoted literals,
//! quoted identifiers and comments but never parses statement structure.

use crate::config::SqlDialect;
use crate::platform::{ParameterType, Platform};

/// Placeholder syntax accepted by a native driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `?`, one value per occurrence.
    Question,
    /// `$1`, `$2`, ..., one value per distinct slot.
    Dollar,
    /// `@P1`, `@P2`, ..., one value per distinct slot.
    AtP,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Occurrence {
    start: usize,
    end: usize,
    slot: usize,
}

/// Declared placeholders of one SQL string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaceholderMap {
    names: Vec<String>,
    occurrences: Vec<Occurrence>,
}

impl PlaceholderMap {
    /// Distinct placeholder names in first-seen order. Positional `?`
    /// placeholders are named `1`, `2`, ...
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of distinct placeholders.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Slot index of a normalized placeholder name.
    pub fn slot(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Render `sql` in the native placeholder style.
    ///
    /// Returns the rewritten SQL and, for every native parameter position,
    /// the slot whose value must be sent there.
    pub fn rewrite(&self, sql: &str, style: PlaceholderStyle) -> (String, Vec<usize>) {
        let mut out = String::with_capacity(sql.len() + self.occurrences.len() * 2);
        let mut order = Vec::new();
        let mut cursor = 0;
        for occurrence in &self.occurrences {
            out.push_str(&sql[cursor..occurrence.start]);
            match style {
                PlaceholderStyle::Question => {
                    out.push('?');
                    order.push(occurrence.slot);
                }
                PlaceholderStyle::Dollar => {
                    out.push_str(&format!("${}", occurrence.slot + 1));
                }
                PlaceholderStyle::AtP => {
                    out.push_str(&format!("@P{}", occurrence.slot + 1));
                }
            }
            cursor = occurrence.end;
        }
        out.push_str(&sql[cursor..]);
        if style != PlaceholderStyle::Question {
            order = (0..self.names.len()).collect();
        }
        (out, order)
    }

    fn record(&mut self, name: String, start: usize, end: usize) {
        let slot = match self.slot(&name) {
            Some(slot) => slot,
            None => {
                self.names.push(name);
                self.names.len() - 1
            }
        };
        self.occurrences.push(Occurrence { start, end, slot });
    }
}

/// Find the placeholders `platform` declares in `sql`.
pub fn scan(sql: &str, platform: &Platform) -> PlaceholderMap {
    let mut map = PlaceholderMap::default();
    let parameter_type = platform.parameter_type();
    if parameter_type == ParameterType::None {
        return map;
    }

    let dialect = platform.dialect();
    let backslash_escapes = dialect == SqlDialect::MySql;
    // `Platform::quote_identifier` escapes `"` with a backslash on PostgreSQL.
    let identifier_escapes = backslash_escapes || dialect == SqlDialect::PostgreSql;
    let bytes = sql.as_bytes();
    let len = bytes.len();
    let mut positional = 0;
    let mut i = 0;

    while i < len {
        match bytes[i] {
            b'\'' => i = skip_quoted(bytes, i, b'\'', backslash_escapes),
            b'"' => i = skip_quoted(bytes, i, b'"', identifier_escapes),
            b'`' if dialect == SqlDialect::MySql => i = skip_quoted(bytes, i, b'`', false),
            b'[' if dialect == SqlDialect::SqlServer => i = skip_quoted(bytes, i, b']', false),
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                i = bytes[i..]
                    .iter()
                    .position(|&b| b == b'\n')
                    .map_or(len, |p| i + p + 1);
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = sql[i + 2..].find("*/").map_or(len, |p| i + 2 + p + 2);
            }
            b'?' if parameter_type == ParameterType::Position => {
                positional += 1;
                map.record(positional.to_string(), i, i + 1);
                i += 1;
            }
            b'$' if parameter_type == ParameterType::Index => {
                let digits = count_while(&bytes[i + 1..], |b| b.is_ascii_digit());
                if digits > 0 {
                    map.record(sql[i + 1..i + 1 + digits].to_string(), i, i + 1 + digits);
                    i += 1 + digits;
                } else {
                    i = skip_dollar_quoted(sql, i);
                }
            }
            b':' if parameter_type == ParameterType::Named => {
                if bytes.get(i + 1) == Some(&b':') {
                    i += 2;
                    continue;
                }
                let starts_name = bytes
                    .get(i + 1)
                    .map_or(false, |b| b.is_ascii_alphabetic() || *b == b'_');
                if starts_name {
                    let name_len = count_while(&bytes[i + 1..], |b| {
                        b.is_ascii_alphanumeric() || b == b'_'
                    });
                    map.record(sql[i + 1..i + 1 + name_len].to_string(), i, i + 1 + name_len);
                    i += 1 + name_len;
                } else {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }
    map
}

fn count_while(bytes: &[u8], pred: impl Fn(u8) -> bool) -> usize {
    bytes.iter().take_while(|&&b| pred(b)).count()
}

/// Index just past the closing quote of the literal opened at `start`.
fn skip_quoted(bytes: &[u8], start: usize, close: u8, backslash_escapes: bool) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        let b = bytes[i];
        if backslash_escapes && b == b'\\' {
            i += 2;
            continue;
        }
        if b == close {
            // A doubled closing quote is an escaped quote.
            if bytes.get(i + 1) == Some(&close) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

/// Skip a PostgreSQL dollar-quoted string (`$tag$ ... $tag$`) starting at
/// `start`, or just the `$` when it does not open one.
fn skip_dollar_quoted(sql: &str, start: usize) -> usize {
    let rest = &sql[start + 1..];
    let tag_len = count_while(rest.as_bytes(), |b| b.is_ascii_alphanumeric() || b == b'_');
    if rest.as_bytes().get(tag_len) != Some(&b'$') {
        return start + 1;
    }
    let tag = &sql[start..start + tag_len + 2];
    let body = start + tag.len();
    match sql[body..].find(tag) {
        Some(p) => body + p + tag.len(),
        None => sql.len(),
    }
}
