//! # Search Patterns
//!
//! Key and value matchers for [`Core::get`](super::Core::get) and the
//! `find_*` family. A pattern is one of:
//!
//! - `Literal`: exact byte equality
//! - `Any`: matches everything
//! - `Regex`: an unanchored RE2-class regex over raw bytes
//!
//! ## Query-Byte Form
//!
//! Callers passing raw query bytes select the matcher with the first byte:
//! a leading `0x00` authorizes pattern matching, anything else is literal.
//! After the zero byte, an empty remainder or a lone `*` is a wildcard and
//! everything else compiles as a regex. Sanitizing user input is therefore
//! a matter of stripping leading zero bytes.
//!
//! Before compilation, every `%` that is not already preceded by an odd
//! run of backslashes gets one, so the codec's `%<n>%` escapes in stored
//! data cannot be summoned by accident from a pattern written against the
//! decoded form.

use regex::bytes::Regex;

use crate::error::Result;

#[derive(Debug, Clone)]
pub enum Pattern {
    Literal(Vec<u8>),
    Any,
    Regex(Regex),
}

impl Pattern {
    pub fn literal(bytes: impl Into<Vec<u8>>) -> Self {
        Pattern::Literal(bytes.into())
    }

    pub fn any() -> Self {
        Pattern::Any
    }

    /// Compiles a regex pattern, applying the `%`-protection pass first.
    pub fn regex(pattern: &[u8]) -> Result<Self> {
        let protected = protect_percent(pattern);
        let source = String::from_utf8_lossy(&protected);
        Ok(Pattern::Regex(Regex::new(&source)?))
    }

    /// Parses the query-byte form described in the module docs.
    pub fn from_query_bytes(raw: &[u8]) -> Result<Self> {
        match raw.split_first() {
            Some((0, rest)) => {
                if rest.is_empty() || rest == b"*" {
                    Ok(Pattern::Any)
                } else {
                    Pattern::regex(rest)
                }
            }
            _ => Ok(Pattern::Literal(raw.to_vec())),
        }
    }

    pub fn matches(&self, data: &[u8]) -> bool {
        match self {
            Pattern::Literal(expected) => expected == data,
            Pattern::Any => true,
            Pattern::Regex(re) => re.is_match(data),
        }
    }
}

/// Backslash-escapes every `%` preceded by an even (possibly zero) run of
/// backslashes. Backslashes themselves are left alone so existing escapes
/// keep their meaning.
fn protect_percent(pattern: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(pattern.len() + 4);
    let mut run = 0usize;

    for &b in pattern {
        match b {
            b'\\' => run += 1,
            b'%' => {
                if run % 2 == 0 {
                    out.push(b'\\');
                }
                run = 0;
            }
            _ => run = 0,
        }
        out.push(b);
    }
    out
}
