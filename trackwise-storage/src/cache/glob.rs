//! Glob patterns with Redis `MATCH` semantics, for backends that match keys
//! themselves.

use regex::Regex;

use super::traits::{CacheError, CacheResult};

/// Compiled glob: `*` any run, `?` one char, `[...]` / `[^...]` classes with
/// ranges, `\x` literal `x`.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    source: String,
    regex: Regex,
}

impl GlobPattern {
    pub fn compile(pattern: &str) -> CacheResult<Self> {
        let invalid = |reason: &str| CacheError::Pattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        let mut out = String::from("(?s)^");
        let mut chars = pattern.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '*' => out.push_str(".*"),
                '?' => out.push('.'),
                '\\' => match chars.next() {
                    Some(literal) => out.push_str(&regex::escape(&literal.to_string())),
                    None => out.push_str(r"\\"),
                },
                '[' => {
                    let mut class = String::from("[");
                    if chars.peek() == Some(&'^') {
                        chars.next();
                        class.push('^');
                    }
                    let mut closed = false;
                    while let Some(member) = chars.next() {
                        match member {
                            ']' => {
                                closed = true;
                                break;
                            }
                            '-' => class.push('-'),
                            '\\' => {
                                if let Some(literal) = chars.next() {
                                    class.push_str(&regex::escape(&literal.to_string()));
                                }
                            }
                            other => class.push_str(&regex::escape(&other.to_string())),
                        }
                    }
                    if !closed {
                        return Err(invalid("unterminated character class"));
                    }
                    class.push(']');
                    out.push_str(&class);
                }
                other => out.push_str(&regex::escape(&other.to_string())),
            }
        }
        out.push('$');

        let regex = Regex::new(&out).map_err(|e| invalid(&e.to_string()))?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn matches(&self, key: &str) -> bool {
        self.regex.is_match(key)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// Escape glob metacharacters so `segment` only matches itself.
pub fn escape(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for c in segment.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
