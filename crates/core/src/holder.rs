//! Function holders (§4.9): owned state for stateful intrinsics, built at
//! `make` time from literal arguments and referenced by emitted code
//! through a raw pointer valid for the compiled module's lifetime (§9
//! Pointer graphs).

use crate::context::ExecutionContext;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Characters that are regex metacharacters and must be escaped when they
/// appear literally in a SQL `LIKE` pattern.
static POSIX_REGEX_SPECIALS: LazyLock<HashSet<char>> = LazyLock::new(|| {
    ['[', ']', '(', ')', '|', '^', '-', '+', '*', '?', '{', '}', '$', '\\']
        .into_iter()
        .collect()
});

/// Translates a SQL-style `LIKE` pattern into a regex pattern: `_` becomes
/// "any single char", `%` becomes "any sequence", literal characters that
/// would otherwise be regex metacharacters are escaped, and an optional
/// escape character produces literals of `_`, `%`, or itself.
fn like_pattern_to_regex(sql_pattern: &str, escape_char: Option<char>) -> Result<String, String> {
    let chars: Vec<char> = sql_pattern.chars().collect();
    let mut out = String::with_capacity(chars.len() * 2);
    out.push('^');
    let mut idx = 0;
    while idx < chars.len() {
        let cur = chars[idx];
        if Some(cur) == escape_char {
            idx += 1;
            if idx == chars.len() {
                return Err(format!(
                    "unexpected escape char at the end of pattern {sql_pattern}"
                ));
            }
            let escaped = chars[idx];
            if escaped == '_' || escaped == '%' || Some(escaped) == escape_char {
                if POSIX_REGEX_SPECIALS.contains(&escaped) {
                    out.push('\\');
                }
                out.push(escaped);
            } else {
                return Err(format!(
                    "invalid escape sequence in pattern {sql_pattern} at offset {idx}"
                ));
            }
        } else if cur == '_' {
            out.push('.');
        } else if cur == '%' {
            out.push_str(".*");
        } else {
            if POSIX_REGEX_SPECIALS.contains(&cur) {
                out.push('\\');
            }
            out.push(cur);
        }
        idx += 1;
    }
    out.push('$');
    Ok(out)
}

/// State for the `like` intrinsic: a precompiled regex built once at
/// `make` time from the pattern's literal argument(s).
#[derive(Debug)]
pub struct PatternHolder {
    regex: Regex,
}

impl PatternHolder {
    /// Compiles `sql_pattern` (with an optional escape character) into a
    /// regex. A runtime `like` pattern that fails to compile is reported
    /// here, at `make` time, not per-batch (§4.5 Tie-breaks).
    pub fn make(sql_pattern: &str, escape_char: Option<char>) -> Result<Self, String> {
        let posix_pattern = like_pattern_to_regex(sql_pattern, escape_char)?;
        let regex = Regex::new(&posix_pattern)
            .map_err(|e| format!("invalid like pattern '{sql_pattern}': {e}"))?;
        Ok(PatternHolder { regex })
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

/// Translates a user-visible date format (`YYYY-MM-DD HH:MI:SS`) into
/// `chrono`'s `strptime`-style format codes, the same role the original's
/// `DateUtils::ToInternalFormat` plays translating to C's `strptime`
/// codes.
fn to_internal_format(user_format: &str) -> String {
    const TOKENS: &[(&str, &str)] = &[
        ("YYYY", "%Y"),
        ("YY", "%y"),
        ("MM", "%m"),
        ("DD", "%d"),
        ("HH24", "%H"),
        ("HH", "%H"),
        ("MI", "%M"),
        ("SS", "%S"),
        ("FFF", "%3f"),
        ("TZD", "%z"),
    ];
    let mut out = String::with_capacity(user_format.len());
    let bytes = user_format.as_bytes();
    let mut i = 0;
    'outer: while i < bytes.len() {
        for (token, replacement) in TOKENS {
            if user_format[i..].starts_with(token) {
                out.push_str(replacement);
                i += token.len();
                continue 'outer;
            }
        }
        out.push(bytes[i] as char);
        i += 1;
    }
    out
}

/// State for the `to_date` intrinsic: a parsed format string plus the
/// "suppress errors" flag, both literal arguments at `make` time.
#[derive(Debug)]
pub struct DateHolder {
    format: String,
    suppress_errors: bool,
}

impl DateHolder {
    pub fn make(user_format: &str, suppress_errors: bool) -> Self {
        DateHolder {
            format: to_internal_format(user_format),
            suppress_errors,
        }
    }

    /// Parses `data` into milliseconds since the Unix epoch. On failure,
    /// reports through `ctx` unless `suppress_errors` is set, then returns
    /// `None` (§4.9 Date holder, §7 Runtime failure).
    pub fn parse(&self, data: &str, ctx: &mut ExecutionContext) -> Option<i64> {
        use chrono::NaiveDateTime;
        match NaiveDateTime::parse_from_str(data, &self.format) {
            Ok(dt) => Some(dt.and_utc().timestamp_millis()),
            Err(_) => {
                if !self.suppress_errors {
                    ctx.set_error(format!("Error parsing value {data} for given format."));
                }
                None
            }
        }
    }
}

/// A function holder: the owned state table entry the emitter passes as a
/// hidden argument to a stateful intrinsic (§4.1 "needs function holder").
#[derive(Debug)]
pub enum FunctionHolder {
    Pattern(PatternHolder),
    Date(DateHolder),
}

impl FunctionHolder {
    /// The opaque pointer emitted code receives as a holder argument (§4.1
    /// "needs function holder", §9 Pointer graphs). Valid for as long as the
    /// holder itself is kept alive by its owning `Projector`/`Filter`.
    pub fn as_ptr(&self) -> *const u8 {
        match self {
            FunctionHolder::Pattern(p) => p as *const PatternHolder as *const u8,
            FunctionHolder::Date(d) => d as *const DateHolder as *const u8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_sql_wildcards() {
        let h = PatternHolder::make("a%c_", None).unwrap();
        assert!(h.is_match("abbbcX"));
        assert!(!h.is_match("abbbc"));
        assert!(!h.is_match("xbc"));
    }

    #[test]
    fn escapes_regex_metacharacters() {
        let h = PatternHolder::make("a.b", None).unwrap();
        assert!(h.is_match("a.b"));
        assert!(!h.is_match("aXb"));
    }

    #[test]
    fn escape_char_produces_literal_wildcards() {
        let h = PatternHolder::make("100\\%", Some('\\')).unwrap();
        assert!(h.is_match("100%"));
        assert!(!h.is_match("100X"));
    }

    #[test]
    fn invalid_escape_sequence_is_an_error() {
        assert!(PatternHolder::make("100\\X", Some('\\')).is_err());
    }

    #[test]
    fn trailing_escape_char_is_an_error() {
        assert!(PatternHolder::make("100\\", Some('\\')).is_err());
    }

    #[test]
    fn date_holder_parses_known_format() {
        let holder = DateHolder::make("YYYY-MM-DD HH:MI:SS", false);
        let mut ctx = ExecutionContext::new();
        let millis = holder.parse("2016-01-01 00:00:00", &mut ctx).unwrap();
        assert_eq!(millis, 1451606400000);
        assert!(!ctx.has_error());
    }

    #[test]
    fn date_holder_reports_unparsable_input() {
        let holder = DateHolder::make("YYYY-MM-DD", false);
        let mut ctx = ExecutionContext::new();
        assert!(holder.parse("not-a-date", &mut ctx).is_none());
        assert!(ctx.has_error());
    }

    #[test]
    fn date_holder_suppresses_errors_when_flagged() {
        let holder = DateHolder::make("YYYY-MM-DD", true);
        let mut ctx = ExecutionContext::new();
        assert!(holder.parse("not-a-date", &mut ctx).is_none());
        assert!(!ctx.has_error());
    }
}
