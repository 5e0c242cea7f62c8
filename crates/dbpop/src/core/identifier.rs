//! Identifier quoting.
//!
//! The quote character is derived from the quoted-identifier pattern the
//! database reports: each candidate style is tested against the pattern in
//! priority order (double quote, backtick, single quote), and double quote is
//! used when nothing matches or no pattern is available.
//!
//! Embedded quote characters are escaped with a backslash, and
//! [`unquote_ident`] reverses the transformation.

use regex::Regex;

use super::schema::TableName;

/// Quote character used when detection finds nothing better.
pub const DEFAULT_QUOTE: char = '"';

const CANDIDATES: [(&str, char); 3] = [("\"xxxx\"", '"'), ("`xxx`", '`'), ("'xxx'", '\'')];

/// Pick the quote character for a reported quoted-identifier pattern.
pub fn detect_quote_char(pattern: Option<&str>) -> char {
    let Some(pattern) = pattern.filter(|p| !p.is_empty()) else {
        return DEFAULT_QUOTE;
    };
    let Ok(re) = Regex::new(pattern) else {
        tracing::debug!("Ignoring unparsable quoted identifier pattern {:?}", pattern);
        return DEFAULT_QUOTE;
    };
    CANDIDATES
        .iter()
        .find(|(sample, _)| re.is_match(sample))
        .map(|(_, quote)| *quote)
        .unwrap_or(DEFAULT_QUOTE)
}

/// Wrap `name` in `quote`, backslash-escaping every embedded `quote`.
pub fn quote_ident(quote: char, name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push(quote);
    for c in name.chars() {
        if c == quote {
            out.push('\\');
        }
        out.push(c);
    }
    out.push(quote);
    out
}

/// Quote every present part of a table name and join them with `.`.
pub fn quote_table(quote: char, name: &TableName) -> String {
    name.parts()
        .map(|part| quote_ident(quote, part))
        .collect::<Vec<_>>()
        .join(".")
}

/// Reverse [`quote_ident`]. Returns `None` if `quoted` is not a quoted identifier.
pub fn unquote_ident(quote: char, quoted: &str) -> Option<String> {
    let inner = quoted.strip_prefix(quote)?.strip_suffix(quote)?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next) if next == quote => out.push(next),
                Some(next) => {
                    out.push(c);
                    out.push(next);
                }
                None => out.push(c),
            }
        } else if c == quote {
            // unescaped quote inside the identifier
            return None;
        } else {
            out.push(c);
        }
    }
    Some(out)
}
