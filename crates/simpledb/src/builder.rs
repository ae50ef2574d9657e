//! Statement accumulation.
//!
//! [`SqlBuilder`] collects SQL fragments and their parameters. Fragments use
//! `?` placeholders; the builder never looks at a connection and never checks
//! that placeholders and parameters line up (the server does that when the
//! statement is prepared).
//!
//! ```ignore
//! let mut b = SqlBuilder::new();
//! b.append("SELECT * FROM article", ())
//!     .append("WHERE title = ?", ("title1",));
//! b.append_in("AND id IN (?)", [1, 2, 3])?;
//!
//! assert_eq!(b.text(), "SELECT * FROM article WHERE title = ? AND id IN (?, ?, ?)");
//! ```

use crate::error::{DbError, DbResult};
use crate::params::IntoParams;
use crate::value::Value;


/// An append-only SQL statement with positional parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlBuilder {
    text: String,
    params: Vec<Value>,
}

impl SqlBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment, separated from the previous one by a single space,
    /// and its parameters.
    pub fn append(&mut self, fragment: &str, params: impl IntoParams) -> &mut Self {
        if !self.text.is_empty() {
            self.text.push(' ');
        }
        self.text.push_str(fragment);
        self.params.extend(params.into_params());
        self
    }

    /// Append a fragment whose first `?` stands for a whole IN-list.
    ///
    /// The first `?` in `fragment` is replaced by one placeholder per
    /// parameter (`?, ?, ?`). Any later `?` is left untouched, and an escaped
    /// `??` is never the one replaced. Fails without modifying the builder
    /// when `params` is empty.
    pub fn append_in(&mut self, fragment: &str, params: impl IntoParams) -> DbResult<&mut Self> {
        let params = params.into_params();
        if params.is_empty() {
            return Err(DbError::invalid_argument("IN parameter list is empty"));
        }

        let group = vec!["?"; params.len()].join(", ");
        let expanded = match first_placeholder(fragment) {
            Some(pos) => format!("{}{group}{}", &fragment[..pos], &fragment[pos + 1..]),
            None => fragment.to_string(),
        };

        if !self.text.is_empty() {
            self.text.push(' ');
        }
        self.text.push_str(&expanded);
        self.params.extend(params);
        Ok(self)
    }

    /// The accumulated SQL, with `?` placeholders.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The accumulated parameters, in placeholder order.
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Render the statement with PostgreSQL `$1, $2, ...` placeholders.
    pub fn to_positional(&self) -> String {
        to_positional(&self.text)
    }
}

/// Byte offset of the first `?` that is not half of a `??` escape.
fn first_placeholder(fragment: &str) -> Option<usize> {
    let bytes = fragment.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'?' {
            if bytes.get(i + 1) == Some(&b'?') {
                i += 2;
                continue;
            }
            return Some(i);
        }
        i += 1;
    }
    None
}

// ==================== Placeholder compilation ====================

/// A run of SQL text that is either executable code or an opaque span
/// (string literal, quoted identifier, dollar-quoted body, comment).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    Code(&'a str),
    Opaque(&'a str),
}

fn is_ident_byte(b: u8) -> bool {
    b == b'_' || b.is_ascii_alphanumeric()
}

/// End (exclusive) of a quoted span starting at `start`.
///
/// The closing quote is doubled to escape it. `backslash` enables `\`
/// escapes, as in `E'...'` strings.
fn skip_quoted(bytes: &[u8], start: usize, quote: u8, backslash: bool) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        let b = bytes[i];
        if backslash && b == b'\\' {
            i += 2;
            continue;
        }
        if b == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

/// End (exclusive) of a `/* ... */` comment, honouring nesting.
fn skip_block_comment(bytes: &[u8], start: usize) -> usize {
    let mut depth = 0usize;
    let mut i = start;
    while i + 1 < bytes.len() {
        match (bytes[i], bytes[i + 1]) {
            (b'/', b'*') => {
                depth += 1;
                i += 2;
            }
            (b'*', b'/') => {
                depth -= 1;
                i += 2;
                if depth == 0 {
                    return i;
                }
            }
            _ => i += 1,
        }
    }
    bytes.len()
}

/// If a dollar-quote opening tag (`$$` or `$tag$`) starts at `start`,
/// return the index of its closing `$`.
fn dollar_tag_end(bytes: &[u8], start: usize) -> Option<usize> {
    if start > 0 && is_ident_byte(bytes[start - 1]) {
        return None;
    }
    let mut i = start + 1;
    if bytes.get(i).is_some_and(u8::is_ascii_digit) {
        return None;
    }
    while i < bytes.len() && is_ident_byte(bytes[i]) {
        i += 1;
    }
    (bytes.get(i) == Some(&b'$')).then_some(i)
}

fn segments(sql: &str) -> Vec<Segment<'_>> {
    let bytes = sql.as_bytes();
    let mut out = Vec::new();
    let mut code_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let end = match bytes[i] {
            b'\'' => {
                let escaped = i > 0
                    && matches!(bytes[i - 1], b'E' | b'e')
                    && (i < 2 || !is_ident_byte(bytes[i - 2]));
                Some(skip_quoted(bytes, i, b'\'', escaped))
            }
            b'"' => Some(skip_quoted(bytes, i, b'"', false)),
            b'-' if bytes.get(i + 1) == Some(&b'-') => Some(
                sql[i..]
                    .find('\n')
                    .map_or(bytes.len(), |pos| i + pos),
            ),
            b'/' if bytes.get(i + 1) == Some(&b'*') => Some(skip_block_comment(bytes, i)),
            b'$' => dollar_tag_end(bytes, i).map(|tag_end| {
                let tag = &sql[i..=tag_end];
                sql[tag_end + 1..]
                    .find(tag)
                    .map_or(bytes.len(), |pos| tag_end + 1 + pos + tag.len())
            }),
            _ => None,
        };

        match end {
            Some(end) => {
                if code_start < i {
                    out.push(Segment::Code(&sql[code_start..i]));
                }
                out.push(Segment::Opaque(&sql[i..end]));
                i = end;
                code_start = end;
            }
            None => i += 1,
        }
    }

    if code_start < bytes.len() {
        out.push(Segment::Code(&sql[code_start..]));
    }
    out
}

/// Rewrite `?` placeholders to `$1, $2, ...`.
///
/// Literals, quoted identifiers, dollar-quoted bodies and comments are copied
/// verbatim. `??` in code renders a literal `?` (the jsonb operator).
pub(crate) fn to_positional(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut idx: usize = 0;

    for segment in segments(sql) {
        match segment {
            Segment::Opaque(s) => out.push_str(s),
            Segment::Code(s) => {
                let mut chars = s.chars().peekable();
                while let Some(c) = chars.next() {
                    if c != '?' {
                        out.push(c);
                    } else if chars.peek() == Some(&'?') {
                        chars.next();
                        out.push('?');
                    } else {
                        idx += 1;
                        out.push('$');
                        out.push_str(&idx.to_string());
                    }
                }
            }
        }
    }
    out
}

/// Whether `keyword` appears as a whole word in the executable part of `sql`.
pub(crate) fn contains_keyword(sql: &str, keyword: &str) -> bool {
    segments(sql).into_iter().any(|segment| match segment {
        Segment::Code(s) => s
            .split(|c: char| !(c == '_' || c.is_ascii_alphanumeric()))
            .any(|word| word.eq_ignore_ascii_case(keyword)),
        Segment::Opaque(_) => false,
    })
}

/// `sql` without its trailing whitespace, comments and `;`.
pub(crate) fn trim_statement_end(sql: &str) -> &str {
    let mut end = 0;
    let mut offset = 0;
    for segment in segments(sql) {
        match segment {
            Segment::Code(s) => {
                let kept = s.trim_end_matches(|c: char| c.is_whitespace() || c == ';');
                if !kept.is_empty() {
                    end = offset + kept.len();
                }
                offset += s.len();
            }
            Segment::Opaque(s) => {
                offset += s.len();
                if !(s.starts_with("--") || s.starts_with("/*")) {
                    end = offset;
                }
            }
        }
    }
    &sql[..end]
}
