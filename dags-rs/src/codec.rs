//! List and array literal grammar.
//!
//! ```text
//! list  := '[' item (',' item)* ']'
//! array := '[' list (',' list)* ']'
//! item  := unquoted | '"' (char | '\"' | '\\')* '"'
//! ```
//!
//! An item is quoted on write iff it contains a comma, quote, whitespace,
//! backslash or bracket.  [`NULL_VALUE`] is written as an empty slot, and an
//! empty slot reads back as `""`.

use crate::error::{Error, Result};

/// Reserved text meaning "no value".
pub const NULL_VALUE: &str = "null";

/// `true` if `text` is the [`NULL_VALUE`] sentinel (case-insensitive).
pub fn is_null_value(text: &str) -> bool {
    text.eq_ignore_ascii_case(NULL_VALUE)
}

/// Returns `true` if `item` must be quoted to survive a round trip.
pub fn needs_quoting(item: &str) -> bool {
    item.chars()
        .any(|c| matches!(c, ',' | '"' | '\\' | '[' | ']') || c.is_whitespace())
}

// ── Write side ────────────────────────────────────────────────────────────────

fn push_item(out: &mut String, item: &str) {
    if needs_quoting(item) {
        out.push('"');
        for c in item.chars() {
            if c == '\\' || c == '"' {
                out.push('\\');
            }
            out.push(c);
        }
        out.push('"');
    } else if item != NULL_VALUE {
        out.push_str(item);
    }
}

/// Write `items` as a list literal.
pub fn collapse_list<S: AsRef<str>>(items: &[S]) -> String {
    let mut out = String::from("[");
    if let [only] = items {
        let only = only.as_ref();
        if only.is_empty() || only == NULL_VALUE {
            // `[]` would read back as an empty list.
            out.push_str("\"\"]");
            return out;
        }
    }
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        push_item(&mut out, item.as_ref());
    }
    out.push(']');
    out
}

/// Write `rows` as an array literal.  Outer brackets are always present.
pub fn collapse_array<S: AsRef<str>>(rows: &[Vec<S>]) -> String {
    let mut out = String::from("[");
    for (i, row) in rows.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&collapse_list(row));
    }
    out.push(']');
    out
}

// ── Read side ─────────────────────────────────────────────────────────────────

struct Reader<'a> {
    src: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            chars: src.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn malformed(&self, what: &str) -> Error {
        Error::MalformedLiteral(format!("{what}: {}", self.src))
    }

    fn quoted(&mut self) -> Result<String> {
        // Opening quote already consumed.
        let mut item = String::new();
        loop {
            match self.peek() {
                None => return Err(self.malformed("unterminated quote")),
                Some('"') => {
                    self.pos += 1;
                    return Ok(item);
                }
                Some('\\') => {
                    self.pos += 1;
                    match self.peek() {
                        Some(c @ ('"' | '\\')) => {
                            item.push(c);
                            self.pos += 1;
                        }
                        _ => item.push('\\'),
                    }
                }
                Some(c) => {
                    item.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn unquoted(&mut self) -> Result<String> {
        let mut item = String::new();
        while let Some(c) = self.peek() {
            match c {
                ',' | ']' => break,
                '[' | '"' => return Err(self.malformed("unexpected character in item")),
                _ => {
                    item.push(c);
                    self.pos += 1;
                }
            }
        }
        Ok(item.trim().to_owned())
    }

    /// Read one list starting at the current position.  When `bracketed` is
    /// false the list runs to the end of input.
    fn list(&mut self, bracketed: bool) -> Result<Vec<String>> {
        let mut items = Vec::new();
        self.skip_ws();
        if bracketed && self.peek() == Some(']') {
            self.pos += 1;
            return Ok(items);
        }
        if !bracketed && self.peek().is_none() {
            return Ok(items);
        }
        loop {
            self.skip_ws();
            let item = if self.peek() == Some('"') {
                self.pos += 1;
                let item = self.quoted()?;
                self.skip_ws();
                item
            } else {
                self.unquoted()?
            };
            items.push(item);
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(']') if bracketed => {
                    self.pos += 1;
                    return Ok(items);
                }
                None if !bracketed => return Ok(items),
                None => return Err(self.malformed("missing ']'")),
                Some(_) => return Err(self.malformed("expected ',' or ']'")),
            }
        }
    }
}

/// Parse a list literal.  Brackets are optional on read.
pub fn expand_list(text: &str) -> Result<Vec<String>> {
    let mut r = Reader::new(text);
    r.skip_ws();
    let bracketed = r.peek() == Some('[');
    if bracketed {
        r.pos += 1;
    }
    let items = r.list(bracketed)?;
    r.skip_ws();
    if r.peek().is_some() {
        return Err(r.malformed("trailing text after list"));
    }
    Ok(items)
}

/// Parse an array literal.  The outer brackets are optional on read.
pub fn expand_array(text: &str) -> Result<Vec<Vec<String>>> {
    let mut r = Reader::new(text);
    r.skip_ws();
    if r.peek().is_none() {
        return Ok(Vec::new());
    }
    if r.peek() != Some('[') {
        return Err(r.malformed("expected '['"));
    }

    // Wrapped when the first '[' is followed by another '[' or closes at once.
    let save = r.pos;
    r.pos += 1;
    r.skip_ws();
    let wrapped = matches!(r.peek(), Some('[') | Some(']'));
    if !wrapped {
        r.pos = save;
    }

    let mut rows = Vec::new();
    loop {
        r.skip_ws();
        match r.peek() {
            None if wrapped => return Err(r.malformed("missing ']'")),
            None => break,
            Some(']') if wrapped => {
                r.pos += 1;
                break;
            }
            Some('[') => {
                r.pos += 1;
                rows.push(r.list(true)?);
                r.skip_ws();
                if r.peek() == Some(',') {
                    r.pos += 1;
                }
            }
            Some(_) => return Err(r.malformed("expected '['")),
        }
    }
    r.skip_ws();
    if r.peek().is_some() {
        return Err(r.malformed("trailing text after array"));
    }
    Ok(rows)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
