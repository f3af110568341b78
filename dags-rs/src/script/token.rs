//! Script tokenizer.
//!
//! A command script is a flat run of tokens:
//!
//! | Token | Example | Notes |
//! |-------|---------|-------|
//! | command | `@GET(`, `@NL` | a trailing `(` opens a group |
//! | keyword | `@IF(`, `@ELSE`, `THEN` | bare only right after a header's `)` |
//! | punctuation | `(` `)` `,` `[` `]` | only inside groups and brackets |
//! | quoted | `"a, b"` | only inside groups and brackets |
//! | text | `You are rich.` | trimmed |
//!
//! Outside groups and brackets, punctuation and quotes are plain narrative
//! text, so `Hello, world.` stays one text token.  Inside a group, a text run
//! keeps the whitespace that separates it from a neighbouring command or
//! quoted piece, so `room.@GET(loc)` and `Hi @GET(name)` concatenate as
//! written.

use std::fmt;

use crate::error::{Error, Result};

/// Control-flow keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    If,
    Then,
    ElseIf,
    Else,
    EndIf,
    For,
    EndFor,
    ForEachKey,
    EndForEachKey,
    ForEachList,
    EndForEachList,
}

impl Keyword {
    /// Look up a keyword by name (case-insensitive, without `@` or `(`).
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name.to_ascii_uppercase().as_str() {
            "IF" => Keyword::If,
            "THEN" => Keyword::Then,
            "ELSEIF" => Keyword::ElseIf,
            "ELSE" => Keyword::Else,
            "ENDIF" => Keyword::EndIf,
            "FOR" => Keyword::For,
            "ENDFOR" => Keyword::EndFor,
            "FOREACHKEY" => Keyword::ForEachKey,
            "ENDFOREACHKEY" => Keyword::EndForEachKey,
            "FOREACHLIST" => Keyword::ForEachList,
            "ENDFOREACHLIST" => Keyword::EndForEachList,
            _ => return None,
        })
    }

    /// Keywords that begin a block with a header.
    pub fn opens_header(self) -> bool {
        matches!(
            self,
            Keyword::If | Keyword::ElseIf | Keyword::For | Keyword::ForEachKey | Keyword::ForEachList
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Keyword::If => "IF",
            Keyword::Then => "THEN",
            Keyword::ElseIf => "ELSEIF",
            Keyword::Else => "ELSE",
            Keyword::EndIf => "ENDIF",
            Keyword::For => "FOR",
            Keyword::EndFor => "ENDFOR",
            Keyword::ForEachKey => "FOREACHKEY",
            Keyword::EndForEachKey => "ENDFOREACHKEY",
            Keyword::ForEachList => "FOREACHLIST",
            Keyword::EndForEachList => "ENDFOREACHLIST",
        }
    }
}

/// Token classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// `@NAME` or `@NAME(`.
    Command,
    /// A control-flow keyword, with or without the sigil.
    Keyword(Keyword),
    OpenParen,
    CloseParen,
    Comma,
    OpenBracket,
    CloseBracket,
    /// `"..."`, raw text including the quotes.
    Quoted,
    Text,
}

/// One lexical unit.  `text` is the exact source spelling (trimmed for text
/// runs), so concatenating tokens reproduces an equivalent script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
}

impl Token {
    fn new(kind: TokenKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    /// `true` if this token opens a group (`@NAME(` or `(`).
    pub fn opens_group(&self) -> bool {
        self.text.ends_with('(')
    }

    pub fn is_sigil(&self) -> bool {
        self.text.starts_with('@')
    }

    pub fn keyword(&self) -> Option<Keyword> {
        match self.kind {
            TokenKind::Keyword(k) => Some(k),
            _ => None,
        }
    }

    /// Command name in upper case, without the sigil or trailing `(`.
    pub fn command_name(&self) -> String {
        self.text
            .trim_start_matches('@')
            .trim_end_matches('(')
            .to_ascii_uppercase()
    }

    /// Value of a quoted token with escapes removed; other tokens verbatim.
    pub fn unquoted(&self) -> String {
        if self.kind != TokenKind::Quoted {
            return self.text.clone();
        }
        let inner = &self.text[1..self.text.len() - 1];
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '\\' {
                if let Some(&next @ ('"' | '\\')) = chars.peek() {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
            out.push(c);
        }
        out
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

// ── Tokenizer ─────────────────────────────────────────────────────────────────

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

struct Lexer<'a> {
    src: &'a str,
    chars: Vec<char>,
    pos: usize,
    parens: usize,
    brackets: usize,
    /// Paren depth outside each open header group, innermost last.
    headers: Vec<usize>,
    /// The last token closed a header group.
    header_closed: bool,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn peek_at(&self, i: usize) -> Option<char> {
        self.chars.get(i).copied()
    }

    fn nested(&self) -> bool {
        self.parens > 0 || self.brackets > 0
    }

    fn last_kind(&self) -> Option<TokenKind> {
        self.tokens.last().map(|t| t.kind)
    }

    /// `true` if the character at `i` starts a token rather than continuing a
    /// text run, given the current nesting.
    fn is_delimiter(&self, i: usize) -> bool {
        let Some(c) = self.peek_at(i) else { return true };
        match c {
            '@' => self.peek_at(i + 1).is_some_and(is_name_start),
            '(' | ',' | '"' => self.nested(),
            ')' => self.parens > 0,
            '[' => self.nested(),
            ']' => self.brackets > 0,
            _ => false,
        }
    }

    fn push(&mut self, kind: TokenKind, text: impl Into<String>) {
        self.header_closed = false;
        self.tokens.push(Token::new(kind, text));
    }

    fn open_paren(&mut self, header: bool) {
        if header {
            self.headers.push(self.parens);
        }
        self.parens += 1;
    }

    fn close_paren(&mut self) {
        self.parens -= 1;
        let closes_header = self.headers.last() == Some(&self.parens);
        if closes_header {
            self.headers.pop();
        }
        self.push(TokenKind::CloseParen, ")");
        self.header_closed = closes_header;
    }

    /// Inside a group, whitespace between a finished piece and following
    /// text is part of the argument.
    fn keeps_gap(&self) -> bool {
        if !self.nested() {
            return false;
        }
        let after_piece = match self.tokens.last() {
            Some(t) => match t.kind {
                TokenKind::CloseParen | TokenKind::Quoted => true,
                TokenKind::Command => !t.opens_group(),
                _ => false,
            },
            None => false,
        };
        if !after_piece {
            return false;
        }
        let mut i = self.pos;
        while self.peek_at(i).is_some_and(char::is_whitespace) {
            i += 1;
        }
        match self.peek_at(i) {
            None | Some(',' | ')' | ']') => false,
            Some(_) => true,
        }
    }

    fn run(mut self) -> Result<Vec<Token>> {
        while self.pos < self.chars.len() {
            let c = self.chars[self.pos];
            if c.is_whitespace() {
                if self.keeps_gap() {
                    self.text();
                } else {
                    self.pos += 1;
                }
                continue;
            }
            if c == '@' && self.peek_at(self.pos + 1).is_some_and(is_name_start) {
                self.command();
                continue;
            }
            let header_open = c == '('
                && !self.nested()
                && matches!(self.last_kind(), Some(TokenKind::Keyword(k)) if k.opens_header());
            match c {
                '(' if self.nested() || header_open => {
                    self.open_paren(header_open);
                    self.pos += 1;
                    self.push(TokenKind::OpenParen, "(");
                }
                ')' if self.parens > 0 => {
                    self.pos += 1;
                    self.close_paren();
                }
                ',' if self.nested() => {
                    self.pos += 1;
                    self.push(TokenKind::Comma, ",");
                }
                '[' if self.nested() || self.tokens.is_empty() => {
                    self.brackets += 1;
                    self.pos += 1;
                    self.push(TokenKind::OpenBracket, "[");
                }
                ']' if self.brackets > 0 => {
                    self.brackets -= 1;
                    self.pos += 1;
                    self.push(TokenKind::CloseBracket, "]");
                }
                '"' if self.nested() => self.quoted()?,
                _ => self.text(),
            }
        }
        Ok(self.tokens)
    }

    fn command(&mut self) {
        let start = self.pos;
        self.pos += 1;
        while self.peek_at(self.pos).is_some_and(is_name_char) {
            self.pos += 1;
        }
        let name: String = self.chars[start + 1..self.pos].iter().collect();
        let kind = match Keyword::from_name(&name) {
            Some(k) => TokenKind::Keyword(k),
            None => TokenKind::Command,
        };
        if self.peek_at(self.pos) == Some('(') {
            self.pos += 1;
            self.open_paren(matches!(kind, TokenKind::Keyword(k) if k.opens_header()));
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        self.push(kind, text);
    }

    fn quoted(&mut self) -> Result<()> {
        let start = self.pos;
        self.pos += 1;
        loop {
            match self.peek_at(self.pos) {
                None => {
                    return Err(Error::MalformedLiteral(format!(
                        "unterminated quote: {}",
                        self.src
                    )))
                }
                Some('\\') => self.pos += 2,
                Some('"') => {
                    self.pos += 1;
                    break;
                }
                Some(_) => self.pos += 1,
            }
        }
        let end = self.pos.min(self.chars.len());
        let text: String = self.chars[start..end].iter().collect();
        self.push(TokenKind::Quoted, text);
        Ok(())
    }

    fn text(&mut self) {
        let start = self.pos;
        self.pos += 1;
        while !self.is_delimiter(self.pos) {
            self.pos += 1;
        }
        let run: String = self.chars[start..self.pos].iter().collect();
        let mut run = if !self.nested() {
            run.trim()
        } else if matches!(self.peek_at(self.pos), Some('@' | '"')) {
            run.as_str()
        } else {
            run.trim_end()
        };

        // A bare keyword may lead a top-level run right after a header's
        // closing `)`, as in `@IF(x)THEN ...`.
        if !self.nested() && self.header_closed {
            let word_len = run
                .find(|c: char| !c.is_ascii_alphabetic())
                .unwrap_or(run.len());
            if let Some(k) = Keyword::from_name(&run[..word_len]).filter(|k| !k.opens_header()) {
                self.push(TokenKind::Keyword(k), &run[..word_len]);
                run = run[word_len..].trim_start();
            }
        }
        if !run.is_empty() {
            self.push(TokenKind::Text, run);
        }
    }
}

/// Split `script` into tokens.
///
/// Fails only on an unterminated quoted literal.
pub fn tokenize(script: &str) -> Result<Vec<Token>> {
    let lexer = Lexer {
        src: script,
        chars: script.chars().collect(),
        pos: 0,
        parens: 0,
        brackets: 0,
        headers: Vec::new(),
        header_closed: false,
        tokens: Vec::new(),
    };
    lexer.run()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
