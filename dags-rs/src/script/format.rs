//! Script pretty-printer and compressor.
//!
//! Both work by rescanning the token stream once; neither touches the store.
//! [`pretty_script`] is a fixed point: formatting its output again yields the
//! same text.

use super::token::{tokenize, Keyword, Token, TokenKind};
use crate::error::Result;

fn is_formattable(script: &str) -> bool {
    let trimmed = script.trim_start();
    trimmed.starts_with('@') || trimmed.starts_with('[')
}

/// Line-oriented output buffer with tab indentation.
struct Lines {
    out: String,
}

impl Lines {
    fn at_line_start(&self) -> bool {
        self.out.is_empty() || self.out.ends_with('\n')
    }

    fn newline(&mut self) {
        self.out.push('\n');
    }

    fn indent(&mut self, level: usize) {
        if self.at_line_start() {
            for _ in 0..level {
                self.out.push('\t');
            }
        }
    }

    fn push(&mut self, s: &str) {
        self.out.push_str(s);
    }
}

/// Format `script` one command per line with tab indentation.
///
/// `indent` adds one leading tab to every line.  Scripts that are neither
/// commands nor list/array literals are returned as-is (tab-prefixed when
/// `indent` is set).
pub fn pretty_script(script: &str, indent: bool) -> Result<String> {
    if !is_formattable(script) {
        let mut out = String::new();
        if indent {
            out.push('\t');
        }
        out.push_str(script);
        return Ok(out);
    }

    let start_level = usize::from(indent);
    let mut level = start_level;
    let mut parens = 0usize;
    let mut if_line = false;
    let mut for_line = false;
    let mut for_each_key_line = false;
    let mut for_each_list_line = false;
    let mut in_list = false;
    let mut in_array = false;
    let mut last_comma = false;
    let mut lines = Lines { out: String::new() };

    for tok in tokenize(script)? {
        let s = tok.text.as_str();

        // ── Lists and arrays ──────────────────────────────────────────────
        match tok.kind {
            TokenKind::OpenBracket => {
                if !in_list {
                    in_list = true;
                    if in_array && !last_comma {
                        lines.push(",");
                        lines.newline();
                    }
                } else {
                    in_array = true;
                    lines.newline();
                    level += 1;
                }
                lines.indent(level);
                lines.push(s);
                last_comma = false;
                continue;
            }
            TokenKind::CloseBracket => {
                if in_list {
                    in_list = false;
                } else {
                    in_array = false;
                    if !last_comma {
                        lines.newline();
                    }
                    if level > start_level {
                        level -= 1;
                    }
                    lines.indent(level);
                }
                lines.push(s);
                last_comma = false;
                continue;
            }
            TokenKind::Comma if in_array && !in_list => {
                lines.push(s);
                lines.newline();
                last_comma = true;
                continue;
            }
            _ if in_array || in_list => {
                lines.push(s);
                last_comma = false;
                continue;
            }
            _ => {}
        }

        // ── Everything else ───────────────────────────────────────────────
        let keyword = tok.keyword();
        if matches!(
            keyword,
            Some(
                Keyword::ElseIf
                    | Keyword::Else
                    | Keyword::EndIf
                    | Keyword::EndFor
                    | Keyword::EndForEachKey
                    | Keyword::EndForEachList
            )
        ) && level > start_level
        {
            level -= 1;
        }

        // A header's `(` stays attached to its keyword.
        if parens == 0 && tok.kind != TokenKind::OpenParen {
            if if_line {
                lines.push(" ");
            } else {
                if !lines.out.is_empty() {
                    lines.newline();
                }
                lines.indent(level);
            }
        }
        lines.push(s);

        match keyword {
            Some(Keyword::If | Keyword::ElseIf) => if_line = true,
            Some(Keyword::Else) => level += 1,
            Some(Keyword::Then) => {
                level += 1;
                if_line = false;
            }
            Some(Keyword::For) => for_line = true,
            Some(Keyword::ForEachKey) => for_each_key_line = true,
            Some(Keyword::ForEachList) => for_each_list_line = true,
            _ => {}
        }

        if tok.opens_group() {
            parens += 1;
        } else if tok.kind == TokenKind::CloseParen {
            parens = parens.saturating_sub(1);
            if parens == 0 && (for_line || for_each_key_line || for_each_list_line) {
                for_line = false;
                for_each_key_line = false;
                for_each_list_line = false;
                level += 1;
            }
        }
    }
    Ok(lines.out)
}

fn is_word(tok: &Token) -> bool {
    matches!(tok.kind, TokenKind::Text | TokenKind::Keyword(_)) && !tok.is_sigil()
}

/// `true` for tokens that would run into a following word if written
/// without a separator.
fn needs_gap(tok: &Token) -> bool {
    is_word(tok) || (tok.is_sigil() && !tok.opens_group())
}

/// Format `script` on a single line with minimal spacing.
pub fn compress_script(script: &str) -> Result<String> {
    if !is_formattable(script) {
        return Ok(script.to_owned());
    }
    let mut out = String::new();
    let mut last_char = ',';
    let mut gap = false;
    // Inside groups and brackets whitespace is significant, so nothing is
    // added there.
    let mut depth = 0usize;
    for tok in tokenize(script)? {
        let space = if depth > 0 {
            false
        } else if tok.is_sigil() {
            !matches!(last_char, '(' | ',') && !last_char.is_whitespace()
        } else {
            is_word(&tok) && gap
        };
        if space {
            out.push(' ');
        }
        out.push_str(&tok.text);
        last_char = tok.text.chars().last().unwrap_or(last_char);
        gap = needs_gap(&tok);
        if tok.opens_group() || tok.kind == TokenKind::OpenBracket {
            depth += 1;
        } else if matches!(tok.kind, TokenKind::CloseParen | TokenKind::CloseBracket) {
            depth = depth.saturating_sub(1);
        }
    }
    Ok(out)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const RICH: &str = "@IF(@GETINT(gold)>(10))THEN You are rich.@ELSE You are poor.@ENDIF";

    #[test]
    fn pretty_conditional() {
        assert_eq!(
            pretty_script(RICH, false).unwrap(),
            "@IF(@GETINT(gold)>(10)) THEN\n\tYou are rich.\n@ELSE\n\tYou are poor.\n@ENDIF"
        );
    }

    #[test]
    fn pretty_with_indent() {
        assert_eq!(
            pretty_script("@IF @EQ(a,b) @THEN @SET(x,1) @ENDIF", true).unwrap(),
            "\t@IF @EQ(a,b) @THEN\n\t\t@SET(x,1)\n\t@ENDIF"
        );
    }

    #[test]
    fn pretty_elseif_chain() {
        let script = "@IF @EQ(a,1) @THEN one @ELSEIF @EQ(a,2) @THEN two @ELSE other @ENDIF";
        assert_eq!(
            pretty_script(script, false).unwrap(),
            "@IF @EQ(a,1) @THEN\n\tone\n@ELSEIF @EQ(a,2) @THEN\n\ttwo\n@ELSE\n\tother\n@ENDIF"
        );
    }

    #[test]
    fn pretty_loops_indent_after_header() {
        let script = "@FOR(i,1,3)@FOREACHLIST(x,inv)@WRITE($x)@ENDFOREACHLIST@ENDFOR";
        assert_eq!(
            pretty_script(script, false).unwrap(),
            "@FOR(i,1,3)\n\t@FOREACHLIST(x,inv)\n\t\t@WRITE($x)\n\t@ENDFOREACHLIST\n@ENDFOR"
        );
    }

    #[test]
    fn pretty_foreachkey() {
        assert_eq!(
            pretty_script("@FOREACHKEY(k,room.) @WRITE($k) @ENDFOREACHKEY", false).unwrap(),
            "@FOREACHKEY(k,room.)\n\t@WRITE($k)\n@ENDFOREACHKEY"
        );
    }

    #[test]
    fn pretty_attaches_spaced_header_paren() {
        assert_eq!(
            pretty_script("@FOR (i,1,2) x @ENDFOR", false).unwrap(),
            "@FOR(i,1,2)\n\tx\n@ENDFOR"
        );
        assert_eq!(
            pretty_script("@IF (x > 1) THEN y @ENDIF", false).unwrap(),
            "@IF(x > 1) THEN\n\ty\n@ENDIF"
        );
    }

    #[test]
    fn pretty_list_stays_on_one_line() {
        assert_eq!(
            pretty_script("@SETLIST(inv, [sword, \"old map\"])", false).unwrap(),
            "@SETLIST(inv,[sword,\"old map\"])"
        );
    }

    #[test]
    fn pretty_array_one_row_per_line() {
        assert_eq!(
            pretty_script("[[a,b],[c,d]]", false).unwrap(),
            "[\n\t[a,b],\n\t[c,d]\n]"
        );
        assert_eq!(
            pretty_script("@SETARRAY(g,[[1],[2]])", true).unwrap(),
            "\t@SETARRAY(g,[\n\t\t[1],\n\t\t[2]\n\t])"
        );
    }

    #[test]
    fn pretty_passes_literal_text_through() {
        assert_eq!(pretty_script("Hello, world.", false).unwrap(), "Hello, world.");
        assert_eq!(pretty_script("Hello", true).unwrap(), "\tHello");
    }

    #[test]
    fn pretty_is_fixed_point() {
        for script in [
            RICH,
            "@IF @EQ(a,1) @THEN one @ELSEIF @EQ(a,2) @THEN two @ELSE other @ENDIF",
            "@FOR(i,1,3)@FOREACHLIST(x,inv)@WRITE($x)@ENDFOREACHLIST@ENDFOR",
            "@SETARRAY(g,[[1,\"a b\"],[2]]) done",
            "[[a,b],[c,d]]",
        ] {
            for indent in [false, true] {
                let once = pretty_script(script, indent).unwrap();
                let twice = pretty_script(&once, indent).unwrap();
                assert_eq!(once, twice, "not a fixed point for {script:?}");
            }
        }
    }

    #[test]
    fn compress_inserts_minimal_spaces() {
        assert_eq!(
            compress_script(RICH).unwrap(),
            "@IF(@GETINT(gold)>(10))THEN You are rich. @ELSE You are poor. @ENDIF"
        );
        let pretty = pretty_script("@SET(a,1) @SET(b,@GET(a)) @NL", false).unwrap();
        assert_eq!(compress_script(&pretty).unwrap(), "@SET(a,1) @SET(b,@GET(a)) @NL");
    }

    #[test]
    fn compress_keeps_literal_text() {
        assert_eq!(compress_script("  just text ").unwrap(), "  just text ");
    }

    #[test]
    fn compress_list_literal() {
        assert_eq!(compress_script("[ a , \"b c\" ]").unwrap(), "[a,\"b c\"]");
        assert_eq!(
            compress_script(&pretty_script("[[1,2],[3]]", false).unwrap()).unwrap(),
            "[[1,2],[3]]"
        );
    }

    #[test]
    fn compress_separates_bare_command_from_text() {
        assert_eq!(compress_script("@NL\nHello").unwrap(), "@NL Hello");
    }

    #[test]
    fn compress_keeps_argument_spacing() {
        let script = "@SET(greeting, Hi @GET(name) there) @SET(k,room.@GET(loc))";
        let once = compress_script(script).unwrap();
        assert_eq!(once, "@SET(greeting,Hi @GET(name) there) @SET(k,room.@GET(loc))");
        assert_eq!(tokenize(&once).unwrap(), tokenize(script).unwrap());
    }

    #[test]
    fn pretty_keeps_argument_spacing() {
        assert_eq!(
            pretty_script("@WRITE(You have @GET(gold) coins)", false).unwrap(),
            "@WRITE(You have @GET(gold) coins)"
        );
    }

    #[test]
    fn pretty_keyword_word_after_command_stays_text() {
        assert_eq!(
            pretty_script("@SET(a,1) Then x", false).unwrap(),
            "@SET(a,1)\nThen x"
        );
    }

    #[test]
    fn compress_then_tokenize_is_stable() {
        let once = compress_script(RICH).unwrap();
        assert_eq!(tokenize(&once).unwrap(), tokenize(RICH).unwrap());
    }
}
