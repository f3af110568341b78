//! Block-tree parser.
//!
//! Turns the flat token stream from [`tokenize`] into nested [`Block`]s so
//! the executor never has to scan ahead for a matching `ELSE` or `ENDFOR`.
//!
//! ```text
//! block  := IF cond THEN block* (ELSEIF cond THEN block*)* [ELSE block*] ENDIF
//!         | FOR(var,start,end[,step]) block* ENDFOR
//!         | FOREACHKEY(var,prefix) block* ENDFOREACHKEY
//!         | FOREACHLIST(var,key) block* ENDFOREACHLIST
//!         | expr
//! cond   := '(' arg ')' | piece+            -- up to THEN
//! expr   := text | quoted | @NAME['(' arg (',' arg)* ')'] | '(' arg ')' | list
//! list   := '[' arg (',' arg)* ']'
//! arg    := piece*
//! ```

use super::token::{tokenize, Keyword, Token, TokenKind};
use crate::error::{Error, Result};

/// One comma-separated argument: its pieces are evaluated and concatenated.
pub type Arg = Vec<Expr>;

/// An expression piece.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal text, `$var` references still in place.
    Text(String),
    /// Quoted literal with escapes already removed.
    Quoted(String),
    /// `@NAME` or `@NAME(args)`; `name` is upper case.
    Call { name: String, args: Vec<Arg> },
    /// `( ... )` inside an argument or condition.
    Group(Arg),
    /// `[ ... ]` list or array literal.
    List(Vec<Arg>),
}

/// One `IF`/`ELSEIF` arm.
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub cond: Arg,
    pub body: Vec<Block>,
}

/// A parsed statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    If {
        branches: Vec<Branch>,
        otherwise: Vec<Block>,
    },
    /// Inclusive integer range.
    For {
        var: String,
        start: Arg,
        end: Arg,
        step: Option<Arg>,
        body: Vec<Block>,
    },
    ForEachKey {
        var: String,
        prefix: Arg,
        body: Vec<Block>,
    },
    ForEachList {
        var: String,
        key: Arg,
        body: Vec<Block>,
    },
    Leaf(Expr),
}

/// Deepest allowed nesting of blocks, groups and lists.
pub const MAX_NESTING: usize = 64;

/// Tokenize and parse `script`.
///
/// Nesting deeper than [`MAX_NESTING`] is a limit error, which also bounds
/// the recursion of the executor walking the tree.
pub fn parse_script(script: &str) -> Result<Vec<Block>> {
    let mut parser = Parser {
        tokens: tokenize(script)?,
        pos: 0,
        depth: 0,
    };
    let (blocks, stop) = parser.parse_block_until(&[])?;
    debug_assert!(stop.is_none());
    Ok(blocks)
}

fn syntax(msg: impl Into<String>) -> Error {
    Error::Syntax(msg.into())
}

// ── Parser ────────────────────────────────────────────────────────────────────

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(Error::LimitExceeded(format!(
                "nesting deeper than {MAX_NESTING}"
            )));
        }
        Ok(())
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    /// Parse blocks until one of the `stops` keywords (consumed and returned)
    /// or end of input (`None`).
    fn parse_block_until(&mut self, stops: &[Keyword]) -> Result<(Vec<Block>, Option<Token>)> {
        self.enter()?;
        let mut blocks = Vec::new();
        let mut stop = None;
        while let Some(tok) = self.advance() {
            if tok.keyword().is_some_and(|k| stops.contains(&k)) {
                stop = Some(tok);
                break;
            }
            blocks.push(self.parse_one(tok)?);
        }
        self.depth -= 1;
        Ok((blocks, stop))
    }

    fn parse_one(&mut self, tok: Token) -> Result<Block> {
        match tok.kind {
            TokenKind::Keyword(Keyword::If) => self.parse_if(tok),
            TokenKind::Keyword(k @ (Keyword::For | Keyword::ForEachKey | Keyword::ForEachList)) => {
                self.parse_loop(k, &tok)
            }
            TokenKind::Keyword(k) => Err(syntax(format!("unexpected {}", k.name()))),
            TokenKind::Comma | TokenKind::CloseParen | TokenKind::CloseBracket => {
                Err(syntax(format!("unexpected '{}'", tok.text)))
            }
            _ => Ok(Block::Leaf(self.piece(tok)?)),
        }
    }

    // ── Control flow ──────────────────────────────────────────────────────────

    fn parse_if(&mut self, head: Token) -> Result<Block> {
        let mut branches = Vec::new();
        let mut head = head;
        loop {
            let cond = self.condition(&head)?;
            let (body, stop) =
                self.parse_block_until(&[Keyword::ElseIf, Keyword::Else, Keyword::EndIf])?;
            branches.push(Branch { cond, body });
            let stop = stop.ok_or_else(|| syntax("IF without ENDIF"))?;
            match stop.keyword() {
                Some(Keyword::ElseIf) => head = stop,
                Some(Keyword::Else) => {
                    let (otherwise, end) = self.parse_block_until(&[Keyword::EndIf])?;
                    if end.is_none() {
                        return Err(syntax("ELSE without ENDIF"));
                    }
                    return Ok(Block::If { branches, otherwise });
                }
                _ => {
                    return Ok(Block::If {
                        branches,
                        otherwise: Vec::new(),
                    })
                }
            }
        }
    }

    /// Condition following an `IF`/`ELSEIF` token, through the `THEN`.
    fn condition(&mut self, head: &Token) -> Result<Arg> {
        let name = head.command_name();
        let cond = if head.opens_group() {
            single(self.parse_args()?, &name)?
        } else {
            let mut cond = Vec::new();
            while let Some(tok) = self.peek() {
                if tok.keyword().is_some() {
                    break;
                }
                let tok = self.advance().ok_or_else(|| syntax("unexpected end"))?;
                cond.push(self.piece(tok)?);
            }
            cond
        };
        match self.advance() {
            Some(tok) if tok.keyword() == Some(Keyword::Then) => {}
            _ => return Err(syntax(format!("{name} without THEN"))),
        }
        if cond.is_empty() {
            return Err(syntax(format!("{name} without a condition")));
        }
        Ok(cond)
    }

    fn parse_loop(&mut self, kind: Keyword, head: &Token) -> Result<Block> {
        let name = kind.name();
        let header = if head.opens_group() {
            self.parse_args()?
        } else if self.peek().is_some_and(|t| t.kind == TokenKind::OpenParen) {
            self.advance();
            self.parse_args()?
        } else {
            return Err(syntax(format!("{name} without a header")));
        };
        let end = match kind {
            Keyword::For => Keyword::EndFor,
            Keyword::ForEachKey => Keyword::EndForEachKey,
            _ => Keyword::EndForEachList,
        };
        let (body, stop) = self.parse_block_until(&[end])?;
        if stop.is_none() {
            return Err(syntax(format!("{name} without {}", end.name())));
        }

        let mut header = header.into_iter();
        let var = loop_var(header.next(), name)?;
        let rest: Vec<Arg> = header.collect();
        match (kind, rest.len()) {
            (Keyword::For, 2 | 3) => {
                let mut rest = rest.into_iter();
                let start = rest.next().unwrap_or_default();
                let end = rest.next().unwrap_or_default();
                Ok(Block::For {
                    var,
                    start,
                    end,
                    step: rest.next(),
                    body,
                })
            }
            (Keyword::ForEachKey, 1) => Ok(Block::ForEachKey {
                var,
                prefix: rest.into_iter().next().unwrap_or_default(),
                body,
            }),
            (Keyword::ForEachList, 1) => Ok(Block::ForEachList {
                var,
                key: rest.into_iter().next().unwrap_or_default(),
                body,
            }),
            (Keyword::For, _) => Err(syntax("FOR expects (var,start,end[,step])")),
            _ => Err(syntax(format!("{name} expects (var,key)"))),
        }
    }

    // ── Expressions ───────────────────────────────────────────────────────────

    fn piece(&mut self, tok: Token) -> Result<Expr> {
        match tok.kind {
            TokenKind::Text => Ok(Expr::Text(tok.text)),
            TokenKind::Quoted => Ok(Expr::Quoted(tok.unquoted())),
            TokenKind::Command => {
                let name = tok.command_name();
                let args = if tok.opens_group() {
                    self.parse_args()?
                } else {
                    Vec::new()
                };
                Ok(Expr::Call { name, args })
            }
            TokenKind::OpenParen => Ok(Expr::Group(single(self.parse_args()?, "(")?)),
            TokenKind::OpenBracket => Ok(Expr::List(self.parse_list()?)),
            TokenKind::Keyword(k) => Err(syntax(format!("{} inside an expression", k.name()))),
            TokenKind::Comma | TokenKind::CloseParen | TokenKind::CloseBracket => {
                Err(syntax(format!("unexpected '{}'", tok.text)))
            }
        }
    }

    /// Comma-separated arguments up to and including the closing `)`.
    fn parse_args(&mut self) -> Result<Vec<Arg>> {
        self.parse_seq(TokenKind::CloseParen, "missing ')'")
    }

    fn parse_list(&mut self) -> Result<Vec<Arg>> {
        self.parse_seq(TokenKind::CloseBracket, "missing ']'")
    }

    fn parse_seq(&mut self, close: TokenKind, missing: &str) -> Result<Vec<Arg>> {
        self.enter()?;
        let mut args = Vec::new();
        let mut current = Vec::new();
        loop {
            let tok = self.advance().ok_or_else(|| syntax(missing))?;
            match tok.kind {
                k if k == close => {
                    args.push(current);
                    break;
                }
                TokenKind::Comma => args.push(std::mem::take(&mut current)),
                _ => current.push(self.piece(tok)?),
            }
        }
        self.depth -= 1;
        // `@NL()` and `[]` carry no arguments.
        if matches!(args.as_slice(), [only] if only.is_empty()) {
            args.clear();
        }
        Ok(args)
    }
}

/// Exactly one argument (possibly empty).
fn single(args: Vec<Arg>, what: &str) -> Result<Arg> {
    if args.len() > 1 {
        return Err(syntax(format!("{what}: unexpected ','")));
    }
    Ok(args.into_iter().next().unwrap_or_default())
}

fn loop_var(arg: Option<Arg>, name: &str) -> Result<String> {
    match arg.as_deref() {
        Some([Expr::Text(var)])
            if !var.is_empty()
                && var.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') =>
        {
            Ok(var.clone())
        }
        _ => Err(syntax(format!("{name}: bad loop variable"))),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Expr {
        Expr::Text(s.into())
    }

    fn call(name: &str, args: Vec<Arg>) -> Expr {
        Expr::Call {
            name: name.into(),
            args,
        }
    }

    #[test]
    fn plain_commands_and_text() {
        let blocks = parse_script("@SET(a,1) hello @NL").unwrap();
        assert_eq!(
            blocks,
            vec![
                Block::Leaf(call("SET", vec![vec![text("a")], vec![text("1")]])),
                Block::Leaf(text("hello")),
                Block::Leaf(call("NL", vec![])),
            ]
        );
    }

    #[test]
    fn conditional_with_bare_then() {
        let blocks =
            parse_script("@IF(@GETINT(gold)>(10))THEN You are rich.@ELSE You are poor.@ENDIF")
                .unwrap();
        let Block::If { branches, otherwise } = &blocks[0] else {
            panic!("expected IF, got {blocks:?}");
        };
        assert_eq!(branches.len(), 1);
        assert_eq!(
            branches[0].cond,
            vec![
                call("GETINT", vec![vec![text("gold")]]),
                text(">"),
                Expr::Group(vec![text("10")]),
            ]
        );
        assert_eq!(branches[0].body, vec![Block::Leaf(text("You are rich."))]);
        assert_eq!(otherwise, &vec![Block::Leaf(text("You are poor."))]);
    }

    #[test]
    fn elseif_chain_without_parens() {
        let blocks =
            parse_script("@IF @EQ(a,1) @THEN one @ELSEIF @EQ(a,2) @THEN two @ENDIF").unwrap();
        let Block::If { branches, otherwise } = &blocks[0] else {
            panic!("expected IF");
        };
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[1].body, vec![Block::Leaf(text("two"))]);
        assert!(otherwise.is_empty());
    }

    #[test]
    fn nested_loops() {
        let blocks =
            parse_script("@FOR(i,1,3,2) @FOREACHLIST(x,inv) $x @ENDFOREACHLIST @ENDFOR").unwrap();
        let Block::For { var, step, body, .. } = &blocks[0] else {
            panic!("expected FOR");
        };
        assert_eq!(var, "i");
        assert_eq!(step, &Some(vec![text("2")]));
        assert!(matches!(&body[0], Block::ForEachList { var, .. } if var == "x"));
    }

    #[test]
    fn spaced_loop_header() {
        let blocks = parse_script("@FOREACHKEY (k, room.) $k @ENDFOREACHKEY").unwrap();
        assert!(matches!(&blocks[0], Block::ForEachKey { var, .. } if var == "k"));
    }

    #[test]
    fn quoted_and_list_arguments() {
        let blocks = parse_script("@SETLIST(inv,[sword,\"old, map\"])").unwrap();
        assert_eq!(
            blocks,
            vec![Block::Leaf(call(
                "SETLIST",
                vec![
                    vec![text("inv")],
                    vec![Expr::List(vec![
                        vec![text("sword")],
                        vec![Expr::Quoted("old, map".into())],
                    ])],
                ]
            ))]
        );
    }

    #[test]
    fn empty_argument_lists() {
        assert_eq!(
            parse_script("@NL()").unwrap(),
            vec![Block::Leaf(call("NL", vec![]))]
        );
        assert_eq!(
            parse_script("@SET(x,)").unwrap(),
            vec![Block::Leaf(call("SET", vec![vec![text("x")], vec![]]))]
        );
    }

    #[test]
    fn missing_terminators() {
        for script in [
            "@IF(1) THEN x",
            "@IF(1) THEN x @ELSE y",
            "@FOR(i,1,2) x",
            "@FOREACHLIST(x,k) y",
        ] {
            assert!(
                matches!(parse_script(script), Err(Error::Syntax(_))),
                "{script} should fail"
            );
        }
    }

    #[test]
    fn stray_keywords_fail() {
        assert!(matches!(parse_script("@ENDIF"), Err(Error::Syntax(_))));
        assert!(matches!(parse_script("x @ELSE y"), Err(Error::Syntax(_))));
        assert!(matches!(parse_script("@SET(x,@ENDIF)"), Err(Error::Syntax(_))));
    }

    #[test]
    fn nesting_limit() {
        let deep = format!("@GET({}x{})", "(".repeat(MAX_NESTING), ")".repeat(MAX_NESTING));
        assert!(matches!(parse_script(&deep), Err(Error::LimitExceeded(_))));

        let lists = format!("@SET(a,{}{})", "[".repeat(MAX_NESTING + 1), "]".repeat(MAX_NESTING + 1));
        assert!(matches!(parse_script(&lists), Err(Error::LimitExceeded(_))));

        let ifs = "@IF(1)THEN ".repeat(MAX_NESTING) + &"@ENDIF ".repeat(MAX_NESTING);
        assert!(matches!(parse_script(&ifs), Err(Error::LimitExceeded(_))));

        let shallow = format!("@GET({}x{})", "(".repeat(10), ")".repeat(10));
        assert!(parse_script(&shallow).is_ok());
    }

    #[test]
    fn bad_headers_fail() {
        assert!(matches!(parse_script("@IF(1) x @ENDIF"), Err(Error::Syntax(_))));
        assert!(matches!(parse_script("@FOR(i,1) x @ENDFOR"), Err(Error::Syntax(_))));
        assert!(matches!(parse_script("@FOR x @ENDFOR"), Err(Error::Syntax(_))));
        assert!(matches!(
            parse_script("@FOREACHKEY(@GET(a),b) x @ENDFOREACHKEY"),
            Err(Error::Syntax(_))
        ));
        assert!(matches!(parse_script("@GET(a"), Err(Error::Syntax(_))));
    }
}
