//! Script executor.
//!
//! The [`Engine`] owns the [`Store`] and the two host channels, and runs
//! parsed [`Block`] trees against them.  Scripts never fail outward:
//! [`Engine::run_script`] turns an error into a diagnostic at the end of the
//! output buffer.

use std::cmp::Ordering;
use std::collections::VecDeque;

use super::parse::{parse_script, Arg, Block, Expr};
use crate::codec::{self, is_null_value};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::key::normalize_prefix;
use crate::store::Store;

/// Script engine: store, host channels and execution limits.
#[derive(Debug, Default)]
pub struct Engine {
    pub store: Store,
    /// Lines queued by the host, consumed by `@INCHANNEL`.
    pub in_channel: VecDeque<String>,
    /// Messages written by `@MSG`, drained by the host.
    pub out_channel: VecDeque<String>,
    config: EngineConfig,
    /// Loop variable bindings, innermost last.
    scopes: Vec<(String, String)>,
    depth: usize,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let mut store = Store::new();
        store.set_use_overlay(config.use_overlay);
        Self::with_store(store, config)
    }

    /// Wrap an existing store; its overlay flag is left as it is.
    pub fn with_store(store: Store, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run `script`, appending its output to `out`.
    ///
    /// A blank or `null` script does nothing; a script that does not start
    /// with `@` is literal text and is appended unchanged.  If the script
    /// fails, the output produced so far is kept and the error message and
    /// the script text are appended, each on its own line.
    pub fn run_script(&mut self, script: &str, out: &mut String) {
        self.scopes.clear();
        self.depth = 0;
        if let Err(e) = self.try_run_script(script, out) {
            tracing::warn!(error = %e, "script aborted");
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&e.to_string());
            out.push('\n');
            out.push_str(script);
            out.push('\n');
        }
    }

    /// Like [`Engine::run_script`] but returns the first error instead of
    /// writing a diagnostic.
    pub fn try_run_script(&mut self, script: &str, out: &mut String) -> Result<()> {
        let trimmed = script.trim();
        if trimmed.is_empty() || is_null_value(trimmed) {
            return Ok(());
        }
        if !script.trim_start().starts_with('@') {
            out.push_str(script);
            return Ok(());
        }
        tracing::debug!(depth = self.depth, len = script.len(), "running script");
        let blocks = parse_script(script)?;
        self.exec_block(&blocks, out)
    }

    /// Run the script stored at `key` from inside another script.
    pub(super) fn run_nested(&mut self, key: &str, out: &mut String) -> Result<()> {
        if self.depth >= self.config.max_script_depth {
            return Err(Error::LimitExceeded(format!(
                "script nesting deeper than {}",
                self.config.max_script_depth
            )));
        }
        let script = self.store.get_text(key)?;
        if is_null_value(script.trim()) {
            return Ok(());
        }
        if !script.trim_start().starts_with('@') {
            emit(out, script.trim());
            return Ok(());
        }
        self.depth += 1;
        let result = self.try_run_script(&script, out);
        self.depth -= 1;
        result
    }

    // ── Blocks ────────────────────────────────────────────────────────────────

    fn exec_block(&mut self, blocks: &[Block], out: &mut String) -> Result<()> {
        for block in blocks {
            self.exec_one(block, out)?;
        }
        Ok(())
    }

    fn exec_one(&mut self, block: &Block, out: &mut String) -> Result<()> {
        match block {
            Block::Leaf(expr) => {
                let text = self.eval_expr(expr, out)?;
                emit(out, &text);
                Ok(())
            }
            Block::If { branches, otherwise } => {
                for branch in branches {
                    let cond = self.eval_condition(&branch.cond, out)?;
                    if truthy(&cond) {
                        return self.exec_block(&branch.body, out);
                    }
                }
                self.exec_block(otherwise, out)
            }
            Block::For {
                var,
                start,
                end,
                step,
                body,
            } => {
                let start = self.eval_int("FOR", start, out)?;
                let end = self.eval_int("FOR", end, out)?;
                let step = match step {
                    Some(step) => self.eval_int("FOR", step, out)?,
                    None => 1,
                };
                if step == 0 {
                    return Err(Error::Arithmetic("FOR: step cannot be zero".into()));
                }
                let mut values = Vec::new();
                let mut i = start;
                while (step > 0 && i <= end) || (step < 0 && i >= end) {
                    values.push(i.to_string());
                    i = match i.checked_add(step) {
                        Some(next) => next,
                        None => break,
                    };
                    if values.len() > self.config.max_loop_iterations {
                        break;
                    }
                }
                self.run_loop("FOR", var, values, body, out)
            }
            Block::ForEachKey { var, prefix, body } => {
                let prefix = normalize_prefix(&self.eval_arg(prefix, out)?);
                let keys: Vec<String> = self
                    .store
                    .visible_keys()
                    .into_iter()
                    .filter_map(|k| k.strip_prefix(prefix.as_str()).map(str::to_owned))
                    .collect();
                self.run_loop("FOREACHKEY", var, keys, body, out)
            }
            Block::ForEachList { var, key, body } => {
                let key = self.eval_arg(key, out)?;
                let items = self.store.get_list(&key)?;
                self.run_loop("FOREACHLIST", var, items, body, out)
            }
        }
    }

    /// Run `body` once per value with `$var` bound to it.  The values are
    /// collected before the first iteration, so the body may change the
    /// store freely.
    fn run_loop(
        &mut self,
        name: &str,
        var: &str,
        values: Vec<String>,
        body: &[Block],
        out: &mut String,
    ) -> Result<()> {
        if values.len() > self.config.max_loop_iterations {
            return Err(Error::LimitExceeded(format!(
                "{name} over {} iterations",
                self.config.max_loop_iterations
            )));
        }
        tracing::trace!(loop_name = name, var, iterations = values.len(), "loop");
        for value in values {
            self.scopes.push((var.to_owned(), value));
            let result = self.exec_block(body, out);
            self.scopes.pop();
            result?;
        }
        Ok(())
    }

    // ── Expressions ───────────────────────────────────────────────────────────

    pub(super) fn eval_expr(&mut self, expr: &Expr, out: &mut String) -> Result<String> {
        match expr {
            Expr::Text(text) | Expr::Quoted(text) => Ok(self.substitute(text)),
            Expr::Call { name, args } => self.call(name, args, out),
            Expr::Group(arg) => self.eval_arg(arg, out),
            Expr::List(items) => self.eval_list(items, out),
        }
    }

    /// Evaluate the pieces of one argument and concatenate them as written.
    pub(super) fn eval_arg(&mut self, arg: &Arg, out: &mut String) -> Result<String> {
        let mut text = String::new();
        for expr in arg {
            text.push_str(&self.eval_expr(expr, out)?);
        }
        Ok(text)
    }

    fn eval_int(&mut self, name: &str, arg: &Arg, out: &mut String) -> Result<i64> {
        let text = self.eval_arg(arg, out)?;
        text.trim().parse().map_err(|_| Error::NotNumeric {
            key: name.to_owned(),
            value: text,
        })
    }

    /// A list literal evaluates to its canonical text; a list whose items
    /// are all lists is an array.
    fn eval_list(&mut self, items: &[Arg], out: &mut String) -> Result<String> {
        let is_array = !items.is_empty()
            && items
                .iter()
                .all(|item| matches!(item.as_slice(), [Expr::List(_)]));
        if is_array {
            let mut rows = Vec::with_capacity(items.len());
            for item in items {
                if let [Expr::List(cells)] = item.as_slice() {
                    let row = cells
                        .iter()
                        .map(|cell| self.eval_arg(cell, out))
                        .collect::<Result<Vec<_>>>()?;
                    rows.push(row);
                }
            }
            return Ok(codec::collapse_array(rows.as_slice()));
        }
        let values = items
            .iter()
            .map(|item| self.eval_arg(item, out))
            .collect::<Result<Vec<_>>>()?;
        Ok(codec::collapse_list(values.as_slice()))
    }

    /// Replace `$name` with the innermost loop binding of `name`.  Unbound
    /// references are left as written.
    fn substitute(&self, text: &str) -> String {
        if self.scopes.is_empty() || !text.contains('$') {
            return text.to_owned();
        }
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(at) = rest.find('$') {
            out.push_str(&rest[..at]);
            let after = &rest[at + 1..];
            let len = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            let name = &after[..len];
            match self.scopes.iter().rev().find(|(var, _)| var == name) {
                Some((_, value)) if !name.is_empty() => out.push_str(value),
                _ => {
                    out.push('$');
                    out.push_str(name);
                }
            }
            rest = &after[len..];
        }
        out.push_str(rest);
        out
    }

    // ── Conditions ────────────────────────────────────────────────────────────

    /// Evaluate an `IF` condition to text; see [`truthy`].
    fn eval_condition(&mut self, cond: &Arg, out: &mut String) -> Result<String> {
        let mut items = Vec::new();
        for expr in cond {
            match expr {
                Expr::Text(text) => lex_condition(&self.substitute(text), &mut items),
                Expr::Group(inner) => {
                    let value = self.eval_condition(inner, out)?;
                    push_operand(&mut items, value);
                }
                other => {
                    let value = self.eval_expr(other, out)?;
                    push_operand(&mut items, value);
                }
            }
        }
        let mut parser = CondParser { items: &items, pos: 0 };
        let value = parser.or()?;
        match items.get(parser.pos) {
            None => Ok(value),
            Some(item) => Err(Error::Syntax(format!("condition: unexpected {item:?}"))),
        }
    }
}

// ── Output joining ────────────────────────────────────────────────────────────

/// Append `piece` to `out`, separated by one space unless either side
/// already provides the break.
pub(super) fn emit(out: &mut String, piece: &str) {
    if piece.is_empty() {
        return;
    }
    let joins_tight = out.is_empty()
        || out.ends_with(|c: char| c.is_whitespace() || c == '(')
        || piece.starts_with(|c: char| c.is_whitespace() || ".,;:!?)".contains(c));
    if !joins_tight {
        out.push(' ');
    }
    out.push_str(piece);
}

/// `""`, `0`, `false` and `null` are false; everything else is true.
pub fn truthy(text: &str) -> bool {
    let t = text.trim();
    !(t.is_empty()
        || t.eq_ignore_ascii_case("false")
        || is_null_value(t)
        || t.parse::<f64>().is_ok_and(|n| n == 0.0))
}

pub(super) fn bool_text(b: bool) -> String {
    let text = if b { "true" } else { "false" };
    text.to_owned()
}

// ── Comparison ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    fn from_symbol(s: &str) -> Option<Self> {
        Some(match s {
            "=" | "==" => CmpOp::Eq,
            "!=" | "<>" => CmpOp::Ne,
            "<" => CmpOp::Lt,
            "<=" => CmpOp::Le,
            ">" => CmpOp::Gt,
            ">=" => CmpOp::Ge,
            _ => return None,
        })
    }
}

/// Compare numerically when both sides are numbers, otherwise as
/// case-insensitive text.
pub(super) fn compare(a: &str, op: CmpOp, b: &str) -> bool {
    let (a, b) = (a.trim(), b.trim());
    let ord = match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => match x.partial_cmp(&y) {
            Some(ord) => ord,
            None => return op == CmpOp::Ne,
        },
        _ => a.to_lowercase().cmp(&b.to_lowercase()),
    };
    match op {
        CmpOp::Eq => ord == Ordering::Equal,
        CmpOp::Ne => ord != Ordering::Equal,
        CmpOp::Lt => ord == Ordering::Less,
        CmpOp::Le => ord != Ordering::Greater,
        CmpOp::Gt => ord == Ordering::Greater,
        CmpOp::Ge => ord != Ordering::Less,
    }
}

#[derive(Debug, Clone, PartialEq)]
enum CondItem {
    Operand(String),
    Op(CmpOp),
    And,
    Or,
    Not,
}

fn push_operand(items: &mut Vec<CondItem>, value: String) {
    match items.last_mut() {
        Some(CondItem::Operand(prev)) => prev.push_str(&value),
        _ => items.push(CondItem::Operand(value)),
    }
}

/// Split condition text into operands, comparison operators and the words
/// `and`, `or`, `not`.  Adjacent plain words form one operand.
fn lex_condition(text: &str, items: &mut Vec<CondItem>) {
    let mut word = String::new();
    let mut phrase: Option<String> = None;

    fn flush_word(word: &mut String, phrase: &mut Option<String>, items: &mut Vec<CondItem>) {
        if word.is_empty() {
            return;
        }
        let w = std::mem::take(word);
        let logical = match w.to_ascii_lowercase().as_str() {
            "and" => Some(CondItem::And),
            "or" => Some(CondItem::Or),
            "not" => Some(CondItem::Not),
            _ => None,
        };
        match logical {
            Some(item) => {
                flush_phrase(phrase, items);
                items.push(item);
            }
            None => {
                if let Some(p) = phrase.as_mut() {
                    p.push(' ');
                    p.push_str(&w);
                } else {
                    *phrase = Some(w);
                }
            }
        }
    }

    fn flush_phrase(phrase: &mut Option<String>, items: &mut Vec<CondItem>) {
        if let Some(p) = phrase.take() {
            push_operand(items, p);
        }
    }

    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            flush_word(&mut word, &mut phrase, items);
        } else if matches!(c, '=' | '!' | '<' | '>') {
            flush_word(&mut word, &mut phrase, items);
            flush_phrase(&mut phrase, items);
            let two: String = chars[i..(i + 2).min(chars.len())].iter().collect();
            if let Some(op) = CmpOp::from_symbol(&two) {
                items.push(CondItem::Op(op));
                i += 2;
                continue;
            }
            match CmpOp::from_symbol(&c.to_string()) {
                Some(op) => items.push(CondItem::Op(op)),
                None => items.push(CondItem::Not),
            }
        } else {
            word.push(c);
        }
        i += 1;
    }
    flush_word(&mut word, &mut phrase, items);
    flush_phrase(&mut phrase, items);
}

/// `or` binds loosest, then `and`, then `not`, then comparisons.
struct CondParser<'a> {
    items: &'a [CondItem],
    pos: usize,
}

impl CondParser<'_> {
    fn eat(&mut self, item: &CondItem) -> bool {
        if self.items.get(self.pos) == Some(item) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn or(&mut self) -> Result<String> {
        let mut value = self.and()?;
        while self.eat(&CondItem::Or) {
            let rhs = self.and()?;
            value = bool_text(truthy(&value) || truthy(&rhs));
        }
        Ok(value)
    }

    fn and(&mut self) -> Result<String> {
        let mut value = self.not()?;
        while self.eat(&CondItem::And) {
            let rhs = self.not()?;
            value = bool_text(truthy(&value) && truthy(&rhs));
        }
        Ok(value)
    }

    fn not(&mut self) -> Result<String> {
        if self.eat(&CondItem::Not) {
            let value = self.not()?;
            return Ok(bool_text(!truthy(&value)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<String> {
        let lhs = self.operand()?;
        if let Some(CondItem::Op(op)) = self.items.get(self.pos) {
            let op = *op;
            self.pos += 1;
            let rhs = self.operand()?;
            return Ok(bool_text(compare(&lhs, op, &rhs)));
        }
        Ok(lhs)
    }

    fn operand(&mut self) -> Result<String> {
        match self.items.get(self.pos) {
            Some(CondItem::Operand(value)) => {
                self.pos += 1;
                Ok(value.clone())
            }
            // `= x` compares against the empty string.
            Some(CondItem::Op(_)) => Ok(String::new()),
            other => Err(Error::Syntax(format!(
                "condition: expected a value, found {other:?}"
            ))),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
