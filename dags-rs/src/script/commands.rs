//! Leaf commands.
//!
//! Every `@NAME(args)` call outside the control-flow keywords lands here.
//! Arguments are evaluated left to right before dispatch; the returned text
//! is the command's value (empty for commands that only act).

use super::exec::{bool_text, compare, emit, truthy, CmpOp, Engine};
use super::parse::Arg;
use crate::codec;
use crate::error::{Error, Result};
use crate::value::Number;

impl Engine {
    /// Evaluate the arguments of `name` and run it.
    pub(super) fn call(&mut self, name: &str, args: &[Arg], out: &mut String) -> Result<String> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval_arg(arg, out)?);
        }
        tracing::trace!(command = name, args = ?values, "call");
        self.call_command(name, values, out)?
            .ok_or_else(|| Error::UnknownCommand(name.to_owned()))
    }

    /// Dispatch a command with evaluated arguments.
    ///
    /// `Ok(None)` means `name` is not a command.
    fn call_command(
        &mut self,
        name: &str,
        args: Vec<String>,
        out: &mut String,
    ) -> Result<Option<String>> {
        let store = &mut self.store;
        Ok(Some(match name {
            // ── Store ────────────────────────────────────────────────────────
            "GET" => store.get_text(arg(&args, 0, name)?)?,
            "SET" => {
                let key = arg(&args, 0, name)?;
                let value = args.get(1).map(String::as_str).unwrap_or_default();
                if codec::is_null_value(value.trim()) {
                    store.set(key, crate::Value::Null)?;
                } else {
                    store.set_string(key, value)?;
                }
                String::new()
            }
            "GETINT" => store.get_int(arg(&args, 0, name)?)?.to_string(),
            "SETINT" => {
                store.set_int(arg(&args, 0, name)?, int(&args, 1, name)?)?;
                String::new()
            }
            "GETBOOL" => bool_text(store.get_bool(arg(&args, 0, name)?)?),
            "SETBOOL" => {
                store.set_bool(arg(&args, 0, name)?, truthy(arg(&args, 1, name)?))?;
                String::new()
            }
            "REMOVE" => {
                store.remove(arg(&args, 0, name)?)?;
                String::new()
            }
            "EXISTS" => bool_text(store.contains_key(arg(&args, 0, name)?)?),
            "ISNULL" => bool_text(store.get(arg(&args, 0, name)?)?.map_or(true, |v| v.is_null())),
            "ADDTO" | "SUBTO" | "MULTO" | "DIVTO" | "MODTO" => {
                let key = arg(&args, 0, name)?;
                let current = store.get_int(key)?;
                let operand = int(&args, 1, name)?;
                let result = int_math(&name[..3], current, operand)?;
                store.set_int(key, result)?;
                String::new()
            }

            // ── Lists ────────────────────────────────────────────────────────
            "GETLIST" => codec::collapse_list(store.get_list(arg(&args, 0, name)?)?.as_slice()),
            "SETLIST" => {
                let items = codec::expand_list(arg(&args, 1, name)?)?;
                store.set_list(arg(&args, 0, name)?, items.as_slice())?;
                String::new()
            }
            "GETLISTITEM" => {
                store.get_list_item_str(arg(&args, 0, name)?, arg(&args, 1, name)?)?
            }
            "SETLISTITEM" => {
                let index = index(&args, 1, name)?;
                store.set_list_item(arg(&args, 0, name)?, index, arg(&args, 2, name)?)?;
                String::new()
            }
            "ADDLISTITEM" => {
                store.add_list_item(arg(&args, 0, name)?, arg(&args, 1, name)?)?;
                String::new()
            }
            "LISTLENGTH" => store.get_list(arg(&args, 0, name)?)?.len().to_string(),

            // ── Arrays ───────────────────────────────────────────────────────
            "GETARRAY" => {
                codec::collapse_array(store.get_array(arg(&args, 0, name)?)?.as_slice())
            }
            "SETARRAY" => {
                let rows = codec::expand_array(arg(&args, 1, name)?)?;
                store.set_array(arg(&args, 0, name)?, rows.as_slice())?;
                String::new()
            }
            "GETARRAYITEM" => store.get_array_item_str(
                arg(&args, 0, name)?,
                arg(&args, 1, name)?,
                arg(&args, 2, name)?,
            )?,
            "SETARRAYITEM" => {
                let y = index(&args, 1, name)?;
                let x = index(&args, 2, name)?;
                store.set_array_item(arg(&args, 0, name)?, y, x, arg(&args, 3, name)?)?;
                String::new()
            }

            // ── Logic ────────────────────────────────────────────────────────
            "EQ" | "NE" | "GT" | "GE" | "LT" | "LE" => {
                let op = match name {
                    "EQ" => CmpOp::Eq,
                    "NE" => CmpOp::Ne,
                    "GT" => CmpOp::Gt,
                    "GE" => CmpOp::Ge,
                    "LT" => CmpOp::Lt,
                    _ => CmpOp::Le,
                };
                bool_text(compare(arg(&args, 0, name)?, op, arg(&args, 1, name)?))
            }
            "AND" => bool_text(args.iter().all(|a| truthy(a))),
            "OR" => bool_text(args.iter().any(|a| truthy(a))),
            "NOT" => bool_text(!truthy(arg(&args, 0, name)?)),

            // ── Math ─────────────────────────────────────────────────────────
            "ADD" | "SUB" | "MUL" | "DIV" | "MOD" => {
                let a = arg(&args, 0, name)?;
                let b = arg(&args, 1, name)?;
                match (a.trim().parse::<i64>(), b.trim().parse::<i64>()) {
                    (Ok(x), Ok(y)) => int_math(name, x, y)?.to_string(),
                    _ => float_math(name, num(&args, 0, name)?, num(&args, 1, name)?)?,
                }
            }
            "ABS" => {
                let a = arg(&args, 0, name)?;
                match a.trim().parse::<i64>() {
                    Ok(x) => x
                        .checked_abs()
                        .ok_or_else(|| Error::Arithmetic(format!("{name}: overflow")))?
                        .to_string(),
                    Err(_) => Number::Decimal(num(&args, 0, name)?.abs()).to_string(),
                }
            }

            // ── Text ─────────────────────────────────────────────────────────
            "CONCAT" => args.concat(),
            "UPPER" => arg(&args, 0, name)?.to_uppercase(),
            "LOWER" => arg(&args, 0, name)?.to_lowercase(),
            "TRIM" => arg(&args, 0, name)?.trim().to_owned(),
            "LEN" => arg(&args, 0, name)?.chars().count().to_string(),
            "SUBSTRING" => {
                let chars: Vec<char> = arg(&args, 0, name)?.chars().collect();
                let start = index(&args, 1, name)?.min(chars.len());
                let end = match args.get(2) {
                    Some(_) => start.saturating_add(index(&args, 2, name)?).min(chars.len()),
                    None => chars.len(),
                };
                chars[start..end].iter().collect()
            }
            "REPLACE" => {
                let s = arg(&args, 0, name)?;
                let from = arg(&args, 1, name)?;
                let to = args.get(2).map(String::as_str).unwrap_or_default();
                if from.is_empty() {
                    s.to_owned()
                } else {
                    s.replace(from, to)
                }
            }

            // ── Output ───────────────────────────────────────────────────────
            "WRITE" => {
                emit(out, &args.join(","));
                String::new()
            }
            "WRITELINE" => {
                emit(out, &args.join(","));
                out.push('\n');
                String::new()
            }
            "NL" => {
                out.push('\n');
                String::new()
            }
            "MSG" => {
                self.out_channel.push_back(args.join(","));
                String::new()
            }
            "INCHANNEL" => self.in_channel.pop_front().unwrap_or_default(),

            // ── Misc ─────────────────────────────────────────────────────────
            "SCRIPT" => {
                let key = arg(&args, 0, name)?.to_owned();
                self.run_nested(&key, out)?;
                String::new()
            }
            "COMMENT" => String::new(),

            _ => return Ok(None),
        }))
    }
}

// ── Argument accessors ────────────────────────────────────────────────────────

fn arg<'a>(args: &'a [String], idx: usize, name: &str) -> Result<&'a str> {
    args.get(idx)
        .map(String::as_str)
        .ok_or_else(|| Error::MissingArgument {
            command: name.to_owned(),
            index: idx,
        })
}

fn int(args: &[String], idx: usize, name: &str) -> Result<i64> {
    let text = arg(args, idx, name)?;
    text.trim().parse().map_err(|_| Error::NotNumeric {
        key: name.to_owned(),
        value: text.to_owned(),
    })
}

fn num(args: &[String], idx: usize, name: &str) -> Result<f64> {
    let text = arg(args, idx, name)?;
    text.trim().parse().map_err(|_| Error::NotNumeric {
        key: name.to_owned(),
        value: text.to_owned(),
    })
}

fn index(args: &[String], idx: usize, name: &str) -> Result<usize> {
    let text = arg(args, idx, name)?;
    text.trim().parse().map_err(|_| Error::NotNumeric {
        key: name.to_owned(),
        value: text.to_owned(),
    })
}

// ── Arithmetic ────────────────────────────────────────────────────────────────

/// Integer arithmetic; division truncates toward zero.
fn int_math(op: &str, a: i64, b: i64) -> Result<i64> {
    let result = match op {
        "ADD" => a.checked_add(b),
        "SUB" => a.checked_sub(b),
        "MUL" => a.checked_mul(b),
        "DIV" | "MOD" if b == 0 => return Err(Error::Arithmetic(format!("{op}: division by zero"))),
        "DIV" => a.checked_div(b),
        _ => a.checked_rem(b),
    };
    result.ok_or_else(|| Error::Arithmetic(format!("{op}: overflow")))
}

fn float_math(op: &str, a: f64, b: f64) -> Result<String> {
    let result = match op {
        "ADD" => a + b,
        "SUB" => a - b,
        "MUL" => a * b,
        _ if b == 0.0 => return Err(Error::Arithmetic(format!("{op}: division by zero"))),
        "DIV" => a / b,
        _ => a % b,
    };
    Ok(Number::Decimal(result).to_string())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
