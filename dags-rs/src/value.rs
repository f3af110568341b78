//! Typed values held by the store.
//!
//! Every store entry is one [`Value`].  Scripts only ever see text, so each
//! variant has a canonical text rendering (its `Display`); lists render as
//! list literals through [`codec::collapse_list`].
//!
//! [`codec::collapse_list`]: crate::codec::collapse_list

use std::collections::HashMap;
use std::fmt;

use crate::codec;

/// Numeric payload of [`Value::Number`], tagged with its width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i32),
    Long(i64),
    Float(f32),
    Decimal(f64),
}

impl Number {
    /// Smallest integer subtype that holds `n`.
    pub fn from_i64(n: i64) -> Self {
        match i32::try_from(n) {
            Ok(small) => Number::Int(small),
            Err(_) => Number::Long(n),
        }
    }

    /// The value as an integer, if the subtype is an integer one.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Number::Int(n) => Some(n as i64),
            Number::Long(n) => Some(n),
            Number::Float(_) | Number::Decimal(_) => None,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            Number::Int(n) => n as f64,
            Number::Long(n) => n as f64,
            Number::Float(x) => x as f64,
            Number::Decimal(x) => x,
        }
    }

    pub fn subtype_name(&self) -> &'static str {
        match self {
            Number::Int(_) => "Int",
            Number::Long(_) => "Long",
            Number::Float(_) => "Float",
            Number::Decimal(_) => "Decimal",
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(n) => write!(f, "{n}"),
            Number::Long(n) => write!(f, "{n}"),
            Number::Float(x) => write!(f, "{x}"),
            Number::Decimal(x) => write!(f, "{x}"),
        }
    }
}

/// A store value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Str(String),
    Number(Number),
    List(Vec<Value>),
    Object(HashMap<String, Value>),
}

impl Value {
    /// Name of the variant, used in type-mismatch errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Str(_) => "string",
            Value::Number(_) => "number",
            Value::List(_) => "list",
            Value::Object(_) => "object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// `true` for the variants that render as a single text item.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Value::Null | Value::Bool(_) | Value::Str(_) | Value::Number(_)
        )
    }

    /// Debug rendering that spells out the type tags, e.g.
    /// `{Type: Number, NumberType: Int, Value: 5}`.
    pub fn describe(&self) -> String {
        let mut out = String::from("{");
        match self {
            Value::Null => out.push_str("Type: Null, Value: null"),
            Value::Bool(b) => out.push_str(&format!("Type: Bool, Value: {b}")),
            Value::Str(s) => out.push_str(&format!("Type: String, Value: \"{s}\"")),
            Value::Number(n) => out.push_str(&format!(
                "Type: Number, NumberType: {}, Value: {n}",
                n.subtype_name()
            )),
            Value::List(items) => {
                out.push_str("Type: List, Value: [");
                let parts: Vec<String> = items.iter().map(Value::describe).collect();
                out.push_str(&parts.join(","));
                out.push(']');
            }
            Value::Object(map) => {
                out.push_str("Type: Obj, Value: {");
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                let parts: Vec<String> = keys
                    .into_iter()
                    .map(|k| format!("\"{k}\":{}", map[k].describe()))
                    .collect();
                out.push_str(&parts.join(","));
                out.push('}');
            }
        }
        out.push('}');
        out
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::List(items) => {
                if items.iter().all(|v| matches!(v, Value::List(_))) && !items.is_empty() {
                    let rows: Vec<Vec<String>> = items
                        .iter()
                        .map(|row| match row {
                            Value::List(cells) => cells.iter().map(Value::to_string).collect(),
                            _ => Vec::new(),
                        })
                        .collect();
                    write!(f, "{}", codec::collapse_array(rows.as_slice()))
                } else {
                    let flat: Vec<String> = items.iter().map(Value::to_string).collect();
                    write!(f, "{}", codec::collapse_list(flat.as_slice()))
                }
            }
            Value::Object(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                write!(f, "{{")?;
                for (i, k) in keys.into_iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "\"{k}\":{}", map[k])?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(Number::Int(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(Number::from_i64(n))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Number(Number::Decimal(x))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_scalars() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::from(42).to_string(), "42");
        assert_eq!(Value::from("hello").to_string(), "hello");
        assert_eq!(Value::Number(Number::Decimal(2.5)).to_string(), "2.5");
    }

    #[test]
    fn display_list_uses_literal_grammar() {
        let v = Value::List(vec!["a".into(), "b c".into(), Value::Null]);
        assert_eq!(v.to_string(), "[a,\"b c\",]");
    }

    #[test]
    fn display_nested_list_as_array() {
        let v = Value::List(vec![
            Value::List(vec!["1".into(), "2".into()]),
            Value::List(vec!["3".into()]),
        ]);
        assert_eq!(v.to_string(), "[[1,2],[3]]");
    }

    #[test]
    fn from_i64_picks_width() {
        assert_eq!(Value::from(7i64), Value::Number(Number::Int(7)));
        assert_eq!(
            Value::from(5_000_000_000i64),
            Value::Number(Number::Long(5_000_000_000))
        );
    }

    #[test]
    fn integer_subtypes() {
        assert_eq!(Number::Long(9).as_i64(), Some(9));
        assert_eq!(Number::Float(1.0).as_i64(), None);
    }

    #[test]
    fn describe_number() {
        assert_eq!(
            Value::from(5).describe(),
            "{Type: Number, NumberType: Int, Value: 5}"
        );
        assert_eq!(
            Value::List(vec![Value::Bool(false)]).describe(),
            "{Type: List, Value: [{Type: Bool, Value: false}]}"
        );
    }

    #[test]
    fn type_names() {
        assert_eq!(Value::Null.type_name(), "null");
        assert_eq!(Value::Object(HashMap::new()).type_name(), "object");
        assert!(Value::from(1).is_scalar());
        assert!(!Value::List(vec![]).is_scalar());
    }
}
