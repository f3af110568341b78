//! List, array and scan accessors on top of [`Store`].
//!
//! A list is stored as one [`Value::List`] of scalars and an array as a
//! [`Value::List`] of lists.  A [`Value::Str`] holding a list or array literal
//! is also accepted on read, so values written by scripts as text work too.

use std::collections::BTreeMap;

use regex::Regex;

use crate::codec::{self, NULL_VALUE};
use crate::error::{Error, Result};
use crate::key::{normalize_pattern, normalize_prefix};
use crate::store::Store;
use crate::value::Value;

fn item_value(item: &str) -> Value {
    if item == NULL_VALUE {
        Value::Null
    } else {
        Value::Str(item.to_owned())
    }
}

fn item_text(key: &str, v: &Value) -> Result<String> {
    if v.is_scalar() {
        Ok(v.to_string())
    } else {
        Err(Error::mismatch(key, "scalar", v.type_name()))
    }
}

fn parse_index(key: &str, index: &str) -> Result<usize> {
    index
        .trim()
        .parse()
        .map_err(|_| Error::MalformedLiteral(format!("bad index for {key}: {index}")))
}

impl Store {
    // ── Lists ─────────────────────────────────────────────────────────────────

    /// The list stored at `key`, or an empty list when absent.
    pub fn get_list(&self, key: &str) -> Result<Vec<String>> {
        match self.get(key)? {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::List(items)) => items.iter().map(|v| item_text(key, v)).collect(),
            Some(Value::Str(s)) if s.trim_start().starts_with('[') => codec::expand_list(s),
            Some(other) => Err(Error::mismatch(key, "list", other.type_name())),
        }
    }

    /// Replace the list at `key`.
    pub fn set_list<S: AsRef<str>>(&mut self, key: &str, items: &[S]) -> Result<()> {
        let list = items.iter().map(|s| item_value(s.as_ref())).collect();
        self.set(key, Value::List(list))
    }

    /// Element `index` of the list at `key`; `""` when out of range or null.
    pub fn get_list_item(&self, key: &str, index: usize) -> Result<String> {
        match self.get(key)? {
            Some(Value::List(items)) => match items.get(index) {
                None => Ok(String::new()),
                Some(v) => item_text(key, v),
            },
            _ => Ok(self.get_list(key)?.get(index).cloned().unwrap_or_default()),
        }
    }

    /// [`Store::get_list_item`] with the index given as text.
    pub fn get_list_item_str(&self, key: &str, index: &str) -> Result<String> {
        self.get_list_item(key, parse_index(key, index)?)
    }

    /// Overwrite element `index`, padding with `""` so the list never shrinks.
    pub fn set_list_item(&mut self, key: &str, index: usize, value: &str) -> Result<()> {
        let mut items = self.owned_list(key)?;
        if items.len() <= index {
            items.resize(index + 1, Value::Str(String::new()));
        }
        items[index] = item_value(value);
        self.set(key, Value::List(items))
    }

    /// Append `value` to the list at `key`.
    pub fn add_list_item(&mut self, key: &str, value: &str) -> Result<()> {
        let mut items = self.owned_list(key)?;
        items.push(item_value(value));
        self.set(key, Value::List(items))
    }

    fn owned_list(&self, key: &str) -> Result<Vec<Value>> {
        match self.get(key)? {
            Some(Value::List(items)) => Ok(items.clone()),
            _ => Ok(self.get_list(key)?.iter().map(|s| item_value(s)).collect()),
        }
    }

    // ── Arrays ────────────────────────────────────────────────────────────────

    /// The array stored at `key`, or an empty array when absent.
    pub fn get_array(&self, key: &str) -> Result<Vec<Vec<String>>> {
        match self.get(key)? {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::List(rows)) => rows
                .iter()
                .map(|row| match row {
                    Value::List(cells) => cells.iter().map(|v| item_text(key, v)).collect(),
                    Value::Null => Ok(Vec::new()),
                    other => Err(Error::mismatch(key, "array row", other.type_name())),
                })
                .collect(),
            Some(Value::Str(s)) if s.trim_start().starts_with('[') => codec::expand_array(s),
            Some(other) => Err(Error::mismatch(key, "array", other.type_name())),
        }
    }

    /// Replace the array at `key`.
    pub fn set_array<S: AsRef<str>>(&mut self, key: &str, rows: &[Vec<S>]) -> Result<()> {
        let rows = rows
            .iter()
            .map(|row| Value::List(row.iter().map(|s| item_value(s.as_ref())).collect()))
            .collect();
        self.set(key, Value::List(rows))
    }

    /// Cell `(y, x)`; `""` when either index is out of range or the cell is null.
    pub fn get_array_item(&self, key: &str, y: usize, x: usize) -> Result<String> {
        Ok(self
            .get_array(key)?
            .get(y)
            .and_then(|row| row.get(x))
            .cloned()
            .unwrap_or_default())
    }

    /// [`Store::get_array_item`] with both indexes given as text.
    pub fn get_array_item_str(&self, key: &str, y: &str, x: &str) -> Result<String> {
        self.get_array_item(key, parse_index(key, y)?, parse_index(key, x)?)
    }

    /// Overwrite cell `(y, x)`, growing rows and the target row as needed.
    pub fn set_array_item(&mut self, key: &str, y: usize, x: usize, value: &str) -> Result<()> {
        let mut rows = self.get_array(key)?;
        if rows.len() <= y {
            rows.resize_with(y + 1, Vec::new);
        }
        let row = &mut rows[y];
        if row.len() <= x {
            row.resize(x + 1, String::new());
        }
        row[x] = value.to_owned();
        self.set_array(key, rows.as_slice())
    }

    // ── Scans ─────────────────────────────────────────────────────────────────

    /// Every visible entry whose key starts with `prefix` (case-insensitive),
    /// rendered as text.
    pub fn get_by_prefix(&self, prefix: &str) -> Result<BTreeMap<String, String>> {
        let prefix = normalize_prefix(prefix);
        let mut out = BTreeMap::new();
        for key in self.visible_keys() {
            if key.starts_with(&prefix) {
                let text = self.get_text(&key)?;
                out.insert(key, text);
            }
        }
        Ok(out)
    }

    /// Every visible entry whose key matches `pattern`, where `*` matches any
    /// run of characters, `?` one character and `#` one digit.
    pub fn get_by_pattern(&self, pattern: &str) -> Result<BTreeMap<String, String>> {
        let re = pattern_regex(&normalize_pattern(pattern)?)?;
        let mut out = BTreeMap::new();
        for key in self.visible_keys() {
            if re.is_match(&key) {
                let text = self.get_text(&key)?;
                out.insert(key, text);
            }
        }
        Ok(out)
    }
}

/// Compile a wildcard key pattern into an anchored regex.
fn pattern_regex(pattern: &str) -> Result<Regex> {
    let mut src = String::from("^");
    for c in pattern.chars() {
        match c {
            '*' => src.push_str(".*"),
            '?' => src.push('.'),
            '#' => src.push_str("[0-9]"),
            c => src.push_str(&regex::escape(&c.to_string())),
        }
    }
    src.push('$');
    Regex::new(&src).map_err(|e| Error::MalformedLiteral(format!("{pattern}: {e}")))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_list_is_empty() {
        let store = Store::new();
        assert!(store.get_list("nothing").unwrap().is_empty());
        assert_eq!(store.get_list_item("nothing", 3).unwrap(), "");
    }

    #[test]
    fn list_round_trip() {
        let mut store = Store::new();
        store.set_list("inv", &["sword", "old map", "null"]).unwrap();
        assert_eq!(store.get_list("inv").unwrap(), vec!["sword", "old map", ""]);
        assert_eq!(store.get_list_item("inv", 1).unwrap(), "old map");
        assert_eq!(store.get_list_item("inv", 2).unwrap(), "");
        assert_eq!(store.get_list_item("inv", 9).unwrap(), "");
    }

    #[test]
    fn list_item_growth() {
        let mut store = Store::new();
        store.set_list_item("k", 5, "x").unwrap();
        let list = store.get_list("k").unwrap();
        assert_eq!(list.len(), 6);
        assert!(list[..5].iter().all(String::is_empty));
        assert_eq!(list[5], "x");
        store.set_list_item("k", 1, "y").unwrap();
        assert_eq!(store.get_list("k").unwrap().len(), 6);
    }

    #[test]
    fn add_list_item_appends() {
        let mut store = Store::new();
        store.add_list_item("q", "a").unwrap();
        store.add_list_item("q", "b").unwrap();
        assert_eq!(store.get_list("q").unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn list_from_string_literal() {
        let mut store = Store::new();
        store.set("k", "[a,\"b c\"]").unwrap();
        assert_eq!(store.get_list("k").unwrap(), vec!["a", "b c"]);
        store.set_list_item("k", 0, "z").unwrap();
        assert_eq!(store.get("k").unwrap().unwrap().to_string(), "[z,\"b c\"]");
    }

    #[test]
    fn list_type_errors() {
        let mut store = Store::new();
        store.set("n", 5).unwrap();
        store.set("nested", Value::List(vec![Value::List(vec![])])).unwrap();
        assert!(matches!(store.get_list("n"), Err(Error::TypeMismatch { .. })));
        assert!(matches!(store.get_list_item("nested", 0), Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn string_index_must_parse() {
        let mut store = Store::new();
        store.set_list("k", &["a", "b"]).unwrap();
        assert_eq!(store.get_list_item_str("k", " 1 ").unwrap(), "b");
        assert!(matches!(
            store.get_list_item_str("k", "one"),
            Err(Error::MalformedLiteral(_))
        ));
    }

    #[test]
    fn array_access() {
        let mut store = Store::new();
        store.set_array_item("grid", 1, 2, "x").unwrap();
        assert_eq!(
            store.get_array("grid").unwrap(),
            vec![vec![], vec!["".to_owned(), "".to_owned(), "x".to_owned()]]
        );
        assert_eq!(store.get_array_item("grid", 1, 2).unwrap(), "x");
        assert_eq!(store.get_array_item("grid", 0, 0).unwrap(), "");
        assert_eq!(store.get_array_item("grid", 7, 7).unwrap(), "");
        assert_eq!(store.get_array_item_str("grid", "1", "2").unwrap(), "x");
    }

    #[test]
    fn set_array_replaces() {
        let mut store = Store::new();
        store.set_array("a", &[vec!["1", "2"], vec!["3"]]).unwrap();
        assert_eq!(store.get("a").unwrap().unwrap().to_string(), "[[1,2],[3]]");
        store.set_array::<&str>("a", &[]).unwrap();
        assert!(store.get_array("a").unwrap().is_empty());
    }

    #[test]
    fn array_from_string_literal() {
        let mut store = Store::new();
        store.set("a", "[[1,2],[3]]").unwrap();
        assert_eq!(store.get_array_item("a", 1, 0).unwrap(), "3");
    }

    #[test]
    fn prefix_scan_respects_overlay() {
        let mut store = Store::new();
        store.set("room.1", "hall").unwrap();
        store.set("room.2", "cellar").unwrap();
        store.set("other", "x").unwrap();
        store.set_use_overlay(true);
        store.set("room.3", "attic").unwrap();
        store.set("room.1", "great hall").unwrap();
        let found = store.get_by_prefix("ROOM.").unwrap();
        assert_eq!(
            found.into_iter().collect::<Vec<_>>(),
            vec![
                ("room.1".to_owned(), "great hall".to_owned()),
                ("room.2".to_owned(), "cellar".to_owned()),
                ("room.3".to_owned(), "attic".to_owned()),
            ]
        );
        store.set_use_overlay(false);
        assert_eq!(store.get_by_prefix("room.").unwrap().len(), 2);
    }

    #[test]
    fn empty_prefix_returns_every_key() {
        let mut store = Store::new();
        store.set("b", "2").unwrap();
        store.set("a", "1").unwrap();
        let found = store.get_by_prefix("").unwrap();
        assert_eq!(found.into_keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(store.get_by_prefix("  ").unwrap().len(), 2);
    }

    #[test]
    fn pattern_scan() {
        let mut store = Store::new();
        for k in ["item.1.name", "item.2.name", "item.x.name", "item.1.weight"] {
            store.set(k, "v").unwrap();
        }
        let hits: Vec<String> = store.get_by_pattern("item.#.name").unwrap().into_keys().collect();
        assert_eq!(hits, vec!["item.1.name", "item.2.name"]);
        assert_eq!(store.get_by_pattern("item.?.*").unwrap().len(), 4);
        assert!(store.get_by_pattern("a b").is_err());
    }
}
