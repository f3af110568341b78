//! Layered key/value store.
//!
//! Two maps share one key space: `base` holds the durable state and
//! `overlay` shadows it while [`Store::use_overlay`] is on.  With the overlay
//! on, reads prefer the overlay entry and writes go only to the overlay; with
//! it off, only `base` is read or written.  [`Store::merge_overlay`] commits
//! the overlay into `base`.
//!
//! Every key-taking method normalizes the key first (see [`crate::key`]) and
//! fails with [`Error::InvalidKey`] on a bad key.

use std::collections::{BTreeSet, HashMap};

use crate::error::{Error, Result};
use crate::key::normalize_key;
use crate::value::{Number, Value};

/// Which layer(s) an operation looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layer {
    #[default]
    Both,
    Base,
    Overlay,
}

/// Base + overlay store of typed values.
#[derive(Debug, Default, Clone)]
pub struct Store {
    base: HashMap<String, Value>,
    overlay: HashMap<String, Value>,
    use_overlay: bool,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether reads and writes are routed through the overlay.
    pub fn use_overlay(&self) -> bool {
        self.use_overlay
    }

    pub fn set_use_overlay(&mut self, on: bool) {
        self.use_overlay = on;
    }

    // ── Generic access ────────────────────────────────────────────────────────

    /// Look up the visible value for `key`.
    pub fn get(&self, key: &str) -> Result<Option<&Value>> {
        let key = normalize_key(key)?;
        Ok(self.lookup(&key))
    }

    /// Set `key` in the active layer.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<()> {
        let key = normalize_key(key)?;
        self.active_mut().insert(key, value.into());
        Ok(())
    }

    /// Remove `key` from base and, when the overlay is on, from the overlay.
    /// Returns `true` if anything was removed.
    pub fn remove(&mut self, key: &str) -> Result<bool> {
        let key = normalize_key(key)?;
        let mut removed = self.base.remove(&key).is_some();
        if self.use_overlay {
            removed |= self.overlay.remove(&key).is_some();
        }
        Ok(removed)
    }

    /// Returns `true` if `key` is visible.
    pub fn contains_key(&self, key: &str) -> Result<bool> {
        let key = normalize_key(key)?;
        Ok(self.use_overlay && self.overlay.contains_key(&key) || self.base.contains_key(&key))
    }

    /// Drop the overlay's shadow of `key` so reads fall through to base.
    pub fn revert(&mut self, key: &str) -> Result<()> {
        let key = normalize_key(key)?;
        self.overlay.remove(&key);
        Ok(())
    }

    /// Copy every overlay entry into base, then empty the overlay.
    pub fn merge_overlay(&mut self) {
        tracing::debug!(entries = self.overlay.len(), "merging overlay into base");
        self.base.extend(self.overlay.drain());
    }

    /// Keys in the chosen layer(s), each listed once.
    pub fn keys(&self, which: Layer) -> BTreeSet<String> {
        match which {
            Layer::Base => self.base.keys().cloned().collect(),
            Layer::Overlay => self.overlay.keys().cloned().collect(),
            Layer::Both => self.base.keys().chain(self.overlay.keys()).cloned().collect(),
        }
    }

    /// Keys a read can currently see: base plus overlay when the overlay is on.
    pub fn visible_keys(&self) -> BTreeSet<String> {
        if self.use_overlay {
            self.keys(Layer::Both)
        } else {
            self.keys(Layer::Base)
        }
    }

    pub fn count(&self, which: Layer) -> usize {
        match which {
            Layer::Base => self.base.len(),
            Layer::Overlay => self.overlay.len(),
            Layer::Both => self.keys(Layer::Both).len(),
        }
    }

    pub fn clear(&mut self, which: Layer) {
        match which {
            Layer::Base => self.base.clear(),
            Layer::Overlay => self.overlay.clear(),
            Layer::Both => {
                self.base.clear();
                self.overlay.clear();
            }
        }
    }

    /// Iterate over visible entries in key order.
    pub fn values(&self) -> impl Iterator<Item = (String, &Value)> + '_ {
        self.visible_keys().into_iter().filter_map(move |k| {
            let v = self.lookup(&k)?;
            Some((k, v))
        })
    }

    pub(crate) fn lookup(&self, key: &str) -> Option<&Value> {
        if self.use_overlay {
            if let Some(v) = self.overlay.get(key) {
                return Some(v);
            }
        }
        self.base.get(key)
    }

    fn active_mut(&mut self) -> &mut HashMap<String, Value> {
        if self.use_overlay {
            &mut self.overlay
        } else {
            &mut self.base
        }
    }

    // ── Typed scalars ─────────────────────────────────────────────────────────

    /// String value of `key`.  Lists are rendered as list literals; missing
    /// and null entries give `""`; any other type is a mismatch.
    pub fn get_string(&self, key: &str) -> Result<String> {
        match self.get(key)? {
            None | Some(Value::Null) => Ok(String::new()),
            Some(v @ (Value::Str(_) | Value::List(_))) => Ok(v.to_string()),
            Some(other) => Err(Error::mismatch(key, "string", other.type_name())),
        }
    }

    pub fn set_string(&mut self, key: &str, value: impl Into<String>) -> Result<()> {
        self.set(key, Value::Str(value.into()))
    }

    /// Any scalar rendered as text; `""` when missing.  Objects are a mismatch.
    pub fn get_text(&self, key: &str) -> Result<String> {
        match self.get(key)? {
            None => Ok(String::new()),
            Some(Value::Object(_)) => Err(Error::mismatch(key, "text", "object")),
            Some(v) => Ok(v.to_string()),
        }
    }

    /// Integer value of `key`.  Integer numbers are returned directly, other
    /// values go through string coercion; missing and null give `0`.
    pub fn get_int(&self, key: &str) -> Result<i64> {
        let value = match self.get(key)? {
            None | Some(Value::Null) => return Ok(0),
            Some(v) => v,
        };
        if let Value::Number(n) = value {
            if let Some(i) = n.as_i64() {
                return Ok(i);
            }
        }
        let text = value.to_string();
        text.trim().parse().map_err(|_| Error::NotNumeric {
            key: key.trim().to_owned(),
            value: text,
        })
    }

    pub fn set_int(&mut self, key: &str, value: i64) -> Result<()> {
        self.set(key, Value::Number(Number::from_i64(value)))
    }

    /// Boolean value of `key`: `true`/`false` text and integers are accepted;
    /// missing and null give `false`.
    pub fn get_bool(&self, key: &str) -> Result<bool> {
        match self.get(key)? {
            None | Some(Value::Null) => Ok(false),
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::Number(n)) => Ok(n.as_f64() != 0.0),
            Some(Value::Str(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "" | "false" | "0" => Ok(false),
                "true" | "1" => Ok(true),
                _ => Err(Error::mismatch(key, "bool", "string")),
            },
            Some(other) => Err(Error::mismatch(key, "bool", other.type_name())),
        }
    }

    pub fn set_bool(&mut self, key: &str, value: bool) -> Result<()> {
        self.set(key, Value::Bool(value))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get() {
        let mut store = Store::new();
        store.set("wrap", "1").unwrap();
        assert_eq!(store.get("wrap").unwrap(), Some(&Value::from("1")));
    }

    #[test]
    fn keys_are_normalized() {
        let mut store = Store::new();
        store.set("  Foo.Bar ", "x").unwrap();
        assert_eq!(store.get("foo.bar").unwrap(), Some(&Value::from("x")));
        assert!(store.contains_key("FOO.BAR").unwrap());
    }

    #[test]
    fn invalid_keys_fail() {
        let mut store = Store::new();
        assert!(matches!(store.get(""), Err(Error::InvalidKey(_))));
        assert!(matches!(store.get("a b"), Err(Error::InvalidKey(_))));
        assert!(store.set("  ", "x").is_err());
        assert!(store.remove("a b").is_err());
        assert!(store.revert("").is_err());
    }

    #[test]
    fn overlay_shadows_base() {
        let mut store = Store::new();
        store.set("k", "base").unwrap();
        store.set_use_overlay(true);
        assert_eq!(store.get_string("k").unwrap(), "base");
        store.set("k", "over").unwrap();
        assert_eq!(store.get_string("k").unwrap(), "over");
        store.set_use_overlay(false);
        assert_eq!(store.get_string("k").unwrap(), "base");
    }

    #[test]
    fn overlay_writes_leave_base_untouched() {
        let mut store = Store::new();
        store.set_use_overlay(true);
        store.set("k", "v").unwrap();
        assert_eq!(store.count(Layer::Base), 0);
        assert_eq!(store.count(Layer::Overlay), 1);
    }

    #[test]
    fn overlay_remove_without_base_is_absent() {
        let mut store = Store::new();
        store.set_use_overlay(true);
        store.set("k", "v").unwrap();
        assert!(store.remove("k").unwrap());
        assert_eq!(store.get("k").unwrap(), None);
        assert!(!store.remove("k").unwrap());
    }

    #[test]
    fn merge_overlay_commits() {
        let mut store = Store::new();
        store.set("a", "old").unwrap();
        store.set_use_overlay(true);
        store.set("a", "new").unwrap();
        store.set("b", 2).unwrap();
        store.merge_overlay();
        assert!(store.keys(Layer::Overlay).is_empty());
        store.set_use_overlay(false);
        assert_eq!(store.get_string("a").unwrap(), "new");
        assert_eq!(store.get_int("b").unwrap(), 2);
    }

    #[test]
    fn revert_falls_through_to_base() {
        let mut store = Store::new();
        store.set("k", "base").unwrap();
        store.set_use_overlay(true);
        store.set("k", "over").unwrap();
        store.revert("k").unwrap();
        assert_eq!(store.get_string("k").unwrap(), "base");
        assert!(store.keys(Layer::Overlay).is_empty());
    }

    #[test]
    fn keys_union_counts_once() {
        let mut store = Store::new();
        store.set("a", 1).unwrap();
        store.set("b", 1).unwrap();
        store.set_use_overlay(true);
        store.set("b", 2).unwrap();
        store.set("c", 3).unwrap();
        let both: Vec<String> = store.keys(Layer::Both).into_iter().collect();
        assert_eq!(both, vec!["a", "b", "c"]);
        assert_eq!(store.count(Layer::Both), 3);
    }

    #[test]
    fn clear_layers() {
        let mut store = Store::new();
        store.set("a", 1).unwrap();
        store.set_use_overlay(true);
        store.set("b", 1).unwrap();
        store.clear(Layer::Overlay);
        assert_eq!(store.count(Layer::Both), 1);
        store.set("b", 1).unwrap();
        store.clear(Layer::Base);
        assert_eq!(store.keys(Layer::Both).into_iter().collect::<Vec<_>>(), vec!["b"]);
        store.clear(Layer::Both);
        assert_eq!(store.count(Layer::Both), 0);
    }

    #[test]
    fn get_string_types() {
        let mut store = Store::new();
        store.set("s", "text").unwrap();
        store.set("l", Value::List(vec!["a".into(), "b".into()])).unwrap();
        store.set("n", 3).unwrap();
        store.set("z", Value::Null).unwrap();
        assert_eq!(store.get_string("s").unwrap(), "text");
        assert_eq!(store.get_string("l").unwrap(), "[a,b]");
        assert_eq!(store.get_string("z").unwrap(), "");
        assert_eq!(store.get_string("missing").unwrap(), "");
        assert!(matches!(store.get_string("n"), Err(Error::TypeMismatch { .. })));
        assert_eq!(store.get_text("n").unwrap(), "3");
    }

    #[test]
    fn get_int_coercion() {
        let mut store = Store::new();
        store.set("i", 42).unwrap();
        store.set("l", 5_000_000_000i64).unwrap();
        store.set("s", " 17 ").unwrap();
        store.set("bad", "lots").unwrap();
        assert_eq!(store.get_int("i").unwrap(), 42);
        assert_eq!(store.get_int("l").unwrap(), 5_000_000_000);
        assert_eq!(store.get_int("s").unwrap(), 17);
        assert_eq!(store.get_int("missing").unwrap(), 0);
        assert!(matches!(store.get_int("bad"), Err(Error::NotNumeric { .. })));
    }

    #[test]
    fn get_bool_values() {
        let mut store = Store::new();
        store.set_bool("t", true).unwrap();
        store.set("s", "FALSE").unwrap();
        store.set("n", 1).unwrap();
        store.set("x", "maybe").unwrap();
        assert!(store.get_bool("t").unwrap());
        assert!(!store.get_bool("s").unwrap());
        assert!(store.get_bool("n").unwrap());
        assert!(!store.get_bool("missing").unwrap());
        assert!(store.get_bool("x").is_err());
    }

    #[test]
    fn values_respects_overlay() {
        let mut store = Store::new();
        store.set("a", "1").unwrap();
        store.set_use_overlay(true);
        store.set("a", "2").unwrap();
        let seen: Vec<(String, String)> =
            store.values().map(|(k, v)| (k, v.to_string())).collect();
        assert_eq!(seen, vec![("a".to_owned(), "2".to_owned())]);
    }
}
