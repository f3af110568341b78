//! Engine options and the `.dagsrc` startup file.
//!
//! | Directive | Action |
//! |-----------|--------|
//! | `/set <key>=<value>` or `/set <key> <value>` | seed a text value |
//! | `/setint <key>=<n>` or `/setint <key> <n>` | seed an integer value |
//! | `/option <name>=<value>` | set an [`EngineConfig`] field |
//! | Lines starting with `;` | comment, ignored |
//! | Any other `/command` | silently skipped |
//!
//! Seeded values go into the base layer.

use std::path::Path;

use crate::store::Store;

/// Limits and switches for an [`Engine`](crate::Engine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Iterations a single loop may run before the script fails.
    pub max_loop_iterations: usize,
    /// Nesting depth of `@SCRIPT` calls.
    pub max_script_depth: usize,
    /// Route reads and writes through the overlay layer.
    pub use_overlay: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_loop_iterations: 10_000,
            max_script_depth: 32,
            use_overlay: false,
        }
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// A non-fatal error encountered while loading a config file.
#[derive(Debug)]
pub struct ConfigError {
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ConfigError {}

/// Parsed startup file: engine options plus seed values.
#[derive(Debug, Default)]
pub struct Config {
    pub options: EngineConfig,
    pub store: Store,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `.dagsrc` string.
    ///
    /// Returns the config and a list of any errors on recognised lines; the
    /// rest of the file is still applied.
    pub fn load_str(s: &str) -> (Self, Vec<ConfigError>) {
        let mut config = Config::new();
        let mut errors = Vec::new();

        for (i, raw) in s.lines().enumerate() {
            let lineno = i + 1;
            let line = raw.trim();

            if line.is_empty() || line.starts_with(';') {
                continue;
            }
            let Some(rest) = line.strip_prefix('/') else { continue };

            let (cmd, args_str) = rest
                .split_once(|c: char| c.is_ascii_whitespace())
                .unwrap_or((rest, ""));
            let tokens = split_args(args_str.trim());

            let result = match cmd.to_ascii_lowercase().as_str() {
                "set" => parse_assignment("/set", &tokens)
                    .and_then(|(k, v)| config.store.set_string(&k, v).map_err(|e| e.to_string())),
                "setint" => parse_assignment("/setint", &tokens).and_then(|(k, v)| {
                    let n: i64 = v
                        .trim()
                        .parse()
                        .map_err(|_| format!("/setint: '{v}' is not an integer"))?;
                    config.store.set_int(&k, n).map_err(|e| e.to_string())
                }),
                "option" => parse_assignment("/option", &tokens)
                    .and_then(|(k, v)| apply_option(&mut config.options, &k, &v)),
                _ => Ok(()),
            };
            if let Err(message) = result {
                errors.push(ConfigError { line: lineno, message });
            }
        }

        config.store.set_use_overlay(config.options.use_overlay);
        (config, errors)
    }

    /// Read and parse a config file from disk.
    pub fn load_file(path: &Path) -> std::io::Result<(Self, Vec<ConfigError>)> {
        let s = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "loading config");
        Ok(Self::load_str(&s))
    }
}

// ── Argument tokenizer ────────────────────────────────────────────────────────

/// Split `s` into whitespace-delimited tokens, honouring double-quoted strings
/// and `\"` escapes within them.
fn split_args(s: &str) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();
    let mut cur = String::new();
    let mut in_quotes = false;
    let mut chars = s.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '\\' if in_quotes => {
                if let Some(escaped) = chars.next() {
                    cur.push(escaped);
                }
            }
            c if c.is_ascii_whitespace() && !in_quotes => {
                if !cur.is_empty() {
                    args.push(std::mem::take(&mut cur));
                }
            }
            c => cur.push(c),
        }
    }
    if !cur.is_empty() {
        args.push(cur);
    }
    args
}

// ── Directives ────────────────────────────────────────────────────────────────

/// Parse `<name>=<value>` or `<name> <value>`.
fn parse_assignment(cmd: &str, tokens: &[String]) -> Result<(String, String), String> {
    if tokens.is_empty() {
        return Err(format!("{cmd}: requires an argument"));
    }

    let (name, value) = if let Some((name, value)) = tokens[0].split_once('=') {
        let mut value = value.to_owned();
        for extra in &tokens[1..] {
            value.push(' ');
            value.push_str(extra);
        }
        (name.to_owned(), value)
    } else if tokens.len() >= 2 {
        (tokens[0].clone(), tokens[1..].join(" "))
    } else {
        return Err(format!("{cmd}: missing value for '{}'", tokens[0]));
    };

    if name.is_empty() {
        return Err(format!("{cmd}: name cannot be empty"));
    }
    Ok((name, value))
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Some(true),
        "off" | "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

fn apply_option(options: &mut EngineConfig, name: &str, value: &str) -> Result<(), String> {
    let count = || {
        value
            .trim()
            .parse::<usize>()
            .map_err(|_| format!("/option {name}: '{value}' is not a count"))
    };
    match name.to_ascii_lowercase().as_str() {
        "max_loop_iterations" => options.max_loop_iterations = count()?,
        "max_script_depth" => options.max_script_depth = count()?,
        "use_overlay" => {
            options.use_overlay = parse_flag(value)
                .ok_or_else(|| format!("/option use_overlay: '{value}' is not on/off"))?
        }
        other => return Err(format!("/option: unknown option '{other}'")),
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // -- split_args -----------------------------------------------------------

    #[test]
    fn split_simple() {
        assert_eq!(split_args("foo bar baz"), ["foo", "bar", "baz"]);
    }

    #[test]
    fn split_quoted_spaces() {
        assert_eq!(split_args(r#"title "The Old Mill""#), ["title", "The Old Mill"]);
    }

    #[test]
    fn split_escaped_quote_inside_quotes() {
        assert_eq!(split_args(r#""say \"hi\"""#), [r#"say "hi""#]);
    }

    // -- /set -----------------------------------------------------------------

    #[test]
    fn set_equals_form() {
        let (cfg, errs) = Config::load_str("/set Player.Name=Alice");
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(cfg.store.get_string("player.name").unwrap(), "Alice");
    }

    #[test]
    fn set_space_form_joins_words() {
        let (cfg, errs) = Config::load_str("/set greeting Hello there");
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(cfg.store.get_string("greeting").unwrap(), "Hello there");
    }

    #[test]
    fn set_bad_key_is_error() {
        let (_, errs) = Config::load_str("/set bad!key=1");
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].line, 1);
    }

    #[test]
    fn set_missing_value_is_error() {
        let (_, errs) = Config::load_str("\n/set lonely");
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].line, 2);
    }

    // -- /setint --------------------------------------------------------------

    #[test]
    fn setint_stores_number() {
        let (cfg, errs) = Config::load_str("/setint gold=25");
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(cfg.store.get_int("gold").unwrap(), 25);
        assert_eq!(cfg.store.get("gold").unwrap(), Some(&crate::Value::from(25)));
    }

    #[test]
    fn setint_rejects_text() {
        let (_, errs) = Config::load_str("/setint gold=lots");
        assert!(errs[0].message.contains("not an integer"));
    }

    // -- /option --------------------------------------------------------------

    #[test]
    fn options_override_defaults() {
        let src = "\
; limits
/option max_loop_iterations=50
/option max_script_depth 4
/option use_overlay=on
";
        let (cfg, errs) = Config::load_str(src);
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(
            cfg.options,
            EngineConfig {
                max_loop_iterations: 50,
                max_script_depth: 4,
                use_overlay: true,
            }
        );
        assert!(cfg.store.use_overlay());
    }

    #[test]
    fn unknown_option_is_error() {
        let (cfg, errs) = Config::load_str("/option colour=red");
        assert_eq!(errs.len(), 1);
        assert_eq!(cfg.options, EngineConfig::default());
    }

    #[test]
    fn unknown_directives_and_comments_skipped() {
        let (cfg, errs) = Config::load_str(";; header\n/def x = y\nplain text\n/set a=1");
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(cfg.store.count(crate::Layer::Base), 1);
    }

    #[test]
    fn seeds_land_in_base_even_with_overlay() {
        let (cfg, _) = Config::load_str("/option use_overlay=on\n/set a=1");
        assert_eq!(cfg.store.keys(crate::Layer::Base).len(), 1);
        assert_eq!(cfg.store.count(crate::Layer::Overlay), 0);
    }
}
