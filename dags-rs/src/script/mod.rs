//! DAGS script language.
//!
//! A script is either literal text, which is output unchanged, or a command
//! script starting with `@`:
//!
//! - Store commands (`@GET(key)`, `@SETINT(key,n)`, `@SETLIST(key,[a,b])`, …)
//! - Control flow: `@IF` … `THEN` … `@ELSEIF` … `@ELSE` … `@ENDIF`,
//!   `@FOR(i,1,3)` … `@ENDFOR`, `@FOREACHKEY` and `@FOREACHLIST` loops
//! - Output: narrative text between commands, `@WRITE`, `@NL`, `@MSG`
//! - Formatting: [`pretty_script`] and [`compress_script`]
//!
//! # Quick start
//!
//! ```rust
//! use dags::Engine;
//!
//! let mut engine = Engine::new();
//! engine.store.set_int("gold", 5).unwrap();
//!
//! let mut out = String::new();
//! engine.run_script(
//!     "@IF(@GETINT(gold)>(10))THEN You are rich.@ELSE You are poor.@ENDIF",
//!     &mut out,
//! );
//! assert_eq!(out, "You are poor.");
//! ```

pub mod commands;
pub mod exec;
pub mod format;
pub mod parse;
pub mod token;

// Re-exports for convenience.
pub use exec::{truthy, Engine};
pub use format::{compress_script, pretty_script};
pub use parse::{parse_script, Block, Expr};
pub use token::{tokenize, Keyword, Token, TokenKind};
