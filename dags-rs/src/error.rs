//! Error type shared by the store, the codec and the script engine.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong inside the engine.
///
/// Store-level variants (`InvalidKey`, `TypeMismatch`, `NotNumeric`) are
/// returned straight to the caller.  Inside [`Engine::run_script`] any variant
/// aborts the script and is rendered into the output buffer instead.
///
/// [`Engine::run_script`]: crate::Engine::run_script
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("Invalid key: \"{0}\"")]
    InvalidKey(String),
    #[error("Type mismatch: {key}: expected {expected}, found {found}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("Value is not numeric: {key}: {value}")]
    NotNumeric { key: String, value: String },
    #[error("Malformed literal: {0}")]
    MalformedLiteral(String),
    #[error("Syntax error: {0}")]
    Syntax(String),
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
    #[error("{command}: missing argument {index}")]
    MissingArgument { command: String, index: usize },
    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),
    #[error("{0}")]
    Arithmetic(String),
}

impl Error {
    pub(crate) fn mismatch(key: &str, expected: &'static str, found: &'static str) -> Self {
        Error::TypeMismatch {
            key: key.to_owned(),
            expected,
            found,
        }
    }
}
