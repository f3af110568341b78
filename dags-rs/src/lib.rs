//! DAGS: a small script engine for interactive fiction, running over GROD,
//! a layered base/overlay key-value store.

pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod facade;
pub mod key;
pub mod script;
pub mod store;
pub mod value;

pub use codec::{collapse_array, collapse_list, expand_array, expand_list, NULL_VALUE};
pub use config::{Config, ConfigError, EngineConfig};
pub use error::{Error, Result};
pub use script::{compress_script, pretty_script, tokenize, Engine};
pub use store::{Layer, Store};
pub use value::{Number, Value};
