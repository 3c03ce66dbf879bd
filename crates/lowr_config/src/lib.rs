//! Parsing and validation of `lowr.toml` pipeline configuration files.
//!
//! The configuration selects a backend (which fixes the ordered pass list),
//! lets a project skip or override passes, and sets the naming conventions
//! used for hoisted and synthesized declarations.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str};
pub use types::*;
