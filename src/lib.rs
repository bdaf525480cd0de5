//! Parse `.env` files and load them into an environment store.
//!
//! [`parse`] and [`EnvLoader::parse_only`] return an ordered [`EnvMap`] and
//! never touch the environment. [`EnvLoader::load`] writes into its
//! [`TargetEnv`], which is an isolated in-memory map unless the caller opts
//! into the process environment.
//!
//! Convenience loaders ([`load`], [`dotenv`]) mutate the process environment
//! and are `unsafe`, because callers must guarantee no concurrent
//! process-environment access.

mod env;
mod error;
mod loader;
mod model;
mod parser;

pub use env::TargetEnv;
pub use error::{Error, ParseError, ParseErrorKind};
pub use loader::{EnvLoader, dotenv, load, parse};
pub use model::{EnvMap, LoadReport, QuoteMode, RequiredKeys};
pub use parser::{is_valid_key, parse_bytes, parse_reader, parse_str, parse_str_with_mode};
