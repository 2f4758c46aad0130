//! Command-line front end for bulkdl.
//!
//! `main.rs` parses arguments and dispatches; everything else lives here so
//! integration tests can drive handlers against a temporary database.

#![deny(unsafe_code)]

pub mod bootstrap;
pub mod commands;
pub mod error;
pub mod handlers;
pub mod parser;
pub mod presentation;

pub use bootstrap::{CliConfig, CliContext, bootstrap, init_logging};
pub use commands::Commands;
pub use error::CliError;
pub use parser::Cli;
