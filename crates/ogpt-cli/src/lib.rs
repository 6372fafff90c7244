//! Command-line surface of the ogpt console.
//!
//! Parses arguments, composes the runtime adapters in [`bootstrap`] and
//! dispatches to one handler per command.
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

#[cfg(test)]
use tokio_test as _;

// Used by the binary target only.
use anyhow as _;
use dotenvy as _;
use tracing_subscriber as _;

pub mod bootstrap;
pub mod commands;
pub mod error;
pub mod handlers;
pub mod parser;
pub mod presentation;

pub use bootstrap::{CliContext, bootstrap, resolve_settings};
pub use commands::Commands;
pub use error::CliError;
pub use parser::Cli;
