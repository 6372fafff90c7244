//! Command handlers.
//!
//! Signature: `pub async fn execute(ctx: &CliContext, ...) -> Result<(), CliError>`.
//! Handlers drive the runtime adapters and render their output; they hold
//! no state of their own.

pub mod compile;
pub mod generate;
pub mod list;
pub mod pull;
pub mod run;
pub mod run_binary;
pub mod serve;
pub mod settings;

mod session;
