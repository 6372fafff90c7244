//! Settings command: print the effective settings.

use crate::bootstrap::CliContext;
use crate::error::CliError;

pub fn execute(ctx: &CliContext) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(&ctx.settings)
        .map_err(|e| CliError::Config(e.to_string()))?;
    println!("{json}");
    Ok(())
}
