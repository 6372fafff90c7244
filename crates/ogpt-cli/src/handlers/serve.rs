//! Serve command: run the server in the foreground.

use ogpt_core::Role;

use super::session::{ChildOutcome, follow_child};
use crate::bootstrap::CliContext;
use crate::error::CliError;

pub async fn execute(ctx: &CliContext) -> Result<(), CliError> {
    let binary = ctx.binary()?;
    let handle = ctx
        .supervisor
        .start(Role::Serve, &binary, &["serve".to_string()], &ctx.working_dir(&binary))
        .await?;
    println!(
        "Server started (pid {}). Press Ctrl-C to stop.",
        handle.pid().map_or_else(|| "?".to_string(), |pid| pid.to_string())
    );

    match follow_child(ctx, &handle).await? {
        ChildOutcome::Interrupted => println!("Server stopped"),
        ChildOutcome::Exited => println!("Server exited"),
    }
    Ok(())
}
