//! Run-binary command: launch the compiled binary without arguments.

use ogpt_core::Role;

use super::session::follow_child;
use crate::bootstrap::CliContext;
use crate::error::CliError;

pub async fn execute(ctx: &CliContext) -> Result<(), CliError> {
    let binary = ctx.binary()?;
    let handle = ctx
        .supervisor
        .start(Role::PullOneShot, &binary, &[], &ctx.working_dir(&binary))
        .await?;
    follow_child(ctx, &handle).await.map(|_| ())
}
