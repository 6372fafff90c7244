//! Compile command: `make -C <source_dir>`, then fix the binary's mode.

use ogpt_core::Role;
use ogpt_core::paths::{build_args, build_tool};
use ogpt_runtime::ensure_executable;
use std::path::Path;

use super::session::{ChildOutcome, follow_child};
use crate::bootstrap::CliContext;
use crate::error::CliError;

pub async fn execute(ctx: &CliContext) -> Result<(), CliError> {
    let source = ctx.source_dir()?.to_path_buf();
    println!("Compiling in {}", source.display());

    let handle = ctx
        .supervisor
        .start(Role::Compile, Path::new(build_tool()), &build_args(&source), &source)
        .await?;
    if let ChildOutcome::Interrupted = follow_child(ctx, &handle).await? {
        println!("Compile interrupted");
        return Ok(());
    }

    let binary = ctx.binary()?;
    if binary.exists() {
        ensure_executable(&binary)?;
        println!("Built {}", binary.display());
    } else {
        println!("Build finished, but {} was not produced", binary.display());
    }
    Ok(())
}
