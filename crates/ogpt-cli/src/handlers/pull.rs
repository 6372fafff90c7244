//! Pull command: stream `/api/pull`, or run `<binary> pull` as a child.

use ogpt_core::{Role, StreamKind};
use ogpt_runtime::pull_payload;

use super::session::{follow_child, follow_stream};
use crate::bootstrap::CliContext;
use crate::error::CliError;

pub async fn execute(ctx: &CliContext, name: &str, no_http: bool) -> Result<(), CliError> {
    if no_http {
        let binary = ctx.binary()?;
        let args = vec!["pull".to_string(), name.to_string()];
        let handle = ctx
            .supervisor
            .start(Role::PullOneShot, &binary, &args, &ctx.working_dir(&binary))
            .await?;
        follow_child(ctx, &handle).await?;
        return Ok(());
    }

    let session = ctx
        .streams
        .start(
            &ctx.api.pull_url(),
            pull_payload(name),
            StreamKind::Pull,
            ctx.settings.effective_stream_timeout(),
        )
        .await;
    follow_stream(session, false).await
}
