//! List command: installed models, via the binary or the HTTP API.

use crate::bootstrap::CliContext;
use crate::error::CliError;

pub async fn execute(ctx: &CliContext, via_api: bool) -> Result<(), CliError> {
    let names = if via_api {
        ctx.api.list_models().await?
    } else {
        let binary = ctx.binary()?;
        ctx.supervisor
            .start_server_then_list(
                &binary,
                &ctx.working_dir(&binary),
                ctx.settings.effective_settle_delay(),
                &ctx.settings.listing_parser(),
            )
            .await?
    };

    if names.is_empty() {
        println!("No models installed.");
        println!("Use 'ogpt pull <name>' to download one.");
        return Ok(());
    }
    for name in names {
        println!("{name}");
    }
    Ok(())
}
