//! Generate command: stream tokens from `/api/generate`.

use ogpt_core::StreamKind;
use ogpt_runtime::generate_payload;

use super::session::follow_stream;
use crate::bootstrap::CliContext;
use crate::error::CliError;

pub async fn execute(ctx: &CliContext, model: &str, prompt: &str, raw: bool) -> Result<(), CliError> {
    let session = ctx
        .streams
        .start(
            &ctx.api.generate_url(),
            generate_payload(model, prompt),
            StreamKind::Generate,
            ctx.settings.effective_stream_timeout(),
        )
        .await;
    follow_stream(session, raw).await
}
