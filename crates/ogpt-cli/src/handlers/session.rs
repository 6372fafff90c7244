//! Shared driving loops for one-shot children and streamed sessions.

use ogpt_core::{ProcessState, StreamEvent};
use ogpt_runtime::{ChildProcessHandle, StreamSession};
use std::time::Duration;
use tracing::debug;

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::presentation::{print_logs, stream_event};

const LOG_DRAIN: Duration = Duration::from_millis(500);

/// How a followed child ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChildOutcome {
    Exited,
    /// Stopped on Ctrl-C.
    Interrupted,
}

/// Print a child's output until it exits; Ctrl-C stops it.
///
/// An unsuccessful exit that was not requested is an error.
pub(crate) async fn follow_child(
    ctx: &CliContext,
    handle: &ChildProcessHandle,
) -> Result<ChildOutcome, CliError> {
    let printer = tokio::spawn(print_logs(handle.logs()));

    let (status, outcome) = tokio::select! {
        status = handle.wait() => (status, ChildOutcome::Exited),
        _ = tokio::signal::ctrl_c() => {
            debug!(role = %handle.role(), "Interrupted, stopping child");
            let status = ctx.supervisor.stop(handle, ctx.settings.effective_stop_grace()).await;
            (status, ChildOutcome::Interrupted)
        }
    };
    // A grandchild holding the pipes must not block the command.
    let _ = tokio::time::timeout(LOG_DRAIN, printer).await;

    match outcome {
        ChildOutcome::Exited if status.state != ProcessState::ExitedOk => {
            Err(CliError::Process(format!(
                "{} exited with {}",
                handle.command().display(),
                status
                    .exit_code
                    .map_or_else(|| "a signal".to_string(), |code| format!("code {code}"))
            )))
        }
        outcome => Ok(outcome),
    }
}

/// Render a streamed session until its terminal event; Ctrl-C cancels.
pub(crate) async fn follow_stream(mut session: StreamSession, show_raw: bool) -> Result<(), CliError> {
    let mut interrupted = false;
    loop {
        let event = tokio::select! {
            event = session.next_event() => event,
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                session.cancel();
                continue;
            }
        };
        let Some(event) = event else {
            return Ok(());
        };

        if let Some(rendered) = stream_event(&event, show_raw) {
            rendered.print();
        }
        match event {
            StreamEvent::Done { .. } => {
                println!();
                return Ok(());
            }
            StreamEvent::Failed { error, .. } => {
                println!();
                return Err(CliError::Stream(error));
            }
            StreamEvent::Cancelled { .. } => return Ok(()),
            _ => {}
        }
    }
}
