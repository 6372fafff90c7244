//! Run command: interactive `ollama run <model>` on a terminal.

use std::io::{BufRead, Write};
use std::thread;

use ogpt_core::PtyError;
use tokio::sync::mpsc;
use tracing::debug;

use crate::bootstrap::CliContext;
use crate::error::CliError;

pub async fn execute(ctx: &CliContext, model: &str) -> Result<(), CliError> {
    let binary = ctx.binary()?;
    let args = vec!["run".to_string(), model.to_string()];
    let working_dir = ctx.working_dir(&binary);
    let mut session = ctx.pty.open(&binary, &args, Some(&working_dir))?;
    eprintln!("Chatting with {model}. Ctrl-D or Ctrl-C to quit.");

    let mut input = spawn_stdin_reader();
    let mut input_open = true;
    let result = loop {
        tokio::select! {
            chunk = session.output.next_chunk() => match chunk {
                Some(text) => {
                    let mut out = std::io::stdout().lock();
                    let _ = out.write_all(text.as_bytes());
                    let _ = out.flush();
                }
                None => break Ok(()),
            },
            line = input.recv(), if input_open => match line {
                Some(line) => match ctx.pty.send(&line) {
                    Ok(()) => {}
                    // The model exited; remaining output still drains.
                    Err(PtyError::NotRunning) => input_open = false,
                    Err(e) => break Err(e.into()),
                },
                None => break Ok(()),
            },
            _ = tokio::signal::ctrl_c() => break Ok(()),
        }
    };

    let exit = ctx.pty.close(ctx.settings.effective_stop_grace()).await;
    debug!(?exit, "Interactive session ended");
    println!();
    result
}

/// Blocking stdin lines on a dedicated thread.
///
/// A blocking task would keep the runtime from shutting down while the
/// terminal waits for input.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    let spawned = thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        debug!(error = %e, "Could not start stdin reader");
    }
    rx
}
