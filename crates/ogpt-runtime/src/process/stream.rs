//! Async output readers for supervised children (non-UTF8-safe).
//!
//! The supervised tools can emit non-UTF8 bytes. `BufReader::lines()` would
//! end the reader task on invalid UTF-8, so lines are read as bytes and
//! decoded lossily.

use std::sync::Arc;

use ogpt_core::{ConsoleEventEmitter, LogLine, LogSource, LogStream, ProcessEvent, strip_output};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Drain `stream` line by line until EOF.
///
/// Each line is filtered, sent to the handle's log channel and emitted as a
/// `ProcessEvent::Log`. The task ends on EOF or a read error.
pub(crate) fn spawn_log_reader(
    stream: impl AsyncRead + Unpin + Send + 'static,
    source: LogSource,
    kind: LogStream,
    tx: broadcast::Sender<LogLine>,
    emitter: Arc<dyn ConsoleEventEmitter>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf: Vec<u8> = Vec::with_capacity(1024);

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break, // EOF
                Ok(_) => {
                    if buf.last() == Some(&b'\n') {
                        buf.pop();
                        if buf.last() == Some(&b'\r') {
                            buf.pop();
                        }
                    }

                    let raw = String::from_utf8_lossy(&buf);
                    let text = strip_output(&raw);
                    // Lines made only of spinner frames carry nothing.
                    if text.trim().is_empty() && !raw.trim().is_empty() {
                        continue;
                    }

                    trace!(%source, stream = kind.as_str(), "{}", text);
                    let line = LogLine::new(source, kind, text);
                    let _ = tx.send(line.clone());
                    emitter.emit(ProcessEvent::Log { line }.into());
                }
                Err(e) => {
                    debug!(%source, stream = kind.as_str(), error = %e, "log reader exiting due to read error");
                    break;
                }
            }
        }

        debug!(%source, stream = kind.as_str(), "log reader task exiting");
    })
}
