//! Terminal rendering of child output and stream events.

use std::io::Write;

use ogpt_core::{LogLine, LogStream, StreamEvent};
use ogpt_runtime::{ConsoleEventBroadcaster, LogSubscription};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Stdout,
    Stderr,
}

/// One piece of terminal output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub target: Target,
    pub text: String,
    pub newline: bool,
}

impl Rendered {
    fn line(target: Target, text: String) -> Self {
        Self {
            target,
            text,
            newline: true,
        }
    }

    fn inline(target: Target, text: String) -> Self {
        Self {
            target,
            text,
            newline: false,
        }
    }

    /// Write to the target and flush.
    pub fn print(&self) {
        let result = match self.target {
            Target::Stdout => write_to(&mut std::io::stdout().lock(), self),
            Target::Stderr => write_to(&mut std::io::stderr().lock(), self),
        };
        if let Err(e) = result {
            debug!(error = %e, "Terminal write failed");
        }
    }
}

fn write_to(out: &mut impl Write, rendered: &Rendered) -> std::io::Result<()> {
    out.write_all(rendered.text.as_bytes())?;
    if rendered.newline {
        out.write_all(b"\n")?;
    }
    out.flush()
}

/// `[role] text`, stderr lines to stderr.
pub fn log_line(line: &LogLine) -> Rendered {
    let target = match line.stream {
        LogStream::Stderr => Target::Stderr,
        LogStream::Stdout | LogStream::Merged => Target::Stdout,
    };
    Rendered::line(target, format!("[{}] {}", line.source, line.text))
}

/// Rendering of a stream event. Terminal events other than `Cancelled` are
/// left to the caller.
pub fn stream_event(event: &StreamEvent, show_raw: bool) -> Option<Rendered> {
    match event {
        StreamEvent::Progress { progress, info, .. } => Some(Rendered::inline(
            Target::Stdout,
            format!("\r{:>3}% {info}", progress.percent),
        )),
        StreamEvent::Token { token, .. } => Some(Rendered::inline(Target::Stdout, token.text.clone())),
        StreamEvent::Raw { line, .. } if show_raw => {
            Some(Rendered::line(Target::Stderr, format!("raw: {line}")))
        }
        StreamEvent::Status { status, .. } => Some(Rendered::line(Target::Stderr, status.clone())),
        StreamEvent::Diagnostic { message, .. } => {
            Some(Rendered::line(Target::Stderr, format!("error: {message}")))
        }
        StreamEvent::Cancelled { .. } => Some(Rendered::line(Target::Stderr, "\ncancelled".to_string())),
        StreamEvent::Raw { .. }
        | StreamEvent::Started { .. }
        | StreamEvent::Done { .. }
        | StreamEvent::Failed { .. } => None,
    }
}

/// Print a child's output until it is exhausted.
pub async fn print_logs(mut logs: LogSubscription) {
    while let Some(line) = logs.next_line().await {
        log_line(&line).print();
    }
}

/// Trace every console event at debug level.
pub fn spawn_event_trace(events: &ConsoleEventBroadcaster) -> JoinHandle<()> {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let payload = serde_json::to_string(&event).unwrap_or_default();
                    debug!(event = event.event_name(), %payload, "console event");
                }
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "Event trace lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ogpt_core::{LogSource, ProgressEvent, Role, StreamSessionId};

    #[test]
    fn log_lines_are_prefixed_by_role() {
        let line = LogLine::new(LogSource::Process(Role::Serve), LogStream::Stderr, "listening");
        let rendered = log_line(&line);
        assert_eq!(rendered.target, Target::Stderr);
        assert_eq!(rendered.text, format!("[{}] listening", Role::Serve));
    }

    #[test]
    fn progress_rewrites_the_line() {
        let session = StreamSessionId::new();
        let event = StreamEvent::progress(session, ProgressEvent::from_counts(50, 100).unwrap());
        let rendered = stream_event(&event, false).unwrap();
        assert!(!rendered.newline);
        assert_eq!(rendered.text, "\r 50% Downloaded: 50 bytes / Total: 100 bytes");
    }

    #[test]
    fn raw_lines_only_when_requested() {
        let session = StreamSessionId::new();
        let raw = StreamEvent::raw(session, "{}");
        assert!(stream_event(&raw, false).is_none());
        assert_eq!(stream_event(&raw, true).unwrap().text, "raw: {}");
        assert!(stream_event(&StreamEvent::Done { session }, true).is_none());
    }

    #[test]
    fn writes_text_and_newline() {
        let mut out = Vec::new();
        write_to(&mut out, &Rendered::line(Target::Stdout, "ok".into())).unwrap();
        write_to(&mut out, &Rendered::inline(Target::Stdout, "tok".into())).unwrap();
        assert_eq!(out, b"ok\ntok");
    }
}
