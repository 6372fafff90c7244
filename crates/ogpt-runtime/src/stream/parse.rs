//! Per-line interpretation of pull and generate bodies.
//!
//! Every line is forwarded verbatim as `Raw` first. Typed events follow when
//! the line can be understood; nothing here ever fails the session.

use std::sync::LazyLock;

use ogpt_core::{ProgressEvent, StreamEvent, StreamKind, StreamSessionId};
use regex::Regex;
use serde_json::{Map, Value};

/// Textual progress shape printed by some builds instead of JSON.
static DOWNLOADED_TOTAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Downloaded:\s*(\d+).*Total:\s*(\d+)").expect("progress pattern is valid")
});

/// Stateful interpreter for one session's lines.
#[derive(Debug)]
pub(crate) struct LineParser {
    session: StreamSessionId,
    kind: StreamKind,
    /// Highest percent reported so far.
    high_water: u8,
    last_progress: Option<ProgressEvent>,
}

impl LineParser {
    pub const fn new(session: StreamSessionId, kind: StreamKind) -> Self {
        Self {
            session,
            kind,
            high_water: 0,
            last_progress: None,
        }
    }

    /// Events derived from one body line, `Raw` first.
    pub fn parse(&mut self, line: &str) -> Vec<StreamEvent> {
        let mut events = vec![StreamEvent::raw(self.session, line)];
        let parsed = serde_json::from_str::<Value>(line).ok();
        let object = parsed.as_ref().and_then(Value::as_object);

        match self.kind {
            StreamKind::Pull => {
                let typed = match object {
                    Some(obj) => self.pull_object(obj),
                    None => textual_progress(line).map(|p| self.track(p)),
                };
                events.extend(typed);
            }
            StreamKind::Generate => {
                if let Some(obj) = object {
                    if let Some(text) = obj.get("response").and_then(Value::as_str) {
                        events.push(StreamEvent::token(self.session, text));
                    } else if let Some(message) = error_message(obj) {
                        events.push(StreamEvent::Diagnostic {
                            session: self.session,
                            message,
                        });
                    }
                }
            }
        }
        events
    }

    /// Event emitted when the body closes normally, if the kind has one.
    pub fn finish(&self) -> Option<StreamEvent> {
        match self.kind {
            StreamKind::Pull => Some(StreamEvent::progress(
                self.session,
                ProgressEvent::finished(self.last_progress),
            )),
            StreamKind::Generate => None,
        }
    }

    fn pull_object(&mut self, obj: &Map<String, Value>) -> Option<StreamEvent> {
        let counts = obj
            .get("total")
            .and_then(Value::as_u64)
            .zip(obj.get("completed").and_then(Value::as_u64));
        if let Some((total, completed)) = counts {
            // A zero total carries no progress and is dropped.
            return ProgressEvent::from_counts(completed, total).map(|p| self.track(p));
        }
        if let Some(message) = error_message(obj) {
            return Some(StreamEvent::Diagnostic {
                session: self.session,
                message,
            });
        }
        obj.get("status")
            .and_then(Value::as_str)
            .map(|status| StreamEvent::Status {
                session: self.session,
                status: status.to_string(),
            })
    }

    /// Clamp to the running maximum so percent never goes backwards when
    /// the server starts counting a new layer.
    fn track(&mut self, mut progress: ProgressEvent) -> StreamEvent {
        if progress.percent < self.high_water {
            progress.percent = self.high_water;
        }
        self.high_water = progress.percent;
        self.last_progress = Some(progress);
        StreamEvent::progress(self.session, progress)
    }
}

fn textual_progress(line: &str) -> Option<ProgressEvent> {
    let caps = DOWNLOADED_TOTAL.captures(line)?;
    let completed = caps[1].parse().ok()?;
    let total = caps[2].parse().ok()?;
    ProgressEvent::from_counts(completed, total)
}

fn error_message(obj: &Map<String, Value>) -> Option<String> {
    obj.get("error").map(|e| match e {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}
