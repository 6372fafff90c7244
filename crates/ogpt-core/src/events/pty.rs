//! Interactive pseudo-terminal session events.

use serde::{Deserialize, Serialize};

use crate::domain::{LogLine, LogSource, LogStream};

/// Output and lifecycle of the single interactive session.
///
/// Chunks are emitted in read order. A logical line may be split across
/// several chunks; re-assembly is the subscriber's business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PtyEvent {
    Opened {
        #[serde(skip_serializing_if = "Option::is_none")]
        pid: Option<u32>,
        command: String,
    },

    /// One filtered read from the terminal, tagged with the stream it came
    /// from.
    Chunk { line: LogLine },

    /// The session ended. Emitted exactly once per session.
    Closed { exit_code: Option<i32> },

    /// A reader failed; the session is being torn down.
    Error { error: String },
}

impl PtyEvent {
    pub fn chunk(stream: LogStream, text: impl Into<String>) -> Self {
        Self::Chunk {
            line: LogLine::new(LogSource::Pty, stream, text),
        }
    }

    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Opened { .. } => "pty:opened",
            Self::Chunk { .. } => "pty:chunk",
            Self::Closed { .. } => "pty:closed",
            Self::Error { .. } => "pty:error",
        }
    }
}
