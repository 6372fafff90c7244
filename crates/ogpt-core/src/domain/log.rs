//! Log lines emitted by supervised processes and the interactive session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::Role;

/// Where a log line originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "role", rename_all = "snake_case")]
pub enum LogSource {
    /// A child owned by the process supervisor.
    Process(Role),
    /// The interactive pty session.
    Pty,
}

impl fmt::Display for LogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Process(role) => write!(f, "{role}"),
            Self::Pty => f.write_str("pty"),
        }
    }
}

/// Which OS stream a line was read from. A pseudo-terminal interleaves
/// both into one `Merged` stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStream {
    Stdout,
    Stderr,
    Merged,
}

impl LogStream {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
            Self::Merged => "merged",
        }
    }
}

/// A single, already filtered, line of output.
///
/// Immutable once emitted; retention is up to the subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub source: LogSource,
    pub stream: LogStream,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl LogLine {
    /// Create a new log line stamped with the current time.
    pub fn new(source: LogSource, stream: LogStream, text: impl Into<String>) -> Self {
        Self {
            source,
            stream,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}
