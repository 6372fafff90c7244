//! Streaming-session domain types.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Shape of a streamed NDJSON protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    /// `POST /api/pull`: lines carry `total` / `completed` byte counts.
    Pull,
    /// `POST /api/generate`: lines carry a `response` text fragment.
    Generate,
}

impl StreamKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pull => "pull",
            Self::Generate => "generate",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unique identifier of one streaming session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamSessionId(Uuid);

impl StreamSessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for StreamSessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StreamSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Download progress of a pull session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub completed_bytes: u64,
    pub total_bytes: u64,
    /// Whole percent in `0..=100`.
    pub percent: u8,
}

impl ProgressEvent {
    /// Build an event from raw byte counts.
    ///
    /// Returns `None` when `total` is zero; the percentage is floored and
    /// capped at 100.
    pub fn from_counts(completed: u64, total: u64) -> Option<Self> {
        if total == 0 {
            return None;
        }
        let percent = (u128::from(completed) * 100 / u128::from(total)).min(100);
        Some(Self {
            completed_bytes: completed,
            total_bytes: total,
            #[allow(clippy::cast_possible_truncation)]
            percent: percent as u8,
        })
    }

    /// The terminal event emitted when a pull body closes normally.
    pub const fn finished(last: Option<Self>) -> Self {
        match last {
            Some(last) => Self {
                completed_bytes: last.total_bytes,
                total_bytes: last.total_bytes,
                percent: 100,
            },
            None => Self {
                completed_bytes: 0,
                total_bytes: 0,
                percent: 100,
            },
        }
    }

    /// Human readable summary, e.g. `Downloaded: 50 bytes / Total: 100 bytes`.
    pub fn info_text(&self) -> String {
        format!(
            "Downloaded: {} bytes / Total: {} bytes",
            self.completed_bytes, self.total_bytes
        )
    }
}

/// One fragment of generated text. Concatenating all fragments of a session
/// in order reconstructs the full response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEvent {
    pub text: String,
}

impl TokenEvent {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_is_floored() {
        let event = ProgressEvent::from_counts(1, 3).unwrap();
        assert_eq!(event.percent, 33);
        let event = ProgressEvent::from_counts(2, 3).unwrap();
        assert_eq!(event.percent, 66);
    }

    #[test]
    fn zero_total_is_suppressed() {
        assert!(ProgressEvent::from_counts(10, 0).is_none());
    }

    #[test]
    fn overshoot_is_capped() {
        let event = ProgressEvent::from_counts(150, 100).unwrap();
        assert_eq!(event.percent, 100);
    }

    #[test]
    fn huge_counts_do_not_overflow() {
        let event = ProgressEvent::from_counts(u64::MAX / 2, u64::MAX).unwrap();
        assert_eq!(event.percent, 49);
    }

    #[test]
    fn finished_reuses_last_total() {
        let last = ProgressEvent::from_counts(40, 80);
        let done = ProgressEvent::finished(last);
        assert_eq!(done.percent, 100);
        assert_eq!(done.completed_bytes, 80);
        assert_eq!(ProgressEvent::finished(None).percent, 100);
    }

    #[test]
    fn info_text_format() {
        let event = ProgressEvent::from_counts(50, 100).unwrap();
        assert_eq!(event.info_text(), "Downloaded: 50 bytes / Total: 100 bytes");
    }
}
