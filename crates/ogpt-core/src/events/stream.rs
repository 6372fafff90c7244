//! Streamed HTTP session events.

use serde::{Deserialize, Serialize};

use crate::domain::{ProgressEvent, StreamKind, StreamSessionId, TokenEvent};

/// Events of one streaming session.
///
/// Typed events (`Progress`, `Token`) and the `Raw` diagnostic channel are
/// independent. Every session ends with exactly one of `Done`, `Failed` or
/// `Cancelled`, and nothing is emitted for it afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Started {
        session: StreamSessionId,
        kind: StreamKind,
    },

    /// Pull progress; `percent` never decreases within a session.
    Progress {
        session: StreamSessionId,
        #[serde(flatten)]
        progress: ProgressEvent,
        /// `Downloaded: <c> bytes / Total: <t> bytes`
        info: String,
    },

    /// Generated text fragment.
    Token {
        session: StreamSessionId,
        #[serde(flatten)]
        token: TokenEvent,
    },

    /// A body line verbatim. Diagnostic only.
    Raw {
        session: StreamSessionId,
        line: String,
    },

    /// Server-reported phase, e.g. `pulling manifest`.
    Status {
        session: StreamSessionId,
        status: String,
    },

    /// Server-reported error line. Does not end the session.
    Diagnostic {
        session: StreamSessionId,
        message: String,
    },

    /// The body closed normally.
    Done { session: StreamSessionId },

    /// Network failure or idle timeout. Not retried.
    Failed {
        session: StreamSessionId,
        error: String,
    },

    Cancelled { session: StreamSessionId },
}

impl StreamEvent {
    pub fn progress(session: StreamSessionId, progress: ProgressEvent) -> Self {
        Self::Progress {
            session,
            info: progress.info_text(),
            progress,
        }
    }

    pub fn token(session: StreamSessionId, text: impl Into<String>) -> Self {
        Self::Token {
            session,
            token: TokenEvent::new(text),
        }
    }

    pub fn raw(session: StreamSessionId, line: impl Into<String>) -> Self {
        Self::Raw {
            session,
            line: line.into(),
        }
    }

    pub const fn session(&self) -> StreamSessionId {
        match self {
            Self::Started { session, .. }
            | Self::Progress { session, .. }
            | Self::Token { session, .. }
            | Self::Raw { session, .. }
            | Self::Status { session, .. }
            | Self::Diagnostic { session, .. }
            | Self::Done { session }
            | Self::Failed { session, .. }
            | Self::Cancelled { session } => *session,
        }
    }

    /// Whether this is the last event of its session.
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Done { .. } | Self::Failed { .. } | Self::Cancelled { .. }
        )
    }

    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Started { .. } => "stream:started",
            Self::Progress { .. } => "stream:progress",
            Self::Token { .. } => "stream:token",
            Self::Raw { .. } => "stream:raw",
            Self::Status { .. } => "stream:status",
            Self::Diagnostic { .. } => "stream:diagnostic",
            Self::Done { .. } => "stream:done",
            Self::Failed { .. } => "stream:failed",
            Self::Cancelled { .. } => "stream:cancelled",
        }
    }
}
