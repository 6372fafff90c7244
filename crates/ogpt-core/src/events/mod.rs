//! Canonical event union for everything the console observes.
//!
//! The supervision layer never touches display state. Workers publish
//! `ConsoleEvent`s through a [`ConsoleEventEmitter`](crate::ports::ConsoleEventEmitter)
//! and the UI (or CLI) subscribes.
//!
//! # Wire Format
//!
//! Events are serialized with a `type` tag; the payload of each family sits
//! under `event` with its own `type` tag:
//!
//! ```json
//! { "type": "stream", "event": { "type": "progress", "session": "...", "percent": 50, ... } }
//! ```

mod process;
mod pty;
mod stream;

use serde::{Deserialize, Serialize};

pub use process::ProcessEvent;
pub use pty::PtyEvent;
pub use stream::StreamEvent;

/// Every event the core can emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConsoleEvent {
    /// Lifecycle and output of supervised children.
    Process { event: ProcessEvent },
    /// Interactive pseudo-terminal session.
    Pty { event: PtyEvent },
    /// Streamed HTTP sessions.
    Stream { event: StreamEvent },
}

impl ConsoleEvent {
    /// Get the event name for wire protocols.
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Process { event } => event.event_name(),
            Self::Pty { event } => event.event_name(),
            Self::Stream { event } => event.event_name(),
        }
    }
}

impl From<ProcessEvent> for ConsoleEvent {
    fn from(event: ProcessEvent) -> Self {
        Self::Process { event }
    }
}

impl From<PtyEvent> for ConsoleEvent {
    fn from(event: PtyEvent) -> Self {
        Self::Pty { event }
    }
}

impl From<StreamEvent> for ConsoleEvent {
    fn from(event: StreamEvent) -> Self {
        Self::Stream { event }
    }
}
