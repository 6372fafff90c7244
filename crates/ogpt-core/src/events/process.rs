//! Supervised child process events.

use serde::{Deserialize, Serialize};

use crate::domain::{LogLine, ProcessState, Role};

/// Lifecycle and output of a child owned by the process supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProcessEvent {
    /// The OS confirmed the launch; the child is Running.
    Started {
        role: Role,
        #[serde(skip_serializing_if = "Option::is_none")]
        pid: Option<u32>,
        /// Command line, for display only.
        command: String,
    },

    /// The child could not be launched.
    FailedToStart { role: Role, error: String },

    /// One filtered line of stdout or stderr.
    Log { line: LogLine },

    /// A stop was requested; the grace period is running.
    Stopping { role: Role, grace_ms: u64 },

    /// The child reached a terminal state. Emitted exactly once per child.
    Exited {
        role: Role,
        /// `None` when the child was killed by a signal.
        exit_code: Option<i32>,
        state: ProcessState,
    },
}

impl ProcessEvent {
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Started { .. } => "process:started",
            Self::FailedToStart { .. } => "process:failed_to_start",
            Self::Log { .. } => "process:log",
            Self::Stopping { .. } => "process:stopping",
            Self::Exited { .. } => "process:exited",
        }
    }

    /// Role this event belongs to.
    pub const fn role(&self) -> Option<Role> {
        match self {
            Self::Started { role, .. }
            | Self::FailedToStart { role, .. }
            | Self::Stopping { role, .. }
            | Self::Exited { role, .. } => Some(*role),
            Self::Log { line } => match line.source {
                crate::domain::LogSource::Process(role) => Some(role),
                crate::domain::LogSource::Pty => None,
            },
        }
    }
}
