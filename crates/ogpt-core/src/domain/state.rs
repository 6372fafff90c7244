//! Process lifecycle state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a supervised child (or pty session).
///
/// Transitions are monotonic along
/// `NotStarted -> Starting -> {Running | FailedToStart} -> {ExitedOk | ExitedError}`.
/// No transition leaves a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    NotStarted,
    Starting,
    Running,
    ExitedOk,
    ExitedError,
    FailedToStart,
}

impl ProcessState {
    /// Whether no further transition is possible.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::ExitedOk | Self::ExitedError | Self::FailedToStart)
    }

    /// Whether a process may currently exist for this state.
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Starting | Self::Running)
    }

    /// Whether `self -> next` is a legal transition.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::NotStarted, Self::Starting)
                | (Self::Starting, Self::Running | Self::FailedToStart)
                | (Self::Running, Self::ExitedOk | Self::ExitedError)
        )
    }

    /// Terminal state for an exit code (`None` means killed by a signal).
    pub const fn from_exit_code(code: Option<i32>) -> Self {
        match code {
            Some(0) => Self::ExitedOk,
            _ => Self::ExitedError,
        }
    }
}

/// Point-in-time snapshot of a supervised process.
///
/// Published as a whole so readers never observe a half-applied transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessStatus {
    pub state: ProcessState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl ProcessStatus {
    /// A status that has not been started yet.
    pub const fn not_started() -> Self {
        Self {
            state: ProcessState::NotStarted,
            pid: None,
            exit_code: None,
            started_at: None,
            ended_at: None,
        }
    }

    /// Apply a transition, returning `false` (and leaving `self` untouched)
    /// when it is not legal from the current state.
    pub fn advance(&mut self, next: ProcessState) -> bool {
        if !self.state.can_transition_to(next) {
            return false;
        }
        let now = Utc::now();
        match next {
            ProcessState::Starting => self.started_at = Some(now),
            s if s.is_terminal() => self.ended_at = Some(now),
            _ => {}
        }
        self.state = next;
        true
    }
}

impl Default for ProcessStatus {
    fn default() -> Self {
        Self::not_started()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_is_monotonic() {
        let mut status = ProcessStatus::not_started();
        assert!(status.advance(ProcessState::Starting));
        assert!(status.started_at.is_some());
        assert!(status.advance(ProcessState::Running));
        assert!(status.advance(ProcessState::ExitedOk));
        assert!(status.ended_at.is_some());
    }

    #[test]
    fn terminal_states_are_sticky() {
        for terminal in [
            ProcessState::ExitedOk,
            ProcessState::ExitedError,
            ProcessState::FailedToStart,
        ] {
            for next in [
                ProcessState::NotStarted,
                ProcessState::Starting,
                ProcessState::Running,
                ProcessState::ExitedOk,
                ProcessState::ExitedError,
                ProcessState::FailedToStart,
            ] {
                assert!(!terminal.can_transition_to(next), "{terminal:?} -> {next:?}");
            }
        }
    }

    #[test]
    fn cannot_skip_starting() {
        let mut status = ProcessStatus::not_started();
        assert!(!status.advance(ProcessState::Running));
        assert_eq!(status.state, ProcessState::NotStarted);
    }

    #[test]
    fn failed_start_never_runs() {
        let mut status = ProcessStatus::not_started();
        status.advance(ProcessState::Starting);
        assert!(status.advance(ProcessState::FailedToStart));
        assert!(!status.advance(ProcessState::Running));
    }

    #[test]
    fn exit_code_mapping() {
        assert_eq!(ProcessState::from_exit_code(Some(0)), ProcessState::ExitedOk);
        assert_eq!(ProcessState::from_exit_code(Some(2)), ProcessState::ExitedError);
        assert_eq!(ProcessState::from_exit_code(None), ProcessState::ExitedError);
    }
}
