//! Error taxonomy of the supervision layer.
//!
//! Control operations (`start`, `open`, `send`, ...) return these to the
//! caller. Background workers never return them; they surface failures as
//! a single terminal event instead.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::domain::Role;

/// Failure to launch a supervised child.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SpawnError {
    /// The command path does not exist (or a bare name is not on `PATH`).
    #[error("executable not found: {path}")]
    NotFound { path: PathBuf },

    /// The OS refused to execute the command.
    #[error("failed to execute {path}: {reason}")]
    ExecFailed { path: PathBuf, reason: String },

    /// The OS did not confirm the launch within the bounded wait.
    #[error("{path} did not start within {}ms", .timeout.as_millis())]
    StartTimeout { path: PathBuf, timeout: Duration },

    /// A process for this role is already live.
    #[error("a {role} process is already running")]
    AlreadyRunning { role: Role },
}

/// Failure of the interactive pseudo-terminal bridge.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PtyError {
    #[error("failed to allocate a pseudo-terminal: {0}")]
    AllocFailed(String),

    #[error("failed to spawn interactive process: {0}")]
    SpawnFailed(String),

    /// No session is open, or its child has already exited.
    #[error("interactive process is not running")]
    NotRunning,

    #[error("failed to write to interactive process: {0}")]
    WriteFailed(String),

    /// A session is still open; close it first.
    #[error("an interactive session is already open")]
    AlreadyOpen,
}

/// Failure of a streamed HTTP session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StreamError {
    #[error("failed to connect: {0}")]
    ConnectFailed(String),

    #[error("no data received for {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("stream closed unexpectedly: {0}")]
    UnexpectedClose(String),

    /// Server answered with a non-success status.
    #[error("server returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },
}

/// Failure of the model listing (textual or API).
#[derive(Debug, Error)]
pub enum ListError {
    #[error(transparent)]
    Spawn(#[from] SpawnError),

    /// `<binary> list` exited unsuccessfully (`None` = killed by a signal).
    #[error("list command failed (exit code {code:?})")]
    Exited { code: Option<i32> },

    /// `GET /api/tags` failed.
    #[error("model listing request failed: {0}")]
    Api(String),
}

/// Invalid configuration values.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl SettingsError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_readable() {
        let err = SpawnError::StartTimeout {
            path: PathBuf::from("/bin/ollama"),
            timeout: Duration::from_millis(3000),
        };
        assert_eq!(err.to_string(), "/bin/ollama did not start within 3000ms");

        let err = SpawnError::AlreadyRunning { role: Role::Serve };
        assert_eq!(err.to_string(), "a serve process is already running");

        assert_eq!(
            StreamError::Timeout(Duration::from_secs(30)).to_string(),
            "no data received for 30s"
        );
    }

    #[test]
    fn list_error_wraps_spawn_error() {
        let err: ListError = SpawnError::NotFound {
            path: PathBuf::from("x"),
        }
        .into();
        assert!(matches!(err, ListError::Spawn(SpawnError::NotFound { .. })));
    }
}
