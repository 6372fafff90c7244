//! CLI error type and exit codes.

use ogpt_core::{ListError, PtyError, SettingsError, SpawnError, StreamError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A supervised process could not be started or failed.
    #[error("Process error: {0}")]
    Process(String),

    /// Interactive session failure.
    #[error("Session error: {0}")]
    Session(String),

    /// Streamed request failure.
    #[error("Request failed: {0}")]
    Stream(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl CliError {
    /// Exit code following sysexits.h where one fits.
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 78,  // EX_CONFIG
            Self::Process(_) => 71, // EX_OSERR
            Self::Session(_) => 1,
            Self::Stream(_) => 69, // EX_UNAVAILABLE
            Self::Io(_) => 74,     // EX_IOERR
        }
    }
}

impl From<SettingsError> for CliError {
    fn from(err: SettingsError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<SpawnError> for CliError {
    fn from(err: SpawnError) -> Self {
        Self::Process(err.to_string())
    }
}

impl From<ListError> for CliError {
    fn from(err: ListError) -> Self {
        match err {
            ListError::Api(msg) => Self::Stream(msg),
            other => Self::Process(other.to_string()),
        }
    }
}

impl From<PtyError> for CliError {
    fn from(err: PtyError) -> Self {
        Self::Session(err.to_string())
    }
}

impl From<StreamError> for CliError {
    fn from(err: StreamError) -> Self {
        Self::Stream(err.to_string())
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn spawn_errors_map_to_process() {
        let err: CliError = SpawnError::NotFound {
            path: PathBuf::from("/x/ollama"),
        }
        .into();
        assert_eq!(err.exit_code(), 71);
        assert!(err.to_string().contains("/x/ollama"));
    }

    #[test]
    fn api_listing_failure_is_unavailable() {
        let err: CliError = ListError::Api("connection refused".into()).into();
        assert_eq!(err.exit_code(), 69);
    }
}
