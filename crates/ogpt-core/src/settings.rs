//! Console settings and validation.
//!
//! Every field is optional so that a settings file, environment variables
//! and command-line flags can be layered with [`Settings::overlay`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::domain::{DEFAULT_HEADER_KEYWORD, DEFAULT_NOISE_PREFIX, ListingParser};
use crate::error::SettingsError;
use crate::paths;

/// Default base URL of the supervised server's HTTP API.
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:11434";

/// Bounded wait for the OS to confirm a launch.
pub const DEFAULT_START_TIMEOUT_MS: u64 = 3000;

/// Delay between starting the server and listing its models.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 2000;

/// Grace period between the termination signal and the forced kill.
pub const DEFAULT_STOP_GRACE_MS: u64 = 3000;

/// Idle timeout of a streamed HTTP body (and its connect timeout).
pub const DEFAULT_STREAM_TIMEOUT_SECS: u64 = 30;

/// Which `InteractivePtyPort` implementation backs the interactive session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PtyBackend {
    /// A real pseudo-terminal.
    #[default]
    Native,
    /// Plain stdin/stdout/stderr pipes.
    Pipe,
}

impl std::str::FromStr for PtyBackend {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "native" | "pty" => Ok(Self::Native),
            "pipe" | "pipes" => Ok(Self::Pipe),
            other => Err(SettingsError::invalid(
                "pty_backend",
                format!("expected native or pipe, got {other:?}"),
            )),
        }
    }
}

/// Console settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Source checkout of the supervised binary (also the compile target).
    pub source_dir: Option<PathBuf>,

    /// Explicit path to the binary. Defaults to `<source_dir>/ollama`.
    pub binary: Option<PathBuf>,

    /// Base URL of the server's HTTP API.
    pub server_url: Option<String>,

    pub start_timeout_ms: Option<u64>,

    pub settle_delay_ms: Option<u64>,

    pub stop_grace_ms: Option<u64>,

    pub stream_timeout_secs: Option<u64>,

    /// Header keyword of the `list` table.
    pub list_header_keyword: Option<String>,

    /// Line prefixes of log noise mixed into `list` output.
    pub list_noise_prefixes: Option<Vec<String>>,

    pub pty_backend: Option<PtyBackend>,
}

impl Settings {
    /// Create settings with sensible defaults.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            source_dir: None,
            binary: None,
            server_url: Some(DEFAULT_SERVER_URL.to_string()),
            start_timeout_ms: Some(DEFAULT_START_TIMEOUT_MS),
            settle_delay_ms: Some(DEFAULT_SETTLE_DELAY_MS),
            stop_grace_ms: Some(DEFAULT_STOP_GRACE_MS),
            stream_timeout_secs: Some(DEFAULT_STREAM_TIMEOUT_SECS),
            list_header_keyword: Some(DEFAULT_HEADER_KEYWORD.to_string()),
            list_noise_prefixes: Some(vec![DEFAULT_NOISE_PREFIX.to_string()]),
            pty_backend: Some(PtyBackend::default()),
        }
    }

    /// Load settings from a JSON file. Missing fields stay `None`.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self = serde_json::from_str(&text).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Loaded settings file");
        Ok(settings)
    }

    /// Layer `other` on top of `self`: fields set in `other` win.
    #[must_use]
    pub fn overlay(mut self, other: Self) -> Self {
        macro_rules! take {
            ($($field:ident),* $(,)?) => {
                $( if other.$field.is_some() { self.$field = other.$field; } )*
            };
        }
        take!(
            source_dir,
            binary,
            server_url,
            start_timeout_ms,
            settle_delay_ms,
            stop_grace_ms,
            stream_timeout_secs,
            list_header_keyword,
            list_noise_prefixes,
            pty_backend,
        );
        self
    }

    /// Path of the supervised binary, if one can be derived.
    pub fn effective_binary(&self) -> Option<PathBuf> {
        self.binary
            .clone()
            .or_else(|| self.source_dir.as_deref().map(paths::binary_path))
    }

    pub fn effective_server_url(&self) -> &str {
        self.server_url
            .as_deref()
            .map_or(DEFAULT_SERVER_URL, |url| url.trim_end_matches('/'))
    }

    #[must_use]
    pub fn effective_start_timeout(&self) -> Duration {
        Duration::from_millis(self.start_timeout_ms.unwrap_or(DEFAULT_START_TIMEOUT_MS))
    }

    #[must_use]
    pub fn effective_settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms.unwrap_or(DEFAULT_SETTLE_DELAY_MS))
    }

    #[must_use]
    pub fn effective_stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms.unwrap_or(DEFAULT_STOP_GRACE_MS))
    }

    #[must_use]
    pub fn effective_stream_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_timeout_secs.unwrap_or(DEFAULT_STREAM_TIMEOUT_SECS))
    }

    pub fn effective_pty_backend(&self) -> PtyBackend {
        self.pty_backend.unwrap_or_default()
    }

    /// The `list` parser configured by these settings.
    pub fn listing_parser(&self) -> ListingParser {
        let defaults = ListingParser::default();
        ListingParser::new(
            self.list_header_keyword
                .clone()
                .unwrap_or(defaults.header_keyword),
            self.list_noise_prefixes
                .clone()
                .unwrap_or(defaults.noise_prefixes),
        )
    }
}

/// Validate settings values.
pub fn validate_settings(settings: &Settings) -> Result<(), SettingsError> {
    if let Some(url) = settings.server_url.as_deref() {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(SettingsError::invalid(
                "server_url",
                format!("must start with http:// or https://, got {url:?}"),
            ));
        }
    }

    if let Some(ms) = settings.start_timeout_ms {
        if !(1..=60_000).contains(&ms) {
            return Err(SettingsError::invalid(
                "start_timeout_ms",
                format!("must be between 1 and 60000, got {ms}"),
            ));
        }
    }

    if settings.stop_grace_ms == Some(0) {
        return Err(SettingsError::invalid("stop_grace_ms", "must be positive"));
    }

    if settings.stream_timeout_secs == Some(0) {
        return Err(SettingsError::invalid(
            "stream_timeout_secs",
            "must be positive",
        ));
    }

    if settings
        .list_header_keyword
        .as_ref()
        .is_some_and(|k| k.trim().is_empty())
    {
        return Err(SettingsError::invalid(
            "list_header_keyword",
            "cannot be empty",
        ));
    }

    if settings
        .source_dir
        .as_ref()
        .is_some_and(|p| p.as_os_str().is_empty())
    {
        return Err(SettingsError::invalid("source_dir", "cannot be empty"));
    }

    Ok(())
}
