//! CLI bootstrap - the composition root.
//!
//! The only place where the runtime adapters are instantiated:
//! - event broadcaster (shared by every adapter)
//! - process supervisor
//! - interactive session bridge on the configured terminal backend
//! - stream monitor and the tags API client
//!
//! Handlers receive the composed [`CliContext`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ogpt_core::paths::working_dir_for;
use ogpt_core::{ConsoleEventEmitter, Settings, validate_settings};
use ogpt_runtime::{
    ConsoleEventBroadcaster, OllamaApiClient, ProcessSupervisor, PtyBridge, StreamMonitor,
    backend_for,
};
use tracing::debug;

use crate::error::CliError;
use crate::parser::Cli;

/// Defaults, then the settings file, then flags and environment.
pub fn resolve_settings(cli: &Cli) -> Result<Settings, CliError> {
    let mut settings = Settings::with_defaults();
    if let Some(path) = cli.config.as_deref() {
        settings = settings.overlay(Settings::load(path)?);
    }
    Ok(settings.overlay(cli.flag_settings()))
}

/// Fully composed context for command handlers.
pub struct CliContext {
    pub settings: Settings,
    pub events: ConsoleEventBroadcaster,
    pub supervisor: Arc<ProcessSupervisor>,
    pub pty: Arc<PtyBridge>,
    pub streams: Arc<StreamMonitor>,
    pub api: OllamaApiClient,
}

impl CliContext {
    /// Path of the supervised binary.
    pub fn binary(&self) -> Result<PathBuf, CliError> {
        self.settings.effective_binary().ok_or_else(|| {
            CliError::Config("no binary configured: pass --source-dir or --binary".to_string())
        })
    }

    /// Source checkout, required by the compile command.
    pub fn source_dir(&self) -> Result<&Path, CliError> {
        self.settings
            .source_dir
            .as_deref()
            .ok_or_else(|| CliError::Config("no source directory configured: pass --source-dir".to_string()))
    }

    /// Working directory for launching `binary`.
    pub fn working_dir(&self, binary: &Path) -> PathBuf {
        self.settings
            .source_dir
            .clone()
            .unwrap_or_else(|| working_dir_for(binary))
    }

    /// Stop every child, close the interactive session and cancel streams.
    pub async fn shutdown(&self) {
        let grace = self.settings.effective_stop_grace();
        self.streams.cancel_all().await;
        self.pty.close(grace).await;
        self.supervisor.stop_all(grace).await;
        debug!("Shutdown complete");
    }
}

/// Validate `settings` and compose the adapters.
pub fn bootstrap(settings: Settings) -> Result<CliContext, CliError> {
    validate_settings(&settings)?;

    let events = ConsoleEventBroadcaster::new();
    let emitter: Arc<dyn ConsoleEventEmitter> = Arc::new(events.clone());

    let supervisor = Arc::new(ProcessSupervisor::new(
        emitter.clone(),
        settings.effective_start_timeout(),
    ));
    let pty = Arc::new(PtyBridge::new(
        backend_for(settings.effective_pty_backend()),
        emitter.clone(),
    ));
    let streams = Arc::new(StreamMonitor::new(emitter));
    let api = OllamaApiClient::new(settings.effective_server_url());

    debug!(
        server_url = settings.effective_server_url(),
        pty_backend = ?settings.effective_pty_backend(),
        "CLI context ready"
    );

    Ok(CliContext {
        settings,
        events,
        supervisor,
        pty,
        streams,
        api,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use ogpt_core::PtyBackend;
    use std::io::Write;

    #[test]
    fn flags_override_settings_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"source_dir": "/from/file", "stop_grace_ms": 500, "pty_backend": "pipe"}}"#
        )
        .unwrap();
        let path = file.path().display().to_string();

        let cli = Cli::parse_from(["ogpt", "--config", &path, "--source-dir", "/from/flag", "settings"]);
        let settings = resolve_settings(&cli).unwrap();

        assert_eq!(settings.source_dir, Some(PathBuf::from("/from/flag")));
        assert_eq!(settings.stop_grace_ms, Some(500));
        assert_eq!(settings.effective_pty_backend(), PtyBackend::Pipe);
        assert_eq!(settings.effective_server_url(), ogpt_core::DEFAULT_SERVER_URL);
    }

    #[test]
    fn binary_requires_source_or_override() {
        let ctx = bootstrap(Settings::with_defaults()).unwrap();
        assert!(matches!(ctx.binary(), Err(CliError::Config(_))));

        let settings = Settings {
            source_dir: Some(PathBuf::from("/src/ollama")),
            ..Settings::with_defaults()
        };
        let ctx = bootstrap(settings).unwrap();
        assert_eq!(ctx.binary().unwrap(), ogpt_core::paths::binary_path(Path::new("/src/ollama")));
        assert_eq!(ctx.working_dir(&ctx.binary().unwrap()), PathBuf::from("/src/ollama"));
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let settings = Settings {
            server_url: Some("localhost:11434".into()),
            ..Settings::with_defaults()
        };
        assert!(matches!(bootstrap(settings), Err(CliError::Config(_))));
    }
}
