//! Root parser and global options.
//!
//! Every setting can come from a flag, an `OGPT_*` environment variable
//! (including `.env`), a JSON settings file or the built-in default, in
//! that order of precedence.

use std::path::PathBuf;

use clap::Parser;
use ogpt_core::{PtyBackend, Settings};

use crate::commands::Commands;

#[derive(Parser)]
#[command(name = "ogpt")]
#[command(about = "Build, serve and talk to a local ollama checkout")]
#[command(version)]
pub struct Cli {
    /// JSON settings file
    #[arg(long, env = "OGPT_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Source checkout of the ollama binary
    #[arg(long, env = "OGPT_SOURCE_DIR", global = true)]
    pub source_dir: Option<PathBuf>,

    /// Explicit path to the binary (defaults to <source-dir>/ollama)
    #[arg(long, env = "OGPT_BINARY", global = true)]
    pub binary: Option<PathBuf>,

    /// Base URL of the server API
    #[arg(long, env = "OGPT_SERVER_URL", global = true)]
    pub server_url: Option<String>,

    /// Delay between starting the server and listing its models, in ms
    #[arg(long, env = "OGPT_SETTLE_DELAY_MS", global = true)]
    pub settle_delay_ms: Option<u64>,

    /// Grace period before a stopped child is killed, in ms
    #[arg(long, env = "OGPT_STOP_GRACE_MS", global = true)]
    pub stop_grace_ms: Option<u64>,

    /// Idle timeout of streamed responses, in seconds
    #[arg(long, env = "OGPT_STREAM_TIMEOUT_SECS", global = true)]
    pub stream_timeout_secs: Option<u64>,

    /// Terminal backend of interactive sessions: native or pipe
    #[arg(long, env = "OGPT_PTY_BACKEND", global = true)]
    pub pty_backend: Option<PtyBackend>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Settings given on the command line or through the environment.
    pub fn flag_settings(&self) -> Settings {
        Settings {
            source_dir: self.source_dir.clone(),
            binary: self.binary.clone(),
            server_url: self.server_url.clone(),
            settle_delay_ms: self.settle_delay_ms,
            stop_grace_ms: self.stop_grace_ms,
            stream_timeout_secs: self.stream_timeout_secs,
            pty_backend: self.pty_backend,
            ..Settings::default()
        }
    }
}
