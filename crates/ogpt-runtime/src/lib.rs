//! Process, pseudo-terminal and stream supervision for ogpt.
//!
//! Adapters behind the ports declared in `ogpt-core`:
//!
//! - [`ProcessSupervisor`] - role-keyed child processes with captured output
//! - [`PtyBridge`] - one interactive session over an [`InteractivePtyPort`](ogpt_core::InteractivePtyPort)
//! - [`StreamMonitor`] - cancellable NDJSON sessions over HTTP
//! - [`ConsoleEventBroadcaster`] - broadcast-channel event bus
//! - [`OllamaApiClient`] - non-streaming `/api/tags` listing
#![deny(unsafe_code)]

mod api;
mod broadcaster;
pub mod process;
pub mod pty;
pub mod stream;

pub use api::{OllamaApiClient, generate_payload, pull_payload};
pub use broadcaster::ConsoleEventBroadcaster;
pub use process::{
    ChildProcessHandle, LogSubscription, ProcessSupervisor, ensure_executable, resolve_executable,
    shutdown_child,
};
pub use pty::{NativePty, PipePty, PtyBridge, PtyOutput, PtySession, backend_for};
pub use stream::{StreamMonitor, StreamSession};

