//! Core domain types and port definitions for ogpt.
//!
//! This crate holds everything the console's supervision layer shares
//! between adapters: roles and lifecycle states, the event union that the
//! UI subscribes to, the error taxonomy, the output filter and the textual
//! `list` parser. It performs no process or network I/O.
#![deny(unused_crate_dependencies)]

pub mod domain;
pub mod error;
pub mod events;
pub mod filter;
pub mod paths;
pub mod ports;
pub mod settings;

// Re-export commonly used types for convenience
pub use domain::{
    ListingParser, LogLine, LogSource, LogStream, ProcessState, ProcessStatus, ProgressEvent,
    Role, StreamKind, StreamSessionId, TokenEvent,
};
pub use error::{ListError, PtyError, SettingsError, SpawnError, StreamError};
pub use events::{ConsoleEvent, ProcessEvent, PtyEvent, StreamEvent};
pub use filter::strip_output;
pub use ports::{
    ChildExit, ConsoleEventEmitter, InteractivePtyPort, NoopEmitter, PtyChannels, PtyChild,
};
pub use settings::{
    DEFAULT_SERVER_URL, DEFAULT_SETTLE_DELAY_MS, DEFAULT_START_TIMEOUT_MS, DEFAULT_STOP_GRACE_MS,
    DEFAULT_STREAM_TIMEOUT_SECS, PtyBackend, Settings, validate_settings,
};
