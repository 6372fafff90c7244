//! Port definitions (trait abstractions) for the supervision layer.
//!
//! Ports describe what the core needs from the outside world without
//! naming a concrete OS or transport mechanism. Adapters in `ogpt-runtime`
//! implement them.

mod event_emitter;
mod interactive_pty;

pub use event_emitter::{ConsoleEventEmitter, NoopEmitter};
pub use interactive_pty::{ChildExit, InteractivePtyPort, PtyChannels, PtyChild};
