//! Event emitter trait for publishing console events.
//!
//! Implementations handle the transport (broadcast channel, logging, ...).

use crate::events::ConsoleEvent;

/// Trait for emitting console events.
///
/// Keeps channel types out of the public API of the supervisor, the pty
/// bridge and the stream monitor.
///
/// # Implementations
///
/// - `NoopEmitter` - for tests and callers that do not listen
/// - `ConsoleEventBroadcaster` in `ogpt-runtime`
pub trait ConsoleEventEmitter: Send + Sync {
    /// Emit an event. Must not block.
    fn emit(&self, event: ConsoleEvent);

    /// Clone this emitter into a boxed trait object.
    fn clone_box(&self) -> Box<dyn ConsoleEventEmitter>;
}

/// Discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopEmitter;

impl NoopEmitter {
    pub const fn new() -> Self {
        Self
    }
}

impl ConsoleEventEmitter for NoopEmitter {
    fn emit(&self, _event: ConsoleEvent) {}

    fn clone_box(&self) -> Box<dyn ConsoleEventEmitter> {
        Box::new(self.clone())
    }
}
