//! Interactive terminal sessions.
//!
//! [`PtyBridge`] drives one session through any
//! [`InteractivePtyPort`]. Two backends ship here: [`NativePty`] allocates a
//! real pseudo-terminal, [`PipePty`] falls back to plain pipes.

mod bridge;
mod native;
mod pipe;

use std::sync::Arc;

use ogpt_core::{InteractivePtyPort, PtyBackend};

pub use bridge::{PtyBridge, PtyOutput, PtySession};
pub use native::NativePty;
pub use pipe::PipePty;

/// Port implementation for a configured backend.
pub fn backend_for(backend: PtyBackend) -> Arc<dyn InteractivePtyPort> {
    match backend {
        PtyBackend::Native => Arc::new(NativePty::default()),
        PtyBackend::Pipe => Arc::new(PipePty::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_names() {
        assert_eq!(backend_for(PtyBackend::Native).name(), "native");
        assert_eq!(backend_for(PtyBackend::Pipe).name(), "pipe");
    }
}
