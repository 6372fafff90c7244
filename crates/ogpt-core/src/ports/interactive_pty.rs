//! Capability for launching a child attached to a terminal-like duplex.
//!
//! Two adapters exist: a native pseudo-terminal and plain process pipes for
//! platforms without one. The bridge contract is identical for both, so the
//! `PtyBridge` only sees this port.

use std::io::{self, Read, Write};
use std::path::Path;

use crate::domain::LogStream;
use crate::error::PtyError;

/// Exit information of an interactive child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildExit {
    /// `None` when the child was killed by a signal.
    pub code: Option<i32>,
}

/// Handle to the spawned interactive child.
pub trait PtyChild: Send {
    /// OS process id, when the backend exposes one.
    fn pid(&self) -> Option<u32>;

    /// Non-blocking exit check. `Ok(None)` while the child is alive.
    fn try_wait(&mut self) -> io::Result<Option<ChildExit>>;

    /// Forceful termination.
    fn kill(&mut self) -> io::Result<()>;
}

/// Everything the bridge needs from a freshly spawned session.
///
/// The slave side (or the child's pipe ends) is already closed in the
/// parent when this is returned.
pub struct PtyChannels {
    /// Output readers with the stream each one carries. One `Merged`
    /// reader for a real terminal, stdout and stderr for the pipe backend.
    pub readers: Vec<(LogStream, Box<dyn Read + Send>)>,
    /// Input writer.
    pub writer: Box<dyn Write + Send>,
    pub child: Box<dyn PtyChild>,
}

impl std::fmt::Debug for PtyChannels {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtyChannels")
            .field("readers", &self.readers.len())
            .field("pid", &self.child.pid())
            .finish_non_exhaustive()
    }
}

/// Spawns interactive children.
///
/// On failure every descriptor allocated during the attempt is released
/// before returning.
pub trait InteractivePtyPort: Send + Sync {
    fn spawn(
        &self,
        command: &Path,
        args: &[String],
        cwd: Option<&Path>,
    ) -> Result<PtyChannels, PtyError>;

    /// Backend name for logs.
    fn name(&self) -> &'static str;
}
