//! Native pseudo-terminal backend (`portable-pty`).

use std::io;
use std::path::Path;

use ogpt_core::{ChildExit, InteractivePtyPort, LogStream, PtyChannels, PtyChild, PtyError};
use portable_pty::{ChildKiller, CommandBuilder, MasterPty, PtySize, native_pty_system};
use tracing::debug;

/// Spawns the child on the slave side of a fresh pseudo-terminal.
#[derive(Debug, Clone, Copy)]
pub struct NativePty {
    size: PtySize,
}

impl NativePty {
    pub const fn new(rows: u16, cols: u16) -> Self {
        Self {
            size: PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            },
        }
    }
}

impl Default for NativePty {
    fn default() -> Self {
        Self::new(24, 120)
    }
}

impl InteractivePtyPort for NativePty {
    fn spawn(
        &self,
        command: &Path,
        args: &[String],
        cwd: Option<&Path>,
    ) -> Result<PtyChannels, PtyError> {
        let pair = native_pty_system()
            .openpty(self.size)
            .map_err(|e| PtyError::AllocFailed(e.to_string()))?;

        let mut cmd = CommandBuilder::new(command);
        cmd.args(args);
        if let Some(dir) = cwd {
            cmd.cwd(dir);
        }

        // On error `pair` is dropped here, closing both ends.
        let mut child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| PtyError::SpawnFailed(e.to_string()))?;

        // The child holds its own copy of the slave.
        drop(pair.slave);

        let io_result = pair
            .master
            .try_clone_reader()
            .and_then(|reader| Ok((reader, pair.master.take_writer()?)));
        let (reader, writer) = match io_result {
            Ok(io) => io,
            Err(e) => {
                discard(&mut *child);
                return Err(PtyError::AllocFailed(e.to_string()));
            }
        };

        debug!(pid = ?child.process_id(), command = %command.display(), "Spawned child on pty");

        Ok(PtyChannels {
            readers: vec![(LogStream::Merged, reader)],
            writer,
            child: Box::new(NativeChild {
                child,
                _master: pair.master,
            }),
        })
    }

    fn name(&self) -> &'static str {
        "native"
    }
}

/// Kill a child that never made it into a session and reap it.
fn discard(child: &mut dyn portable_pty::Child) {
    if let Err(e) = ChildKiller::kill(child) {
        debug!(error = %e, "Kill of abandoned pty child failed");
    }
    if let Err(e) = child.wait() {
        debug!(error = %e, "Reaping abandoned pty child failed");
    }
}

/// Child plus the master end, released together with the session.
struct NativeChild {
    child: Box<dyn portable_pty::Child + Send>,
    _master: Box<dyn MasterPty + Send>,
}

impl PtyChild for NativeChild {
    fn pid(&self) -> Option<u32> {
        self.child.process_id()
    }

    fn try_wait(&mut self) -> io::Result<Option<ChildExit>> {
        Ok(self.child.try_wait()?.map(|status| ChildExit {
            code: i32::try_from(status.exit_code()).ok(),
        }))
    }

    fn kill(&mut self) -> io::Result<()> {
        ChildKiller::kill(&mut *self.child)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    #[test]
    fn discarded_child_leaves_no_zombie() {
        let pair = native_pty_system().openpty(PtySize::default()).unwrap();
        let mut cmd = CommandBuilder::new("sleep");
        cmd.arg("30");
        let mut child = pair.slave.spawn_command(cmd).unwrap();
        let pid = Pid::from_raw(i32::try_from(child.process_id().unwrap()).unwrap());

        discard(&mut *child);

        // A zombie would still accept signal 0.
        assert!(kill(pid, None).is_err());
    }
}
