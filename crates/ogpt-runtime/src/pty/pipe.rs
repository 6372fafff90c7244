//! Pipe backend for platforms (or tests) without a pseudo-terminal.
//!
//! The child sees plain pipes instead of a terminal, so line editing and
//! prompts may differ, but the bridge contract is unchanged.

use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command, Stdio};

use ogpt_core::{ChildExit, InteractivePtyPort, LogStream, PtyChannels, PtyChild, PtyError};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default)]
pub struct PipePty;

impl PipePty {
    pub const fn new() -> Self {
        Self
    }
}

impl InteractivePtyPort for PipePty {
    fn spawn(
        &self,
        command: &Path,
        args: &[String],
        cwd: Option<&Path>,
    ) -> Result<PtyChannels, PtyError> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| PtyError::SpawnFailed(e.to_string()))?;

        let (Some(stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(PtyError::AllocFailed("child pipes unavailable".to_string()));
        };

        debug!(pid = child.id(), command = %command.display(), "Spawned child on pipes");

        let stdout: Box<dyn Read + Send> = Box::new(stdout);
        let stderr: Box<dyn Read + Send> = Box::new(stderr);
        Ok(PtyChannels {
            readers: vec![(LogStream::Stdout, stdout), (LogStream::Stderr, stderr)],
            writer: Box::new(stdin),
            child: Box::new(PipeChild(child)),
        })
    }

    fn name(&self) -> &'static str {
        "pipe"
    }
}

struct PipeChild(Child);

impl PtyChild for PipeChild {
    fn pid(&self) -> Option<u32> {
        Some(self.0.id())
    }

    fn try_wait(&mut self) -> io::Result<Option<ChildExit>> {
        Ok(self.0.try_wait()?.map(|status| ChildExit {
            code: status.code(),
        }))
    }

    fn kill(&mut self) -> io::Result<()> {
        self.0.kill()
    }
}
