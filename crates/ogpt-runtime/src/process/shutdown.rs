//! Graceful shutdown with SIGTERM -> SIGKILL escalation.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;
use tokio::time::timeout;
use tracing::{debug, warn};

#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

/// Gracefully shut down a child process, escalating to a forced kill.
///
/// # Strategy
/// 1. Send SIGTERM and wait up to `grace` for the child to exit
/// 2. If still running, kill it
/// 3. Wait for reaping (required to avoid zombies)
///
/// # Platform behavior
/// - Unix: SIGTERM through `nix`, then SIGKILL via `.kill()`
/// - Windows: immediately calls `.kill()`
pub async fn shutdown_child(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    if let Some(pid) = child.id() {
        if !send_terminate(pid)? {
            return child.wait().await;
        }
    }

    if let Ok(result) = timeout(grace, child.wait()).await {
        return result;
    }

    warn!(pid = ?child.id(), grace_ms = grace.as_millis(), "Grace period elapsed, killing");
    child.kill().await?;
    child.wait().await
}

/// Ask `pid` to terminate.
///
/// Returns `Ok(false)` when the process is already gone (or the platform
/// has no graceful signal), in which case the caller should reap or kill.
#[cfg(unix)]
pub(crate) fn send_terminate(pid: u32) -> io::Result<bool> {
    let raw = i32::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
    match signal::kill(Pid::from_raw(raw), Signal::SIGTERM) {
        Ok(()) => {
            debug!(pid, "Sent SIGTERM");
            Ok(true)
        }
        // Process may have already exited
        Err(nix::errno::Errno::ESRCH) => Ok(false),
        Err(e) => Err(io::Error::other(e)),
    }
}

#[cfg(not(unix))]
pub(crate) fn send_terminate(_pid: u32) -> io::Result<bool> {
    Ok(false)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;
    use tokio::process::Command;
    use tokio::time::sleep;

    #[tokio::test]
    async fn shutdown_responds_to_sigterm() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();

        let started = Instant::now();
        let status = shutdown_child(&mut child, Duration::from_secs(5)).await;
        assert!(status.is_ok());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn shutdown_escalates_when_sigterm_is_ignored() {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg("trap '' TERM; sleep 30")
            .spawn()
            .unwrap();
        // Let the shell install its trap.
        sleep(Duration::from_millis(200)).await;

        let status = shutdown_child(&mut child, Duration::from_millis(300))
            .await
            .unwrap();
        assert!(!status.success());
    }

    #[tokio::test]
    async fn shutdown_handles_already_exited() {
        let mut child = Command::new("true").spawn().unwrap();
        sleep(Duration::from_millis(100)).await;

        let result = shutdown_child(&mut child, Duration::from_secs(1)).await;
        assert!(result.is_ok());
    }
}
