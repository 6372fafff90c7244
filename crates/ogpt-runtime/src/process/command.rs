//! Executable resolution and the executable-bit fix.

use std::path::{Path, PathBuf};

use ogpt_core::SpawnError;
use tracing::debug;

/// Resolve `command` to a launchable path.
///
/// A bare name (`make`) is looked up on `PATH`. Anything with a directory
/// component must exist and be a regular file; on Unix a missing execute
/// bit is set before returning.
pub fn resolve_executable(command: &Path) -> Result<PathBuf, SpawnError> {
    if is_bare_name(command) {
        let resolved = which::which(command).map_err(|_| SpawnError::NotFound {
            path: command.to_path_buf(),
        })?;
        debug!(command = %command.display(), resolved = %resolved.display(), "Resolved on PATH");
        return Ok(resolved);
    }

    let metadata = std::fs::metadata(command).map_err(|_| SpawnError::NotFound {
        path: command.to_path_buf(),
    })?;
    if !metadata.is_file() {
        return Err(SpawnError::ExecFailed {
            path: command.to_path_buf(),
            reason: "not a regular file".to_string(),
        });
    }

    ensure_executable(command)?;
    Ok(command.to_path_buf())
}

fn is_bare_name(command: &Path) -> bool {
    command
        .parent()
        .is_some_and(|parent| parent.as_os_str().is_empty())
        && !command.as_os_str().is_empty()
}

/// Make `path` executable (mode `0o755`) when it is not already.
#[cfg(unix)]
pub fn ensure_executable(path: &Path) -> Result<(), SpawnError> {
    use std::os::unix::fs::PermissionsExt;

    let exec_failed = |e: std::io::Error| SpawnError::ExecFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    let mut perms = std::fs::metadata(path).map_err(exec_failed)?.permissions();
    if perms.mode() & 0o111 != 0 {
        return Ok(());
    }

    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms).map_err(exec_failed)?;
    tracing::info!(path = %path.display(), "Set executable permission");
    Ok(())
}

#[cfg(not(unix))]
pub fn ensure_executable(path: &Path) -> Result<(), SpawnError> {
    debug!(path = %path.display(), "No executable bit on this platform");
    Ok(())
}

/// Display form of a command line for events and logs.
pub(crate) fn display_command(command: &Path, args: &[String]) -> String {
    let mut line = command.display().to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn missing_path_is_not_found() {
        let err = resolve_executable(Path::new("/nonexistent/ollama")).unwrap_err();
        assert!(matches!(err, SpawnError::NotFound { .. }));
    }

    #[test]
    fn missing_bare_name_is_not_found() {
        let err = resolve_executable(Path::new("ogpt-no-such-tool-xyz")).unwrap_err();
        assert!(matches!(err, SpawnError::NotFound { .. }));
    }

    #[test]
    fn bare_name_is_resolved_on_path() {
        let path = resolve_executable(Path::new("sh")).unwrap();
        assert!(path.is_absolute());
    }

    #[test]
    fn directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_executable(dir.path()).unwrap_err();
        assert!(matches!(err, SpawnError::ExecFailed { .. }));
    }

    #[test]
    fn execute_bit_is_fixed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ollama");
        std::fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let resolved = resolve_executable(&path).unwrap();
        assert_eq!(resolved, path);
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn command_line_display() {
        let line = display_command(Path::new("/bin/ollama"), &["pull".into(), "llama3".into()]);
        assert_eq!(line, "/bin/ollama pull llama3");
    }
}
