//! Path conventions for the supervised binary and its build tool.
//!
//! The working directory and executable path are caller-supplied
//! configuration; these helpers only encode the platform naming rules.

use std::path::{Path, PathBuf};

/// File name of the supervised binary on this platform.
pub const fn binary_file_name() -> &'static str {
    if cfg!(windows) { "ollama.exe" } else { "ollama" }
}

/// Default location of the compiled binary inside a source checkout.
pub fn binary_path(source_dir: &Path) -> PathBuf {
    source_dir.join(binary_file_name())
}

/// Build tool used for the compile role.
pub const fn build_tool() -> &'static str {
    if cfg!(windows) { "mingw32-make" } else { "make" }
}

/// Arguments for the build tool (`-C <source_dir>`).
pub fn build_args(source_dir: &Path) -> Vec<String> {
    vec!["-C".to_string(), source_dir.display().to_string()]
}

/// Working directory for a binary: its parent directory, or `.`.
pub fn working_dir_for(binary: &Path) -> PathBuf {
    binary
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}
