//! Child process supervision.
//!
//! # Structure
//!
//! - `ProcessSupervisor` - role-keyed start/stop, output capture, listing
//! - `ChildProcessHandle` - identity, status snapshots, exit callbacks
//! - `LogSubscription` - lazy per-child log sequence
//! - `shutdown_child` - SIGTERM, bounded wait, SIGKILL

mod command;
mod handle;
pub mod shutdown;
mod stream;
mod supervisor;

pub(crate) use command::display_command;
pub use command::{ensure_executable, resolve_executable};
pub use handle::{ChildProcessHandle, LogSubscription};
pub(crate) use shutdown::send_terminate;
pub use shutdown::shutdown_child;
pub use supervisor::ProcessSupervisor;
