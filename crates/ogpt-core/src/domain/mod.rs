//! Domain types for the supervision layer.
//!
//! These are pure data types with no infrastructure dependencies.

mod listing;
mod log;
mod role;
mod state;
mod stream;

pub use listing::{DEFAULT_HEADER_KEYWORD, DEFAULT_NOISE_PREFIX, ListingParser};
pub use log::{LogLine, LogSource, LogStream};
pub use role::Role;
pub use state::{ProcessState, ProcessStatus};
pub use stream::{ProgressEvent, StreamKind, StreamSessionId, TokenEvent};
