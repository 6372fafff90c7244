//! Streamed NDJSON sessions (`/api/pull`, `/api/generate`).
//!
//! Body bytes are framed into lines ([`lines`]), each line is interpreted
//! per protocol shape ([`parse`]) and the resulting events are published by
//! the [`StreamMonitor`] worker.

mod lines;
mod monitor;
mod parse;

pub use monitor::{StreamMonitor, StreamSession};
