//! Append Log Module
//!
//! The two durable, append-only files behind a store.
//!
//! ## Responsibilities
//! - Append framed records under an exclusive advisory lock, fsync before returning
//! - Return the end offset of every append (the new high-water mark)
//! - Positioned reads of exact byte ranges, safe alongside concurrent appends
//! - Linear scans from offset 0, treating a torn or malformed tail as end-of-log
//!
//! ## Files
//! ```text
//! {prefix}.idx   Scope | Name | Control | DataEntry | ConfigEntry frames
//! {prefix}.log   Data | Config frames
//! ```
//! Bytes are never rewritten. The only mutation besides appends is cutting a
//! torn tail off the index log during recovery.

mod reader;
mod recovery;
mod writer;

use std::fmt;

pub use reader::LogReader;
pub use recovery::{scan, ScanSummary};
pub use writer::AppendLog;

/// Which of the two logs a handle points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    /// Small control/metadata records
    Index,

    /// Bulk payloads
    Data,
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogKind::Index => f.write_str("index"),
            LogKind::Data => f.write_str("data"),
        }
    }
}
