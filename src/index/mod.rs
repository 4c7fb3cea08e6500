//! Index Module
//!
//! In-memory index rebuilt from the index log.
//!
//! ## Responsibilities
//! - Replay the index log at startup (a deterministic fold over its frames)
//! - Apply each new record as the store appends it
//! - Answer "which entries match these scope/name patterns past offset X"
//! - Track the largest id ever issued and the data-log high-water mark
//!
//! ## Foreign Keys
//! ```text
//! Name.scope_id        -> Scope
//! DataEntry.name_id    -> Name
//! ConfigEntry.scope_id -> Scope
//! ```
//! Records whose parent is unknown are dropped, not rejected: a client that
//! crashed halfway through a write must not poison the whole index.
//!
//! ## Data Structure Choice
//! BTreeMaps keyed by id for the primary maps (ordered, deterministic
//! iteration), HashMaps for the auxiliary tag/name/scope lookups.

mod query;
mod table;

pub use table::Index;

/// What `Index::apply` did with a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The record changed the index
    Applied,

    /// The record was dropped: unknown parent, unknown delete target, or a
    /// payload record that does not belong in the index log
    Ignored,
}

/// Statistics from replaying the index log
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Records that changed the index
    pub records_applied: u64,

    /// Records dropped by admission checks
    pub records_ignored: u64,

    /// Offset just past the last decodable frame
    pub valid_len: u64,

    /// Undecodable bytes found after `valid_len`
    pub discarded_bytes: u64,

    /// Whether the torn tail was cut off the file
    pub was_truncated: bool,

    /// Decode error that ended the replay early, if any
    pub tail_error: Option<String>,
}
