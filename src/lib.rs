//! # vislog
//!
//! An append-only log store for streaming metric visualization:
//! - Two durable append-only files (index log + data log) per store
//! - Length-prefixed record frames with torn-tail detection
//! - An in-memory index rebuilt from the index log at startup
//! - Incremental, cancellable streaming reads resumed by byte offset
//! - Single-writer/multi-reader concurrency model
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Store                                 │
//! │      add_scope / add_names / add_datas / get_data ...        │
//! └───────┬──────────────────────┬───────────────────┬──────────┘
//!         │ append               │ apply / snapshot  │ stream
//!         ▼                      ▼                   ▼
//!  ┌─────────────┐        ┌─────────────┐     ┌─────────────┐
//!  │ Append Log  │ replay │    Index    │     │   Loader    │
//!  │ .idx / .log ├───────▶│  (RwLock)   │     │ (thread +   │
//!  └──────┬──────┘        └─────────────┘     │  channel)   │
//!         │                                   └──────┬──────┘
//!         │            positioned reads              │
//!         └◀─────────────────────────────────────────┘
//!                     ┌─────────────┐
//!                     │   Record    │  frames: [len u32][bincode]
//!                     └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod record;
pub mod log;
pub mod index;
pub mod loader;
pub mod store;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, VislogError};
pub use config::{Config, SyncMode};
pub use index::{Index, LoadReport};
pub use loader::{CancelToken, LoadStream};
pub use store::{RecordResult, Store};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of vislog
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
