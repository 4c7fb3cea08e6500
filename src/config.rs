//! Configuration for vislog
//!
//! Centralized configuration with sensible defaults.

use std::ffi::OsString;
use std::path::PathBuf;

use crate::error::{Result, VislogError};

/// Main configuration for a vislog store
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Path prefix for the two log files:
    ///   {prefix}.idx   (index log: scopes, names, controls, entries)
    ///   {prefix}.log   (data log: data and config payloads)
    pub path_prefix: PathBuf,

    /// Create empty log files when they do not exist yet
    pub create_if_missing: bool,

    /// Open without append handles; both files must exist and writes fail
    /// with `VislogError::ReadOnly`
    pub read_only: bool,

    // -------------------------------------------------------------------------
    // Durability Configuration
    // -------------------------------------------------------------------------
    /// How each append is flushed to disk before it is acknowledged
    pub sync_mode: SyncMode,

    /// Truncate a torn index-log tail at open
    pub repair_torn_tail: bool,

    // -------------------------------------------------------------------------
    // Streaming Configuration
    // -------------------------------------------------------------------------
    /// Capacity of the bounded channel between a loader and its consumer
    pub stream_buffer: usize,
}

/// Flush strategy applied after every append.
///
/// Both variants are durable before `append` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// fsync data and metadata (`File::sync_all`)
    Full,

    /// fdatasync, skipping metadata not needed to read the bytes back (`File::sync_data`)
    Data,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path_prefix: PathBuf::from("./vislog_data/store"),
            create_if_missing: true,
            read_only: false,
            sync_mode: SyncMode::Full,
            repair_torn_tail: true,
            stream_buffer: 64,
        }
    }
}

impl Config {
    const INDEX_EXTENSION: &'static str = ".idx";
    const DATA_EXTENSION: &'static str = ".log";

    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Path of the index log (`<prefix>.idx`)
    pub fn index_path(&self) -> PathBuf {
        self.with_suffix(Self::INDEX_EXTENSION)
    }

    /// Path of the data log (`<prefix>.log`)
    pub fn data_path(&self) -> PathBuf {
        self.with_suffix(Self::DATA_EXTENSION)
    }

    /// Check the configuration for values the store cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.path_prefix.as_os_str().is_empty() {
            return Err(VislogError::Config("path prefix is empty".to_string()));
        }
        if self.stream_buffer == 0 {
            return Err(VislogError::Config(
                "stream buffer must hold at least one message".to_string(),
            ));
        }
        Ok(())
    }

    fn with_suffix(&self, suffix: &str) -> PathBuf {
        let mut name: OsString = self.path_prefix.clone().into_os_string();
        name.push(suffix);
        PathBuf::from(name)
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the path prefix shared by the index and data logs
    pub fn path_prefix(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.config.path_prefix = prefix.into();
        self
    }

    /// Create missing log files on open
    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.config.create_if_missing = create;
        self
    }

    /// Open for reading only (no append handles, no repair)
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.config.read_only = read_only;
        self
    }

    /// Set the sync mode used after each append
    pub fn sync_mode(mut self, mode: SyncMode) -> Self {
        self.config.sync_mode = mode;
        self
    }

    /// Truncate a torn index-log tail at open
    pub fn repair_torn_tail(mut self, repair: bool) -> Self {
        self.config.repair_torn_tail = repair;
        self
    }

    /// Set the loader channel capacity (number of in-flight messages)
    pub fn stream_buffer(mut self, capacity: usize) -> Self {
        self.config.stream_buffer = capacity;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
