//! Append Log Writer
//!
//! Handles appending frames to a log file.

use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;

use fs2::FileExt;
use parking_lot::Mutex;

use crate::config::SyncMode;
use crate::error::Result;

use super::LogKind;

/// Appends bytes to one log file
///
/// Every append holds an exclusive `flock` on the file for the span of
/// write + fsync + position read, so appenders in other processes never
/// interleave partial frames. `flock` is per open file description, so
/// threads sharing this handle are serialized by `append_lock` first.
pub struct AppendLog {
    /// Write-only, append-mode handle
    file: File,

    /// Serializes appends from threads sharing this handle
    append_lock: Mutex<()>,

    kind: LogKind,

    sync_mode: SyncMode,
}

impl AppendLog {
    /// Open or create a log file for appending
    pub fn open(path: &Path, kind: LogKind, sync_mode: SyncMode) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            file,
            append_lock: Mutex::new(()),
            kind,
            sync_mode,
        })
    }

    /// Append `bytes` and make them durable
    ///
    /// Returns the offset immediately after the written bytes. Because the
    /// lock is held until that offset is read, the appended bytes occupy
    /// exactly `[offset - bytes.len(), offset)`.
    pub fn append(&self, bytes: &[u8]) -> Result<u64> {
        let _guard = self.append_lock.lock();
        let _lock = FileLock::acquire(&self.file)?;
        let mut file = &self.file;

        if bytes.is_empty() {
            return Ok(file.seek(SeekFrom::End(0))?);
        }

        file.write_all(bytes)?;
        match self.sync_mode {
            SyncMode::Full => file.sync_all()?,
            SyncMode::Data => file.sync_data()?,
        }
        let offset = file.stream_position()?;

        tracing::debug!(
            "Appended {} bytes to {} log, end offset {}",
            bytes.len(),
            self.kind,
            offset
        );

        Ok(offset)
    }

    /// Cut the file back to `len` bytes (torn-tail repair)
    ///
    /// Returns the number of bytes removed.
    pub fn truncate(&self, len: u64) -> Result<u64> {
        let _guard = self.append_lock.lock();
        let _lock = FileLock::acquire(&self.file)?;

        let current = self.file.metadata()?.len();
        if current <= len {
            return Ok(0);
        }

        self.file.set_len(len)?;
        self.file.sync_all()?;

        Ok(current - len)
    }

    /// Current file length
    pub fn len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// True when nothing has been appended yet
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn kind(&self) -> LogKind {
        self.kind
    }
}

/// Exclusive advisory lock, released on drop
struct FileLock<'a> {
    file: &'a File,
}

impl<'a> FileLock<'a> {
    fn acquire(file: &'a File) -> io::Result<Self> {
        FileExt::lock_exclusive(file)?;
        Ok(Self { file })
    }
}

impl Drop for FileLock<'_> {
    fn drop(&mut self) {
        let _ = FileExt::unlock(self.file);
    }
}
