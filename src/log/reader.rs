//! Append Log Reader
//!
//! Positioned reads from a log file.

use std::fs::File;
use std::path::Path;

use crate::error::{Result, VislogError};

use super::LogKind;

/// Read-only handle on a log file
///
/// Reads are positioned (`pread`), so there is no shared cursor and any
/// number of threads can read through one handle while appends land at
/// higher offsets.
pub struct LogReader {
    file: File,
    kind: LogKind,
}

impl LogReader {
    /// Open a log file for reading
    pub fn open(path: &Path, kind: LogKind) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            file,
            kind,
        })
    }

    /// Read exactly the bytes in `[beg, end)`
    pub fn read_range(&self, beg: u64, end: u64) -> Result<Vec<u8>> {
        if end < beg {
            return Err(VislogError::Range { beg, end });
        }

        let len = usize::try_from(end - beg).map_err(|_| VislogError::Range { beg, end })?;
        let mut buf = vec![0u8; len];
        self.read_exact_at(&mut buf, beg)?;

        tracing::trace!("Read {} bytes at {} from {} log", buf.len(), beg, self.kind);
        Ok(buf)
    }

    /// Current file length
    pub fn len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// True when the file holds no bytes
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    #[cfg(unix)]
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> std::io::Result<()> {
        use std::os::unix::fs::FileExt;
        self.file.read_exact_at(buf, offset)
    }

    #[cfg(windows)]
    fn read_exact_at(&self, mut buf: &mut [u8], mut offset: u64) -> std::io::Result<()> {
        use std::io::{Error, ErrorKind};
        use std::os::windows::fs::FileExt;

        while !buf.is_empty() {
            match self.file.seek_read(buf, offset) {
                Ok(0) => {
                    return Err(Error::new(
                        ErrorKind::UnexpectedEof,
                        "failed to fill whole buffer",
                    ))
                }
                Ok(n) => {
                    buf = &mut buf[n..];
                    offset += n as u64;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}
