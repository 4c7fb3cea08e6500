//! Log Scanning
//!
//! Linear scans over a log file, used to rebuild the index at startup and to
//! verify either log offline.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::Result;
use crate::record::{read_frame, Record};

/// Result of a linear scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Number of frames decoded and handed to the visitor
    pub frames_read: u64,

    /// Offset just past the last good frame
    pub valid_len: u64,

    /// File length at the time the scan stopped
    pub file_len: u64,

    /// Why decoding stopped before `file_len`, if it did
    pub tail_error: Option<String>,
}

impl ScanSummary {
    /// True when bytes after `valid_len` could not be decoded
    pub fn is_torn(&self) -> bool {
        self.valid_len < self.file_len
    }

    /// Bytes past the last good frame
    pub fn torn_bytes(&self) -> u64 {
        self.file_len.saturating_sub(self.valid_len)
    }
}

/// Scan every frame of the log at `path`, in file order
///
/// `visit` receives the start offset of each frame and the decoded record.
/// A truncated or malformed frame ends the scan without error; everything
/// from that point on is reported through `ScanSummary::tail_error`. I/O
/// errors and errors returned by `visit` abort the scan.
pub fn scan<F>(path: &Path, mut visit: F) -> Result<ScanSummary>
where
    F: FnMut(u64, Record) -> Result<()>,
{
    let file = File::open(path)?;
    let file_len = file.metadata()?.len();
    let mut reader = BufReader::new(file);

    let mut summary = ScanSummary {
        file_len,
        ..ScanSummary::default()
    };

    loop {
        match read_frame(&mut reader) {
            Ok(Some((record, size))) => {
                tracing::trace!(
                    "Scanned {} frame at {} ({} bytes)",
                    record.kind(),
                    summary.valid_len,
                    size
                );
                visit(summary.valid_len, record)?;
                summary.frames_read += 1;
                summary.valid_len += size as u64;
            }
            Ok(None) => break,
            Err(e) if e.is_codec() => {
                summary.tail_error = Some(e.to_string());
                break;
            }
            Err(e) => return Err(e),
        }
    }

    // The file may have grown while we scanned; bytes appended after the
    // metadata call are not torn.
    summary.file_len = summary.file_len.max(summary.valid_len);
    if summary.tail_error.is_some() {
        tracing::warn!(
            "Log {} is torn at offset {}: {} bytes undecodable ({})",
            path.display(),
            summary.valid_len,
            summary.torn_bytes(),
            summary.tail_error.as_deref().unwrap_or_default()
        );
    }

    Ok(summary)
}
