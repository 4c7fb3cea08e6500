//! Loader Module
//!
//! Streams payload records for a list of index entries out of the data log.
//!
//! ## Responsibilities
//! - Sort entries by `beg_offset`, so output is in non-decreasing offset order
//! - Read each entry's exact byte range and decode it as one frame
//! - Feed a bounded channel from a background thread (backpressure)
//! - Stop on cancellation or on the first read/decode failure
//!
//! ## Channels
//! ```text
//!  loader thread ──▶ records: bounded(capacity)  ──▶ consumer
//!                └─▶ errors:  bounded(1)         ──▶ consumer
//! ```
//! Both channels close when the thread exits. At most one error is sent, and
//! it is sent before the records channel closes, so a consumer that drains
//! `records` and then reads `errors` sees the terminal state.

mod cancel;

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};

use crate::error::{Result, VislogError};
use crate::log::LogReader;
use crate::record::{decode_payload, Extent, Payload, FRAME_HEADER_SIZE, MAX_FRAME_SIZE};

/// Largest byte range that can hold one frame
const MAX_RANGE: u64 = FRAME_HEADER_SIZE as u64 + MAX_FRAME_SIZE as u64;

pub use cancel::CancelToken;

/// Start streaming the payloads behind `entries`
///
/// Returns immediately; records arrive on the stream as the background
/// thread reads them.
pub fn load_messages<E, M>(
    reader: Arc<LogReader>,
    mut entries: Vec<E>,
    cancel: CancelToken,
    capacity: usize,
) -> Result<LoadStream<M>>
where
    E: Extent + Send + 'static,
    M: Payload,
{
    entries.sort_by_key(|entry| entry.beg_offset());

    let (records_tx, records_rx) = channel::bounded(capacity.max(1));
    let (errors_tx, errors_rx) = channel::bounded(1);

    let worker = thread::Builder::new()
        .name("vislog-loader".to_string())
        .spawn(move || {
            if let Err(e) = run_loader(&reader, &entries, &cancel, &records_tx) {
                tracing::debug!("Loader stopped: {}", e);
                let _ = errors_tx.send(e);
            }
        })?;

    Ok(LoadStream {
        records: records_rx,
        errors: errors_rx,
        worker: Some(worker),
        finished: false,
    })
}

/// Loader body: one entry at a time, fail fast
fn run_loader<E: Extent, M: Payload>(
    reader: &LogReader,
    entries: &[E],
    cancel: &CancelToken,
    out: &Sender<M>,
) -> Result<()> {
    for entry in entries {
        if cancel.is_cancelled() {
            return Err(VislogError::Cancelled);
        }

        let (beg, end) = (entry.beg_offset(), entry.end_offset());
        if end < beg {
            return Err(VislogError::Range { beg, end });
        }
        if end - beg > MAX_RANGE {
            return Err(VislogError::Codec(format!(
                "{} record at [{}, {}): range exceeds maximum frame size {}",
                M::KIND,
                beg,
                end,
                MAX_RANGE
            )));
        }

        let bytes = reader.read_range(beg, end)?;
        let message = decode_payload::<M>(&bytes).map_err(|e| match e {
            VislogError::Io(_) => e,
            other => VislogError::Codec(format!(
                "{} record at [{}, {}): {}",
                M::KIND,
                beg,
                end,
                other
            )),
        })?;

        crossbeam::select! {
            send(out, message) -> res => {
                if res.is_err() {
                    // Consumer hung up; nobody is left to report to.
                    return Ok(());
                }
            }
            recv(cancel.signal()) -> _ => return Err(VislogError::Cancelled),
        }
    }

    Ok(())
}

/// Consumer side of a running load
///
/// Use `records()`/`errors()` directly, or iterate: the iterator yields every
/// record, then the terminal error (if any), then ends. A loader thread that
/// panics ends the iteration with `VislogError::LoaderPanicked`.
pub struct LoadStream<M> {
    records: Receiver<M>,
    errors: Receiver<VislogError>,
    worker: Option<JoinHandle<()>>,
    finished: bool,
}

impl<M> LoadStream<M> {
    /// Decoded payloads, in offset order
    pub fn records(&self) -> &Receiver<M> {
        &self.records
    }

    /// At most one terminal error
    pub fn errors(&self) -> &Receiver<VislogError> {
        &self.errors
    }

    /// Drain the stream, failing on the terminal error
    ///
    /// On failure the records received so far are discarded; use the
    /// iterator to keep a partial result.
    pub fn collect_all(self) -> Result<Vec<M>> {
        self.collect()
    }

    fn join_worker(&mut self) -> Result<()> {
        match self.worker.take().map(|worker| worker.join()) {
            Some(Err(_)) => {
                tracing::error!("Loader thread panicked");
                Err(VislogError::LoaderPanicked)
            }
            _ => Ok(()),
        }
    }
}

impl<M> Iterator for LoadStream<M> {
    type Item = Result<M>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.records.recv() {
            Ok(message) => Some(Ok(message)),
            Err(_) => {
                self.finished = true;
                let joined = self.join_worker();
                match self.errors.try_recv() {
                    Ok(e) => Some(Err(e)),
                    Err(_) => joined.err().map(Err),
                }
            }
        }
    }
}
