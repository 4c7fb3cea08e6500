//! Tests for Log Scanning and Recovery
//!
//! These tests verify:
//! - Scanning a clean log visits every frame in order
//! - A torn tail (partial write) ends the scan without an error
//! - Garbage after the last good frame is reported, not applied
//! - Truncating to the valid length lets later appends be read again

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use tempfile::TempDir;
use vislog::config::SyncMode;
use vislog::log::{scan, AppendLog, LogKind};
use vislog::record::{encode_frame, Record, Scope};
use vislog::VislogError;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_log() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("test.idx");
    (temp_dir, path)
}

/// Write well-formed scope frames through the appender
fn write_scopes(path: &PathBuf, ids: std::ops::Range<u32>) -> u64 {
    let log = AppendLog::open(path, LogKind::Index, SyncMode::Full).unwrap();
    let mut end = log.len().unwrap();
    for id in ids {
        let frame = encode_frame(&Record::Scope(Scope::new(id, format!("run{}", id)))).unwrap();
        end = log.append(&frame).unwrap();
    }
    end
}

/// Append raw bytes directly (for crafting torn tails)
fn write_raw(path: &PathBuf, bytes: &[u8]) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(bytes).unwrap();
    file.sync_all().unwrap();
}

fn scope_ids(path: &PathBuf) -> Vec<u32> {
    let mut ids = Vec::new();
    scan(path, |_, record| {
        if let Record::Scope(scope) = record {
            ids.push(scope.scope_id);
        }
        Ok(())
    })
    .unwrap();
    ids
}

// =============================================================================
// Clean Log Tests
// =============================================================================

#[test]
fn test_scan_empty_file() {
    let (_temp, path) = setup_temp_log();
    File::create(&path).unwrap();

    let summary = scan(&path, |_, _| Ok(())).unwrap();

    assert_eq!(summary.frames_read, 0);
    assert_eq!(summary.valid_len, 0);
    assert!(!summary.is_torn());
    assert!(summary.tail_error.is_none());
}

#[test]
fn test_scan_visits_frames_in_order_with_offsets() {
    let (_temp, path) = setup_temp_log();
    let end = write_scopes(&path, 1..6);

    let mut offsets = Vec::new();
    let summary = scan(&path, |offset, _| {
        offsets.push(offset);
        Ok(())
    })
    .unwrap();

    assert_eq!(summary.frames_read, 5);
    assert_eq!(summary.valid_len, end);
    assert_eq!(offsets[0], 0);
    assert!(offsets.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(scope_ids(&path), vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_scan_missing_file_is_io_error() {
    let (_temp, path) = setup_temp_log();
    let err = scan(&path, |_, _| Ok(())).unwrap_err();
    assert!(matches!(err, VislogError::Io(_)));
}

#[test]
fn test_visitor_error_aborts_scan() {
    let (_temp, path) = setup_temp_log();
    write_scopes(&path, 1..4);

    let mut seen = 0;
    let err = scan(&path, |_, _| {
        seen += 1;
        if seen == 2 {
            return Err(VislogError::Corruption("stop".to_string()));
        }
        Ok(())
    })
    .unwrap_err();

    assert!(matches!(err, VislogError::Corruption(_)));
    assert_eq!(seen, 2);
}

// =============================================================================
// Torn Tail Tests
// =============================================================================

#[test]
fn test_partial_header_is_torn_tail() {
    let (_temp, path) = setup_temp_log();
    let end = write_scopes(&path, 1..4);
    write_raw(&path, &[7, 0]);

    let summary = scan(&path, |_, _| Ok(())).unwrap();

    assert_eq!(summary.frames_read, 3);
    assert_eq!(summary.valid_len, end);
    assert_eq!(summary.torn_bytes(), 2);
    assert!(summary.tail_error.is_some());
}

#[test]
fn test_partial_payload_is_torn_tail() {
    let (_temp, path) = setup_temp_log();
    let end = write_scopes(&path, 1..3);
    let frame = encode_frame(&Record::Scope(Scope::new(3, "run3"))).unwrap();
    write_raw(&path, &frame[..frame.len() / 2]);

    let summary = scan(&path, |_, _| Ok(())).unwrap();

    assert_eq!(summary.frames_read, 2);
    assert_eq!(summary.valid_len, end);
    assert!(summary.is_torn());
    assert_eq!(scope_ids(&path), vec![1, 2]);
}

#[test]
fn test_garbage_tail_is_not_applied() {
    let (_temp, path) = setup_temp_log();
    write_scopes(&path, 1..3);

    // Declares 4 payload bytes holding an impossible variant tag
    let mut garbage = 4u32.to_le_bytes().to_vec();
    garbage.extend_from_slice(&250u32.to_le_bytes());
    write_raw(&path, &garbage);

    let summary = scan(&path, |_, _| Ok(())).unwrap();
    assert_eq!(summary.frames_read, 2);
    assert_eq!(summary.torn_bytes(), 8);
}

// =============================================================================
// Repair Tests
// =============================================================================

#[test]
fn test_truncate_then_append_is_visible() {
    let (_temp, path) = setup_temp_log();
    write_scopes(&path, 1..3);
    write_raw(&path, &[1, 2, 3]);

    let summary = scan(&path, |_, _| Ok(())).unwrap();
    let log = AppendLog::open(&path, LogKind::Index, SyncMode::Full).unwrap();
    assert_eq!(log.truncate(summary.valid_len).unwrap(), 3);
    assert_eq!(log.truncate(summary.valid_len).unwrap(), 0);
    drop(log);

    write_scopes(&path, 3..5);

    let summary = scan(&path, |_, _| Ok(())).unwrap();
    assert!(!summary.is_torn());
    assert_eq!(scope_ids(&path), vec![1, 2, 3, 4]);
}

#[test]
fn test_without_repair_later_appends_are_hidden() {
    let (_temp, path) = setup_temp_log();
    write_scopes(&path, 1..3);
    write_raw(&path, &[9, 9, 9, 9, 9]);
    write_scopes(&path, 3..5);

    assert_eq!(scope_ids(&path), vec![1, 2]);
}
