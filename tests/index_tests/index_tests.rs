//! Index Tests
//!
//! Tests for applying records, admission checks, deletes and replay.

use std::path::PathBuf;

use regex::Regex;
use tempfile::TempDir;
use vislog::config::SyncMode;
use vislog::index::{ApplyOutcome, Index};
use vislog::log::{AppendLog, LogKind};
use vislog::record::{
    encode_frame, ConfigEntry, Control, Data, DataEntry, Field, FieldType, Name, Record, Scope,
    Tag,
};
use vislog::VislogError;

// =============================================================================
// Helper Functions
// =============================================================================

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap()
}

fn scope(id: u32, scope: &str) -> Record {
    Record::Scope(Scope::new(id, scope))
}

fn name(id: u32, scope_id: u32, name: &str) -> Record {
    Record::Name(Name {
        name_id: id,
        scope_id,
        name: name.to_string(),
        fields: vec![Field::new("y", FieldType::Float)],
    })
}

fn entry(id: u32, name_id: u32, beg: u64, end: u64) -> Record {
    Record::DataEntry(DataEntry {
        entry_id: id,
        name_id,
        beg_offset: beg,
        end_offset: end,
    })
}

fn config_entry(id: u32, scope_id: u32, beg: u64, end: u64) -> Record {
    Record::ConfigEntry(ConfigEntry {
        entry_id: id,
        scope_id,
        beg_offset: beg,
        end_offset: end,
    })
}

/// run1: loss(2) with entries 3,4 and acc(5) with entry 6; run2: loss(8) with entry 9
fn setup_index() -> Index {
    let mut index = Index::new();
    for record in [
        scope(1, "run1"),
        name(2, 1, "loss"),
        entry(3, 2, 0, 10),
        entry(4, 2, 10, 20),
        name(5, 1, "acc"),
        entry(6, 5, 20, 30),
        scope(7, "run2"),
        name(8, 7, "loss"),
        entry(9, 8, 30, 40),
    ] {
        assert_eq!(index.apply(record).unwrap(), ApplyOutcome::Applied);
    }
    index
}

fn entry_ids(entries: &[DataEntry]) -> Vec<u32> {
    entries.iter().map(|e| e.entry_id).collect()
}

fn write_log(path: &PathBuf, records: &[Record]) {
    let log = AppendLog::open(path, LogKind::Index, SyncMode::Full).unwrap();
    for record in records {
        log.append(&encode_frame(record).unwrap()).unwrap();
    }
}

// =============================================================================
// Apply Tests
// =============================================================================

#[test]
fn test_apply_builds_maps() {
    let index = setup_index();

    assert_eq!(index.scope_count(), 2);
    assert_eq!(index.name_count(), 3);
    assert_eq!(index.entry_count(), 4);
    assert_eq!(index.max_id(), 9);
    assert_eq!(index.high_water(), 40);
    assert_eq!(index.scope(7).unwrap().scope, "run2");
    assert_eq!(index.name(5).unwrap().name, "acc");
    assert_eq!(index.entry(4).unwrap().beg_offset, 10);
    assert_eq!(index.name_ids(&Tag::new("run1", "loss")), &[2]);
    assert!(index.name_ids(&Tag::new("run1", "nope")).is_empty());
}

#[test]
fn test_orphans_are_ignored() {
    let mut index = Index::new();

    assert_eq!(index.apply(name(2, 1, "loss")).unwrap(), ApplyOutcome::Ignored);
    assert_eq!(index.apply(entry(3, 2, 0, 10)).unwrap(), ApplyOutcome::Ignored);
    assert_eq!(index.apply(config_entry(4, 1, 0, 10)).unwrap(), ApplyOutcome::Ignored);

    assert_eq!(index, Index::new());
}

#[test]
fn test_payload_records_are_ignored() {
    let mut index = setup_index();
    let before = index.clone();

    let data = Record::Data(Data {
        entry_id: 50,
        name_id: 2,
        index: 0,
        axes: vec![],
    });
    assert_eq!(index.apply(data).unwrap(), ApplyOutcome::Ignored);
    assert_eq!(index, before);
}

#[test]
fn test_same_tag_twice_keeps_both_names() {
    let mut index = setup_index();
    index.apply(name(10, 1, "loss")).unwrap();

    assert_eq!(index.name_ids(&Tag::new("run1", "loss")), &[2, 10]);
}

// =============================================================================
// Duplicate Key Tests
// =============================================================================

#[test]
fn test_duplicate_scope_is_corruption() {
    let mut index = setup_index();
    let before = index.clone();

    let err = index.apply(scope(1, "other")).unwrap_err();
    assert!(matches!(err, VislogError::Corruption(_)));
    assert_eq!(index, before);
}

#[test]
fn test_duplicate_name_is_corruption() {
    let mut index = setup_index();
    let before = index.clone();

    let err = index.apply(name(2, 7, "other")).unwrap_err();
    assert!(matches!(err, VislogError::Corruption(_)));
    assert_eq!(index, before);
}

#[test]
fn test_duplicate_entries_are_corruption() {
    let mut index = setup_index();
    index.apply(config_entry(11, 1, 40, 50)).unwrap();
    let before = index.clone();

    assert!(matches!(
        index.apply(entry(3, 2, 50, 60)).unwrap_err(),
        VislogError::Corruption(_)
    ));
    assert!(matches!(
        index.apply(config_entry(11, 1, 50, 60)).unwrap_err(),
        VislogError::Corruption(_)
    ));
    assert_eq!(index, before);
}

// =============================================================================
// Delete Tests
// =============================================================================

#[test]
fn test_delete_name_hides_entries() {
    let mut index = setup_index();
    let outcome = index
        .apply(Record::Control(Control::delete_name("run1", "loss")))
        .unwrap();
    assert_eq!(outcome, ApplyOutcome::Applied);

    assert!(index.entry_list(&re("^run1$"), &re("^loss$"), 0).is_empty());
    assert_eq!(entry_ids(&index.entry_list(&re(".*"), &re("loss"), 0)), vec![9]);
    assert!(index.name(2).is_none());
    assert!(index.entry(3).is_none());
    assert!(index.entry(4).is_none());
    assert_eq!(index.entry_count(), 2);
}

#[test]
fn test_delete_unknown_name_is_ignored() {
    let mut index = setup_index();
    let before = index.clone();

    let outcome = index
        .apply(Record::Control(Control::delete_name("run3", "loss")))
        .unwrap();
    assert_eq!(outcome, ApplyOutcome::Ignored);
    assert_eq!(index, before);
}

#[test]
fn test_reregistered_name_starts_empty() {
    let mut index = setup_index();
    index
        .apply(Record::Control(Control::delete_name("run1", "loss")))
        .unwrap();
    index.apply(name(12, 1, "loss")).unwrap();

    assert!(index.entry_list(&re("^run1$"), &re("^loss$"), 0).is_empty());
    assert!(index.names(&re("^run1$"), &re("^loss$")).is_empty());

    index.apply(entry(13, 12, 40, 50)).unwrap();
    assert_eq!(entry_ids(&index.entry_list(&re("^run1$"), &re("^loss$"), 0)), vec![13]);
}

#[test]
fn test_entry_for_deleted_name_is_ignored() {
    let mut index = setup_index();
    index
        .apply(Record::Control(Control::delete_name("run1", "loss")))
        .unwrap();

    assert_eq!(index.apply(entry(14, 2, 40, 50)).unwrap(), ApplyOutcome::Ignored);
}

#[test]
fn test_delete_scope_removes_everything_under_it() {
    let mut index = setup_index();
    index.apply(config_entry(10, 1, 40, 50)).unwrap();
    index.apply(config_entry(11, 7, 50, 60)).unwrap();

    let outcome = index
        .apply(Record::Control(Control::delete_scope("run1")))
        .unwrap();
    assert_eq!(outcome, ApplyOutcome::Applied);

    assert!(index.scope(1).is_none());
    assert!(index.name(2).is_none());
    assert!(index.name(5).is_none());
    assert!(index.config_entry(10).is_none());
    assert!(index.config_entry(11).is_some());
    assert_eq!(entry_ids(&index.entry_list(&re(".*"), &re(".*"), 0)), vec![9]);
    assert!(index.config_entry_list(&re("run1"), 0).is_empty());
    assert_eq!(index.scopes(&re(".*")).len(), 1);
}

#[test]
fn test_max_id_survives_deletes() {
    let mut index = setup_index();
    index
        .apply(Record::Control(Control::delete_scope("run2")))
        .unwrap();

    assert!(index.entry(9).is_none());
    assert_eq!(index.max_id(), 9);
    assert_eq!(index.high_water(), 40);
}

// =============================================================================
// Query Tests
// =============================================================================

#[test]
fn test_entry_list_filters_and_orders() {
    let index = setup_index();

    assert_eq!(entry_ids(&index.entry_list(&re(".*"), &re(".*"), 0)), vec![3, 4, 6, 9]);
    assert_eq!(entry_ids(&index.entry_list(&re("run1"), &re(".*"), 0)), vec![3, 4, 6]);
    assert_eq!(entry_ids(&index.entry_list(&re(".*"), &re("^loss$"), 0)), vec![3, 4, 9]);
    assert_eq!(entry_ids(&index.entry_list(&re(".*"), &re(".*"), 10)), vec![4, 6, 9]);
    assert_eq!(entry_ids(&index.entry_list(&re(".*"), &re(".*"), 39)), vec![9]);
    assert!(index.entry_list(&re(".*"), &re(".*"), 40).is_empty());
}

#[test]
fn test_patterns_are_unanchored() {
    let index = setup_index();
    assert_eq!(entry_ids(&index.entry_list(&re("un"), &re("os"), 0)), vec![3, 4, 9]);
}

#[test]
fn test_scopes_and_names_require_live_children() {
    let mut index = setup_index();
    index.apply(scope(20, "empty")).unwrap();
    index.apply(name(21, 7, "unlogged")).unwrap();

    let scopes: Vec<String> = index.scopes(&re(".*")).into_iter().map(|s| s.scope).collect();
    assert_eq!(scopes, vec!["run1", "run2"]);

    let names: Vec<u32> = index
        .names(&re(".*"), &re(".*"))
        .into_iter()
        .map(|n| n.name_id)
        .collect();
    assert_eq!(names, vec![2, 5, 8]);
}

#[test]
fn test_config_entry_list() {
    let mut index = setup_index();
    index.apply(config_entry(31, 7, 60, 70)).unwrap();
    index.apply(config_entry(30, 1, 50, 60)).unwrap();

    let ids: Vec<u32> = index
        .config_entry_list(&re(".*"), 0)
        .iter()
        .map(|e| e.entry_id)
        .collect();
    assert_eq!(ids, vec![30, 31]);

    let ids: Vec<u32> = index
        .config_entry_list(&re("run2"), 0)
        .iter()
        .map(|e| e.entry_id)
        .collect();
    assert_eq!(ids, vec![31]);
    assert!(index.config_entry_list(&re(".*"), 70).is_empty());
}

// =============================================================================
// Load Tests
// =============================================================================

#[test]
fn test_load_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.idx");
    write_log(
        &path,
        &[
            scope(1, "run1"),
            name(2, 1, "loss"),
            entry(3, 2, 0, 10),
            name(4, 99, "orphan"),
            Record::Control(Control::delete_name("run1", "nothing")),
        ],
    );

    let (first, report) = Index::open(&path).unwrap();
    let (second, again) = Index::open(&path).unwrap();

    assert_eq!(first, second);
    assert_eq!(report, again);
    assert_eq!(report.records_applied, 3);
    assert_eq!(report.records_ignored, 2);
    assert_eq!(report.discarded_bytes, 0);
    assert_eq!(first.max_id(), 3);
}

#[test]
fn test_load_equals_incremental_apply() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.idx");
    let records = vec![
        scope(1, "run1"),
        name(2, 1, "loss"),
        entry(3, 2, 0, 10),
        config_entry(4, 1, 10, 20),
        Record::Control(Control::delete_scope("run1")),
        scope(5, "run1"),
    ];
    write_log(&path, &records);

    let mut incremental = Index::new();
    for record in records {
        incremental.apply(record).unwrap();
    }
    let (loaded, _) = Index::open(&path).unwrap();

    assert_eq!(loaded, incremental);
}

#[test]
fn test_load_reports_torn_tail() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.idx");
    write_log(&path, &[scope(1, "run1"), name(2, 1, "loss")]);
    let valid = std::fs::metadata(&path).unwrap().len();

    let log = AppendLog::open(&path, LogKind::Index, SyncMode::Full).unwrap();
    let frame = encode_frame(&entry(3, 2, 0, 10)).unwrap();
    log.append(&frame[..frame.len() - 2]).unwrap();

    let (index, report) = Index::open(&path).unwrap();
    assert_eq!(index.name_count(), 1);
    assert_eq!(index.entry_count(), 0);
    assert_eq!(report.valid_len, valid);
    assert_eq!(report.discarded_bytes, frame.len() as u64 - 2);
    assert!(report.tail_error.is_some());
    assert!(!report.was_truncated);
}

#[test]
fn test_load_fails_on_duplicate_ids() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.idx");
    write_log(&path, &[scope(1, "run1"), scope(1, "run1-again")]);

    let err = Index::open(&path).unwrap_err();
    assert!(matches!(err, VislogError::Corruption(_)));
}
