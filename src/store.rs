//! Store Module
//!
//! The façade that coordinates the two logs, the index and the loader.
//!
//! ## Responsibilities
//! - Open both logs, replay the index log, repair a torn tail
//! - Issue ids from one counter shared by every record kind
//! - Serialize writers and keep the logs and the index consistent
//! - Hand out snapshot-consistent streaming reads

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use bytes::BytesMut;
use parking_lot::{Mutex, MutexGuard, RwLock};
use regex::Regex;

use crate::config::Config;
use crate::error::{Result, VislogError};
use crate::index::{ApplyOutcome, Index, LoadReport};
use crate::loader::{self, CancelToken, LoadStream};
use crate::log::{AppendLog, LogKind, LogReader};
use crate::record::{
    encode_frame, encode_frames, Attributes, ConfigEntry, Control, Data, DataEntry, Name,
    NewData, NewName, Record, Scope, ScopeConfig, Tag,
};

/// Metadata snapshot sent ahead of a streaming read
///
/// `file_offset` is the resume cursor: pass it as `min_offset` on the next
/// call to receive only what was appended since.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordResult {
    pub scopes: BTreeMap<u32, Scope>,
    pub names: BTreeMap<u32, Name>,
    pub file_offset: u64,
}

/// Append-only metric store over `<prefix>.idx` and `<prefix>.log`
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader
///
/// - **Writes**: serialized by the `writer` mutex, held for the whole
///   encode → append → apply span. The index write lock is taken only for
///   the final apply, after the bytes are durable.
/// - **Reads**: take the index read lock just long enough to snapshot the
///   matching entries and metadata; payloads are then streamed from the
///   data log by a loader thread with positioned reads.
///
/// Because bytes are appended before the index learns about them, a reader
/// never receives an entry whose range extends past the data log's length.
pub struct Store {
    config: Config,

    /// Derived state, rebuilt from the index log at open
    index: RwLock<Index>,

    /// Append handles and the id counter (exclusive access needed);
    /// `None` for a read-only store
    writer: Option<Mutex<Writer>>,

    /// Shared positioned-read handle on the data log
    data_reader: Arc<LogReader>,

    /// What happened while replaying the index log
    load_report: LoadReport,
}

/// State only a writer may touch
struct Writer {
    index_log: AppendLog,
    data_log: AppendLog,

    /// Last id handed out; the next one is `last_id + 1`
    last_id: u32,
}

impl Writer {
    fn issue_id(&mut self) -> Result<u32> {
        let id = self
            .last_id
            .checked_add(1)
            .ok_or(VislogError::IdsExhausted)?;
        self.last_id = id;
        Ok(id)
    }
}

impl Store {
    /// Open or create a store with the given config
    ///
    /// On startup:
    /// 1. Create the parent directory and files (if allowed)
    /// 2. Replay the index log
    /// 3. Cut a torn tail off the index log (if enabled)
    /// 4. Seed the id counter from the largest id ever applied
    ///
    /// Tail repair assumes no other process is appending to the index log
    /// while the store opens.
    ///
    /// With `read_only` set, nothing is created, locked or truncated: both
    /// files must already exist and a torn tail is only reported.
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let index_path = config.index_path();
        let data_path = config.data_path();

        // Step 1: Files
        if config.create_if_missing && !config.read_only {
            if let Some(parent) = index_path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
        } else {
            for path in [&index_path, &data_path] {
                if !path.exists() {
                    return Err(VislogError::Config(format!(
                        "log file {} does not exist",
                        path.display()
                    )));
                }
            }
        }

        let logs = if config.read_only {
            None
        } else {
            Some((
                AppendLog::open(&index_path, LogKind::Index, config.sync_mode)?,
                AppendLog::open(&data_path, LogKind::Data, config.sync_mode)?,
            ))
        };
        let data_reader = Arc::new(LogReader::open(&data_path, LogKind::Data)?);

        // Step 2: Replay
        let (index, mut load_report) = Index::open(&index_path)?;

        // Step 3: Torn tail
        if load_report.discarded_bytes > 0 {
            match &logs {
                Some((index_log, _)) if config.repair_torn_tail => {
                    let removed = index_log.truncate(load_report.valid_len)?;
                    load_report.was_truncated = removed > 0;
                    tracing::warn!(
                        "Truncated {} torn bytes from {}",
                        removed,
                        index_path.display()
                    );
                }
                _ => {
                    tracing::warn!(
                        "Index log {} has {} torn bytes past offset {}; left in place",
                        index_path.display(),
                        load_report.discarded_bytes,
                        load_report.valid_len
                    );
                }
            }
        }

        let data_len = data_reader.len()?;
        if index.high_water() > data_len {
            tracing::warn!(
                "Index references data up to offset {} but the data log is {} bytes",
                index.high_water(),
                data_len
            );
        }

        // Step 4: Id counter
        let last_id = index.max_id();

        tracing::info!(
            "Opened store {}{}: {} scopes, {} names, {} entries, {} config entries, \
             {} records applied, {} ignored, max id {}, data log {} bytes",
            config.path_prefix.display(),
            if logs.is_none() { " (read-only)" } else { "" },
            index.scope_count(),
            index.name_count(),
            index.entry_count(),
            index.config_entry_count(),
            load_report.records_applied,
            load_report.records_ignored,
            last_id,
            data_len
        );

        Ok(Self {
            config,
            index: RwLock::new(index),
            writer: logs.map(|(index_log, data_log)| {
                Mutex::new(Writer {
                    index_log,
                    data_log,
                    last_id,
                })
            }),
            data_reader,
            load_report,
        })
    }

    /// Open with a path prefix (convenience method)
    ///
    /// Uses default config with the specified prefix
    pub fn open_path(prefix: &Path) -> Result<Self> {
        Self::open(Config::builder().path_prefix(prefix).build())
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Register a new scope and return its id
    pub fn add_scope(&self, scope: &str) -> Result<u32> {
        let mut writer = self.writer()?;

        let scope_id = writer.issue_id()?;
        let record = Record::Scope(Scope::new(scope_id, scope));
        writer.index_log.append(&encode_frame(&record)?)?;
        self.apply(vec![record])?;

        Ok(scope_id)
    }

    /// Store a configuration payload for `scope_id`
    ///
    /// The attributes go to the data log; the index log gets a
    /// `ConfigEntry` pointing at them. Returns the entry id.
    pub fn add_config(&self, scope_id: u32, attributes: Attributes) -> Result<u32> {
        let mut writer = self.writer()?;

        let entry_id = writer.issue_id()?;
        let payload = Record::Config(ScopeConfig {
            entry_id,
            scope_id,
            attributes,
        });
        let frame = encode_frame(&payload)?;
        let end_offset = writer.data_log.append(&frame)?;

        let entry = Record::ConfigEntry(ConfigEntry {
            entry_id,
            scope_id,
            beg_offset: end_offset - frame.len() as u64,
            end_offset,
        });
        writer.index_log.append(&encode_frame(&entry)?)?;
        self.apply(vec![entry])?;

        Ok(entry_id)
    }

    /// Register a batch of series schemas with one append
    pub fn add_names(&self, names: Vec<NewName>) -> Result<Vec<Name>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let mut writer = self.writer()?;

        let mut created = Vec::with_capacity(names.len());
        for new_name in names {
            created.push(Name {
                name_id: writer.issue_id()?,
                scope_id: new_name.scope_id,
                name: new_name.name,
                fields: new_name.fields,
            });
        }

        let records: Vec<Record> = created.iter().cloned().map(Record::from).collect();
        let mut buf = BytesMut::new();
        encode_frames(&records, &mut buf)?;
        writer.index_log.append(&buf)?;
        self.apply(records)?;

        Ok(created)
    }

    /// Append a batch of data points with one data-log append and one
    /// index-log append
    ///
    /// Every frame's size is recorded while encoding, so each entry's range
    /// can be recovered from the single end offset the append returns.
    pub fn add_datas(&self, datas: Vec<NewData>) -> Result<Vec<DataEntry>> {
        if datas.is_empty() {
            return Ok(Vec::new());
        }

        let mut writer = self.writer()?;

        // Step 1: Issue ids and build payloads
        let mut keys = Vec::with_capacity(datas.len());
        let mut payloads = Vec::with_capacity(datas.len());
        for new_data in datas {
            let entry_id = writer.issue_id()?;
            keys.push((entry_id, new_data.name_id));
            payloads.push(Record::Data(Data {
                entry_id,
                name_id: new_data.name_id,
                index: new_data.index,
                axes: new_data.axes,
            }));
        }

        // Step 2: Encode, remembering each frame's size, and append once
        let mut buf = BytesMut::new();
        let sizes = encode_frames(&payloads, &mut buf)?;
        let end_offset = writer.data_log.append(&buf)?;

        // Step 3: Walk forward from the start of the batch
        let total: u64 = sizes.iter().sum();
        let mut pos = end_offset.checked_sub(total).ok_or_else(|| {
            VislogError::Corruption(format!(
                "append of {} bytes returned end offset {}",
                total, end_offset
            ))
        })?;
        let entries: Vec<DataEntry> = keys
            .into_iter()
            .zip(sizes)
            .map(|((entry_id, name_id), size)| {
                let entry = DataEntry {
                    entry_id,
                    name_id,
                    beg_offset: pos,
                    end_offset: pos + size,
                };
                pos += size;
                entry
            })
            .collect();

        // Step 4: Index the ranges
        let records: Vec<Record> = entries.iter().copied().map(Record::from).collect();
        buf.clear();
        encode_frames(&records, &mut buf)?;
        writer.index_log.append(&buf)?;
        self.apply(records)?;

        Ok(entries)
    }

    /// Logically delete `(scope, name)` for every name in `names`
    pub fn delete_scope_names<S: AsRef<str>>(&self, scope: &str, names: &[S]) -> Result<()> {
        let controls = names
            .iter()
            .map(|name| Record::Control(Control::delete_name(scope, name.as_ref())))
            .collect();
        self.append_controls(controls)
    }

    /// Logically delete every scope called `scope`, with its names, entries
    /// and configs
    pub fn delete_scope(&self, scope: &str) -> Result<()> {
        self.append_controls(vec![Record::Control(Control::delete_scope(scope))])
    }

    fn append_controls(&self, controls: Vec<Record>) -> Result<()> {
        if controls.is_empty() {
            return Ok(());
        }

        let writer = self.writer()?;

        let mut buf = BytesMut::new();
        encode_frames(&controls, &mut buf)?;
        writer.index_log.append(&buf)?;
        self.apply(controls)
    }

    fn writer(&self) -> Result<MutexGuard<'_, Writer>> {
        self.writer
            .as_ref()
            .map(Mutex::lock)
            .ok_or(VislogError::ReadOnly)
    }

    /// Apply records that are already durable in the index log
    ///
    /// Callers hold the writer mutex.
    fn apply(&self, records: Vec<Record>) -> Result<()> {
        let mut index = self.index.write();
        for record in records {
            let kind = record.kind();
            if index.apply(record)? == ApplyOutcome::Ignored {
                tracing::debug!("Appended {} record had no effect on the index", kind);
            }
        }
        Ok(())
    }

    // =========================================================================
    // Streaming Reads
    // =========================================================================

    /// Stream every `Data` whose scope and name match and whose entry ends
    /// past `min_offset`
    ///
    /// The metadata and the entry list come from one index snapshot.
    pub fn get_data(
        &self,
        scope_pat: &Regex,
        name_pat: &Regex,
        min_offset: u64,
        cancel: &CancelToken,
    ) -> Result<(RecordResult, LoadStream<Data>)> {
        let (result, entries) = {
            let index = self.index.read();
            let entries = index.entry_list(scope_pat, name_pat, min_offset);
            let result = RecordResult {
                scopes: by_id(index.scopes(scope_pat), |scope| scope.scope_id),
                names: by_id(index.names(scope_pat, name_pat), |name| name.name_id),
                file_offset: index.high_water().max(min_offset),
            };
            (result, entries)
        };

        tracing::debug!(
            "get_data({}, {}, {}): {} entries",
            scope_pat,
            name_pat,
            min_offset,
            entries.len()
        );

        let stream = loader::load_messages(
            Arc::clone(&self.data_reader),
            entries,
            cancel.clone(),
            self.config.stream_buffer,
        )?;
        Ok((result, stream))
    }

    /// Stream every `ScopeConfig` whose scope matches and whose entry ends
    /// past `min_offset`
    ///
    /// The metadata holds the scopes owning the returned configs; `names`
    /// is left empty.
    pub fn get_configs(
        &self,
        scope_pat: &Regex,
        min_offset: u64,
        cancel: &CancelToken,
    ) -> Result<(RecordResult, LoadStream<ScopeConfig>)> {
        let (result, entries) = {
            let index = self.index.read();
            let entries = index.config_entry_list(scope_pat, min_offset);
            let scopes = entries
                .iter()
                .filter_map(|entry| index.scope(entry.scope_id))
                .map(|scope| (scope.scope_id, scope.clone()))
                .collect();
            let result = RecordResult {
                scopes,
                names: BTreeMap::new(),
                file_offset: index.high_water().max(min_offset),
            };
            (result, entries)
        };

        tracing::debug!(
            "get_configs({}, {}): {} entries",
            scope_pat,
            min_offset,
            entries.len()
        );

        let stream = loader::load_messages(
            Arc::clone(&self.data_reader),
            entries,
            cancel.clone(),
            self.config.stream_buffer,
        )?;
        Ok((result, stream))
    }

    // =========================================================================
    // Index Pass-throughs
    // =========================================================================

    /// Largest id ever issued or replayed
    pub fn max_id(&self) -> u32 {
        self.index.read().max_id()
    }

    /// Scopes matching `scope_pat` that own at least one live name
    pub fn scopes(&self, scope_pat: &Regex) -> Vec<Scope> {
        self.index.read().scopes(scope_pat)
    }

    /// Names matching both patterns that own at least one live entry
    pub fn names(&self, scope_pat: &Regex, name_pat: &Regex) -> Vec<Name> {
        self.index.read().names(scope_pat, name_pat)
    }

    /// Distinct scope strings among `scopes(scope_pat)`
    pub fn scope_names(&self, scope_pat: &Regex) -> Vec<String> {
        let mut scopes: Vec<String> = self
            .scopes(scope_pat)
            .into_iter()
            .map(|scope| scope.scope)
            .collect();
        scopes.sort();
        scopes.dedup();
        scopes
    }

    /// Distinct `(scope, name)` pairs among `names(scope_pat, name_pat)`
    pub fn tags(&self, scope_pat: &Regex, name_pat: &Regex) -> Vec<Tag> {
        let index = self.index.read();
        let mut tags: Vec<Tag> = index
            .names(scope_pat, name_pat)
            .into_iter()
            .filter_map(|name| {
                index
                    .scope(name.scope_id)
                    .map(|scope| Tag::new(scope.scope.clone(), name.name))
            })
            .collect();
        tags.sort();
        tags.dedup();
        tags
    }

    /// Largest data-log offset the index knows about
    pub fn high_water(&self) -> u64 {
        self.index.read().high_water()
    }

    /// Index statistics from open
    pub fn load_report(&self) -> &LoadReport {
        &self.load_report
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run `f` against a consistent view of the index
    pub fn with_index<T>(&self, f: impl FnOnce(&Index) -> T) -> T {
        f(&*self.index.read())
    }
}

fn by_id<T>(items: Vec<T>, id: impl Fn(&T) -> u32) -> BTreeMap<u32, T> {
    items.into_iter().map(|item| (id(&item), item)).collect()
}
