//! Record definitions
//!
//! Every record that can appear in either log, and the `Record` envelope
//! that tags them on disk.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{Result, VislogError};

// =============================================================================
// Index Log Records
// =============================================================================

/// One logical run/session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    pub scope_id: u32,
    pub scope: String,
    /// Unix millis when the scope was created
    pub created_at: u64,
}

impl Scope {
    /// Create a scope stamped with the current time
    pub fn new(scope_id: u32, scope: impl Into<String>) -> Self {
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            scope_id,
            scope: scope.into(),
            created_at,
        }
    }
}

/// Element type of one column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Float,
    Int,
}

/// One named column of a series
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub field_type: FieldType,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }
}

/// Schema of one logged series within a scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Name {
    pub name_id: u32,
    pub scope_id: u32,
    pub name: String,
    pub fields: Vec<Field>,
}

impl Name {
    /// Check that `data` has one axis per field with the field's element type
    pub fn accepts(&self, data: &Data) -> bool {
        data.axes.len() == self.fields.len()
            && self
                .fields
                .iter()
                .zip(&data.axes)
                .all(|(field, axis)| axis.field_type() == field.field_type)
    }
}

/// Logical action carried by a `Control` record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Remove every Name registered under (scope, name), with its entries
    DeleteName,

    /// Remove every Scope called `scope`, with its names, entries and configs
    DeleteScope,
}

/// Logical delete, replayed against the index and never kept as an entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Control {
    pub scope: String,
    pub name: String,
    pub action: Action,
}

impl Control {
    pub fn delete_name(scope: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            name: name.into(),
            action: Action::DeleteName,
        }
    }

    pub fn delete_scope(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            name: String::new(),
            action: Action::DeleteScope,
        }
    }
}

/// Byte range of a `Data` frame in the data log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataEntry {
    pub entry_id: u32,
    pub name_id: u32,
    pub beg_offset: u64,
    pub end_offset: u64,
}

/// Byte range of a `ScopeConfig` frame in the data log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub entry_id: u32,
    pub scope_id: u32,
    pub beg_offset: u64,
    pub end_offset: u64,
}

// =============================================================================
// Data Log Records
// =============================================================================

/// One typed numeric column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Axis {
    Floats(Vec<f32>),
    Ints(Vec<i32>),
}

impl Axis {
    pub fn field_type(&self) -> FieldType {
        match self {
            Axis::Floats(_) => FieldType::Float,
            Axis::Ints(_) => FieldType::Int,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Axis::Floats(v) => v.len(),
            Axis::Ints(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A batch of points for one (scope, name, index) series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Data {
    pub entry_id: u32,
    pub name_id: u32,
    pub index: u32,
    pub axes: Vec<Axis>,
}

/// Free-form attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<AttrValue>),
    Map(BTreeMap<String, AttrValue>),
}

/// Attribute blob attached to a scope
pub type Attributes = BTreeMap<String, AttrValue>;

/// Run configuration / metadata attached to a scope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeConfig {
    pub entry_id: u32,
    pub scope_id: u32,
    pub attributes: Attributes,
}

// =============================================================================
// Envelope
// =============================================================================

/// Tagged union written in every frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Record {
    Scope(Scope),
    Name(Name),
    Control(Control),
    DataEntry(DataEntry),
    ConfigEntry(ConfigEntry),
    Data(Data),
    Config(ScopeConfig),
}

/// Record kind, for logging and error messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Scope,
    Name,
    Control,
    DataEntry,
    ConfigEntry,
    Data,
    Config,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecordKind::Scope => "scope",
            RecordKind::Name => "name",
            RecordKind::Control => "control",
            RecordKind::DataEntry => "data-entry",
            RecordKind::ConfigEntry => "config-entry",
            RecordKind::Data => "data",
            RecordKind::Config => "config",
        };
        f.write_str(s)
    }
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Scope(_) => RecordKind::Scope,
            Record::Name(_) => RecordKind::Name,
            Record::Control(_) => RecordKind::Control,
            Record::DataEntry(_) => RecordKind::DataEntry,
            Record::ConfigEntry(_) => RecordKind::ConfigEntry,
            Record::Data(_) => RecordKind::Data,
            Record::Config(_) => RecordKind::Config,
        }
    }
}

macro_rules! impl_from_record {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Record {
                fn from(value: $ty) -> Self {
                    Record::$variant(value)
                }
            }
        )*
    };
}

impl_from_record! {
    Scope => Scope,
    Name => Name,
    Control => Control,
    DataEntry => DataEntry,
    ConfigEntry => ConfigEntry,
    Data => Data,
    Config => ScopeConfig,
}

// =============================================================================
// Loader Seams
// =============================================================================

/// An index record that points at a byte range in the data log
pub trait Extent {
    fn beg_offset(&self) -> u64;
    fn end_offset(&self) -> u64;
}

impl Extent for DataEntry {
    fn beg_offset(&self) -> u64 {
        self.beg_offset
    }

    fn end_offset(&self) -> u64 {
        self.end_offset
    }
}

impl Extent for ConfigEntry {
    fn beg_offset(&self) -> u64 {
        self.beg_offset
    }

    fn end_offset(&self) -> u64 {
        self.end_offset
    }
}

/// A data-log record that can be pulled back out of its envelope
pub trait Payload: Sized + Send + 'static {
    const KIND: RecordKind;

    fn from_record(record: Record) -> Result<Self>;
}

impl Payload for Data {
    const KIND: RecordKind = RecordKind::Data;

    fn from_record(record: Record) -> Result<Self> {
        match record {
            Record::Data(data) => Ok(data),
            other => Err(VislogError::Codec(format!(
                "expected {} record, found {}",
                Self::KIND,
                other.kind()
            ))),
        }
    }
}

impl Payload for ScopeConfig {
    const KIND: RecordKind = RecordKind::Config;

    fn from_record(record: Record) -> Result<Self> {
        match record {
            Record::Config(config) => Ok(config),
            other => Err(VislogError::Codec(format!(
                "expected {} record, found {}",
                Self::KIND,
                other.kind()
            ))),
        }
    }
}

// =============================================================================
// Facade Inputs
// =============================================================================

/// A (scope, name) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag {
    pub scope: String,
    pub name: String,
}

impl Tag {
    pub fn new(scope: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            name: name.into(),
        }
    }
}

/// A series schema to register; the store issues its `name_id`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewName {
    pub scope_id: u32,
    pub name: String,
    pub fields: Vec<Field>,
}

impl NewName {
    pub fn new(scope_id: u32, name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            scope_id,
            name: name.into(),
            fields,
        }
    }
}

/// A batch of points to append; the store issues its `entry_id`
#[derive(Debug, Clone, PartialEq)]
pub struct NewData {
    pub name_id: u32,
    pub index: u32,
    pub axes: Vec<Axis>,
}

impl NewData {
    pub fn new(name_id: u32, index: u32, axes: Vec<Axis>) -> Self {
        Self {
            name_id,
            index,
            axes,
        }
    }
}
