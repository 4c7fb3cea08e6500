//! Record Module
//!
//! Typed records stored in the two logs and the frame codec that writes them.
//!
//! ## Record Kinds
//! - Index log: `Scope`, `Name`, `Control`, `DataEntry`, `ConfigEntry`
//! - Data log:  `Data`, `ScopeConfig`
//!
//! ## Frame Format
//! ```text
//! ┌──────────┬──────────────────────────────────────────┐
//! │ Len (4)  │  bincode(Record)  (tag u32 + fields)     │
//! └──────────┴──────────────────────────────────────────┘
//! ```
//! Frames are written back to back with no file header or footer. A frame
//! whose declared length runs past the available bytes is a torn write.

mod codec;
mod types;

pub use codec::{
    decode_frame, decode_payload, encode_frame, encode_frames, frame_len, read_frame,
    FRAME_HEADER_SIZE, MAX_FRAME_SIZE,
};
pub use types::{
    Action, AttrValue, Attributes, Axis, Control, Data, DataEntry, ConfigEntry, Extent, Field,
    FieldType, Name, NewData, NewName, Payload, Record, RecordKind, Scope, ScopeConfig, Tag,
};
