//! Core types for the gx-track FM tracker.
//!
//! Defines the pattern grid, the editable field table and the instrument
//! bank. The text format crate produces these types and the playback
//! engine consumes them.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod edit;
mod instrument;
pub mod notation;
mod pattern;

pub use edit::{
    CellField, CursorPos, FieldDescriptor, FieldKind, FieldWidth, COLUMNS_PER_CHANNEL, FIELDS,
    TOTAL_COLUMNS,
};
pub use instrument::{
    power_on_patch, InstrumentBank, Patch, MAX_PATCHES, OPERATORS, OPERATOR_BYTES,
    OPERATOR_GROUPS,
};
pub use pattern::{
    Cell, Effect, Note, Pattern, CELL_BYTES, CHANNELS, EFFECT_SPEED, FM_CHANNELS, NOTE_EMPTY,
    NOTE_MAX, NOTE_OFF, ROWS,
};
