//! Editable cell fields and cursor stepping.
//!
//! Every column the cursor can sit on maps to one `CellField`. The
//! descriptor table says where the field lives inside the packed cell and
//! how far the cursor moves after a value is written.

use crate::pattern::{CHANNELS, ROWS};

/// How a key press on a field should be interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    /// Note name entry (piano keys, note off, clear)
    Pitch,
    /// Plain hex digit
    Nibble,
    /// Hex digit in the volume column
    Volume,
    /// Hex digit selecting the effect type
    Effect,
}

/// Bit width of a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldWidth {
    Byte,
    Nibble,
}

/// Location and cursor behaviour of one editable field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub kind: FieldKind,
    /// Byte offset inside the packed cell
    pub byte: u8,
    /// Left shift of the nibble inside that byte
    pub shift: u8,
    pub width: FieldWidth,
    /// Rows to move after an edit (scaled by the edit step)
    pub row_delta: i8,
    /// Columns to move after an edit
    pub col_delta: i8,
}

/// Which sub-column of a cell the cursor is on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellField {
    Note,
    InstrumentHi,
    InstrumentLo,
    VolumeHi,
    VolumeLo,
    EffectType,
    EffectParamHi,
    EffectParamLo,
}

/// Number of cursor columns per channel.
pub const COLUMNS_PER_CHANNEL: usize = 8;

/// Total cursor columns across the pattern.
pub const TOTAL_COLUMNS: usize = COLUMNS_PER_CHANNEL * CHANNELS;

const fn nib(
    kind: FieldKind,
    byte: u8,
    shift: u8,
    row_delta: i8,
    col_delta: i8,
) -> FieldDescriptor {
    FieldDescriptor {
        kind,
        byte,
        shift,
        width: FieldWidth::Nibble,
        row_delta,
        col_delta,
    }
}

/// Descriptor table, indexed by column within a channel.
pub static FIELDS: [FieldDescriptor; COLUMNS_PER_CHANNEL] = [
    FieldDescriptor {
        kind: FieldKind::Pitch,
        byte: 0,
        shift: 0,
        width: FieldWidth::Byte,
        row_delta: 1,
        col_delta: 0,
    },
    nib(FieldKind::Nibble, 1, 4, 0, 1),
    nib(FieldKind::Nibble, 1, 0, 1, -1),
    nib(FieldKind::Volume, 2, 4, 0, 1),
    nib(FieldKind::Volume, 2, 0, 1, -1),
    nib(FieldKind::Effect, 3, 0, 0, 1),
    nib(FieldKind::Nibble, 4, 4, 0, 1),
    nib(FieldKind::Nibble, 4, 0, 1, -2),
];

impl CellField {
    /// All fields in display order.
    pub const ALL: [CellField; COLUMNS_PER_CHANNEL] = [
        CellField::Note,
        CellField::InstrumentHi,
        CellField::InstrumentLo,
        CellField::VolumeHi,
        CellField::VolumeLo,
        CellField::EffectType,
        CellField::EffectParamHi,
        CellField::EffectParamLo,
    ];

    /// Column of this field within its channel.
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn descriptor(self) -> &'static FieldDescriptor {
        &FIELDS[self as usize]
    }

    pub fn kind(self) -> FieldKind {
        FIELDS[self as usize].kind
    }
}

/// Cursor position as the editor tracks it: a row and a flat column.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CursorPos {
    pub row: usize,
    /// Flat column, `channel * COLUMNS_PER_CHANNEL + field`
    pub column: usize,
}

impl CursorPos {
    pub fn new(row: usize, channel: usize, field: CellField) -> Self {
        Self {
            row: row % ROWS,
            column: (channel % CHANNELS) * COLUMNS_PER_CHANNEL + field.index(),
        }
    }

    pub fn channel(&self) -> usize {
        self.column / COLUMNS_PER_CHANNEL
    }

    pub fn field(&self) -> CellField {
        CellField::ALL[self.column % COLUMNS_PER_CHANNEL]
    }

    /// Apply the current field's post-edit deltas. `step` scales the row
    /// movement (0 keeps the cursor on the row). Both axes wrap.
    pub fn advance(&mut self, step: usize) {
        let desc = self.field().descriptor();
        let cols = TOTAL_COLUMNS as isize;
        let rows = ROWS as isize;

        let column = self.column as isize + desc.col_delta as isize;
        let row = self.row as isize + desc.row_delta as isize * step as isize;

        self.column = column.rem_euclid(cols) as usize;
        self.row = row.rem_euclid(rows) as usize;
    }
}
