//! Pattern and cell types for the tracker grid.

use alloc::vec::Vec;

use crate::edit::{CellField, FieldWidth};

/// Number of rows in a pattern.
pub const ROWS: usize = 0x40;

/// Number of channels in a pattern.
pub const CHANNELS: usize = 10;

/// Channels backed by an FM voice. The rest are sequencer-only.
pub const FM_CHANNELS: usize = 6;

/// Encoded size of one cell.
pub const CELL_BYTES: usize = 5;

/// Raw note byte for "no note".
pub const NOTE_EMPTY: u8 = 0x00;

/// Raw note byte for an explicit key release.
pub const NOTE_OFF: u8 = 0xff;

/// Highest playable raw note byte (B-7).
pub const NOTE_MAX: u8 = 96;

/// Effect type that sets speed, or stops playback with a zero parameter.
pub const EFFECT_SPEED: u8 = 0xf;

/// Decoded view of a cell's note byte.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Note {
    /// No pitch event this row
    #[default]
    None,
    /// Note on, semitone index (octave * 12 + pitch class)
    On(u8),
    /// Key release
    Off,
}

impl Note {
    /// Create a note from octave and pitch class (0-11).
    pub const fn from_octave_semitone(octave: u8, semitone: u8) -> Self {
        Note::On(octave * 12 + semitone)
    }

    /// Decode a raw note byte.
    pub const fn from_raw(raw: u8) -> Self {
        match raw {
            NOTE_EMPTY => Note::None,
            NOTE_OFF => Note::Off,
            n => Note::On(n - 1),
        }
    }

    /// Encode back to the raw note byte.
    pub const fn to_raw(self) -> u8 {
        match self {
            Note::None => NOTE_EMPTY,
            Note::Off => NOTE_OFF,
            Note::On(n) => n.wrapping_add(1),
        }
    }

    /// Get the octave if this is a note on.
    pub const fn octave(self) -> Option<u8> {
        match self {
            Note::On(n) => Some(n / 12),
            _ => None,
        }
    }

    /// Get the pitch class (0-11) if this is a note on.
    pub const fn semitone(self) -> Option<u8> {
        match self {
            Note::On(n) => Some(n % 12),
            _ => None,
        }
    }
}

/// Effect column contents: a type nibble and a byte parameter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Effect {
    pub kind: u8,
    pub param: u8,
}

impl Effect {
    /// Returns true for the set-speed/stop transport command.
    pub const fn is_speed(&self) -> bool {
        self.kind == EFFECT_SPEED
    }
}

/// A single 5-byte cell in a pattern.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Cell {
    /// Raw note byte (0 = empty, 1..=96 = note on, 0xff = note off)
    pub note: u8,
    /// Instrument number (0 = unchanged, 1.. = bank index)
    pub instrument: u8,
    /// Volume column payload (0 = unused)
    pub volume: u8,
    /// Effect type in the low nibble
    pub effect_hi: u8,
    /// Effect parameter
    pub effect_lo: u8,
}

impl Cell {
    /// Create an empty cell.
    pub const fn empty() -> Self {
        Self {
            note: NOTE_EMPTY,
            instrument: 0,
            volume: 0,
            effect_hi: 0,
            effect_lo: 0,
        }
    }

    /// Rebuild a cell from its packed bytes.
    pub const fn from_bytes(b: [u8; CELL_BYTES]) -> Self {
        Self {
            note: b[0],
            instrument: b[1],
            volume: b[2],
            effect_hi: b[3],
            effect_lo: b[4],
        }
    }

    /// The packed byte layout used by the field descriptors.
    pub const fn to_bytes(&self) -> [u8; CELL_BYTES] {
        [self.note, self.instrument, self.volume, self.effect_hi, self.effect_lo]
    }

    /// Decoded note.
    pub const fn note(&self) -> Note {
        Note::from_raw(self.note)
    }

    /// Decoded effect column.
    pub const fn effect(&self) -> Effect {
        Effect {
            kind: self.effect_hi & 0x0f,
            param: self.effect_lo,
        }
    }

    /// Returns true if the cell is completely empty.
    pub fn is_empty(&self) -> bool {
        *self == Cell::empty()
    }

    fn byte_mut(&mut self, offset: usize) -> &mut u8 {
        match offset {
            0 => &mut self.note,
            1 => &mut self.instrument,
            2 => &mut self.volume,
            3 => &mut self.effect_hi,
            _ => &mut self.effect_lo,
        }
    }

    /// Read one field through its descriptor.
    pub fn field(&self, field: CellField) -> u8 {
        let desc = field.descriptor();
        let byte = self.to_bytes()[desc.byte as usize];
        match desc.width {
            FieldWidth::Byte => byte,
            FieldWidth::Nibble => (byte >> desc.shift) & 0x0f,
        }
    }

    /// Write one field through its descriptor, leaving the other bits alone.
    pub fn set_field(&mut self, field: CellField, value: u8) {
        let desc = field.descriptor();
        let byte = self.byte_mut(desc.byte as usize);
        match desc.width {
            FieldWidth::Byte => *byte = value,
            FieldWidth::Nibble => {
                *byte &= !(0x0f << desc.shift);
                *byte |= (value & 0x0f) << desc.shift;
            }
        }
    }
}

/// The pattern grid: ROWS x CHANNELS cells, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pattern {
    /// Pattern data, stored row-major: data[row * CHANNELS + channel]
    data: Vec<Cell>,
}

impl Pattern {
    /// Create a pattern with empty cells.
    pub fn new() -> Self {
        Self {
            data: alloc::vec![Cell::empty(); ROWS * CHANNELS],
        }
    }

    /// Get a reference to a cell.
    pub fn cell(&self, row: usize, channel: usize) -> &Cell {
        debug_assert!(row < ROWS);
        debug_assert!(channel < CHANNELS);
        &self.data[row * CHANNELS + channel]
    }

    /// Get a mutable reference to a cell.
    pub fn cell_mut(&mut self, row: usize, channel: usize) -> &mut Cell {
        debug_assert!(row < ROWS);
        debug_assert!(channel < CHANNELS);
        &mut self.data[row * CHANNELS + channel]
    }

    /// All cells in a row.
    pub fn row(&self, row: usize) -> &[Cell] {
        let start = row * CHANNELS;
        &self.data[start..start + CHANNELS]
    }

    /// All cells, row-major.
    pub fn cells(&self) -> &[Cell] {
        &self.data
    }

    /// Mutate a single field of a cell in place.
    pub fn edit_cell(&mut self, row: usize, channel: usize, field: CellField, value: u8) {
        self.cell_mut(row, channel).set_field(field, value);
    }

    /// Enter a note the way the editor does: a note on carries the current
    /// instrument, a note off or a cleared note drops it.
    pub fn enter_note(&mut self, row: usize, channel: usize, note: Note, instrument: u8) {
        let cell = self.cell_mut(row, channel);
        cell.note = note.to_raw();
        cell.instrument = match note {
            Note::On(_) => instrument,
            Note::Off | Note::None => 0,
        };
    }
}

impl Default for Pattern {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_octave_semitone() {
        let c4 = Note::from_octave_semitone(4, 0);
        assert_eq!(c4, Note::On(48));
        assert_eq!(c4.octave(), Some(4));
        assert_eq!(c4.semitone(), Some(0));
        assert_eq!(c4.to_raw(), 49);
    }

    #[test]
    fn raw_note_decoding() {
        assert_eq!(Note::from_raw(0), Note::None);
        assert_eq!(Note::from_raw(0xff), Note::Off);
        assert_eq!(Note::from_raw(1), Note::On(0));
        assert_eq!(Note::from_raw(NOTE_MAX), Note::On(95));
    }

    #[test]
    fn pattern_cell_access() {
        let mut pattern = Pattern::new();
        pattern.cell_mut(10, 2).note = 61;

        assert_eq!(pattern.cell(10, 2).note(), Note::On(60));
        assert!(pattern.cell(10, 1).is_empty());
        assert_eq!(pattern.row(10)[2].note, 61);
    }

    #[test]
    fn effect_type_is_low_nibble() {
        let cell = Cell::from_bytes([0, 0, 0, 0xaf, 0x03]);
        assert_eq!(cell.effect(), Effect { kind: 0xf, param: 3 });
        assert!(cell.effect().is_speed());
    }

    #[test]
    fn nibble_edit_preserves_other_half() {
        let mut pattern = Pattern::new();
        pattern.edit_cell(0, 0, CellField::InstrumentHi, 0x1);
        pattern.edit_cell(0, 0, CellField::InstrumentLo, 0xc);
        assert_eq!(pattern.cell(0, 0).instrument, 0x1c);

        pattern.edit_cell(0, 0, CellField::InstrumentHi, 0x3);
        assert_eq!(pattern.cell(0, 0).instrument, 0x3c);
        assert_eq!(pattern.cell(0, 0).field(CellField::InstrumentLo), 0xc);
    }

    #[test]
    fn effect_fields_pack_into_separate_bytes() {
        let mut cell = Cell::empty();
        cell.set_field(CellField::EffectType, 0xf);
        cell.set_field(CellField::EffectParamHi, 0x0);
        cell.set_field(CellField::EffectParamLo, 0x4);
        assert_eq!(cell.to_bytes(), [0, 0, 0, 0x0f, 0x04]);
    }

    #[test]
    fn enter_note_off_clears_instrument() {
        let mut pattern = Pattern::new();
        pattern.enter_note(3, 1, Note::On(24), 2);
        assert_eq!(pattern.cell(3, 1).instrument, 2);

        pattern.enter_note(3, 1, Note::Off, 2);
        assert_eq!(pattern.cell(3, 1).note, NOTE_OFF);
        assert_eq!(pattern.cell(3, 1).instrument, 0);
    }
}
