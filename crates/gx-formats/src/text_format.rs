//! Fixed-width pattern text.
//!
//! Each cell is a 10-character record, written row-major with channels
//! inside each row and no separators:
//!
//! ```text
//! NNO II VV E PP
//! C-4 01 00 f 03
//! ```
//!
//! `NN` is a note name (`"=="` releases, `"  "` is empty), `O` the octave
//! digit, then hex instrument, hex volume, one hex effect type and a hex
//! effect parameter. Decoding never fails: unknown characters read as zero
//! and missing characters read as blanks.

use gx_ir::notation::{
    hex_lenient, note_label, pitch_class, HEX_DIGITS, NOTE_EMPTY_TOKEN, NOTE_OFF_TOKEN,
};
use gx_ir::{Cell, Note, Pattern, CHANNELS, NOTE_EMPTY, NOTE_OFF, ROWS};

/// Characters per cell record.
pub const RECORD_LEN: usize = 10;

/// Characters in a complete pattern.
pub const PATTERN_TEXT_LEN: usize = ROWS * CHANNELS * RECORD_LEN;

/// Decode one record.
fn decode_record(r: &[u8; RECORD_LEN]) -> Cell {
    let name = [r[0], r[1]];
    let note = if name == NOTE_OFF_TOKEN {
        NOTE_OFF
    } else if name == NOTE_EMPTY_TOKEN {
        NOTE_EMPTY
    } else {
        let pitch = pitch_class(name).unwrap_or(0);
        let octave = if r[2].is_ascii_digit() { r[2] - b'0' } else { 0 };
        (pitch + 1).wrapping_add(octave.wrapping_mul(12))
    };

    Cell {
        note,
        instrument: hex_lenient(&r[3..5]),
        volume: hex_lenient(&r[5..7]),
        effect_hi: hex_lenient(&r[7..8]),
        effect_lo: hex_lenient(&r[8..10]),
    }
}

fn encode_record(cell: &Cell, out: &mut String) {
    let hex = |v: u8| HEX_DIGITS[(v & 0x0f) as usize] as char;

    // The octave digit after "==" is ignored on read; write a zero.
    let label = match cell.note() {
        Note::Off => [NOTE_OFF_TOKEN[0], NOTE_OFF_TOKEN[1], b'0'],
        note => note_label(note),
    };
    out.extend(label.iter().map(|&b| b as char));
    out.push(hex(cell.instrument >> 4));
    out.push(hex(cell.instrument));
    out.push(hex(cell.volume >> 4));
    out.push(hex(cell.volume));
    out.push(hex(cell.effect_hi));
    out.push(hex(cell.effect_lo >> 4));
    out.push(hex(cell.effect_lo));
}

/// Compile pattern text into a pattern.
///
/// Text shorter than a full pattern leaves the trailing cells empty; extra
/// text is ignored.
pub fn compile(text: &[u8]) -> Pattern {
    let mut pattern = Pattern::new();

    for row in 0..ROWS {
        for ch in 0..CHANNELS {
            let start = (row * CHANNELS + ch) * RECORD_LEN;
            let mut record = [b' '; RECORD_LEN];
            if let Some(src) = text.get(start..) {
                let n = src.len().min(RECORD_LEN);
                record[..n].copy_from_slice(&src[..n]);
            }
            *pattern.cell_mut(row, ch) = decode_record(&record);
        }
    }

    pattern
}

/// Encode a pattern back to its text form.
pub fn to_text(pattern: &Pattern) -> String {
    let mut out = String::with_capacity(PATTERN_TEXT_LEN);
    for cell in pattern.cells() {
        encode_record(cell, &mut out);
    }
    out
}

/// Compile text that may be broken into lines (one row per line, say).
/// Line breaks are dropped before decoding.
pub fn load_pattern_text(text: &str) -> Pattern {
    let flat: Vec<u8> = text.bytes().filter(|&b| b != b'\n' && b != b'\r').collect();
    if flat.len() != PATTERN_TEXT_LEN {
        log::warn!(
            "pattern text is {} characters, expected {}",
            flat.len(),
            PATTERN_TEXT_LEN
        );
    }
    compile(&flat)
}
