//! Note-to-register pitch conversion.
//!
//! The chip takes an 11-bit frequency number plus a 3-bit block (octave).
//! One table row covers an octave; the block selects which.

/// Frequency numbers for C through B within one block.
pub const FNUM_TABLE: [u16; 12] = [
    617, 653, 692, 733, 777, 823, 872, 924, 979, 1037, 1099, 1164,
];

/// Highest block value the chip accepts.
pub const BLOCK_MAX: u8 = 7;

/// Block and frequency number for a semitone index (octave * 12 + pitch).
pub fn note_to_block_fnum(semitone: u8) -> (u8, u16) {
    let fnum = FNUM_TABLE[(semitone % 12) as usize];
    let block = (semitone / 12).min(BLOCK_MAX);
    (block, fnum)
}

/// Register values for a semitone index: (0xa4 value, 0xa0 value).
pub fn pitch_registers(semitone: u8) -> (u8, u8) {
    let (block, fnum) = note_to_block_fnum(semitone);
    ((block << 3) | (fnum >> 8) as u8, (fnum & 0xff) as u8)
}
