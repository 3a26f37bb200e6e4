//! Note-name and hex-digit tables shared by the text format and displays.

use crate::pattern::Note;

/// Two-character note names, indexed by pitch class.
pub const NOTE_NAMES: [&str; 12] = [
    "C-", "Db", "D-", "Eb", "E-", "F-", "Gb", "G-", "Ab", "A-", "Bb", "B-",
];

/// Hex digits in the order the text format writes them.
pub const HEX_DIGITS: [u8; 16] = *b"0123456789abcdef";

/// Note-name token for a key release.
pub const NOTE_OFF_TOKEN: [u8; 2] = *b"==";

/// Note-name token for an empty note.
pub const NOTE_EMPTY_TOKEN: [u8; 2] = *b"  ";

/// Value of a single hex digit, case-insensitive.
pub fn hex_value(c: u8) -> Option<u8> {
    let lower = c.to_ascii_lowercase();
    HEX_DIGITS.iter().position(|&d| d == lower).map(|i| i as u8)
}

/// Parse hex digits most significant first. Unknown characters count as 0.
pub fn hex_lenient(digits: &[u8]) -> u8 {
    digits
        .iter()
        .fold(0u8, |acc, &c| (acc << 4) | hex_value(c).unwrap_or(0))
}

/// Pitch class for a two-character note name.
pub fn pitch_class(name: [u8; 2]) -> Option<u8> {
    NOTE_NAMES
        .iter()
        .position(|n| n.as_bytes() == name)
        .map(|i| i as u8)
}

/// Three-character display form of a note ("C-4", "===", "   ").
pub fn note_label(note: Note) -> [u8; 3] {
    match note {
        Note::None => *b"   ",
        Note::Off => *b"===",
        Note::On(n) => {
            let name = NOTE_NAMES[(n % 12) as usize].as_bytes();
            [name[0], name[1], b'0' + (n / 12) % 10]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_is_case_insensitive() {
        assert_eq!(hex_value(b'A'), Some(10));
        assert_eq!(hex_value(b'f'), Some(15));
        assert_eq!(hex_value(b'g'), None);
    }

    #[test]
    fn unknown_hex_digits_read_as_zero() {
        assert_eq!(hex_lenient(b"1f"), 0x1f);
        assert_eq!(hex_lenient(b"x7"), 0x07);
        assert_eq!(hex_lenient(b"7?"), 0x70);
        assert_eq!(hex_lenient(b"  "), 0x00);
    }

    #[test]
    fn note_names_resolve() {
        assert_eq!(pitch_class(*b"C-"), Some(0));
        assert_eq!(pitch_class(*b"Bb"), Some(10));
        assert_eq!(pitch_class(*b"H-"), None);
    }

    #[test]
    fn labels() {
        assert_eq!(&note_label(Note::On(49)), b"Db4");
        assert_eq!(&note_label(Note::Off), b"===");
        assert_eq!(&note_label(Note::None), b"   ");
    }
}
