//! Pattern text fixtures: decode, re-encode, reload.

use gx_formats::{
    compile, load_pattern_file, load_pattern_text, to_text, FormatError, PATTERN_TEXT_LEN,
};
use gx_ir::{Note, Pattern, CHANNELS, EFFECT_SPEED, FM_CHANNELS, ROWS};
use std::path::PathBuf;

fn demo_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../demos/progression.txt")
}

fn demo_text() -> String {
    std::fs::read_to_string(demo_path()).unwrap()
}

#[test]
fn demo_text_reencodes_exactly() {
    let text = demo_text();
    let flat: String = text.lines().collect();
    assert_eq!(flat.len(), PATTERN_TEXT_LEN);

    let pattern = load_pattern_text(&text);
    assert_eq!(to_text(&pattern), flat);
}

#[test]
fn encoder_output_compiles_back_to_same_pattern() {
    let pattern = load_pattern_text(&demo_text());
    let again = compile(to_text(&pattern).as_bytes());
    assert_eq!(again, pattern);
}

#[test]
fn demo_contents() {
    let pattern = load_pattern_file(demo_path()).unwrap();

    // Bass on channel 0, note-off two rows later
    assert_eq!(pattern.cell(0, 0).note(), Note::On(2 * 12 + 9));
    assert_eq!(pattern.cell(0, 0).instrument, 4);
    assert_eq!(pattern.cell(2, 0).note(), Note::Off);

    // Speed effect on the last FM channel
    let fx = pattern.cell(32, FM_CHANNELS - 1).effect();
    assert_eq!(fx.kind, EFFECT_SPEED);
    assert_eq!(fx.param, 5);

    // Data in sequencer-only channels is kept
    assert_eq!(pattern.cell(8, 6).volume, 0x40);
}

#[test]
fn arbitrary_pattern_round_trips_through_text() {
    let mut pattern = Pattern::new();
    for row in 0..ROWS {
        for ch in 0..CHANNELS {
            let seed = (row * CHANNELS + ch) as u8;
            let cell = pattern.cell_mut(row, ch);
            cell.note = match seed % 5 {
                0 => 0,
                1 => 0xff,
                _ => 1 + seed % 96,
            };
            cell.instrument = seed.wrapping_mul(7);
            cell.volume = seed.wrapping_mul(13);
            cell.effect_hi = seed % 16;
            cell.effect_lo = seed.wrapping_mul(31);
        }
    }

    let text = to_text(&pattern);
    assert_eq!(compile(text.as_bytes()), pattern);
}

#[test]
fn missing_file_is_an_io_error() {
    let err = load_pattern_file(demo_path().with_file_name("no-such-pattern.txt")).unwrap_err();
    assert!(matches!(err, FormatError::Io(_)));
}

#[test]
fn binary_file_is_rejected() {
    let path = std::env::temp_dir().join(format!("gx-track-binary-{}.txt", std::process::id()));
    std::fs::write(&path, [0xffu8, 0xfe, 0x00, 0x80]).unwrap();
    let err = load_pattern_file(&path).unwrap_err();
    let _ = std::fs::remove_file(&path);
    assert!(matches!(err, FormatError::NotText));
}
