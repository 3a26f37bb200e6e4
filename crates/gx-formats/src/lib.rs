//! Pattern formats for gx-track.
//!
//! Reads and writes the fixed-width pattern text into the IR.

mod text_format;

use std::path::Path;

use gx_ir::Pattern;

pub use text_format::{compile, load_pattern_text, to_text, PATTERN_TEXT_LEN, RECORD_LEN};

/// Error type for pattern loading.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// The pattern file could not be read
    #[error("failed to read pattern: {0}")]
    Io(#[from] std::io::Error),
    /// The pattern file is not text
    #[error("pattern file is not valid UTF-8")]
    NotText,
}

/// Load a pattern text file. Decoding is lenient; only reading can fail.
pub fn load_pattern_file(path: impl AsRef<Path>) -> Result<Pattern, FormatError> {
    let bytes = std::fs::read(path)?;
    let text = String::from_utf8(bytes).map_err(|_| FormatError::NotText)?;
    Ok(load_pattern_text(&text))
}
