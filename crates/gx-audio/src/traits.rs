//! Audio output trait and error types.

use gx_engine::Frame;

/// Error type for audio operations.
///
/// Startup failures are split by cause so the front end can tell a missing
/// device from one it could open but not use.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    /// No output device available
    #[error("no audio output device available")]
    NoDevice,
    /// Device found but could not be queried or opened
    #[error("failed to open audio device: {0}")]
    DeviceInit(String),
    /// Device opened but offers no usable stereo 16-bit or float format
    #[error("unsupported audio format: {0}")]
    FormatMismatch(String),
    /// Failed to create audio stream
    #[error("failed to create audio stream: {0}")]
    StreamCreate(String),
    #[error("playback error: {0}")]
    Playback(String),
}

/// Trait for audio output backends.
pub trait AudioOutput {
    fn sample_rate(&self) -> u32;

    /// Queue frames, blocking until all of them fit in the buffer.
    fn write(&mut self, frames: &[Frame]);

    fn start(&mut self) -> Result<(), AudioError>;

    fn stop(&mut self) -> Result<(), AudioError>;
}
