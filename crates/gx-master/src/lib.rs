//! Headless controller for the gx-track FM tracker.
//!
//! Owns the shared engine and the audio thread. Front ends (the terminal
//! player, an editor) talk to the engine only through [`Controller`].

mod wav;

use gx_audio::{AudioOutput, CpalOutput};
use gx_engine::Engine;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

// Re-export common types so callers don't need gx-ir/gx-engine directly.
pub use gx_audio::AudioError;
pub use gx_engine::{EngineConfig, FmChip, Frame, JamPolicy, Playhead};
pub use gx_formats::FormatError;
pub use gx_ir::{CellField, Note, Pattern};

pub use wav::{frames_to_wav, wav_header, write_wav};

/// Frames rendered per lock of the engine on the audio thread.
const BLOCK_FRAMES: usize = 256;

type SharedEngine = Arc<Mutex<Engine<FmChip>>>;

/// Headless tracker controller: one engine shared with the audio thread.
///
/// Every call takes the engine lock once, so a transport command never
/// lands in the middle of a tick.
pub struct Controller {
    engine: SharedEngine,
    audio: Option<AudioHandle>,
}

struct AudioHandle {
    stop_signal: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

fn lock(engine: &Mutex<Engine<FmChip>>) -> MutexGuard<'_, Engine<FmChip>> {
    // A panic on the other side leaves the engine usable.
    engine.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Controller {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            engine: Arc::new(Mutex::new(Engine::with_fm_chip(config))),
            audio: None,
        }
    }

    /// Run `f` with the engine locked.
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut Engine<FmChip>) -> R) -> R {
        f(&mut lock(&self.engine))
    }

    // --- Pattern ---

    pub fn pattern(&self) -> Pattern {
        self.with_engine(|e| e.pattern().clone())
    }

    pub fn set_pattern(&self, pattern: Pattern) {
        self.with_engine(|e| e.set_pattern(pattern));
    }

    pub fn load_pattern_file(&self, path: impl AsRef<Path>) -> Result<(), FormatError> {
        let path = path.as_ref();
        let pattern = gx_formats::load_pattern_file(path)?;
        tracing::info!(path = %path.display(), "pattern loaded");
        self.set_pattern(pattern);
        Ok(())
    }

    pub fn edit_cell(&self, row: usize, channel: usize, field: CellField, value: u8) {
        self.with_engine(|e| e.edit_cell(row, channel, field, value));
    }

    pub fn enter_note(&self, row: usize, channel: usize, note: Note, instrument: u8) {
        self.with_engine(|e| e.enter_note(row, channel, note, instrument));
    }

    // --- Transport ---

    pub fn start(&self, row: usize) {
        self.with_engine(|e| e.start(row));
    }

    pub fn stop(&self) {
        self.with_engine(|e| e.stop());
    }

    pub fn audition_row(&self, row: usize) {
        self.with_engine(|e| e.audition_row(row));
    }

    pub fn audition_note(&self, channel: usize, instrument: u8, note: u8) {
        self.with_engine(|e| e.audition_note(channel, instrument, note));
    }

    pub fn jam_on(&self, channel_hint: usize, instrument: u8, note: u8) -> Option<usize> {
        self.with_engine(|e| e.jam_on(channel_hint, instrument, note))
    }

    pub fn jam_off(&self, note: u8) -> Option<usize> {
        self.with_engine(|e| e.jam_off(note))
    }

    pub fn playhead(&self) -> Playhead {
        self.with_engine(|e| e.playhead())
    }

    pub fn take_redraw(&self) -> bool {
        self.with_engine(|e| e.take_redraw())
    }

    // --- Real-time playback ---

    /// Open the default audio device and start feeding it from the engine.
    /// Returns the device sample rate, which the engine adopts.
    pub fn open_audio(&mut self) -> Result<u32, AudioError> {
        self.close_audio();

        let stop_signal = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let engine = self.engine.clone();
        let stop = stop_signal.clone();

        let thread = std::thread::Builder::new()
            .name("gx-audio".into())
            .spawn(move || audio_thread(engine, stop, ready_tx))
            .map_err(|e| AudioError::DeviceInit(e.to_string()))?;

        let sample_rate = match ready_rx.recv() {
            Ok(Ok(rate)) => rate,
            Ok(Err(err)) => {
                let _ = thread.join();
                return Err(err);
            }
            Err(_) => {
                let _ = thread.join();
                return Err(AudioError::DeviceInit("audio thread exited".into()));
            }
        };

        self.audio = Some(AudioHandle {
            stop_signal,
            thread: Some(thread),
        });
        Ok(sample_rate)
    }

    pub fn close_audio(&mut self) {
        if let Some(mut handle) = self.audio.take() {
            handle.stop_signal.store(true, Ordering::Relaxed);
            if let Some(thread) = handle.thread.take() {
                let _ = thread.join();
            }
            tracing::debug!("audio closed");
        }
    }

    pub fn is_audio_open(&self) -> bool {
        self.audio
            .as_ref()
            .and_then(|h| h.thread.as_ref())
            .is_some_and(|t| !t.is_finished())
    }

    // --- Offline rendering ---

    /// Render `frames` frames from the shared engine's current state.
    pub fn render_frames(&self, frames: usize) -> Vec<Frame> {
        self.with_engine(|e| e.render_frames(frames))
    }

    /// Play the pattern from the top `loops` times (or until a stop effect)
    /// and return the audio. Output is capped at `max_frames`.
    pub fn render_pattern(&self, loops: u32, max_frames: usize) -> Vec<Frame> {
        self.with_engine(|e| {
            e.start(0);
            let tick = e.samples_per_tick() as usize;
            let mut out = Vec::new();
            let mut wraps = 0;
            let mut last_row = e.playhead().row;

            while e.is_playing() && wraps < loops && out.len() < max_frames {
                let n = tick.min(max_frames - out.len());
                let start = out.len();
                out.resize(start + n, Frame::silence());
                e.render(&mut out[start..]);

                let row = e.playhead().row;
                if row < last_row {
                    wraps += 1;
                }
                last_row = row;
            }
            e.stop();
            out
        })
    }

    /// Render the pattern and encode it as a WAV file image.
    pub fn render_to_wav(&self, loops: u32, max_seconds: u32) -> Vec<u8> {
        let sample_rate = self.with_engine(|e| e.sample_rate());
        let max_frames = (sample_rate as usize).saturating_mul(max_seconds as usize);
        let frames = self.render_pattern(loops, max_frames);
        tracing::info!(frames = frames.len(), sample_rate, "rendered");
        wav::frames_to_wav(&frames, sample_rate)
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.close_audio();
    }
}

fn audio_thread(
    engine: SharedEngine,
    stop_signal: Arc<AtomicBool>,
    ready: mpsc::SyncSender<Result<u32, AudioError>>,
) {
    let (mut output, consumer) = match CpalOutput::new() {
        Ok(pair) => pair,
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };

    let sample_rate = output.sample_rate();
    lock(&engine).set_sample_rate(sample_rate);

    if let Err(err) = output.build_stream(consumer).and_then(|()| output.start()) {
        let _ = ready.send(Err(err));
        return;
    }
    let _ = ready.send(Ok(sample_rate));

    let mut buf = [Frame::silence(); BLOCK_FRAMES];
    while !stop_signal.load(Ordering::Relaxed) {
        lock(&engine).render(&mut buf);
        output.write(&buf);
    }

    if let Err(err) = output.stop() {
        tracing::warn!("stopping audio: {err}");
    }
}
