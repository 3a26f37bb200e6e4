//! Main playback engine.

use alloc::vec::Vec;
use gx_ir::{CellField, InstrumentBank, Note, Pattern, CHANNELS, ROWS};

use crate::chip::FmChip;
use crate::config::{EngineConfig, POWER_ON_CHANNELS};
use crate::device::SynthDevice;
use crate::driver::ChannelDriver;
use crate::frame::Frame;
use crate::jam::{JamAllocator, JamPolicy};
use crate::scheduler::{Playhead, Scheduler};

/// The playback engine: pattern, playhead, jam table and the synth device.
///
/// Control calls and `render` take `&mut self`; callers that drive it from
/// two threads share it behind a single lock.
pub struct Engine<D> {
    pattern: Pattern,
    driver: ChannelDriver<D>,
    scheduler: Scheduler,
    jam: JamAllocator,
    config: EngineConfig,
    /// Frames per tick at the current sample rate
    samples_per_tick: u32,
    /// Frames left before the next tick
    samples_left: u32,
    redraw: bool,
}

impl Engine<FmChip> {
    /// Engine on the built-in FM chip with the stock instrument bank.
    pub fn with_fm_chip(config: EngineConfig) -> Self {
        let chip = FmChip::new(config.sample_rate);
        Self::new(chip, InstrumentBank::stock(), config)
    }
}

impl<D: SynthDevice> Engine<D> {
    pub fn new(device: D, bank: InstrumentBank, config: EngineConfig) -> Self {
        let samples_per_tick = config.samples_per_tick();
        let mut driver = ChannelDriver::new(device, bank);

        let voice = gx_ir::power_on_patch();
        for channel in POWER_ON_CHANNELS {
            driver.device_mut().key_off(channel);
            driver.load_patch(channel, &voice);
        }

        Self {
            pattern: Pattern::new(),
            driver,
            scheduler: Scheduler::new(config.initial_speed),
            jam: JamAllocator::new(config.jam_channels.clone(), config.jam_policy),
            samples_per_tick,
            samples_left: samples_per_tick,
            redraw: true,
            config,
        }
    }

    // --- Pattern ---

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn set_pattern(&mut self, pattern: Pattern) {
        self.pattern = pattern;
        self.redraw = true;
    }

    /// Change one field of a cell. Row and channel wrap.
    pub fn edit_cell(&mut self, row: usize, channel: usize, field: CellField, value: u8) {
        self.pattern
            .edit_cell(row % ROWS, channel % CHANNELS, field, value);
        self.redraw = true;
    }

    /// Write a note (and instrument) the way the editor does.
    pub fn enter_note(&mut self, row: usize, channel: usize, note: Note, instrument: u8) {
        self.pattern
            .enter_note(row % ROWS, channel % CHANNELS, note, instrument);
        self.redraw = true;
    }

    // --- Transport ---

    pub fn playhead(&self) -> Playhead {
        self.scheduler.playhead()
    }

    pub fn is_playing(&self) -> bool {
        self.scheduler.is_playing()
    }

    pub fn start(&mut self, row: usize) {
        self.scheduler.start(row, &self.pattern, &mut self.driver);
        self.redraw = true;
    }

    pub fn stop(&mut self) {
        self.scheduler.stop(&mut self.driver);
        self.redraw = true;
    }

    /// Play one row without moving the playhead.
    pub fn audition_row(&mut self, row: usize) {
        self.scheduler
            .audition_row(row, &self.pattern, &mut self.driver);
        self.redraw = true;
    }

    /// Single-step entry point; same as [`Engine::audition_row`].
    pub fn step_once(&mut self, row: usize) {
        self.audition_row(row);
    }

    pub fn set_speed(&mut self, speed: u8) {
        self.scheduler.set_speed(speed);
        self.redraw = true;
    }

    /// Advance one tick by hand. `render` calls this on tick boundaries.
    pub fn advance_tick(&mut self) {
        if self.scheduler.advance_tick(&self.pattern, &mut self.driver) {
            self.redraw = true;
        }
    }

    // --- Live input ---

    /// Start a live note on the next free jam channel. The channel hint is
    /// accepted for API symmetry and ignored. Returns the channel used.
    pub fn jam_on(&mut self, _channel_hint: usize, instrument: u8, note: u8) -> Option<usize> {
        if !matches!(Note::from_raw(note), Note::On(_)) {
            return None;
        }
        let driver = &self.driver;
        let channel = self.jam.press(note, |ch| driver.is_sequenced(ch))?;
        self.driver.jam_on(channel, instrument, note);
        Some(channel)
    }

    /// Release a live note. Returns the channel it freed.
    pub fn jam_off(&mut self, note: u8) -> Option<usize> {
        let channel = self.jam.release(note)?;
        self.driver.jam_off(channel);
        Some(channel)
    }

    /// Play a note on a specific channel, bypassing the jam allocator.
    /// Used to preview an edit on the channel under the cursor.
    pub fn audition_note(&mut self, channel: usize, instrument: u8, note: u8) {
        self.driver.jam_on(channel, instrument, note);
    }

    pub fn jam(&self) -> &JamAllocator {
        &self.jam
    }

    /// Change how live notes share channels with the pattern. Every held
    /// live note is keyed off first.
    pub fn set_jam_policy(&mut self, policy: JamPolicy) {
        for (channel, _) in self.jam.held() {
            self.driver.jam_off(channel);
        }
        self.jam.set_policy(policy);
        self.config.jam_policy = policy;
    }

    // --- Output ---

    /// Returns and clears the redraw flag.
    pub fn take_redraw(&mut self) -> bool {
        core::mem::take(&mut self.redraw)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    /// Switch output rate. The current tick restarts at the new length.
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.config.sample_rate = sample_rate;
        self.samples_per_tick = self.config.samples_per_tick();
        self.samples_left = self.samples_per_tick;
        self.driver.device_mut().set_sample_rate(sample_rate);
        log::debug!(
            "sample rate {sample_rate} Hz, {} frames per tick",
            self.samples_per_tick
        );
    }

    pub fn samples_per_tick(&self) -> u32 {
        self.samples_per_tick
    }

    pub fn device(&self) -> &D {
        self.driver.device()
    }

    /// Fill `out` with audio, advancing the playhead at every tick boundary.
    /// Does not allocate.
    pub fn render(&mut self, out: &mut [Frame]) {
        #[cfg(feature = "alloc_check")]
        assert_no_alloc::assert_no_alloc(|| self.render_inner(out));
        #[cfg(not(feature = "alloc_check"))]
        self.render_inner(out);
    }

    fn render_inner(&mut self, mut out: &mut [Frame]) {
        while !out.is_empty() {
            let n = out.len().min(self.samples_left as usize);
            let (chunk, rest) = core::mem::take(&mut out).split_at_mut(n);
            self.driver.device_mut().render(chunk);
            self.samples_left -= n as u32;
            out = rest;

            if self.samples_left == 0 {
                self.advance_tick();
                self.samples_left = self.samples_per_tick;
            }
        }
    }

    /// Render `frames` frames into a new buffer.
    pub fn render_frames(&mut self, frames: usize) -> Vec<Frame> {
        let mut buf = alloc::vec![Frame::silence(); frames];
        self.render(&mut buf);
        buf
    }
}
