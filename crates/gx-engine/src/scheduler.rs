//! Tick/row playhead and the transport that drives it.
//!
//! A row lasts `speed` ticks. Cells fire on the first tick of their row;
//! the remaining ticks only count down.

use gx_ir::{Pattern, FM_CHANNELS, ROWS};

use crate::device::SynthDevice;
use crate::driver::{ChannelDriver, TransportCommand};

/// Snapshot of the playback position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Playhead {
    pub tick: u8,
    pub row: usize,
    pub speed: u8,
    pub playing: bool,
}

impl Playhead {
    pub fn new(speed: u8) -> Self {
        Self {
            tick: 0,
            row: 0,
            speed: speed.max(1),
            playing: false,
        }
    }
}

impl Default for Playhead {
    fn default() -> Self {
        Self::new(6)
    }
}

/// Owns the playhead and fires pattern rows through a channel driver.
#[derive(Clone, Debug, Default)]
pub struct Scheduler {
    playhead: Playhead,
}

impl Scheduler {
    pub fn new(speed: u8) -> Self {
        Self {
            playhead: Playhead::new(speed),
        }
    }

    pub fn playhead(&self) -> Playhead {
        self.playhead
    }

    pub fn is_playing(&self) -> bool {
        self.playhead.playing
    }

    /// Ticks per row. Zero is treated as one.
    pub fn set_speed(&mut self, speed: u8) {
        self.playhead.speed = speed.max(1);
    }

    /// Begin playback at `row`, firing it immediately. A running playback is
    /// stopped first so no note is left hanging.
    pub fn start<D: SynthDevice>(
        &mut self,
        row: usize,
        pattern: &Pattern,
        driver: &mut ChannelDriver<D>,
    ) {
        if self.playhead.playing {
            self.stop(driver);
        }
        self.playhead.row = row % ROWS;
        self.playhead.tick = 0;
        self.playhead.playing = true;
        log::debug!("play from row {:02x}", self.playhead.row);
        self.fire_row(pattern, driver);
    }

    /// Halt playback and cut every FM channel. Safe to repeat.
    pub fn stop<D: SynthDevice>(&mut self, driver: &mut ChannelDriver<D>) {
        if self.playhead.playing {
            log::debug!("stop at row {:02x}", self.playhead.row);
        }
        self.playhead.playing = false;
        driver.hard_reset_all();
    }

    /// Fire one row as if it were tick 0 without moving the playhead.
    /// A speed effect in the row still applies; a stop effect is ignored.
    pub fn audition_row<D: SynthDevice>(
        &mut self,
        row: usize,
        pattern: &Pattern,
        driver: &mut ChannelDriver<D>,
    ) {
        let cells = pattern.row(row % ROWS);
        for (channel, cell) in cells.iter().take(FM_CHANNELS).enumerate() {
            if let Some(TransportCommand::SetSpeed(speed)) = driver.fire_cell(cell, channel) {
                self.set_speed(speed);
            }
        }
    }

    /// Advance one tick. Returns true when a new row started (and fired).
    pub fn advance_tick<D: SynthDevice>(
        &mut self,
        pattern: &Pattern,
        driver: &mut ChannelDriver<D>,
    ) -> bool {
        if !self.playhead.playing {
            return false;
        }
        let ph = &mut self.playhead;
        ph.tick = ph.tick.wrapping_add(1);
        if ph.tick % ph.speed == 0 {
            ph.tick = 0;
            ph.row = (ph.row + 1) % ROWS;
        }
        if ph.tick != 0 {
            return false;
        }
        self.fire_row(pattern, driver);
        true
    }

    fn fire_row<D: SynthDevice>(&mut self, pattern: &Pattern, driver: &mut ChannelDriver<D>) {
        let cells = pattern.row(self.playhead.row);
        for (channel, cell) in cells.iter().take(FM_CHANNELS).enumerate() {
            match driver.fire_cell(cell, channel) {
                Some(TransportCommand::Stop) => self.playhead.playing = false,
                Some(TransportCommand::SetSpeed(speed)) => self.set_speed(speed),
                None => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::recording::RecordingDevice;
    use gx_ir::{CellField, InstrumentBank, Note};

    fn setup() -> (Scheduler, Pattern, ChannelDriver<RecordingDevice>) {
        (
            Scheduler::new(6),
            Pattern::new(),
            ChannelDriver::new(RecordingDevice::new(), InstrumentBank::stock()),
        )
    }

    #[test]
    fn row_advances_every_speed_ticks() {
        let (mut s, p, mut d) = setup();
        s.set_speed(4);
        s.start(0, &p, &mut d);

        let mut rows = alloc::vec::Vec::new();
        for _ in 0..12 {
            if s.advance_tick(&p, &mut d) {
                rows.push(s.playhead().row);
            }
        }
        assert_eq!(rows, [1, 2, 3]);
        assert_eq!(s.playhead().tick, 0);
    }

    #[test]
    fn row_wraps_after_last() {
        let (mut s, p, mut d) = setup();
        s.set_speed(1);
        s.start(ROWS - 1, &p, &mut d);
        assert!(s.advance_tick(&p, &mut d));
        assert_eq!(s.playhead().row, 0);
    }

    #[test]
    fn start_wraps_out_of_range_row() {
        let (mut s, p, mut d) = setup();
        s.start(ROWS + 2, &p, &mut d);
        assert_eq!(s.playhead().row, 2);
    }

    #[test]
    fn idle_playhead_does_not_move() {
        let (mut s, p, mut d) = setup();
        for _ in 0..20 {
            assert!(!s.advance_tick(&p, &mut d));
        }
        assert_eq!(s.playhead(), Playhead::new(6));
    }

    #[test]
    fn zero_speed_is_coerced() {
        let mut s = Scheduler::new(0);
        assert_eq!(s.playhead().speed, 1);
        s.set_speed(0);
        assert_eq!(s.playhead().speed, 1);
    }

    #[test]
    fn speed_effect_takes_effect_on_its_row() {
        let (mut s, mut p, mut d) = setup();
        p.edit_cell(1, 2, CellField::EffectType, 0xf);
        p.edit_cell(1, 2, CellField::EffectParamLo, 2);
        s.start(0, &p, &mut d);

        for _ in 0..6 {
            s.advance_tick(&p, &mut d);
        }
        assert_eq!(s.playhead().row, 1);
        assert_eq!(s.playhead().speed, 2);
        s.advance_tick(&p, &mut d);
        assert!(s.advance_tick(&p, &mut d));
        assert_eq!(s.playhead().row, 2);
    }

    #[test]
    fn stop_effect_halts_playhead() {
        let (mut s, mut p, mut d) = setup();
        p.edit_cell(0, 0, CellField::EffectType, 0xf);
        s.start(0, &p, &mut d);
        assert!(!s.is_playing());
    }

    #[test]
    fn stop_is_idempotent() {
        let (mut s, p, mut d) = setup();
        s.start(3, &p, &mut d);
        s.stop(&mut d);
        let first = s.playhead();
        d.device_mut().clear();
        s.stop(&mut d);

        assert_eq!(s.playhead(), first);
        assert!(!first.playing);
        // The second stop writes the same cut sequence and nothing else.
        assert_eq!(d.device().writes.len(), FM_CHANNELS * 5);
    }

    #[test]
    fn audition_leaves_playhead_and_ignores_stop() {
        let (mut s, mut p, mut d) = setup();
        p.enter_note(5, 0, Note::On(48), 1);
        p.edit_cell(5, 1, CellField::EffectType, 0xf);
        s.set_speed(3);
        s.start(2, &Pattern::new(), &mut d);
        let before = s.playhead();

        s.audition_row(5, &p, &mut d);
        assert_eq!(s.playhead(), before);
        assert!(s.is_playing());
        assert_eq!(d.device().key_writes(0).last(), Some(&0xf0));
    }

    #[test]
    fn audition_applies_speed_effect() {
        let (mut s, mut p, mut d) = setup();
        p.edit_cell(4, 0, CellField::EffectType, 0xf);
        p.edit_cell(4, 0, CellField::EffectParamLo, 3);
        let before = s.playhead();

        s.audition_row(4, &p, &mut d);
        let after = s.playhead();
        assert_eq!(after.speed, 3);
        assert_eq!(after.row, before.row);
        assert_eq!(after.tick, before.tick);
        assert!(!after.playing);
    }

    #[test]
    fn sequencer_only_channels_never_fire() {
        let (mut s, mut p, mut d) = setup();
        for ch in FM_CHANNELS..gx_ir::CHANNELS {
            p.enter_note(0, ch, Note::On(30), 1);
        }
        s.start(0, &p, &mut d);
        assert!(d.device().writes.is_empty());
    }
}
