//! Cell-to-register translation for the FM channels.

use gx_ir::{Cell, InstrumentBank, Note, Patch, FM_CHANNELS};

use crate::device::{reg, SynthDevice};
use crate::frequency::pitch_registers;

/// Transport change requested by a cell's effect column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportCommand {
    Stop,
    SetSpeed(u8),
}

/// Drives a synth device on behalf of the sequencer and live input.
///
/// Also tracks which channels hold a keyed sequenced note, for the jam
/// allocator's collision policy.
pub struct ChannelDriver<D> {
    device: D,
    bank: InstrumentBank,
    sequenced: [bool; FM_CHANNELS],
}

impl<D: SynthDevice> ChannelDriver<D> {
    pub fn new(device: D, bank: InstrumentBank) -> Self {
        Self {
            device,
            bank,
            sequenced: [false; FM_CHANNELS],
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn bank(&self) -> &InstrumentBank {
        &self.bank
    }

    /// True while a sequenced note is keyed on the channel.
    pub fn is_sequenced(&self, channel: usize) -> bool {
        self.sequenced.get(channel).copied().unwrap_or(false)
    }

    /// Apply one pattern cell to an FM channel.
    ///
    /// Order matters: note-off, patch load, note-on, then the effect.
    pub fn fire_cell(&mut self, cell: &Cell, channel: usize) -> Option<TransportCommand> {
        if channel >= FM_CHANNELS {
            return None;
        }
        let note = cell.note();
        if note == Note::Off {
            self.device.key_off(channel);
            self.sequenced[channel] = false;
        }
        if cell.instrument != 0 {
            self.load_instrument(channel, cell.instrument);
        }
        if let Note::On(semitone) = note {
            self.note_on(channel, semitone);
            self.sequenced[channel] = true;
        }

        let effect = cell.effect();
        if effect.is_speed() {
            return Some(if effect.param == 0 {
                TransportCommand::Stop
            } else {
                TransportCommand::SetSpeed(effect.param)
            });
        }
        None
    }

    /// Play a live note. A raw note of 0 or 0xff only keys off.
    pub fn jam_on(&mut self, channel: usize, instrument: u8, note: u8) {
        if channel >= FM_CHANNELS {
            return;
        }
        self.device.key_off(channel);
        if let Note::On(semitone) = Note::from_raw(note) {
            self.write_pitch(channel, semitone);
            // Instrument 0 keeps whatever voice the channel already has.
            if instrument != 0 {
                self.load_instrument(channel, instrument);
            }
            self.device.key_on(channel);
        }
    }

    pub fn jam_off(&mut self, channel: usize) {
        if channel < FM_CHANNELS {
            self.device.key_off(channel);
        }
    }

    /// Cut a channel: force the fastest release on every operator, key off.
    pub fn hard_reset(&mut self, channel: usize) {
        if channel >= FM_CHANNELS {
            return;
        }
        for slot in 0..4u8 {
            self.device
                .write_channel(channel, reg::D1L_RR + slot * reg::OPERATOR_STRIDE, 0xff);
        }
        self.device.key_off(channel);
        self.sequenced[channel] = false;
    }

    pub fn hard_reset_all(&mut self) {
        for channel in 0..FM_CHANNELS {
            self.hard_reset(channel);
        }
    }

    /// Write a patch's full register block to a channel.
    pub fn load_patch(&mut self, channel: usize, patch: &Patch) {
        let mut address = reg::OPERATOR_BASE;
        for &value in patch.operators.iter() {
            self.device.write_channel(channel, address, value);
            address += reg::OPERATOR_STRIDE;
        }
        self.device
            .write_channel(channel, reg::FEEDBACK_ALGORITHM, patch.feedback_algorithm);
        self.device.write_channel(channel, reg::OUTPUT, patch.output);
    }

    fn load_instrument(&mut self, channel: usize, index: u8) {
        let patch = self.bank.load(index);
        self.load_patch(channel, &patch);
    }

    fn note_on(&mut self, channel: usize, semitone: u8) {
        self.device.key_off(channel);
        self.write_pitch(channel, semitone);
        self.device.key_on(channel);
    }

    /// Block/high bits first; the low write commits both.
    fn write_pitch(&mut self, channel: usize, semitone: u8) {
        let (block_hi, fnum_lo) = pitch_registers(semitone);
        self.device.write_channel(channel, reg::BLOCK_FNUM_HI, block_hi);
        self.device.write_channel(channel, reg::FNUM_LO, fnum_lo);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::recording::RecordingDevice;
    use alloc::vec::Vec;

    fn driver() -> ChannelDriver<RecordingDevice> {
        ChannelDriver::new(RecordingDevice::new(), InstrumentBank::stock())
    }

    fn cell(note: u8, instrument: u8, effect_hi: u8, effect_lo: u8) -> Cell {
        Cell {
            note,
            instrument,
            volume: 0,
            effect_hi,
            effect_lo,
        }
    }

    fn addresses(dev: &RecordingDevice) -> Vec<(u8, u8)> {
        dev.writes.iter().map(|w| (w.bank, w.address)).collect()
    }

    #[test]
    fn note_on_keys_off_before_pitch_and_key_on() {
        let mut d = driver();
        // A-4 on channel 4
        d.fire_cell(&cell(4 * 12 + 9 + 1, 0, 0, 0), 4);

        let dev = d.device();
        assert_eq!(
            addresses(dev),
            [(0, reg::KEY), (1, 0xa5), (1, 0xa1), (0, reg::KEY)]
        );
        assert_eq!(dev.key_writes(4), [0x05, 0xf5]);
        assert_eq!(dev.registers[1][0xa5], (4 << 3) | 0x04);
        assert_eq!(dev.registers[1][0xa1], 0x0d);
        assert!(d.is_sequenced(4));
    }

    #[test]
    fn note_off_only_keys_off() {
        let mut d = driver();
        d.fire_cell(&cell(0xff, 0, 0, 0), 2);
        assert_eq!(d.device().writes.len(), 1);
        assert_eq!(d.device().key_writes(2), [0x02]);
    }

    #[test]
    fn instrument_loads_full_block_in_order() {
        let mut d = driver();
        d.fire_cell(&cell(0, 2, 0, 0), 1);

        let dev = d.device();
        let mut expected: Vec<(u8, u8)> = (0..28).map(|i| (0, 0x31 + i * 4)).collect();
        expected.push((0, 0xb1));
        expected.push((0, 0xb5));
        assert_eq!(addresses(dev), expected);

        let strings = InstrumentBank::stock().load(2);
        assert_eq!(dev.registers[0][0x31], strings.operators[0]);
        assert_eq!(dev.registers[0][0x9d], strings.operators[27]);
        assert_eq!(dev.registers[0][0xb1], strings.feedback_algorithm);
    }

    #[test]
    fn patch_load_precedes_note_on() {
        let mut d = driver();
        d.fire_cell(&cell(25, 1, 0, 0), 0);
        let writes = &d.device().writes;
        assert_eq!(writes.len(), 30 + 4);
        assert_eq!(writes[29].address, 0xb4);
        assert_eq!(writes[30].address, reg::KEY);
        assert_eq!(writes[33].value, 0xf0);
    }

    #[test]
    fn unknown_instrument_loads_silence() {
        let mut d = driver();
        d.fire_cell(&cell(0, 0x40, 0, 0), 0);
        assert!(d.device().writes.iter().all(|w| w.value == 0));
    }

    #[test]
    fn speed_effect_returns_transport_command() {
        let mut d = driver();
        assert_eq!(
            d.fire_cell(&cell(0, 0, 0x0f, 0x03), 0),
            Some(TransportCommand::SetSpeed(3))
        );
        assert_eq!(
            d.fire_cell(&cell(0, 0, 0x0f, 0x00), 0),
            Some(TransportCommand::Stop)
        );
        assert_eq!(d.fire_cell(&cell(0, 0, 0x0a, 0x10), 0), None);
        assert!(d.device().writes.is_empty());
    }

    #[test]
    fn sequencer_only_channels_are_ignored() {
        let mut d = driver();
        assert_eq!(d.fire_cell(&cell(13, 1, 0x0f, 0x00), 7), None);
        assert!(d.device().writes.is_empty());
    }

    #[test]
    fn jam_without_note_is_bare_key_off() {
        let mut d = driver();
        d.jam_on(3, 1, 0);
        d.jam_on(3, 1, 0xff);
        assert_eq!(d.device().writes.len(), 2);
        assert_eq!(d.device().key_writes(3), [0x04, 0x04]);
    }

    #[test]
    fn jam_with_instrument_loads_before_key_on() {
        let mut d = driver();
        d.jam_on(1, 3, 37);

        let writes = &d.device().writes;
        assert_eq!(writes.len(), 1 + 2 + 30 + 1);
        assert_eq!((writes[1].address, writes[2].address), (0xa5, 0xa1));
        assert_eq!(writes[32].address, 0xb5);
        assert_eq!(d.device().key_writes(1), [0x01, 0xf1]);
    }

    #[test]
    fn jam_does_not_mark_channel_sequenced() {
        let mut d = driver();
        d.jam_on(0, 1, 49);
        assert!(!d.is_sequenced(0));
        assert_eq!(d.device().key_writes(0).last(), Some(&0xf0));
    }

    #[test]
    fn hard_reset_forces_release_then_keys_off() {
        let mut d = driver();
        d.fire_cell(&cell(49, 0, 0, 0), 5);
        d.device_mut().clear();
        d.hard_reset(5);

        let dev = d.device();
        assert_eq!(
            addresses(dev),
            [(1, 0x82), (1, 0x86), (1, 0x8a), (1, 0x8e), (0, reg::KEY)]
        );
        assert!(dev.writes[..4].iter().all(|w| w.value == 0xff));
        assert_eq!(dev.key_writes(5), [0x06]);
        assert!(!d.is_sequenced(5));
    }
}
