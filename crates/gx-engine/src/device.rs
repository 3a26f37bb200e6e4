//! Synth device boundary and the FM register map.
//!
//! Channels 0-2 live in register bank 0 and channels 3-5 in bank 1; within
//! a bank a channel's per-channel registers sit at `base + channel % 3`.
//! Key on/off always goes through bank 0 register 0x28.

use gx_ir::FM_CHANNELS;

use crate::frame::Frame;

/// Register addresses used by the driver.
pub mod reg {
    /// Key on/off: low bits select the channel, high nibble the operators.
    pub const KEY: u8 = 0x28;
    /// First operator register group (DT1/MUL).
    pub const OPERATOR_BASE: u8 = 0x30;
    /// One past the last operator register group (SSG-EG ends at 0x9f).
    pub const OPERATOR_END: u8 = 0xa0;
    /// Distance between operator slots and between register groups' slots.
    pub const OPERATOR_STRIDE: u8 = 0x04;
    /// D1L/RR group, forced high to cut an envelope short.
    pub const D1L_RR: u8 = 0x80;
    /// Frequency number, low 8 bits. Writing it commits the latched high bits.
    pub const FNUM_LO: u8 = 0xa0;
    /// Block (bits 3-5) and frequency number high bits (bits 0-2).
    pub const BLOCK_FNUM_HI: u8 = 0xa4;
    /// Feedback and algorithm.
    pub const FEEDBACK_ALGORITHM: u8 = 0xb0;
    /// Output routing: L, R, AMS, FMS.
    pub const OUTPUT: u8 = 0xb4;
}

/// Channel select codes for the key register, by channel.
pub const KEY_CODES: [u8; FM_CHANNELS] = [0, 1, 2, 4, 5, 6];

/// Operator bits OR'd into a key code to key all four operators on.
pub const KEY_ON_ALL: u8 = 0xf0;

/// Register bank holding a channel.
pub const fn channel_bank(channel: usize) -> u8 {
    (channel / 3) as u8
}

/// Offset of a channel's registers inside its bank.
pub const fn channel_offset(channel: usize) -> u8 {
    (channel % 3) as u8
}

/// An FM synthesis device driven through register writes.
///
/// Implementations own all synthesis state. `render` must not allocate or
/// block; it is called from the real-time render path.
pub trait SynthDevice {
    /// Write one register.
    fn write_register(&mut self, bank: u8, address: u8, value: u8);

    /// Fill `out` with frames generated from the current state.
    fn render(&mut self, out: &mut [Frame]);

    /// Output sample rate changed.
    fn set_sample_rate(&mut self, _sample_rate: u32) {}

    /// Write a per-channel register (`address` is the channel 0 address).
    fn write_channel(&mut self, channel: usize, address: u8, value: u8) {
        self.write_register(
            channel_bank(channel),
            address + channel_offset(channel),
            value,
        );
    }

    fn key_on(&mut self, channel: usize) {
        self.write_register(0, reg::KEY, KEY_CODES[channel] | KEY_ON_ALL);
    }

    fn key_off(&mut self, channel: usize) {
        self.write_register(0, reg::KEY, KEY_CODES[channel]);
    }
}

impl<D: SynthDevice + ?Sized> SynthDevice for alloc::boxed::Box<D> {
    fn write_register(&mut self, bank: u8, address: u8, value: u8) {
        (**self).write_register(bank, address, value)
    }

    fn render(&mut self, out: &mut [Frame]) {
        (**self).render(out)
    }

    fn set_sample_rate(&mut self, sample_rate: u32) {
        (**self).set_sample_rate(sample_rate)
    }
}
