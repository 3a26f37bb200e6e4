//! Built-in six-channel, four-operator FM synthesiser.
//!
//! Follows the OPN2 register map closely enough for the driver and the
//! stock patches to sound right: operator groups 0x30-0x9f, frequency at
//! 0xa0/0xa4, algorithm/feedback at 0xb0, panning at 0xb4 and the key
//! register at 0x28. Envelopes, modulation depth and feedback are
//! approximations; detune, LFO and SSG-EG are ignored.

use gx_ir::{FM_CHANNELS, OPERATORS};

use crate::device::{reg, SynthDevice};
use crate::frame::Frame;

/// NTSC master clock.
pub const CLOCK_NTSC: u32 = 53_693_175;

/// FM chip input clock.
pub const CHIP_CLOCK: u32 = CLOCK_NTSC / 7;

/// Internal sample rate of the real chip; envelope rates are defined here.
const NATIVE_RATE: f64 = CHIP_CLOCK as f64 / 144.0;

const SINE_BITS: u32 = 10;
const SINE_LEN: usize = 1 << SINE_BITS;

/// Attenuation is kept in 10-bit units of 0.09375 dB.
const ATTENUATION_MAX: f32 = 1023.0;

/// Total level steps are 0.75 dB, eight attenuation units.
const TL_UNITS: f32 = 8.0;

/// Phase offset, in sine table entries, of a full-scale modulator.
const MODULATION_SCALE: f32 = 4096.0;

/// Feedback phase offset per unit of summed operator 1 history.
const FEEDBACK_SCALE: [f32; 8] = [0.0, 16.0, 32.0, 64.0, 128.0, 256.0, 512.0, 1024.0];

/// Output scale of one voice at full level.
const VOICE_GAIN: f32 = 6144.0;

/// Operator slot order of register offsets +0, +4, +8, +c.
const SLOT_TO_OPERATOR: [usize; OPERATORS] = [0, 2, 1, 3];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EnvPhase {
    Attack,
    Decay,
    Sustain,
    Release,
    Off,
}

struct Tables {
    sine: [f32; SINE_LEN],
    /// Linear gain for each attenuation unit.
    gain: [f32; SINE_LEN],
    /// Attenuation units per output sample for each effective rate.
    rate_step: [f32; 64],
}

impl Tables {
    fn new(sample_rate: u32) -> Self {
        let mut sine = [0.0; SINE_LEN];
        let mut gain = [0.0; SINE_LEN];
        for i in 0..SINE_LEN {
            let phase = i as f32 / SINE_LEN as f32 * core::f32::consts::TAU;
            sine[i] = libm::sinf(phase);
            gain[i] = libm::exp2f(-(i as f32) / 64.0);
        }
        let mut tables = Self {
            sine,
            gain,
            rate_step: [0.0; 64],
        };
        tables.set_sample_rate(sample_rate);
        tables
    }

    fn set_sample_rate(&mut self, sample_rate: u32) {
        let ratio = (NATIVE_RATE / sample_rate.max(1) as f64) as f32;
        for (rate, step) in self.rate_step.iter_mut().enumerate() {
            *step = if rate < 2 {
                0.0
            } else {
                libm::exp2f(rate as f32 / 4.0) / 4096.0 * ratio
            };
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Operator {
    mul: u8,
    total_level: u8,
    attack_rate: u8,
    decay_rate: u8,
    sustain_rate: u8,
    sustain_level: u8,
    release_rate: u8,

    phase: u32,
    phase_step: u32,
    level: f32,
    env: EnvPhase,
    keyed: bool,
}

impl Operator {
    const fn new() -> Self {
        Self {
            mul: 0,
            total_level: 0,
            attack_rate: 0,
            decay_rate: 0,
            sustain_rate: 0,
            sustain_level: 0,
            release_rate: 0,
            phase: 0,
            phase_step: 0,
            level: ATTENUATION_MAX,
            env: EnvPhase::Off,
            keyed: false,
        }
    }

    fn key_on(&mut self) {
        if !self.keyed {
            self.phase = 0;
            self.env = EnvPhase::Attack;
        }
        self.keyed = true;
    }

    fn key_off(&mut self) {
        if self.keyed && self.env != EnvPhase::Off {
            self.env = EnvPhase::Release;
        }
        self.keyed = false;
    }

    fn set_frequency(&mut self, hz: f64, sample_rate: u32) {
        let mul = if self.mul == 0 { 0.5 } else { self.mul as f64 };
        let cycles = hz * mul / sample_rate.max(1) as f64;
        self.phase_step = (cycles * 4_294_967_296.0) as u64 as u32;
    }

    fn step_envelope(&mut self, tables: &Tables) {
        match self.env {
            EnvPhase::Attack => {
                let rate = self.attack_rate as usize * 2;
                if rate >= 62 {
                    self.level = 0.0;
                } else {
                    self.level -= tables.rate_step[rate] * 8.0;
                }
                if self.level <= 0.0 {
                    self.level = 0.0;
                    self.env = EnvPhase::Decay;
                }
            }
            EnvPhase::Decay => {
                self.level += tables.rate_step[self.decay_rate as usize * 2];
                let sustain = if self.sustain_level == 15 {
                    ATTENUATION_MAX
                } else {
                    self.sustain_level as f32 * 32.0
                };
                if self.level >= sustain {
                    self.level = sustain;
                    self.env = EnvPhase::Sustain;
                }
            }
            EnvPhase::Sustain => {
                self.level += tables.rate_step[self.sustain_rate as usize * 2];
            }
            EnvPhase::Release => {
                self.level += tables.rate_step[self.release_rate as usize * 4 + 2];
            }
            EnvPhase::Off => {}
        }
        if self.level >= ATTENUATION_MAX {
            self.level = ATTENUATION_MAX;
            if matches!(self.env, EnvPhase::Release | EnvPhase::Sustain) {
                self.env = EnvPhase::Off;
            }
        }
    }

    /// Produce one output in [-1, 1], then advance phase and envelope.
    fn sample(&mut self, modulation: f32, tables: &Tables) -> f32 {
        let out = if self.env == EnvPhase::Off {
            0.0
        } else {
            let attenuation = self.level + self.total_level as f32 * TL_UNITS;
            if attenuation >= ATTENUATION_MAX {
                0.0
            } else {
                let index = (self.phase >> (32 - SINE_BITS)) as i32 + modulation as i32;
                let wave = tables.sine[(index & (SINE_LEN as i32 - 1)) as usize];
                wave * tables.gain[attenuation as usize]
            }
        };
        self.phase = self.phase.wrapping_add(self.phase_step);
        self.step_envelope(tables);
        out
    }
}

#[derive(Clone, Copy, Debug)]
struct Voice {
    ops: [Operator; OPERATORS],
    fnum: u16,
    block: u8,
    fnum_latch: u8,
    algorithm: u8,
    feedback: u8,
    left: bool,
    right: bool,
    history: [f32; 2],
}

impl Voice {
    const fn new() -> Self {
        Self {
            ops: [Operator::new(); OPERATORS],
            fnum: 0,
            block: 0,
            fnum_latch: 0,
            algorithm: 0,
            feedback: 0,
            left: true,
            right: true,
            history: [0.0; 2],
        }
    }

    fn frequency_hz(&self) -> f64 {
        self.fnum as f64 * (1u32 << self.block) as f64 * CHIP_CLOCK as f64
            / (144.0 * (1u32 << 21) as f64)
    }

    fn update_frequency(&mut self, sample_rate: u32) {
        let hz = self.frequency_hz();
        for op in &mut self.ops {
            op.set_frequency(hz, sample_rate);
        }
    }

    fn is_silent(&self) -> bool {
        self.ops.iter().all(|op| op.env == EnvPhase::Off)
    }

    fn sample(&mut self, tables: &Tables) -> f32 {
        let fb = (self.history[0] + self.history[1]) * FEEDBACK_SCALE[self.feedback as usize];
        let m = |x: f32| x * MODULATION_SCALE;
        let [s1, s2, s3, s4] = &mut self.ops;

        let o1 = s1.sample(fb, tables);
        self.history = [self.history[1], o1];

        match self.algorithm {
            0 => {
                let o2 = s2.sample(m(o1), tables);
                let o3 = s3.sample(m(o2), tables);
                s4.sample(m(o3), tables)
            }
            1 => {
                let o2 = s2.sample(0.0, tables);
                let o3 = s3.sample(m(o1 + o2), tables);
                s4.sample(m(o3), tables)
            }
            2 => {
                let o2 = s2.sample(0.0, tables);
                let o3 = s3.sample(m(o2), tables);
                s4.sample(m(o1 + o3), tables)
            }
            3 => {
                let o2 = s2.sample(m(o1), tables);
                let o3 = s3.sample(0.0, tables);
                s4.sample(m(o2 + o3), tables)
            }
            4 => {
                let o2 = s2.sample(m(o1), tables);
                let o3 = s3.sample(0.0, tables);
                o2 + s4.sample(m(o3), tables)
            }
            5 => {
                let o2 = s2.sample(m(o1), tables);
                let o3 = s3.sample(m(o1), tables);
                o2 + o3 + s4.sample(m(o1), tables)
            }
            6 => {
                let o2 = s2.sample(m(o1), tables);
                let o3 = s3.sample(0.0, tables);
                o2 + o3 + s4.sample(0.0, tables)
            }
            _ => {
                let o2 = s2.sample(0.0, tables);
                let o3 = s3.sample(0.0, tables);
                o1 + o2 + o3 + s4.sample(0.0, tables)
            }
        }
    }
}

/// The built-in FM device.
pub struct FmChip {
    registers: [[u8; 256]; 2],
    voices: [Voice; FM_CHANNELS],
    tables: Tables,
    sample_rate: u32,
}

impl FmChip {
    pub fn new(sample_rate: u32) -> Self {
        let mut chip = Self {
            registers: [[0; 256]; 2],
            voices: [Voice::new(); FM_CHANNELS],
            tables: Tables::new(sample_rate),
            sample_rate,
        };
        chip.registers[0][reg::OUTPUT as usize..reg::OUTPUT as usize + 3].fill(0xc0);
        chip.registers[1][reg::OUTPUT as usize..reg::OUTPUT as usize + 3].fill(0xc0);
        chip
    }

    /// Last value written to a register.
    pub fn register(&self, bank: u8, address: u8) -> u8 {
        self.registers[bank as usize & 1][address as usize]
    }

    /// True when any operator on the channel is still producing output.
    pub fn is_sounding(&self, channel: usize) -> bool {
        self.voices
            .get(channel)
            .is_some_and(|v| !v.is_silent())
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn write_key(&mut self, value: u8) {
        let channel = match value & 0x07 {
            code @ 0..=2 => code as usize,
            code @ 4..=6 => code as usize - 1,
            _ => return,
        };
        let voice = &mut self.voices[channel];
        for (bit, op) in voice.ops.iter_mut().enumerate() {
            if value & (0x10 << bit) != 0 {
                op.key_on();
            } else {
                op.key_off();
            }
        }
    }

    fn write_operator(&mut self, bank: u8, address: u8, value: u8) {
        let offset = (address & 0x03) as usize;
        if offset == 3 {
            return;
        }
        let channel = bank as usize * 3 + offset;
        let slot = ((address >> 2) & 0x03) as usize;
        let voice = &mut self.voices[channel];
        let op = &mut voice.ops[SLOT_TO_OPERATOR[slot]];

        match address & 0xf0 {
            0x30 => {
                op.mul = value & 0x0f;
                voice.update_frequency(self.sample_rate);
            }
            0x40 => op.total_level = value & 0x7f,
            0x50 => op.attack_rate = value & 0x1f,
            0x60 => op.decay_rate = value & 0x1f,
            0x70 => op.sustain_rate = value & 0x1f,
            0x80 => {
                op.sustain_level = value >> 4;
                op.release_rate = value & 0x0f;
            }
            _ => {}
        }
    }

    fn write_voice(&mut self, bank: u8, address: u8, value: u8) {
        let offset = (address & 0x03) as usize;
        if offset == 3 {
            return;
        }
        let voice = &mut self.voices[bank as usize * 3 + offset];

        match address & 0xfc {
            reg::FNUM_LO => {
                voice.fnum = ((voice.fnum_latch as u16 & 0x07) << 8) | value as u16;
                voice.block = (voice.fnum_latch >> 3) & 0x07;
                voice.update_frequency(self.sample_rate);
            }
            reg::BLOCK_FNUM_HI => voice.fnum_latch = value,
            reg::FEEDBACK_ALGORITHM => {
                voice.algorithm = value & 0x07;
                voice.feedback = (value >> 3) & 0x07;
            }
            reg::OUTPUT => {
                voice.left = value & 0x80 != 0;
                voice.right = value & 0x40 != 0;
            }
            _ => {}
        }
    }
}

impl SynthDevice for FmChip {
    fn write_register(&mut self, bank: u8, address: u8, value: u8) {
        let bank = bank & 1;
        self.registers[bank as usize][address as usize] = value;

        match address {
            reg::KEY if bank == 0 => self.write_key(value),
            reg::OPERATOR_BASE..=0x9f => self.write_operator(bank, address, value),
            0xa0..=0xb6 => self.write_voice(bank, address, value),
            _ => {}
        }
    }

    fn render(&mut self, out: &mut [Frame]) {
        let tables = &self.tables;
        for frame in out.iter_mut() {
            let mut left = 0.0f32;
            let mut right = 0.0f32;
            for voice in self.voices.iter_mut() {
                let s = voice.sample(tables);
                if voice.left {
                    left += s;
                }
                if voice.right {
                    right += s;
                }
            }
            *frame = Frame::saturating((left * VOICE_GAIN) as i32, (right * VOICE_GAIN) as i32);
        }
    }

    fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
        self.tables.set_sample_rate(sample_rate);
        for voice in &mut self.voices {
            voice.update_frequency(sample_rate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gx_ir::power_on_patch;

    fn load(chip: &mut FmChip, channel: usize) {
        let patch = power_on_patch();
        let mut bytes = patch.operators.iter();
        let mut addr = reg::OPERATOR_BASE;
        while addr < reg::OPERATOR_END {
            if let Some(&b) = bytes.next() {
                chip.write_channel(channel, addr, b);
            }
            addr += reg::OPERATOR_STRIDE;
        }
        chip.write_channel(channel, reg::FEEDBACK_ALGORITHM, patch.feedback_algorithm);
        chip.write_channel(channel, reg::OUTPUT, patch.output);
    }

    fn play_a4(chip: &mut FmChip, channel: usize) {
        chip.write_channel(channel, reg::BLOCK_FNUM_HI, (4 << 3) | 0x04);
        chip.write_channel(channel, reg::FNUM_LO, 0x0d);
        chip.key_on(channel);
    }

    fn peak(chip: &mut FmChip, frames: usize) -> i16 {
        let mut buf = [Frame::silence(); 256];
        let mut max = 0i16;
        let mut left = frames;
        while left > 0 {
            let n = left.min(buf.len());
            chip.render(&mut buf[..n]);
            for f in &buf[..n] {
                max = max.max(f.left.saturating_abs()).max(f.right.saturating_abs());
            }
            left -= n;
        }
        max
    }

    #[test]
    fn silent_at_power_on() {
        let mut chip = FmChip::new(44100);
        assert_eq!(peak(&mut chip, 1024), 0);
        assert!(!chip.is_sounding(0));
    }

    #[test]
    fn keyed_voice_produces_output() {
        let mut chip = FmChip::new(44100);
        load(&mut chip, 4);
        play_a4(&mut chip, 4);

        assert!(chip.is_sounding(4));
        assert!(peak(&mut chip, 4410) > 100);
    }

    #[test]
    fn release_decays_to_silence() {
        let mut chip = FmChip::new(44100);
        load(&mut chip, 0);
        play_a4(&mut chip, 0);
        peak(&mut chip, 1000);

        // Fastest release on every operator, then key off.
        for slot in 0..4u8 {
            chip.write_channel(0, reg::D1L_RR + slot * reg::OPERATOR_STRIDE, 0xff);
        }
        chip.key_off(0);
        peak(&mut chip, 4410);

        assert!(!chip.is_sounding(0));
        assert_eq!(peak(&mut chip, 256), 0);
    }

    #[test]
    fn frequency_latch_commits_on_low_write() {
        let mut chip = FmChip::new(44100);
        chip.write_channel(2, reg::BLOCK_FNUM_HI, (3 << 3) | 0x02);
        assert_eq!(chip.voices[2].fnum, 0);

        chip.write_channel(2, reg::FNUM_LO, 0x69);
        assert_eq!(chip.voices[2].fnum, 0x269);
        assert_eq!(chip.voices[2].block, 3);
    }

    #[test]
    fn panning_routes_output() {
        let mut chip = FmChip::new(44100);
        load(&mut chip, 1);
        chip.write_channel(1, reg::OUTPUT, 0x80);
        play_a4(&mut chip, 1);

        let mut buf = [Frame::silence(); 2048];
        chip.render(&mut buf);
        assert!(buf.iter().any(|f| f.left != 0));
        assert!(buf.iter().all(|f| f.right == 0));
    }

    #[test]
    fn registers_are_shadowed() {
        let mut chip = FmChip::new(48000);
        chip.write_register(1, 0xb2, 0x3a);
        assert_eq!(chip.register(1, 0xb2), 0x3a);
        assert_eq!(chip.voices[5].algorithm, 2);
        assert_eq!(chip.voices[5].feedback, 7);
    }
}
