//! Engine configuration.

use core::ops::Range;

use gx_ir::FM_CHANNELS;

use crate::jam::JamPolicy;

/// Channels that receive the power-on voice.
pub const POWER_ON_CHANNELS: Range<usize> = 0..5;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Output sample rate in Hz
    pub sample_rate: u32,
    /// Ticks per second
    pub tick_rate: u32,
    /// Ticks per row at startup
    pub initial_speed: u8,
    pub jam_policy: JamPolicy,
    /// FM channels live notes may borrow
    pub jam_channels: Range<usize>,
}

impl EngineConfig {
    /// Frames between ticks, never zero.
    pub fn samples_per_tick(&self) -> u32 {
        (self.sample_rate / self.tick_rate.max(1)).max(1)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            tick_rate: 60,
            initial_speed: 6,
            jam_policy: JamPolicy::Shared,
            jam_channels: 0..FM_CHANNELS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tick_length() {
        assert_eq!(EngineConfig::default().samples_per_tick(), 735);
        let cfg = EngineConfig {
            sample_rate: 48000,
            ..Default::default()
        };
        assert_eq!(cfg.samples_per_tick(), 800);
    }

    #[test]
    fn degenerate_rates_still_tick() {
        let cfg = EngineConfig {
            sample_rate: 10,
            tick_rate: 0,
            ..Default::default()
        };
        assert_eq!(cfg.samples_per_tick(), 10);
        let cfg = EngineConfig {
            sample_rate: 10,
            tick_rate: 60,
            ..Default::default()
        };
        assert_eq!(cfg.samples_per_tick(), 1);
    }
}
