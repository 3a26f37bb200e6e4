//! Playback engine for the gx-track FM tracker.
//!
//! Drives an FM synth device from a pattern in lock-step with rendered
//! audio, and routes live notes to free channels.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod chip;
mod config;
mod device;
mod driver;
mod engine;
mod frame;
mod frequency;
mod jam;
mod scheduler;

pub use chip::{FmChip, CHIP_CLOCK, CLOCK_NTSC};
pub use config::{EngineConfig, POWER_ON_CHANNELS};
pub use device::{channel_bank, channel_offset, reg, SynthDevice, KEY_CODES, KEY_ON_ALL};
pub use driver::{ChannelDriver, TransportCommand};
pub use engine::Engine;
pub use frame::Frame;
pub use frequency::{note_to_block_fnum, pitch_registers, BLOCK_MAX, FNUM_TABLE};
pub use jam::{JamAllocator, JamPolicy};
pub use scheduler::{Playhead, Scheduler};
