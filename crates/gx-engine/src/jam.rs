//! Live-note channel allocation.

use gx_ir::FM_CHANNELS;
use heapless::Vec;

/// How live notes share channels with the sequencer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JamPolicy {
    /// Jam and sequencer share the pool; a jam note may land on a channel
    /// the pattern is also using.
    #[default]
    Shared,
    /// Skip channels holding a keyed sequenced note.
    AvoidSequenced,
}

/// Assigns FM channels to held live notes, round-robin.
///
/// Each channel is owned by at most one note. The cursor moves past every
/// channel it inspects, so consecutive presses rotate through the pool.
#[derive(Clone, Debug)]
pub struct JamAllocator {
    /// Note holding each channel.
    owners: [Option<u8>; FM_CHANNELS],
    pool: Vec<u8, FM_CHANNELS>,
    cursor: usize,
    policy: JamPolicy,
}

impl JamAllocator {
    /// Build an allocator over `channels`. Non-FM and repeated channels are
    /// skipped.
    pub fn new(channels: impl IntoIterator<Item = usize>, policy: JamPolicy) -> Self {
        let mut pool = Vec::new();
        for ch in channels {
            if ch < FM_CHANNELS && !pool.contains(&(ch as u8)) {
                let _ = pool.push(ch as u8);
            }
        }
        Self {
            owners: [None; FM_CHANNELS],
            pool,
            cursor: 0,
            policy,
        }
    }

    pub fn policy(&self) -> JamPolicy {
        self.policy
    }

    /// Switch policy. Held notes are dropped from the table; the caller
    /// keys them off.
    pub fn set_policy(&mut self, policy: JamPolicy) {
        self.policy = policy;
        self.clear();
    }

    /// Claim a channel for `note`.
    ///
    /// Returns `None` for a repeated press of a held note or when every
    /// channel is taken. `is_sequenced` reports channels the pattern holds.
    pub fn press(&mut self, note: u8, is_sequenced: impl Fn(usize) -> bool) -> Option<usize> {
        if self.channel_of(note).is_some() {
            return None;
        }
        for _ in 0..self.pool.len() {
            let ch = self.pool[self.cursor] as usize;
            self.cursor = (self.cursor + 1) % self.pool.len();

            if self.owners[ch].is_some() {
                continue;
            }
            if self.policy == JamPolicy::AvoidSequenced && is_sequenced(ch) {
                continue;
            }
            self.owners[ch] = Some(note);
            return Some(ch);
        }
        log::debug!("no free jam channel, dropping note {note}");
        None
    }

    /// Free the channel held by `note`, if any.
    pub fn release(&mut self, note: u8) -> Option<usize> {
        let ch = self.channel_of(note)?;
        self.owners[ch] = None;
        Some(ch)
    }

    pub fn channel_of(&self, note: u8) -> Option<usize> {
        self.owners.iter().position(|o| *o == Some(note))
    }

    /// Channels currently held, with their notes.
    pub fn held(&self) -> impl Iterator<Item = (usize, u8)> + '_ {
        self.owners
            .iter()
            .enumerate()
            .filter_map(|(ch, o)| o.map(|n| (ch, n)))
    }

    pub fn clear(&mut self) {
        self.owners = [None; FM_CHANNELS];
    }
}

impl Default for JamAllocator {
    fn default() -> Self {
        Self::new(0..FM_CHANNELS, JamPolicy::Shared)
    }
}
