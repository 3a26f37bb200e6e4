//! FM instrument patches and the instrument bank.

use arrayvec::{ArrayString, ArrayVec};

/// Operator register groups per patch (DT1/MUL, TL, RS/AR, AM/D1R, D2R,
/// D1L/RR, SSG-EG).
pub const OPERATOR_GROUPS: usize = 7;

/// Operators per channel.
pub const OPERATORS: usize = 4;

/// Size of the operator register block.
pub const OPERATOR_BYTES: usize = OPERATOR_GROUPS * OPERATORS;

/// Maximum number of patches a bank can hold (excluding the reserved slot 0).
pub const MAX_PATCHES: usize = 255;

/// One instrument: the register values loaded into a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Patch {
    pub name: ArrayString<16>,
    /// Operator registers, grouped by register then operator slot, in the
    /// order they are written (0x30, 0x34, 0x38, 0x3c, 0x40, ...).
    pub operators: [u8; OPERATOR_BYTES],
    /// Feedback (bits 3-5) and algorithm (bits 0-2)
    pub feedback_algorithm: u8,
    /// Output routing: L (bit 7), R (bit 6), AMS, FMS
    pub output: u8,
}

impl Patch {
    /// A patch with every register zeroed.
    pub const fn silent() -> Self {
        Self {
            name: ArrayString::new_const(),
            operators: [0; OPERATOR_BYTES],
            feedback_algorithm: 0,
            output: 0,
        }
    }

    pub fn new(
        name: &str,
        operators: [u8; OPERATOR_BYTES],
        feedback_algorithm: u8,
        output: u8,
    ) -> Self {
        let mut patch = Self {
            operators,
            feedback_algorithm,
            output,
            ..Self::silent()
        };
        let _ = patch.name.try_push_str(name);
        patch
    }

    pub fn algorithm(&self) -> u8 {
        self.feedback_algorithm & 0x07
    }

    pub fn feedback(&self) -> u8 {
        (self.feedback_algorithm >> 3) & 0x07
    }
}

impl Default for Patch {
    fn default() -> Self {
        Self::silent()
    }
}

/// Fixed table of patches. Index 0 is reserved and always silent.
#[derive(Clone, Debug, Default)]
pub struct InstrumentBank {
    patches: ArrayVec<Patch, MAX_PATCHES>,
}

impl InstrumentBank {
    /// An empty bank: every index resolves to the silent patch.
    pub fn new() -> Self {
        Self {
            patches: ArrayVec::new(),
        }
    }

    /// Build a bank from patches for indices 1, 2, ... in order.
    /// Patches beyond the bank's capacity are ignored.
    pub fn from_patches(patches: impl IntoIterator<Item = Patch>) -> Self {
        let mut bank = Self::new();
        for patch in patches {
            if bank.patches.try_push(patch).is_err() {
                break;
            }
        }
        bank
    }

    /// The stock bank shipped with the tracker.
    pub fn stock() -> Self {
        Self::from_patches(stock_patches())
    }

    /// Look up a patch. Index 0 and unknown indices give the silent patch.
    pub fn load(&self, index: u8) -> Patch {
        if index == 0 {
            return Patch::silent();
        }
        self.patches
            .get(index as usize - 1)
            .copied()
            .unwrap_or_else(Patch::silent)
    }

    /// Number of usable patches (highest valid index).
    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }
}

/// Voice loaded on the first channels at power-on, before any patch load.
#[rustfmt::skip]
pub fn power_on_patch() -> Patch {
    Patch::new(
        "init",
        [
            0x71, 0x0d, 0x33, 0x01,
            0x23, 0x2d, 0x26, 0x00,
            0x5f, 0x99, 0x5f, 0x94,
            0x05, 0x05, 0x05, 0x07,
            0x02, 0x02, 0x02, 0x02,
            0x11, 0x11, 0x11, 0xa6,
            0x00, 0x00, 0x00, 0x00,
        ],
        0x32,
        0xc0,
    )
}

#[rustfmt::skip]
fn stock_patches() -> [Patch; 4] {
    [
        Patch::new(
            "e.piano",
            [
                0x71, 0x0d, 0x33, 0x02, // DT1, MUL
                0x23, 0x2d, 0x26, 0x80, // TL
                0x5f, 0x99, 0x5f, 0x94, // RS, AR
                0x0a, 0x0a, 0x0a, 0x0a, // AM, D1R
                0x02, 0x02, 0x02, 0x02, // D2R
                0x11, 0x11, 0x11, 0xa7, // D1L, RR
                0x00, 0x00, 0x00, 0x00, // SSG-EG
            ],
            0x32,
            0xc0,
        ),
        Patch::new(
            "strings",
            [
                0x41, 0x41, 0x41, 0x41,
                0x14, 0x16, 0x18, 0x0a,
                0x19, 0x18, 0x0a, 0x1f,
                0x02, 0x03, 0x02, 0x01,
                0x08, 0x06, 0x07, 0x05,
                0x85, 0x85, 0x85, 0x85,
                0x00, 0x00, 0x00, 0x00,
            ],
            0x02,
            0xc0,
        ),
        Patch::new(
            "organ",
            [
                0x00, 0x04, 0x02, 0x01,
                0x04, 0x04, 0x04, 0x04,
                0x1f, 0x1f, 0x1f, 0x1f,
                0x04, 0x0f, 0x04, 0x0f,
                0x00, 0x00, 0x00, 0x00,
                0xf8, 0xf7, 0xf8, 0xfa,
                0x00, 0x00, 0x00, 0x00,
            ],
            0x07,
            0xc0,
        ),
        Patch::new(
            "bass",
            [
                0x62, 0x34, 0x43, 0x22,
                0x2f, 0x20, 0x12, 0x00,
                0x1f, 0x1f, 0x1f, 0x1f,
                0x00, 0x10, 0x07, 0x00,
                0x00, 0x00, 0x00, 0x00,
                0xf2, 0xf4, 0xf6, 0xf3,
                0x00, 0x00, 0x00, 0x00,
            ],
            0x00,
            0xc0,
        ),
    ]
}
