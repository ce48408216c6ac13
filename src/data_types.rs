//! Wire keys and the global free-XOR offset.

use std::ops::{BitXor, BitXorAssign};

use serde::{Deserialize, Serialize};

use crate::block::Block;

/// A 128-bit key (garbled value) of a single wire.
///
/// The least significant bit is the signal bit used for point-and-permute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label(pub Block);

impl Label {
    /// The all-zero label. Linear gates without inputs evaluate to it.
    pub const ZERO: Self = Label(Block::ZERO);

    /// The point-and-permute bit of the label.
    #[inline]
    pub fn signal_bit(&self) -> bool {
        self.0.lsb()
    }

    /// The label with its signal bit replaced.
    #[inline]
    pub(crate) fn with_signal_bit(&self, bit: bool) -> Self {
        Label(self.0.with_lsb(bit))
    }
}

impl From<Block> for Label {
    fn from(value: Block) -> Self {
        Label(value)
    }
}

impl BitXor for Label {
    type Output = Self;

    fn bitxor(self, rhs: Self) -> Self::Output {
        Label(self.0 ^ rhs.0)
    }
}

impl BitXor<Block> for Label {
    type Output = Self;

    fn bitxor(self, rhs: Block) -> Self::Output {
        Label(self.0 ^ rhs)
    }
}

impl BitXor<Delta> for Label {
    type Output = Self;

    fn bitxor(self, rhs: Delta) -> Self::Output {
        Label(self.0 ^ rhs.0)
    }
}

impl BitXorAssign for Label {
    fn bitxor_assign(&mut self, rhs: Self) {
        self.0 ^= rhs.0;
    }
}

/// The global free-XOR offset `R`, with its signal bit set to 1.
///
/// `R` never leaves the garbler. It is sampled once per garbling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delta(pub(crate) Block);

impl Delta {
    /// Turns a random block into a valid offset by forcing its signal bit.
    pub(crate) fn from_random(block: Block) -> Self {
        Delta(block.with_lsb(true))
    }

    /// `R` if `bit` is set, zero otherwise, in constant time.
    #[inline]
    pub(crate) fn times(&self, bit: bool) -> Block {
        self.0.const_mul(bit)
    }
}

/// Both keys of a wire: `zero` encodes the value 0, `one` encodes 1.
///
/// The two keys always have different signal bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelPair {
    /// Key of the logical value 0.
    pub zero: Label,
    /// Key of the logical value 1.
    pub one: Label,
}

impl LabelPair {
    /// Creates a pair from both keys.
    pub fn new(zero: Label, one: Label) -> Self {
        Self { zero, one }
    }

    /// A free-XOR pair `(k0, k0 ^ R)`.
    pub(crate) fn with_delta(zero: Label, delta: Delta) -> Self {
        Self {
            zero,
            one: zero ^ delta,
        }
    }

    /// The key encoding `value`.
    #[inline]
    pub fn select(&self, value: bool) -> Label {
        if value { self.one } else { self.zero }
    }

    /// The key whose signal bit equals `signal`.
    #[inline]
    pub(crate) fn by_signal(&self, signal: bool) -> Label {
        self.select(self.zero.signal_bit() ^ signal)
    }

    /// The logical value of the key with signal bit `signal`.
    #[inline]
    pub(crate) fn value_of_signal(&self, signal: bool) -> bool {
        self.zero.signal_bit() ^ signal
    }

    /// The logical value encoded by `label`, if it is one of the two keys.
    pub fn decode(&self, label: Label) -> Option<bool> {
        if label == self.zero {
            Some(false)
        } else if label == self.one {
            Some(true)
        } else {
            None
        }
    }

    /// The XOR of the two keys (`R` for free-XOR pairs).
    pub(crate) fn offset(&self) -> Block {
        self.zero.0 ^ self.one.0
    }
}

#[cfg(test)]
mod tests {
    use rand::random;

    use super::{Delta, Label, LabelPair};

    #[test]
    fn delta_has_signal_bit_set() {
        for _ in 0..16 {
            let delta = Delta::from_random(random());
            assert!(delta.0.lsb());
        }
    }

    #[test]
    fn free_xor_pair_signal_bits_differ() {
        let delta = Delta::from_random(random());
        let pair = LabelPair::with_delta(Label(random()), delta);
        assert_ne!(pair.zero.signal_bit(), pair.one.signal_bit());
        assert_eq!(delta.0, pair.offset());
    }

    #[test]
    fn select_by_signal() {
        let delta = Delta::from_random(random());
        let pair = LabelPair::with_delta(Label(random()), delta);
        for signal in [false, true] {
            let key = pair.by_signal(signal);
            assert_eq!(signal, key.signal_bit());
            assert_eq!(Some(pair.value_of_signal(signal)), pair.decode(key));
        }
        assert_eq!(None, pair.decode(Label(random())));
    }
}
