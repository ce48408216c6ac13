//! A 128-bit [`Block`] type used for wire keys, table rows and cipher blocks.
//!
//! Operations on [`Block`]s will use SIMD instructions where possible. A
//! `Block` is always 16-byte aligned, so a `Vec<Block>` is an aligned buffer
//! that can be handed to the block cipher without copying.
use std::{
    fmt,
    ops::{BitAnd, BitOr, BitXor, BitXorAssign},
};

use aes::cipher::{self, array::sizes};
use bytemuck::{Pod, Zeroable};
use rand::{Rng, distr::StandardUniform, prelude::Distribution};
use serde::{Deserialize, Serialize};
use subtle::{Choice, ConditionallySelectable, ConstantTimeEq};
use wide::{u8x16, u64x2};

mod gf128;

/// A 128-bit block. Uses SIMD operations where available.
#[derive(Clone, Copy, Serialize, Deserialize, Default, Pod, Zeroable)]
#[repr(transparent)]
pub struct Block(u8x16);

impl Block {
    /// All bits set to 0.
    pub const ZERO: Self = Self(u8x16::ZERO);
    /// Lsb set to 1, all others zero.
    pub const ONE: Self = Self::new(1_u128.to_ne_bytes());
    /// Mask to mask off the LSB of a Block.
    pub const MASK_LSB: Self = Self::pack(u64::MAX << 1, u64::MAX);

    /// 16 bytes in a Block.
    pub const BYTES: usize = 16;

    /// Create a new block from bytes.
    #[inline]
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(u8x16::new(bytes))
    }

    /// Pack two `u64` into a Block. Usable in const context.
    #[inline]
    pub const fn pack(low: u64, high: u64) -> Self {
        let mut bytes = [0; 16];
        let low = low.to_ne_bytes();
        let high = high.to_ne_bytes();
        let mut i = 0;
        while i < 8 {
            bytes[i] = low[i];
            bytes[i + 8] = high[i];
            i += 1;
        }
        Self::new(bytes)
    }

    /// Bytes of the block.
    #[inline]
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_array_ref()
    }

    /// Mutable bytes of the block.
    #[inline]
    pub fn as_mut_bytes(&mut self) -> &mut [u8; 16] {
        self.0.as_array_mut()
    }

    /// Low 64 bits of the block.
    #[inline]
    pub fn low(&self) -> u64 {
        let inner: &u64x2 = bytemuck::must_cast_ref(&self.0);
        inner.as_array_ref()[0]
    }

    /// High 64 bits of the block.
    #[inline]
    pub fn high(&self) -> u64 {
        let inner: &u64x2 = bytemuck::must_cast_ref(&self.0);
        inner.as_array_ref()[1]
    }

    /// Least significant bit of the block.
    ///
    /// For wire keys this is the point-and-permute (signal) bit.
    #[inline]
    pub fn lsb(&self) -> bool {
        *self & Block::ONE == Block::ONE
    }

    /// Returns a copy of the block whose least significant bit is `bit`.
    #[inline]
    pub fn with_lsb(&self, bit: bool) -> Block {
        (*self & Block::MASK_LSB) | Block::ONE.const_mul(bit)
    }

    /// Shifts both 64-bit lanes left by one bit (the `2A` transform).
    ///
    /// The top bit of each lane is dropped, so this is not a doubling in
    /// GF(2^128) and has no inverse.
    #[inline]
    pub fn lanes_shl1(&self) -> Block {
        Block::pack(self.low() << 1, self.high() << 1)
    }

    /// Shifts both 64-bit lanes right by one bit (the `4B` transform).
    #[inline]
    pub fn lanes_shr1(&self) -> Block {
        Block::pack(self.low() >> 1, self.high() >> 1)
    }

    /// Computes self * b, where b is `bool` in constant time.
    #[inline]
    pub fn const_mul(&self, b: bool) -> Block {
        Block::conditional_select(&Block::ZERO, self, Choice::from(u8::from(b)))
    }
}

impl BitAnd for Block {
    type Output = Self;

    #[inline]
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl BitOr for Block {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitXor for Block {
    type Output = Self;

    #[inline]
    fn bitxor(self, rhs: Self) -> Self {
        Self(self.0 ^ rhs.0)
    }
}

impl BitXorAssign for Block {
    #[inline]
    fn bitxor_assign(&mut self, rhs: Self) {
        *self = *self ^ rhs;
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        let a: u128 = (*self).into();
        let b: u128 = (*other).into();
        a.ct_eq(&b).into()
    }
}

impl Eq for Block {}

impl Distribution<Block> for StandardUniform {
    #[inline]
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Block {
        let mut bytes = [0; 16];
        rng.fill_bytes(&mut bytes);
        Block::new(bytes)
    }
}

impl From<Block> for cipher::Array<u8, sizes::U16> {
    #[inline]
    fn from(value: Block) -> Self {
        Self(*value.as_bytes())
    }
}

impl From<cipher::Array<u8, sizes::U16>> for Block {
    #[inline]
    fn from(value: cipher::Array<u8, sizes::U16>) -> Self {
        Self::new(value.0)
    }
}

impl From<[u8; 16]> for Block {
    #[inline]
    fn from(value: [u8; 16]) -> Self {
        Self::new(value)
    }
}

impl From<Block> for [u8; 16] {
    fn from(value: Block) -> Self {
        *value.as_bytes()
    }
}

impl From<Block> for u128 {
    #[inline]
    fn from(value: Block) -> Self {
        u128::from_ne_bytes(*value.as_bytes())
    }
}

impl From<u128> for Block {
    #[inline]
    fn from(value: u128) -> Self {
        Self::new(value.to_ne_bytes())
    }
}

impl From<usize> for Block {
    fn from(value: usize) -> Self {
        (value as u128).into()
    }
}

// required of a `SeedableRng::Seed`
impl AsRef<[u8]> for Block {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl AsMut<[u8]> for Block {
    #[inline]
    fn as_mut(&mut self) -> &mut [u8] {
        self.as_mut_bytes()
    }
}

impl ConditionallySelectable for Block {
    #[inline]
    // adapted from https://github.com/dalek-cryptography/subtle/blob/369e7463e85921377a5f2df80aabcbbc6d57a930/src/lib.rs#L510-L517
    fn conditional_select(a: &Self, b: &Self, choice: Choice) -> Self {
        // if choice = 0, mask = (-0) = 0000...0000
        // if choice = 1, mask = (-1) = 1111...1111
        let mask = Block::new((-(choice.unwrap_u8() as i128)).to_le_bytes());
        *a ^ (mask & (*a ^ *b))
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Block({:#034x})", u128::from(*self))
    }
}

#[cfg(test)]
mod tests {
    use subtle::{Choice, ConditionallySelectable};

    use super::Block;

    #[test]
    fn test_block_cond_select() {
        let choice = Choice::from(0);
        assert_eq!(
            Block::ZERO,
            Block::conditional_select(&Block::ZERO, &Block::ONE, choice)
        );
        let choice = Choice::from(1);
        assert_eq!(
            Block::ONE,
            Block::conditional_select(&Block::ZERO, &Block::ONE, choice)
        );
    }

    #[test]
    fn test_pack() {
        let b = Block::pack(42, 123);
        assert_eq!(42, b.low());
        assert_eq!(123, b.high());
    }

    #[test]
    fn test_mask_lsb() {
        assert_eq!(Block::pack(u64::MAX, u64::MAX) ^ Block::ONE, Block::MASK_LSB);
    }

    #[test]
    fn test_debug_is_hex() {
        assert_eq!(
            "Block(0x0000000000000000000000000000002a)",
            format!("{:?}", Block::from(42_u128))
        );
    }

    #[test]
    fn test_with_lsb() {
        let b = Block::from(0b1010_u128);
        assert!(!b.lsb());
        assert!(b.with_lsb(true).lsb());
        assert_eq!(Block::from(0b1011_u128), b.with_lsb(true));
        assert_eq!(b, b.with_lsb(true).with_lsb(false));
    }

    #[test]
    fn test_lane_shifts() {
        let b = Block::pack(u64::MAX, 0b11);
        let shl = b.lanes_shl1();
        assert_eq!(u64::MAX << 1, shl.low());
        assert_eq!(0b110, shl.high());
        let shr = b.lanes_shr1();
        assert_eq!(u64::MAX >> 1, shr.low());
        assert_eq!(0b1, shr.high());
    }

    #[test]
    fn test_seed_bytes() {
        let mut b = Block::ZERO;
        b.as_mut().copy_from_slice(Block::ONE.as_ref());
        assert_eq!(Block::ONE, b);
        assert_eq!(&Block::ONE.as_bytes()[..], b.as_ref());
    }

    #[test]
    fn test_usize_and_u128_agree() {
        assert_eq!(Block::from(1234_u128), Block::from(1234_usize));
        assert_eq!(1234_u128, u128::from(Block::from(1234_usize)));
    }
}
