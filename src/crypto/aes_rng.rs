//! RNG based on AES in CTR mode.
//!
//! All wire keys of a garbling are drawn from an [`AesRng`] seeded with the
//! garbling seed, so a garbling is a deterministic function of its seed. The
//! 128-bit counter is split into a stream id (high 64 bits) and a position
//! (low 64 bits), which gives independent streams for independent consumers
//! of the same seed.
use std::mem;

use aes::{
    Aes128,
    cipher::{BlockCipherEncrypt, KeyInit},
};
use rand::rand_core::block::{BlockRng, BlockRngCore, CryptoBlockRng};
use rand::{CryptoRng, RngCore, SeedableRng};

use crate::block::Block;

/// Independent key streams derived from one seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub(crate) enum Stream {
    /// Input keys, the global offset and non-free-XOR output keys.
    Garbling = 0,
    /// Fresh output keys of the unlinkability layer.
    UnlinkableOutputs = 1,
}

/// AES in counter mode, used as a PRG.
#[derive(Clone, Debug)]
pub(crate) struct AesRng(BlockRng<AesRngCore>);

impl RngCore for AesRng {
    #[inline]
    fn next_u32(&mut self) -> u32 {
        self.0.next_u32()
    }

    #[inline]
    fn next_u64(&mut self) -> u64 {
        self.0.next_u64()
    }

    #[inline]
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        let block_size = mem::size_of::<aes::Block>();
        let block_len = dest.len() / block_size * block_size;
        let (block_bytes, rest_bytes) = dest.split_at_mut(block_len);
        // whole blocks are encrypted in place, without going through the u32 buffer
        let blocks = bytemuck::cast_slice_mut::<_, aes::Block>(block_bytes);
        for chunk in blocks.chunks_mut(AES_PAR_BLOCKS) {
            for block in chunk.iter_mut() {
                *block = self.0.core.next_counter();
            }
            self.0.core.aes.encrypt_blocks(chunk);
        }
        self.0.fill_bytes(rest_bytes)
    }
}

impl SeedableRng for AesRng {
    type Seed = Block;

    #[inline]
    fn from_seed(seed: Self::Seed) -> Self {
        AesRng(BlockRng::<AesRngCore>::from_seed(seed))
    }
}

impl CryptoRng for AesRng {}

impl AesRng {
    /// An RNG producing the key stream `stream` of `seed`.
    pub(crate) fn for_stream(seed: Block, stream: Stream) -> Self {
        let mut core = AesRngCore::from_seed(seed);
        core.state = (stream as u64 as u128) << 64;
        AesRng(BlockRng::new(core))
    }
}

/// The core of `AesRng`, used with `BlockRng`.
#[derive(Clone)]
pub(crate) struct AesRngCore {
    aes: Aes128,
    state: u128,
}

impl AesRngCore {
    #[inline]
    fn next_counter(&mut self) -> aes::Block {
        let counter = aes::cipher::Array(self.state.to_le_bytes());
        self.state = self.state.wrapping_add(1);
        counter
    }
}

impl std::fmt::Debug for AesRngCore {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "AesRngCore {{}}")
    }
}

impl BlockRngCore for AesRngCore {
    type Item = u32;
    // This is equivalent to `[Block; AES_PAR_BLOCKS]`
    type Results = hidden::ParBlockWrapper;

    // Compute `E(state)` for `AES_PAR_BLOCKS` consecutive counter values.
    #[inline]
    fn generate(&mut self, results: &mut Self::Results) {
        let blocks = bytemuck::cast_slice_mut::<_, aes::Block>(results.as_mut());
        blocks
            .iter_mut()
            .for_each(|blk| *blk = self.next_counter());
        self.aes.encrypt_blocks(blocks);
    }
}

mod hidden {
    use super::AES_PAR_BLOCKS;

    /// Equivalent to `[aes::Block; AES_PAR_BLOCKS]`. Large arrays don't
    /// implement `Default`, hence the wrapper.
    #[derive(Copy, Clone)]
    pub(crate) struct ParBlockWrapper([u32; AES_PAR_BLOCKS * 4]);

    impl Default for ParBlockWrapper {
        fn default() -> Self {
            Self([0; AES_PAR_BLOCKS * 4])
        }
    }

    impl AsMut<[u32]> for ParBlockWrapper {
        fn as_mut(&mut self) -> &mut [u32] {
            &mut self.0
        }
    }

    impl AsRef<[u32]> for ParBlockWrapper {
        fn as_ref(&self) -> &[u32] {
            &self.0
        }
    }
}

impl SeedableRng for AesRngCore {
    type Seed = Block;

    #[inline]
    fn from_seed(seed: Self::Seed) -> Self {
        AesRngCore {
            aes: Aes128::new(&seed.into()),
            state: 0,
        }
    }
}

impl CryptoBlockRng for AesRngCore {}

/// Number of Blocks for which hardware accelerated AES can make use of ILP.
///
/// This corresponds to `ParBlocksSize` in [`aes::cipher::ParBlocksSizeUser`]
/// for the SIMD backend of the target architecture. Its value only affects
/// performance, never the produced keys or tables.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub(crate) const AES_PAR_BLOCKS: usize = 9;
#[cfg(target_arch = "aarch64")]
pub(crate) const AES_PAR_BLOCKS: usize = 21;
#[cfg(not(any(target_arch = "x86", target_arch = "x86_64", target_arch = "aarch64")))]
pub(crate) const AES_PAR_BLOCKS: usize = 4;

#[cfg(test)]
mod tests {
    use rand::{Rng, RngCore, SeedableRng};

    use super::{AesRng, Stream};
    use crate::block::Block;

    #[test]
    fn same_seed_same_stream() {
        let seed = Block::from(42_u128);
        let a: [Block; 12] = AesRng::from_seed(seed).random();
        let b: [Block; 12] = AesRng::for_stream(seed, Stream::Garbling).random();
        assert_eq!(a, b);
    }

    #[test]
    fn streams_are_independent() {
        let seed = Block::from(42_u128);
        let a: [Block; 4] = AesRng::for_stream(seed, Stream::Garbling).random();
        let b: [Block; 4] = AesRng::for_stream(seed, Stream::UnlinkableOutputs).random();
        assert_ne!(a, b);
    }

    #[test]
    fn byte_and_word_output_agree_on_keystream() {
        let seed = Block::from(7_u128);
        let mut bytes = [0_u8; 16 * 3 + 5];
        AesRng::from_seed(seed).fill_bytes(&mut bytes);
        let blocks: [Block; 3] = AesRng::from_seed(seed).random();
        assert_eq!(bytemuck::cast_slice::<Block, u8>(&blocks), &bytes[..48]);
    }
}

#[cfg(all(test, not(miri), target_feature = "aes"))]
mod aes_par_blocks_tests {
    use aes::{
        Aes128,
        cipher::{
            BlockCipherEncClosure, BlockCipherEncrypt, BlockSizeUser, KeyInit, ParBlocksSizeUser,
        },
    };

    use super::AES_PAR_BLOCKS;

    #[test]
    fn aes_par_block_size() {
        use aes::cipher::typenum::Unsigned;

        struct GetParBlockSize;
        impl BlockSizeUser for GetParBlockSize {
            type BlockSize = aes::cipher::array::sizes::U16;
        }
        impl BlockCipherEncClosure for GetParBlockSize {
            fn call<B: aes::cipher::BlockCipherEncBackend<BlockSize = Self::BlockSize>>(
                self,
                _backend: &B,
            ) {
                assert_eq!(
                    AES_PAR_BLOCKS,
                    <<B as ParBlocksSizeUser>::ParBlocksSize as Unsigned>::USIZE,
                );
            }
        }
        let aes = Aes128::new(&Default::default());
        aes.encrypt_with_backend(GetParBlockSize);
    }
}
