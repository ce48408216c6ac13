//! AES based encryption of garbled table rows.
//!
//! Rows are masked with the correlation robust hash `H(K) = π(K) ^ K` of
//! <https://eprint.iacr.org/2019/074>, where `π` is AES-128 under a public
//! key and `K = 2A ^ 4B ^ tweak` combines the input keys of a gate with a
//! per-gate tweak. `2A` shifts both 64-bit lanes of `A` left by one bit, `4B`
//! shifts both lanes of `B` right by one bit, so the two inputs never cancel
//! out for related keys.
use aes::{
    Aes128,
    cipher::{BlockCipherEncrypt, KeyInit},
};
use serde::{Deserialize, Serialize};

use crate::{block::Block, crypto::AES_PAR_BLOCKS, data_types::Label};

/// The public key of fixed-key garbling.
///
/// This value is not a secret: every garbler and evaluator uses it. It was
/// chosen at random, any other key works just as well.
pub const FIXED_KEY: Block = Block::pack(0x9186_58c2_0b53_c73f, 0x6be4_1df0_98a4_a2d1);

/// Context string for deriving the cipher key of seeded garbling.
const SEEDED_KEY_CONTEXT: &str = "yao-gc 2024-06 seeded gate cipher key";

/// The key of the block cipher used to encrypt table rows.
///
/// Garbler and evaluator must use the same key for one garbled circuit; the
/// key travels with the circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CipherKey {
    /// The public [`FIXED_KEY`], shared by all circuits.
    Fixed,
    /// A circuit specific key derived from the garbling seed.
    Seeded(Block),
}

impl CipherKey {
    /// Derives the circuit specific key for `seed`.
    ///
    /// The derived key reveals nothing about the seed, so it can be sent to
    /// the evaluator.
    pub fn from_seed(seed: Block) -> Self {
        let derived = blake3::derive_key(SEEDED_KEY_CONTEXT, seed.as_bytes());
        let mut key = [0; 16];
        key.copy_from_slice(&derived[..16]);
        CipherKey::Seeded(Block::new(key))
    }

    /// The AES key.
    pub fn block(&self) -> Block {
        match self {
            CipherKey::Fixed => FIXED_KEY,
            CipherKey::Seeded(key) => *key,
        }
    }
}

/// `K = 2A ^ 4B ^ tweak`, the cipher input for a gate with two inputs.
#[inline]
pub(crate) fn pair_input(a: Label, b: Label, tweak: Block) -> Block {
    a.0.lanes_shl1() ^ b.0.lanes_shr1() ^ tweak
}

/// `K = 2A ^ tweak`, the cipher input for a gate with one input.
#[inline]
pub(crate) fn single_input(a: Label, tweak: Block) -> Block {
    a.0.lanes_shl1() ^ tweak
}

/// The row encryption primitive `H(K) = π(K) ^ K`.
#[derive(Clone)]
pub(crate) struct GateCipher {
    aes: Aes128,
}

impl GateCipher {
    /// Create a new `GateCipher` with the given key.
    pub(crate) fn new(key: CipherKey) -> Self {
        Self {
            aes: Aes128::new(&key.block().into()),
        }
    }

    /// `H(K)` for a single cipher input.
    pub(crate) fn hash(&self, input: Block) -> Block {
        let mut enc = input.into();
        self.aes.encrypt_block(&mut enc);
        input ^ enc.into()
    }

    /// `H(2A ^ 4B ^ tweak)`.
    #[inline]
    pub(crate) fn hash_pair(&self, a: Label, b: Label, tweak: Block) -> Block {
        self.hash(pair_input(a, b, tweak))
    }

    /// `H(2A ^ tweak)`.
    #[inline]
    pub(crate) fn hash_single(&self, a: Label, tweak: Block) -> Block {
        self.hash(single_input(a, tweak))
    }

    /// `H(K)` for several independent inputs, pipelined in one cipher call.
    pub(crate) fn hash_many<const N: usize>(&self, inputs: [Block; N]) -> [Block; N] {
        let mut blocks: [aes::Block; N] = inputs.map(Into::into);
        self.aes.encrypt_blocks(&mut blocks);
        let mut out = inputs;
        out.iter_mut()
            .zip(blocks)
            .for_each(|(x, x_enc)| *x ^= x_enc.into());
        out
    }

    /// `H(K)` in place for a slice of inputs, chunked for instruction-level
    /// parallelism.
    pub(crate) fn hash_slice_mut(&self, x: &mut [Block]) {
        let mut tmp = [aes::Block::default(); AES_PAR_BLOCKS];
        for chunk in x.chunks_mut(AES_PAR_BLOCKS) {
            let tmp = &mut tmp[..chunk.len()];
            tmp.iter_mut()
                .zip(chunk.iter())
                .for_each(|(t, x)| *t = (*x).into());
            self.aes.encrypt_blocks(tmp);
            chunk
                .iter_mut()
                .zip(tmp.iter())
                .for_each(|(x, x_enc)| *x ^= (*x_enc).into());
        }
    }
}

/// AES keyed with a wire key, the PRF of garbling without a fixed key.
///
/// Every instance runs its own key schedule, which is the price of not
/// relying on a public permutation.
pub(crate) struct WirePrf {
    aes: Aes128,
}

impl WirePrf {
    pub(crate) fn new(key: Label) -> Self {
        Self {
            aes: Aes128::new(&key.0.into()),
        }
    }

    /// `AES_key(input)`.
    pub(crate) fn eval(&self, input: Block) -> Block {
        let mut block = input.into();
        self.aes.encrypt_block(&mut block);
        block.into()
    }
}
