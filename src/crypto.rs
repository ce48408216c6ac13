//! Cryptographic building blocks: the row encryption cipher, the AES-CTR
//! generator that samples wire keys, and interpolation over GF(2^128).
mod aes_hash;
mod aes_rng;
mod interpolate;

pub use aes_hash::{CipherKey, FIXED_KEY};
pub(crate) use aes_hash::{GateCipher, WirePrf, pair_input, single_input};
pub(crate) use aes_rng::{AES_PAR_BLOCKS, AesRng, Stream};
pub(crate) use interpolate::{Quadratic, point};
