//! Arithmetic in GF(2^128), used to interpolate the two-row tables of the
//! four-to-two garbling scheme.
//!
//! Only the portable, constant-time implementation is provided. Four-to-two
//! garbling spends its time in the AES key schedule, not in field arithmetic.
use super::Block;

impl Block {
    /// Multiplication over GF(2^128).
    ///
    /// Uses the irreducible polynomial `x^128 + x^7 + x^2 + x + 1`.
    #[inline]
    pub fn gf_mul(&self, rhs: &Self) -> Self {
        let (low, high) = clmul128((*self).into(), (*rhs).into());
        gf128_reduce(low, high).into()
    }

    /// Multiplicative inverse over GF(2^128).
    ///
    /// Computed as `self^(2^128 - 2)`. The inverse of zero is defined as zero.
    pub fn gf_inv(&self) -> Self {
        // 2^128 - 2 = 2 + 4 + ... + 2^127
        let mut square = *self;
        let mut acc = Block::ONE;
        for _ in 1..128 {
            square = square.gf_mul(&square);
            acc = acc.gf_mul(&square);
        }
        acc
    }
}

/// Carry-less multiply of two 128-bit numbers.
///
/// Return (low, high) bits
#[inline]
fn clmul128(a: u128, b: u128) -> (u128, u128) {
    let (a_low, a_high) = (a as u64, (a >> 64) as u64);
    let (b_low, b_high) = (b as u64, (b >> 64) as u64);

    // karatsuba
    let ab_low = clmul64(a_low, b_low);
    let ab_high = clmul64(a_high, b_high);
    let ab_mid = clmul64(a_low ^ a_high, b_low ^ b_high) ^ ab_low ^ ab_high;
    let low = ab_low ^ (ab_mid << 64);
    let high = ab_high ^ (ab_mid >> 64);
    (low, high)
}

/// Carry-less multiply of two 64-bit numbers, as a 32-bit karatsuba step.
#[inline]
fn clmul64(a: u64, b: u64) -> u128 {
    let (a_low, a_high) = (a as u32, (a >> 32) as u32);
    let (b_low, b_high) = (b as u32, (b >> 32) as u32);

    let ab_low = clmul32(a_low, b_low);
    let ab_high = clmul32(a_high, b_high);
    let ab_mid = clmul32(a_low ^ a_high, b_low ^ b_high) ^ ab_low ^ ab_high;
    u128::from(ab_low) ^ (u128::from(ab_mid) << 32) ^ (u128::from(ab_high) << 64)
}

// Uses the technique described in https://www.bearssl.org/constanttime.html#ghash-for-gcm
/// Multiplication in GF(2)[X] with “holes” (sequences of zeroes) to avoid
/// carry spilling.
///
/// A result bit sums at most 8 partial products per hole class, which fits
/// the 3 zero bits between two positions of a class. The holes are only wide
/// enough for 32-bit operands.
#[inline]
fn clmul32(x: u32, y: u32) -> u64 {
    let x0 = u64::from(x & 0x1111_1111);
    let x1 = u64::from(x & 0x2222_2222);
    let x2 = u64::from(x & 0x4444_4444);
    let x3 = u64::from(x & 0x8888_8888);
    let y0 = u64::from(y & 0x1111_1111);
    let y1 = u64::from(y & 0x2222_2222);
    let y2 = u64::from(y & 0x4444_4444);
    let y3 = u64::from(y & 0x8888_8888);

    let mut z0 = (x0 * y0) ^ (x1 * y3) ^ (x2 * y2) ^ (x3 * y1);
    let mut z1 = (x0 * y1) ^ (x1 * y0) ^ (x2 * y3) ^ (x3 * y2);
    let mut z2 = (x0 * y2) ^ (x1 * y1) ^ (x2 * y0) ^ (x3 * y3);
    let mut z3 = (x0 * y3) ^ (x1 * y2) ^ (x2 * y1) ^ (x3 * y0);

    z0 &= 0x1111_1111_1111_1111;
    z1 &= 0x2222_2222_2222_2222;
    z2 &= 0x4444_4444_4444_4444;
    z3 &= 0x8888_8888_8888_8888;

    z0 | z1 | z2 | z3
}

/// Reduces a 256-bit value (`high`, `low`) modulo
/// `x^128 + x^7 + x^2 + x + 1`, using `x^128 ≡ x^7 + x^2 + x + 1`.
#[inline]
fn gf128_reduce(low: u128, high: u128) -> u128 {
    // x << shift as (overflow, lower), for 0 < shift < 128
    #[inline]
    fn shift_u128(x: u128, shift: u32) -> (u128, u128) {
        (x >> (128 - shift), x << shift)
    }

    let (ov7, lo7) = shift_u128(high, 7);
    let (ov2, lo2) = shift_u128(high, 2);
    let (ov1, lo1) = shift_u128(high, 1);

    let combined_low = lo7 ^ lo2 ^ lo1 ^ high;
    // at most 7 bits wide, one more multiplication by the reduction
    // polynomial cannot overflow again
    let overflow = ov7 ^ ov2 ^ ov1;
    let reduced_overflow = (overflow << 7) ^ (overflow << 2) ^ (overflow << 1) ^ overflow;

    low ^ combined_low ^ reduced_overflow
}
