//! Degree-2 polynomials over GF(2^128) through three points.
//!
//! Nodes are small field elements (the row points `1..=4` and the two
//! transmitted points `5`, `6`), so the denominators of the Lagrange basis are
//! small as well and their inverses come from a table.
use std::sync::LazyLock;

use crate::block::Block;

/// Inverses of the field elements `0..64` (with `0` mapped to `0`).
static SMALL_INVERSES: LazyLock<[Block; 64]> =
    LazyLock::new(|| std::array::from_fn(|i| Block::from(i).gf_inv()));

fn inverse(x: Block) -> Block {
    match usize::try_from(u128::from(x)) {
        Ok(i) if i < 64 => SMALL_INVERSES[i],
        _ => x.gf_inv(),
    }
}

/// `c0 + c1·x + c2·x²`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Quadratic([Block; 3]);

impl Quadratic {
    /// The unique polynomial of degree at most 2 through three points with
    /// distinct `x` coordinates.
    pub(crate) fn through(points: [(Block, Block); 3]) -> Self {
        let mut coeffs = [Block::ZERO; 3];
        for i in 0..3 {
            let (xi, yi) = points[i];
            let (xj, _) = points[(i + 1) % 3];
            let (xk, _) = points[(i + 2) % 3];
            // y_i (x - x_j)(x - x_k) / ((x_i - x_j)(x_i - x_k)), subtraction is xor
            let denominator = (xi ^ xj).gf_mul(&(xi ^ xk));
            let scale = yi.gf_mul(&inverse(denominator));
            coeffs[2] ^= scale;
            coeffs[1] ^= scale.gf_mul(&(xj ^ xk));
            coeffs[0] ^= scale.gf_mul(&xj.gf_mul(&xk));
        }
        Self(coeffs)
    }

    pub(crate) fn eval(&self, x: Block) -> Block {
        let [c0, c1, c2] = self.0;
        c2.gf_mul(&x).gf_mul(&x) ^ c1.gf_mul(&x) ^ c0
    }
}

/// The field element of a small integer, used for interpolation nodes.
#[inline]
pub(crate) fn point(i: usize) -> Block {
    Block::from(i)
}

#[cfg(test)]
mod tests {
    use rand::random;

    use super::{Quadratic, inverse, point};
    use crate::block::Block;

    #[test]
    fn passes_through_its_points() {
        let ys: [Block; 3] = random();
        let points = [(point(1), ys[0]), (point(5), ys[1]), (point(6), ys[2])];
        let q = Quadratic::through(points);
        for (x, y) in points {
            assert_eq!(y, q.eval(x));
        }
    }

    #[test]
    fn any_three_points_define_the_same_polynomial() {
        let ys: [Block; 3] = random();
        let q = Quadratic::through([(point(2), ys[0]), (point(3), ys[1]), (point(4), ys[2])]);
        let r = Quadratic::through([
            (point(2), ys[0]),
            (point(5), q.eval(point(5))),
            (point(6), q.eval(point(6))),
        ]);
        assert_eq!(q, r);
        assert_eq!(q.eval(point(200)), r.eval(point(200)));
    }

    #[test]
    fn small_inverses() {
        for i in 1..64 {
            assert_eq!(Block::ONE, point(i).gf_mul(&inverse(point(i))));
        }
        let big: Block = random();
        assert_eq!(big.gf_inv(), inverse(big));
    }
}
