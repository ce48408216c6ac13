//! Two-row garbling without free-XOR and without a fixed-key cipher.
//!
//! The key of the row with signal bits `(sa, sb)` is
//! `K = AES_A(T) ^ AES_B(T')`, with the input wire keys `A`, `B` as AES keys
//! and `T`, `T'` derived from the gate index. Row `r = 2·sa + sb` is the point
//! `(r + 1, K)`. The rows with equal output value lie on a common polynomial
//! of degree 2, and the garbler publishes the values of that polynomial at
//! the points 5 and 6. The evaluator interpolates its own row point and the
//! two published points and evaluates the result at a point chosen by the
//! garbler (the selector), where the keys of the two output values have
//! different signal bits.
//!
//! Gates with a constant truth table publish their output key directly.
use crate::{
    block::Block,
    circuit::TruthTable,
    crypto::{Quadratic, WirePrf, point},
    data_types::{Label, LabelPair},
    garble::Error,
};

const FIRST_POINT: usize = 5;
const SECOND_POINT: usize = 6;

/// The result of garbling one gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct GarbledGate {
    pub(crate) output: LabelPair,
    pub(crate) rows: [Block; 2],
    pub(crate) selector: u8,
}

/// Tweaks of the `n`-th gate for its first and second input.
fn tweaks(n: usize) -> (Block, Block) {
    let tweak = Block::from(n);
    (tweak, tweak ^ Block::pack(0, 1))
}

/// `0` for selector `0`, else `selector + 6`, never one of the row points.
fn evaluation_point(selector: u8) -> Block {
    match selector {
        0 => Block::ZERO,
        s => point(s as usize + SECOND_POINT),
    }
}

fn row_point(r: usize) -> Block {
    point(r + 1)
}

/// Value at the second published point of the polynomial through `rows`
/// and `(5, t0)`, written as `c + λ·t0`.
fn second_point_affine(rows: [(Block, Block); 2]) -> (Block, Block) {
    let [(x1, y1), (x2, y2)] = rows;
    let c = Quadratic::through([(x1, y1), (x2, y2), (point(FIRST_POINT), Block::ZERO)])
        .eval(point(SECOND_POINT));
    let lambda = Quadratic::through([
        (x1, Block::ZERO),
        (x2, Block::ZERO),
        (point(FIRST_POINT), Block::ONE),
    ])
    .eval(point(SECOND_POINT));
    (c, lambda)
}

pub(crate) fn garble(
    tt: TruthTable,
    a: LabelPair,
    b: LabelPair,
    n: usize,
) -> Result<GarbledGate, Error> {
    let (ta, tb) = tweaks(n);
    if tt.is_constant() {
        // both keys depend on the two key pairs, the evaluator knows one key of each
        let known = Label(WirePrf::new(Label(a.offset())).eval(b.offset() ^ ta));
        let other = Label(WirePrf::new(Label(b.offset())).eval(a.offset() ^ tb))
            .with_signal_bit(!known.signal_bit());
        let output = if tt.row(0) {
            LabelPair::new(other, known)
        } else {
            LabelPair::new(known, other)
        };
        return Ok(GarbledGate {
            output,
            rows: [known.0, Block::ZERO],
            selector: 0,
        });
    }

    let ka = [false, true].map(|s| WirePrf::new(a.by_signal(s)).eval(ta));
    let kb = [false, true].map(|s| WirePrf::new(b.by_signal(s)).eval(tb));
    let mut groups: [Vec<(Block, Block)>; 2] = [Vec::with_capacity(3), Vec::with_capacity(3)];
    for r in 0..4 {
        let (sa, sb) = (r >> 1, r & 1);
        let value = tt.eval(a.value_of_signal(sa == 1), b.value_of_signal(sb == 1));
        groups[value as usize].push((row_point(r), ka[sa] ^ kb[sb]));
    }

    let [zeros, ones] = &groups;
    let (published, polys) = if zeros.len() == 2 {
        let (c0, l0) = second_point_affine([zeros[0], zeros[1]]);
        let (c1, l1) = second_point_affine([ones[0], ones[1]]);
        if l0 == l1 {
            return Err(Error::DegenerateGate(n));
        }
        let t0 = (c0 ^ c1).gf_mul(&(l0 ^ l1).gf_inv());
        let t1 = c0 ^ l0.gf_mul(&t0);
        let extra = [(point(FIRST_POINT), t0), (point(SECOND_POINT), t1)];
        let polys =
            [zeros, ones].map(|group| Quadratic::through([group[0], extra[0], extra[1]]));
        ([t0, t1], polys)
    } else {
        let (majority, minority) = if zeros.len() == 3 {
            (zeros, ones)
        } else {
            (ones, zeros)
        };
        let p = Quadratic::through([majority[0], majority[1], majority[2]]);
        let t0 = p.eval(point(FIRST_POINT));
        let t1 = p.eval(point(SECOND_POINT));
        let q = Quadratic::through([
            minority[0],
            (point(FIRST_POINT), t0),
            (point(SECOND_POINT), t1),
        ]);
        let polys = if zeros.len() == 3 { [p, q] } else { [q, p] };
        ([t0, t1], polys)
    };

    for selector in 0..=u8::MAX {
        let x = evaluation_point(selector);
        let [zero, one] = polys.map(|poly| Label(poly.eval(x)));
        if zero.signal_bit() != one.signal_bit() {
            return Ok(GarbledGate {
                output: LabelPair::new(zero, one),
                rows: published,
                selector,
            });
        }
    }
    Err(Error::DegenerateGate(n))
}

/// Recovers the output key of the `n`-th gate from one key per input.
pub(crate) fn evaluate(
    tt: TruthTable,
    a: Label,
    b: Label,
    n: usize,
    rows: &[Block],
    selector: u8,
) -> Label {
    if tt.is_constant() {
        return Label(rows[0]);
    }
    let (ta, tb) = tweaks(n);
    let r = 2 * a.signal_bit() as usize + b.signal_bit() as usize;
    let key = WirePrf::new(a).eval(ta) ^ WirePrf::new(b).eval(tb);
    let poly = Quadratic::through([
        (row_point(r), key),
        (point(FIRST_POINT), rows[0]),
        (point(SECOND_POINT), rows[1]),
    ]);
    Label(poly.eval(evaluation_point(selector)))
}
