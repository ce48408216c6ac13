//! The garbling engine.
//!
//! [`garble`] turns a [`CircuitSpec`] into a [`GarbledCircuit`] (the garbled
//! table, the translation table and the public cipher key, everything the
//! evaluator receives) and a [`GarblingOutput`] with both keys of every input
//! and output wire, which stays with the garbler.
//!
//! Gates are processed in file order. Free gates are computed by XORing keys;
//! every other gate appends `rows_per_gate` rows to the table, so the `n`-th
//! non-free gate owns the rows `n * rows_per_gate ..`. Evaluation and
//! verification count non-free gates the same way.
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{Level, debug, instrument, trace};

use crate::{
    block::Block,
    circuit::{self, CircuitSpec, Linear, TruthTable},
    crypto::{AesRng, CipherKey, GateCipher, Stream, pair_input, single_input},
    data_types::{Delta, Label, LabelPair},
    variant::{GarblingConfig, GarblingVariant, GateKind, KeyMode, TableShape},
};

pub(crate) mod four_to_two;

/// Errors raised while garbling or while receiving a garbled circuit.
#[derive(Debug, Error)]
pub enum Error {
    /// Re-randomized output keys are only defined for free-XOR variants.
    #[error("unlinkable outputs require a free-XOR variant, {0:?} has no global offset")]
    UnlinkableOutputsRequireFreeXor(GarblingVariant),
    /// A variant that cannot be combined with the requested key mode.
    #[error("{variant:?} garbling cannot use the {key_mode:?} cipher key")]
    IncompatibleConfig {
        /// The requested variant.
        variant: GarblingVariant,
        /// The requested key mode.
        key_mode: KeyMode,
    },
    /// A flat buffer whose length does not match the circuit.
    #[error("expected {expected} bytes, got {actual}")]
    WrongTableSize {
        /// The size computed from circuit and configuration.
        expected: usize,
        /// The size of the received buffer.
        actual: usize,
    },
    /// A translation table entry other than 0 or 1.
    #[error("translation table entry {index} is {value}, expected 0 or 1")]
    InvalidTranslationEntry {
        /// Position of the entry.
        index: usize,
        /// The received byte.
        value: u8,
    },
    /// No evaluation point gives the two output keys of a four-to-two gate
    /// distinct signal bits. Happens with negligible probability.
    #[error("could not separate the output keys of non-free gate {0}")]
    DegenerateGate(usize),
}

/// The encrypted rows of all non-free gates, followed by the rows of the
/// unlinkability layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GarbledTable {
    pub(crate) rows: Vec<Block>,
    pub(crate) selectors: Vec<u8>,
}

impl GarbledTable {
    pub(crate) fn zeroed(shape: &TableShape) -> Self {
        Self {
            rows: vec![Block::ZERO; shape.rows()],
            selectors: vec![0; shape.selectors],
        }
    }

    /// All 128-bit rows.
    pub fn rows(&self) -> &[Block] {
        &self.rows
    }

    /// Evaluation point selectors of the four-to-two variant.
    pub fn selectors(&self) -> &[u8] {
        &self.selectors
    }

    /// The flat byte representation: all rows, then all selectors.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.rows.len() * Block::BYTES + self.selectors.len());
        bytes.extend_from_slice(bytemuck::cast_slice(&self.rows));
        bytes.extend_from_slice(&self.selectors);
        bytes
    }

    /// Parses a flat buffer, which must have exactly `shape.bytes()` bytes.
    pub fn from_bytes(shape: &TableShape, bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != shape.bytes() {
            return Err(Error::WrongTableSize {
                expected: shape.bytes(),
                actual: bytes.len(),
            });
        }
        let (rows, selectors) = bytes.split_at(shape.rows() * Block::BYTES);
        let rows = rows
            .chunks_exact(Block::BYTES)
            .map(|chunk| {
                let mut row = [0; Block::BYTES];
                row.copy_from_slice(chunk);
                Block::new(row)
            })
            .collect();
        Ok(Self {
            rows,
            selectors: selectors.to_vec(),
        })
    }
}

/// One byte per output wire: the signal bit of the output's zero key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationTable(pub(crate) Vec<u8>);

impl TranslationTable {
    fn from_output_keys(outputs: &[LabelPair]) -> Self {
        Self(
            outputs
                .iter()
                .map(|pair| pair.zero.signal_bit() as u8)
                .collect(),
        )
    }

    /// The table bytes, each 0 or 1.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Parses a table for `outputs` output wires.
    pub fn from_bytes(outputs: usize, bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != outputs {
            return Err(Error::WrongTableSize {
                expected: outputs,
                actual: bytes.len(),
            });
        }
        if let Some((index, &value)) = bytes.iter().enumerate().find(|(_, b)| **b > 1) {
            return Err(Error::InvalidTranslationEntry { index, value });
        }
        Ok(Self(bytes.to_vec()))
    }

    #[inline]
    pub(crate) fn bit(&self, i: usize) -> bool {
        self.0[i] == 1
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the circuit has no outputs.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The public part of a garbling, sent to the evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GarbledCircuit {
    pub(crate) config: GarblingConfig,
    pub(crate) cipher_key: CipherKey,
    pub(crate) shape: TableShape,
    pub(crate) table: GarbledTable,
    pub(crate) translation_table: TranslationTable,
}

impl GarbledCircuit {
    /// An empty holder on the evaluator side, to be filled with
    /// [`Self::set_garbled_table`] and [`Self::set_translation_table`].
    pub fn for_evaluation(
        circuit: &CircuitSpec,
        config: GarblingConfig,
        cipher_key: CipherKey,
    ) -> Result<Self, Error> {
        config.validate()?;
        let shape = TableShape::of(circuit, &config);
        Ok(Self {
            config,
            cipher_key,
            shape,
            table: GarbledTable::zeroed(&shape),
            translation_table: TranslationTable(vec![0; circuit.number_of_outputs()]),
        })
    }

    /// The configuration the circuit was garbled with.
    pub fn config(&self) -> &GarblingConfig {
        &self.config
    }

    /// The public key of the row encryption cipher.
    pub fn cipher_key(&self) -> CipherKey {
        self.cipher_key
    }

    /// The layout of the garbled table.
    pub fn shape(&self) -> &TableShape {
        &self.shape
    }

    /// The garbled table.
    pub fn garbled_table(&self) -> &GarbledTable {
        &self.table
    }

    /// The translation table.
    pub fn translation_table(&self) -> &TranslationTable {
        &self.translation_table
    }

    /// Size of the flat garbled table in bytes.
    pub fn garbled_table_size(&self) -> usize {
        self.shape.bytes()
    }

    /// Replaces the garbled table with a received flat buffer.
    pub fn set_garbled_table(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.table = GarbledTable::from_bytes(&self.shape, bytes)?;
        Ok(())
    }

    /// Replaces the translation table with a received buffer.
    pub fn set_translation_table(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.translation_table = TranslationTable::from_bytes(self.translation_table.len(), bytes)?;
        Ok(())
    }
}

/// The secret part of a garbling: both keys of all input and output wires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GarblingOutput {
    input_keys: Vec<LabelPair>,
    output_keys: Vec<LabelPair>,
}

impl GarblingOutput {
    /// Key pairs of all input wires, in the order of [`CircuitSpec::input_wires`].
    pub fn input_keys(&self) -> &[LabelPair] {
        &self.input_keys
    }

    /// Key pairs of all output wires, in output order.
    pub fn output_keys(&self) -> &[LabelPair] {
        &self.output_keys
    }

    /// The key pairs of the inputs of `party`.
    pub fn party_input_keys(
        &self,
        circuit: &CircuitSpec,
        party: usize,
    ) -> Result<&[LabelPair], circuit::Error> {
        let offset = circuit.party_input_offset(party)?;
        let len = circuit.party_number_of_inputs(party)?;
        Ok(&self.input_keys[offset..offset + len])
    }

    /// The keys encoding `bits`, one bit per input wire of the circuit.
    pub fn garbled_inputs(&self, bits: &[bool]) -> Result<Vec<Label>, circuit::Error> {
        select_keys(&self.input_keys, bits)
    }

    /// The keys encoding the inputs `bits` of `party`.
    pub fn garbled_inputs_for(
        &self,
        circuit: &CircuitSpec,
        party: usize,
        bits: &[bool],
    ) -> Result<Vec<Label>, circuit::Error> {
        select_keys(self.party_input_keys(circuit, party)?, bits)
    }
}

fn select_keys(pairs: &[LabelPair], bits: &[bool]) -> Result<Vec<Label>, circuit::Error> {
    if pairs.len() != bits.len() {
        return Err(circuit::Error::WrongInputSize {
            expected: pairs.len(),
            actual: bits.len(),
        });
    }
    Ok(pairs
        .iter()
        .zip(bits)
        .map(|(pair, &bit)| pair.select(bit))
        .collect())
}

/// Garbles `circuit`. The garbling is a deterministic function of
/// `(circuit, config, seed)`.
#[instrument(level = Level::DEBUG, skip_all, fields(variant = ?config.variant), err)]
pub fn garble(
    circuit: &CircuitSpec,
    config: GarblingConfig,
    seed: Block,
) -> Result<(GarbledCircuit, GarblingOutput), Error> {
    config.validate()?;
    let shape = TableShape::of(circuit, &config);
    let cipher_key = config.cipher_key(seed);
    let mut rng = AesRng::for_stream(seed, Stream::Garbling);
    let delta = Delta::from_random(rng.random());
    let mut garbler = Garbler {
        variant: config.variant,
        cipher: GateCipher::new(cipher_key),
        rng,
        delta,
        table: GarbledTable::zeroed(&shape),
    };

    let mut wires = vec![LabelPair::new(Label::ZERO, Label::ZERO); circuit.last_wire_index() + 1];
    let mut input_keys = Vec::with_capacity(circuit.number_of_inputs());
    for wire in circuit.input_wires() {
        let pair = garbler.fresh_pair();
        wires[wire] = pair;
        input_keys.push(pair);
    }

    let mut non_free = 0;
    for gate in circuit.gates() {
        let a = wires[gate.input0];
        let b = wires[gate.input1];
        let kind = config.variant.gate_kind(gate.truth_table);
        wires[gate.output] = match kind {
            GateKind::Free(linear) => garbler.free_gate(linear, a, b),
            _ => {
                let out = garbler.garble_gate(kind, gate.truth_table, a, b, non_free)?;
                non_free += 1;
                out
            }
        };
    }
    debug_assert_eq!(shape.non_free_gates, non_free);

    let mut output_keys: Vec<_> = circuit.output_wires().iter().map(|&w| wires[w]).collect();
    if config.unlinkable_outputs {
        output_keys = garbler.unlink_outputs(&output_keys, &shape, seed);
    }
    let translation_table = TranslationTable::from_output_keys(&output_keys);

    debug!(
        gates = circuit.number_of_gates(),
        free_gates = circuit.number_of_gates() - non_free,
        table_bytes = shape.bytes(),
        "garbled circuit"
    );
    let garbled = GarbledCircuit {
        config,
        cipher_key,
        shape,
        table: garbler.table,
        translation_table,
    };
    let output = GarblingOutput {
        input_keys,
        output_keys,
    };
    Ok((garbled, output))
}

/// The fresh output key pairs of the unlinkability layer, drawn from their
/// own stream of `seed` so they can be recomputed during verification.
pub(crate) fn fresh_output_keys(seed: Block, outputs: usize) -> Vec<LabelPair> {
    let mut rng = AesRng::for_stream(seed, Stream::UnlinkableOutputs);
    (0..outputs)
        .map(|_| {
            let zero = Label(rng.random());
            let one = Label(rng.random()).with_signal_bit(!zero.signal_bit());
            LabelPair::new(zero, one)
        })
        .collect()
}

/// Cipher tweak of the first output of the unlinkability layer.
pub(crate) fn output_tweak_base(variant: GarblingVariant, shape: &TableShape) -> usize {
    shape.non_free_gates * variant.tweaks_per_gate()
}

/// `c_a·A ^ c_b·B ^ c·R`, the zero key of a free gate.
pub(crate) fn free_gate_zero(linear: Linear, a: Label, b: Label, delta: Delta) -> Label {
    Label(a.0.const_mul(linear.a) ^ b.0.const_mul(linear.b) ^ delta.times(linear.constant))
}

/// Both keys of a constant gate garbled without free-XOR.
///
/// Every row encrypts `known`. No row reveals the key of the other value, so
/// it is derived from the offsets of both input pairs, which only the garbler
/// and a verifier holding both input keys can compute.
pub(crate) fn constant_gate_pair(
    cipher: &GateCipher,
    tt: TruthTable,
    a: LabelPair,
    b: LabelPair,
    n: usize,
    known: Label,
) -> LabelPair {
    let hidden = Label(cipher.hash_pair(Label(a.offset()), Label(b.offset()), Block::from(n)))
        .with_signal_bit(!known.signal_bit());
    if tt.row(0) {
        LabelPair::new(hidden, known)
    } else {
        LabelPair::new(known, hidden)
    }
}

/// Half-gate tweaks of the `n`-th non-free gate.
#[inline]
pub(crate) fn half_gate_tweaks(n: usize) -> (Block, Block) {
    (Block::from(2 * n), Block::from(2 * n + 1))
}

struct Garbler {
    variant: GarblingVariant,
    cipher: GateCipher,
    rng: AesRng,
    delta: Delta,
    table: GarbledTable,
}

impl Garbler {
    /// A new key pair: `(k0, k0 ^ R)` under free-XOR, otherwise two
    /// independent keys with distinct signal bits.
    fn fresh_pair(&mut self) -> LabelPair {
        let zero = Label(self.rng.random());
        if self.variant.free_xor() {
            LabelPair::with_delta(zero, self.delta)
        } else {
            let one = Label(self.rng.random()).with_signal_bit(!zero.signal_bit());
            LabelPair::new(zero, one)
        }
    }

    fn free_gate(&self, linear: Linear, a: LabelPair, b: LabelPair) -> LabelPair {
        let zero = free_gate_zero(linear, a.zero, b.zero, self.delta);
        LabelPair::with_delta(zero, self.delta)
    }

    fn garble_gate(
        &mut self,
        kind: GateKind,
        tt: TruthTable,
        a: LabelPair,
        b: LabelPair,
        n: usize,
    ) -> Result<LabelPair, Error> {
        let base = n * self.variant.rows_per_gate();
        let out = match (kind, self.variant) {
            (GateKind::HalfAnd { alpha, beta, gamma }, _) => {
                self.half_gates(alpha, beta, gamma, a, b, n, base)
            }
            (_, GarblingVariant::Standard | GarblingVariant::FreeXor) => {
                self.four_rows(tt, a, b, n, base)
            }
            (_, GarblingVariant::RowReduction) => self.three_rows(tt, a, b, n, base),
            (_, GarblingVariant::FourToTwo) => {
                let gate = four_to_two::garble(tt, a, b, n)?;
                self.table.rows[base..base + 2].copy_from_slice(&gate.rows);
                self.table.selectors[n] = gate.selector;
                gate.output
            }
            (_, GarblingVariant::HalfGates) => {
                unreachable!("truth tables without an AND form are linear")
            }
        };
        trace!(gate = n, "garbled gate");
        Ok(out)
    }

    /// `H(2A ^ 4B ^ n)` for the four signal combinations, row `2·sa + sb`.
    fn row_hashes(&self, a: LabelPair, b: LabelPair, n: usize) -> [Block; 4] {
        let tweak = Block::from(n);
        let inputs = std::array::from_fn(|r| {
            pair_input(a.by_signal(r >> 1 == 1), b.by_signal(r & 1 == 1), tweak)
        });
        self.cipher.hash_many(inputs)
    }

    fn four_rows(
        &mut self,
        tt: TruthTable,
        a: LabelPair,
        b: LabelPair,
        n: usize,
        base: usize,
    ) -> LabelPair {
        let hashes = self.row_hashes(a, b, n);
        let out = if tt.is_constant() {
            // only reachable without free-XOR, where constant tables are not free
            let known = self.fresh_pair().zero;
            constant_gate_pair(&self.cipher, tt, a, b, n, known)
        } else {
            self.fresh_pair()
        };
        for (r, hash) in hashes.into_iter().enumerate() {
            let value = row_value(tt, a, b, r);
            self.table.rows[base + r] = hash ^ out.select(value).0;
        }
        out
    }

    fn three_rows(
        &mut self,
        tt: TruthTable,
        a: LabelPair,
        b: LabelPair,
        n: usize,
        base: usize,
    ) -> LabelPair {
        let hashes = self.row_hashes(a, b, n);
        // the (0,0) signal row decrypts to its key without a table entry
        let implicit = Label(hashes[0]);
        let out = if row_value(tt, a, b, 0) {
            LabelPair::new(implicit ^ self.delta, implicit)
        } else {
            LabelPair::with_delta(implicit, self.delta)
        };
        for (r, hash) in hashes.into_iter().enumerate().skip(1) {
            let value = row_value(tt, a, b, r);
            self.table.rows[base + r - 1] = hash ^ out.select(value).0;
        }
        out
    }

    #[allow(clippy::too_many_arguments)]
    fn half_gates(
        &mut self,
        alpha: bool,
        beta: bool,
        gamma: bool,
        a: LabelPair,
        b: LabelPair,
        n: usize,
        base: usize,
    ) -> LabelPair {
        let r = self.delta;
        // keys of `a ^ alpha = 0` and `b ^ beta = 0`
        let a0 = a.select(alpha);
        let b0 = b.select(beta);
        let pa = a0.signal_bit();
        let pb = b0.signal_bit();
        let (j0, j1) = half_gate_tweaks(n);
        let [ha0, ha1, hb0, hb1] = self.cipher.hash_many([
            single_input(a0, j0),
            single_input(a0 ^ r, j0),
            single_input(b0, j1),
            single_input(b0 ^ r, j1),
        ]);

        // generator half
        let tg = ha0 ^ ha1 ^ r.times(pb);
        let wg0 = ha0 ^ tg.const_mul(pa);
        // evaluator half
        let te = hb0 ^ hb1 ^ a0.0;
        let we0 = hb0 ^ (te ^ a0.0).const_mul(pb);

        self.table.rows[base] = tg;
        self.table.rows[base + 1] = te;
        let zero = Label(wg0 ^ we0 ^ r.times(gamma));
        LabelPair::with_delta(zero, r)
    }

    /// Appends an identity gate per output that maps the output's key to a
    /// fresh, independently sampled key of the same value.
    fn unlink_outputs(
        &mut self,
        outputs: &[LabelPair],
        shape: &TableShape,
        seed: Block,
    ) -> Vec<LabelPair> {
        let fresh = fresh_output_keys(seed, outputs.len());
        let tweak_base = output_tweak_base(self.variant, shape);
        let mut hashes: Vec<Block> = outputs
            .iter()
            .enumerate()
            .flat_map(|(i, pair)| {
                let tweak = Block::from(tweak_base + i);
                [false, true].map(|s| single_input(pair.by_signal(s), tweak))
            })
            .collect();
        self.cipher.hash_slice_mut(&mut hashes);

        let rows = &mut self.table.rows[shape.gate_rows()..];
        for (i, (pair, new)) in outputs.iter().zip(&fresh).enumerate() {
            for s in [false, true] {
                let row = 2 * i + s as usize;
                rows[row] = hashes[row] ^ new.select(pair.value_of_signal(s)).0;
            }
        }
        fresh
    }
}

/// The gate output for the signal combination `r = 2·sa + sb`.
#[inline]
pub(crate) fn row_value(tt: TruthTable, a: LabelPair, b: LabelPair, r: usize) -> bool {
    tt.eval(
        a.value_of_signal(r >> 1 == 1),
        b.value_of_signal(r & 1 == 1),
    )
}
