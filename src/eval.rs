//! The evaluation engine.
//!
//! Evaluation walks the gates in the same order as garbling, holding a
//! single key per wire. Non-free gates are counted exactly as during
//! garbling; the count selects the rows and the tweak of each gate.
use thiserror::Error;
use tracing::{Level, debug, instrument};

use crate::{
    block::Block,
    circuit::{CircuitSpec, Linear, TruthTable},
    crypto::{GateCipher, single_input},
    data_types::Label,
    garble::{
        GarbledCircuit, GarbledTable, four_to_two, half_gate_tweaks, output_tweak_base,
    },
    variant::{GarblingVariant, GateKind, TableShape},
};

/// Errors raised when evaluating a garbled circuit.
#[derive(Debug, Error)]
pub enum Error {
    /// The garbling configuration cannot be evaluated.
    #[error("invalid garbling configuration: {0}")]
    InvalidConfig(#[from] crate::garble::Error),
    /// Not every input wire has a key.
    #[error("expected one key per input wire ({expected}), got {actual}")]
    NotAllInputsSet {
        /// Number of input wires.
        expected: usize,
        /// Number of provided keys.
        actual: usize,
    },
    /// The garbled table does not belong to the circuit.
    #[error("the garbled table has {actual} bytes, the circuit needs {expected}")]
    WrongTableSize {
        /// Size required by circuit and configuration.
        expected: usize,
        /// Size of the garbled table.
        actual: usize,
    },
    /// The number of output keys does not match the translation table.
    #[error("expected {expected} output keys, got {actual}")]
    WrongNumberOfOutputs {
        /// Size of the translation table.
        expected: usize,
        /// Number of provided keys.
        actual: usize,
    },
}

/// The single key known for every wire during one evaluation.
pub(crate) struct ComputedWires(Vec<Label>);

impl ComputedWires {
    pub(crate) fn new(circuit: &CircuitSpec, input_keys: &[Label]) -> Self {
        let mut wires = vec![Label::ZERO; circuit.last_wire_index() + 1];
        for (wire, &key) in circuit.input_wires().zip(input_keys) {
            wires[wire] = key;
        }
        Self(wires)
    }

    #[inline]
    pub(crate) fn get(&self, wire: usize) -> Label {
        self.0[wire]
    }

    #[inline]
    pub(crate) fn set(&mut self, wire: usize, key: Label) {
        self.0[wire] = key;
    }
}

/// `c_a·A ^ c_b·B`; the garbler has already folded the constant into the keys.
#[inline]
pub(crate) fn free_gate(linear: Linear, a: Label, b: Label) -> Label {
    Label(a.0.const_mul(linear.a) ^ b.0.const_mul(linear.b))
}

/// Decrypts single gates of one garbled table.
pub(crate) struct GateEvaluator<'a> {
    variant: GarblingVariant,
    cipher: GateCipher,
    table: &'a GarbledTable,
}

impl<'a> GateEvaluator<'a> {
    pub(crate) fn new(garbled: &'a GarbledCircuit) -> Self {
        Self {
            variant: garbled.config.variant,
            cipher: GateCipher::new(garbled.cipher_key),
            table: &garbled.table,
        }
    }

    pub(crate) fn cipher(&self) -> &GateCipher {
        &self.cipher
    }

    /// The output key of the `n`-th non-free gate, given one key per input.
    pub(crate) fn eval_gate(
        &self,
        kind: GateKind,
        tt: TruthTable,
        a: Label,
        b: Label,
        n: usize,
    ) -> Label {
        if let GateKind::Free(linear) = kind {
            return free_gate(linear, a, b);
        }
        let stride = self.variant.rows_per_gate();
        let rows = &self.table.rows[n * stride..(n + 1) * stride];
        let sa = a.signal_bit();
        let sb = b.signal_bit();
        match (kind, self.variant) {
            (GateKind::HalfAnd { .. }, _) => {
                let (j0, j1) = half_gate_tweaks(n);
                let [ha, hb] = self
                    .cipher
                    .hash_many([single_input(a, j0), single_input(b, j1)]);
                let wg = ha ^ rows[0].const_mul(sa);
                let we = hb ^ (rows[1] ^ a.0).const_mul(sb);
                Label(wg ^ we)
            }
            (_, GarblingVariant::Standard | GarblingVariant::FreeXor) => {
                let r = 2 * sa as usize + sb as usize;
                Label(self.cipher.hash_pair(a, b, Block::from(n)) ^ rows[r])
            }
            (_, GarblingVariant::RowReduction) => {
                let r = 2 * sa as usize + sb as usize;
                let hash = self.cipher.hash_pair(a, b, Block::from(n));
                match r {
                    0 => Label(hash),
                    r => Label(hash ^ rows[r - 1]),
                }
            }
            (_, GarblingVariant::FourToTwo) => {
                four_to_two::evaluate(tt, a, b, n, rows, self.table.selectors[n])
            }
            (GateKind::Free(_), _) | (_, GarblingVariant::HalfGates) => {
                unreachable!("free gates return early, non-linear tables have an AND form")
            }
        }
    }

    /// Maps the key of output `i` to its fresh key of the unlinkability layer.
    pub(crate) fn eval_unlinked_output(&self, shape: &TableShape, i: usize, key: Label) -> Label {
        let tweak = Block::from(output_tweak_base(self.variant, shape) + i);
        let row = shape.gate_rows() + 2 * i + key.signal_bit() as usize;
        Label(self.cipher.hash_single(key, tweak) ^ self.table.rows[row])
    }
}

impl GarbledCircuit {
    /// Checks that the tables have the sizes `circuit` requires.
    pub(crate) fn check_shape(&self, circuit: &CircuitSpec) -> Result<(), Error> {
        let expected = TableShape::of(circuit, &self.config);
        let actual_bytes = self.table.rows.len() * Block::BYTES + self.table.selectors.len();
        if expected != self.shape
            || self.table.rows.len() != expected.rows()
            || self.table.selectors.len() != expected.selectors
        {
            return Err(Error::WrongTableSize {
                expected: expected.bytes(),
                actual: actual_bytes,
            });
        }
        if self.translation_table.len() != circuit.number_of_outputs() {
            return Err(Error::WrongNumberOfOutputs {
                expected: circuit.number_of_outputs(),
                actual: self.translation_table.len(),
            });
        }
        Ok(())
    }

    /// Evaluates the garbled circuit.
    ///
    /// `input_keys` holds one key per input wire, in the order of
    /// [`CircuitSpec::input_wires`]. Returns one key per output wire; use
    /// [`GarbledCircuit::translate`] to decode them.
    #[instrument(level = Level::DEBUG, skip_all, fields(variant = ?self.config.variant), err)]
    pub fn evaluate(&self, circuit: &CircuitSpec, input_keys: &[Label]) -> Result<Vec<Label>, Error> {
        let expected = circuit.number_of_inputs();
        if input_keys.len() != expected {
            return Err(Error::NotAllInputsSet {
                expected,
                actual: input_keys.len(),
            });
        }
        self.config.validate()?;
        self.check_shape(circuit)?;

        let evaluator = GateEvaluator::new(self);
        let mut wires = ComputedWires::new(circuit, input_keys);
        let mut non_free = 0;
        for gate in circuit.gates() {
            let a = wires.get(gate.input0);
            let b = wires.get(gate.input1);
            let kind = self.config.variant.gate_kind(gate.truth_table);
            let out = evaluator.eval_gate(kind, gate.truth_table, a, b, non_free);
            if !matches!(kind, GateKind::Free(_)) {
                non_free += 1;
            }
            wires.set(gate.output, out);
        }

        let outputs = circuit
            .output_wires()
            .iter()
            .enumerate()
            .map(|(i, &w)| {
                let key = wires.get(w);
                if self.config.unlinkable_outputs {
                    evaluator.eval_unlinked_output(&self.shape, i, key)
                } else {
                    key
                }
            })
            .collect();
        debug!(gates = circuit.number_of_gates(), non_free, "evaluated circuit");
        Ok(outputs)
    }

    /// Decodes output keys: `bit[i] = signal_bit(key[i]) ^ translation[i]`.
    pub fn translate(&self, output_keys: &[Label]) -> Result<Vec<bool>, Error> {
        if output_keys.len() != self.translation_table.len() {
            return Err(Error::WrongNumberOfOutputs {
                expected: self.translation_table.len(),
                actual: output_keys.len(),
            });
        }
        Ok(output_keys
            .iter()
            .enumerate()
            .map(|(i, key)| key.signal_bit() ^ self.translation_table.bit(i))
            .collect())
    }
}
