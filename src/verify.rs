//! Verification of a garbled circuit by a party that knows both keys of
//! every input wire, e.g. after the garbler opened a circuit in a
//! cut-and-choose protocol.
//!
//! For every non-free gate all four input key combinations are decrypted
//! and checked for consistency with the truth table. Four-to-two gates are
//! deterministic in their input keys and are recomputed instead. A mismatch
//! means the garbler cheated; verification stops at the first one.
use tracing::{Level, debug, instrument};

use crate::{
    block::Block,
    circuit::{CircuitSpec, TruthTable},
    crypto::CipherKey,
    data_types::{Delta, Label, LabelPair},
    eval::GateEvaluator,
    garble::{
        GarbledCircuit, constant_gate_pair, four_to_two, free_gate_zero, fresh_output_keys,
        row_value,
    },
    variant::{GarblingVariant, GateKind, KeyMode},
};

/// The secrets needed to verify a garbling.
#[derive(Debug, Clone, Copy)]
pub struct VerifyKeys<'a> {
    input_keys: &'a [LabelPair],
    seed: Option<Block>,
}

impl<'a> VerifyKeys<'a> {
    /// Both keys of every input wire, in the order of [`CircuitSpec::input_wires`].
    pub fn new(input_keys: &'a [LabelPair]) -> Self {
        Self {
            input_keys,
            seed: None,
        }
    }

    /// Adds the garbling seed.
    ///
    /// Required for circuits with unlinkable outputs, whose fresh output keys
    /// are recomputed from the seed. With a seeded cipher key, the key is
    /// checked against the seed as well.
    pub fn with_seed(self, seed: Block) -> Self {
        Self {
            seed: Some(seed),
            ..self
        }
    }
}

impl GarbledCircuit {
    /// Checks the garbled table and the translation table against both keys
    /// of all inputs.
    #[instrument(level = Level::DEBUG, skip_all, fields(variant = ?self.config.variant))]
    pub fn verify(&self, circuit: &CircuitSpec, keys: &VerifyKeys) -> bool {
        self.internal_verify(circuit, keys)
            .is_some_and(|outputs| self.verify_translation_table(&outputs))
    }

    /// Checks the garbled table and returns both keys of every output wire.
    ///
    /// Returns `None` if the table does not match the input keys.
    pub fn internal_verify(
        &self,
        circuit: &CircuitSpec,
        keys: &VerifyKeys,
    ) -> Option<Vec<LabelPair>> {
        if self.config.validate().is_err() || self.check_shape(circuit).is_err() {
            debug!("garbled circuit does not fit the circuit description");
            return None;
        }
        let inputs = keys.input_keys;
        if inputs.len() != circuit.number_of_inputs()
            || inputs
                .iter()
                .any(|pair| pair.zero.signal_bit() == pair.one.signal_bit())
        {
            debug!("invalid input keys");
            return None;
        }
        if let (Some(seed), KeyMode::Seeded) = (keys.seed, self.config.key_mode)
            && self.cipher_key != CipherKey::from_seed(seed)
        {
            debug!("cipher key was not derived from the seed");
            return None;
        }

        let variant = self.config.variant;
        let delta = if variant.free_xor() {
            let delta = inputs.first().map(LabelPair::offset);
            if inputs.iter().any(|pair| Some(pair.offset()) != delta) {
                debug!("input keys do not share one offset");
                return None;
            }
            delta
        } else {
            None
        };

        let evaluator = GateEvaluator::new(self);
        let mut wires =
            vec![LabelPair::new(Label::ZERO, Label::ZERO); circuit.last_wire_index() + 1];
        for (wire, &pair) in circuit.input_wires().zip(inputs) {
            wires[wire] = pair;
        }
        let stride = variant.rows_per_gate();
        let mut non_free = 0;
        for (i, gate) in circuit.gates().iter().enumerate() {
            let a = wires[gate.input0];
            let b = wires[gate.input1];
            let tt = gate.truth_table;
            let kind = variant.gate_kind(tt);
            let out = match kind {
                GateKind::Free(linear) => {
                    let delta = Delta(delta?);
                    Some(LabelPair::with_delta(
                        free_gate_zero(linear, a.zero, b.zero, delta),
                        delta,
                    ))
                }
                _ if variant == GarblingVariant::FourToTwo => {
                    let rows = &self.table.rows[non_free * stride..(non_free + 1) * stride];
                    four_to_two::garble(tt, a, b, non_free)
                        .ok()
                        .filter(|expected| {
                            expected.rows == rows && expected.selector == self.table.selectors[non_free]
                        })
                        .map(|expected| expected.output)
                }
                _ => decode_gate(&evaluator, kind, tt, a, b, non_free, delta),
            };
            let Some(out) = out else {
                debug!(gate = i, "garbled gate does not match its input keys");
                return None;
            };
            if !matches!(kind, GateKind::Free(_)) {
                non_free += 1;
            }
            wires[gate.output] = out;
        }

        let outputs: Vec<_> = circuit.output_wires().iter().map(|&w| wires[w]).collect();
        if !self.config.unlinkable_outputs {
            return Some(outputs);
        }
        let Some(seed) = keys.seed else {
            debug!("unlinkable outputs can only be verified with the seed");
            return None;
        };
        let fresh = fresh_output_keys(seed, outputs.len());
        for (i, (pair, new)) in outputs.iter().zip(&fresh).enumerate() {
            for s in [false, true] {
                let key = evaluator.eval_unlinked_output(&self.shape, i, pair.by_signal(s));
                if key != new.select(pair.value_of_signal(s)) {
                    debug!(output = i, "unlinkable output does not match its keys");
                    return None;
                }
            }
        }
        Some(fresh)
    }

    /// Checks that the translation table decodes both keys of every output.
    pub fn verify_translation_table(&self, output_keys: &[LabelPair]) -> bool {
        output_keys.len() == self.translation_table.len()
            && output_keys.iter().enumerate().all(|(i, pair)| {
                let t = self.translation_table.bit(i);
                !(pair.zero.signal_bit() ^ t) && (pair.one.signal_bit() ^ t)
            })
    }

    /// Translates output keys after checking each is one of the two expected
    /// keys of its output wire.
    pub fn verify_translate(
        &self,
        output_keys: &[Label],
        expected: &[LabelPair],
    ) -> Option<Vec<bool>> {
        if output_keys.len() != expected.len() {
            return None;
        }
        let bits = self.translate(output_keys).ok()?;
        output_keys
            .iter()
            .zip(expected)
            .zip(&bits)
            .all(|((&key, pair), &bit)| pair.decode(key) == Some(bit))
            .then_some(bits)
    }
}

/// Decrypts all four rows of a gate and recovers both output keys.
///
/// Rows of equal output value must decrypt to the same key. Under free-XOR
/// the keys of the two values must differ by the global offset; otherwise
/// they must differ in their signal bit.
fn decode_gate(
    evaluator: &GateEvaluator,
    kind: GateKind,
    tt: TruthTable,
    a: LabelPair,
    b: LabelPair,
    n: usize,
    delta: Option<Block>,
) -> Option<LabelPair> {
    let mut keys: [Option<Label>; 2] = [None, None];
    for r in 0..4 {
        let key = evaluator.eval_gate(kind, tt, a.by_signal(r >> 1 == 1), b.by_signal(r & 1 == 1), n);
        let value = row_value(tt, a, b, r) as usize;
        match keys[value] {
            None => keys[value] = Some(key),
            Some(known) if known != key => return None,
            Some(_) => {}
        }
    }
    match (keys, delta) {
        ([Some(zero), Some(one)], Some(delta)) => {
            (zero ^ one == Label(delta)).then_some(LabelPair::new(zero, one))
        }
        ([Some(zero), Some(one)], None) => {
            (zero.signal_bit() != one.signal_bit()).then_some(LabelPair::new(zero, one))
        }
        ([Some(zero), None], Some(delta)) => Some(LabelPair::new(zero, zero ^ delta)),
        ([None, Some(one)], Some(delta)) => Some(LabelPair::new(one ^ delta, one)),
        ([Some(known), None] | [None, Some(known)], None) => Some(constant_gate_pair(
            evaluator.cipher(),
            tt,
            a,
            b,
            n,
            known,
        )),
        ([None, None], _) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::VerifyKeys;
    use crate::{
        block::Block,
        circuit::CircuitSpec,
        garble::{GarbledCircuit, GarblingOutput, garble},
        variant::{GarblingConfig, GarblingVariant},
    };

    fn adder() -> CircuitSpec {
        // full adder: sum = a ^ b ^ c, carry = (a & b) | (c & (a ^ b))
        "5 2\n1 2 0 1\n2 1 2\n2 4 7\n\
         2 1 0 1 3 0110\n2 1 3 2 4 0110\n2 1 0 1 5 0001\n2 1 2 3 6 0001\n2 1 5 6 7 0111\n"
            .parse()
            .unwrap()
    }

    #[test]
    fn honest_garbling_verifies() {
        let circuit = adder();
        let seed = Block::from(1234_u128);
        for config in GarblingConfig::PRESETS {
            let (garbled, keys) = garble(&circuit, config, seed).unwrap();
            let verify_keys = VerifyKeys::new(keys.input_keys());
            assert!(garbled.verify(&circuit, &verify_keys), "{config:?}");
            assert!(garbled.verify(&circuit, &verify_keys.with_seed(seed)), "{config:?}");
            assert_eq!(
                Some(keys.output_keys().to_vec()),
                garbled.internal_verify(&circuit, &verify_keys)
            );
        }
    }

    #[test]
    fn unlinkable_outputs_need_the_seed() {
        let circuit = adder();
        let seed = Block::from(77_u128);
        let config = GarblingConfig::fixed_key_free_xor_half_gates().with_unlinkable_outputs();
        let (garbled, keys) = garble(&circuit, config, seed).unwrap();
        let verify_keys = VerifyKeys::new(keys.input_keys());
        assert!(!garbled.verify(&circuit, &verify_keys));
        assert!(garbled.verify(&circuit, &verify_keys.with_seed(seed)));
        assert!(!garbled.verify(&circuit, &verify_keys.with_seed(seed ^ Block::ONE)));
    }

    /// Whether the garbling translates to the plaintext result on every input.
    fn computes_circuit(garbled: &GarbledCircuit, keys: &GarblingOutput, circuit: &CircuitSpec) -> bool {
        (0..1_u32 << circuit.number_of_inputs()).all(|x| {
            let bits: Vec<bool> = (0..circuit.number_of_inputs()).map(|i| (x >> i) & 1 == 1).collect();
            let outputs = garbled
                .evaluate(circuit, &keys.garbled_inputs(&bits).unwrap())
                .unwrap();
            garbled.translate(&outputs).unwrap() == circuit.evaluate_plain(&bits).unwrap()
        })
    }

    #[test]
    fn tampered_tables_are_detected() {
        let circuit = adder();
        for config in GarblingConfig::PRESETS {
            let (garbled, keys) = garble(&circuit, config, Block::from(8_u128)).unwrap();
            let verify_keys = VerifyKeys::new(keys.input_keys());
            let bytes = garbled.garbled_table().to_bytes();
            for pos in (0..bytes.len()).step_by(7) {
                let mut tampered = garbled.clone();
                let mut modified = bytes.clone();
                modified[pos] ^= 0x10;
                tampered.set_garbled_table(&modified).unwrap();
                if config.variant == GarblingVariant::Standard {
                    // independent keys: a changed output key is another valid garbling
                    assert!(
                        !tampered.verify(&circuit, &verify_keys)
                            || computes_circuit(&tampered, &keys, &circuit),
                        "byte {pos}"
                    );
                } else {
                    assert!(!tampered.verify(&circuit, &verify_keys), "{config:?} byte {pos}");
                }
            }
            let mut tampered = garbled.clone();
            let mut translation = garbled.translation_table().as_bytes().to_vec();
            translation[0] ^= 1;
            tampered.set_translation_table(&translation).unwrap();
            assert!(!tampered.verify(&circuit, &verify_keys));
        }
    }

    #[test]
    fn standard_constant_gates_verify() {
        // out = (a & 0) | b, with the constant computed by a 0000 gate
        let circuit: CircuitSpec = "2 2\n1 1 0\n2 1 1\n1 3\n2 1 0 1 2 0000\n2 1 2 1 3 0111\n"
            .parse()
            .unwrap();
        let config = GarblingConfig::fixed_key_standard();
        let (garbled, keys) = garble(&circuit, config, Block::from(21_u128)).unwrap();
        let verify_keys = VerifyKeys::new(keys.input_keys());
        assert_eq!(
            Some(keys.output_keys().to_vec()),
            garbled.internal_verify(&circuit, &verify_keys)
        );
        assert!(garbled.verify(&circuit, &verify_keys));
        assert!(computes_circuit(&garbled, &keys, &circuit));

        // the constant gate's rows all carry the same key
        let mut rows = garbled.garbled_table().to_bytes();
        rows[16] ^= 0x10;
        let mut tampered = garbled.clone();
        tampered.set_garbled_table(&rows).unwrap();
        assert!(!tampered.verify(&circuit, &verify_keys));
    }

    #[test]
    fn wrong_input_keys_fail() {
        let circuit = adder();
        let (garbled, keys) =
            garble(&circuit, GarblingConfig::default(), Block::from(5_u128)).unwrap();
        let (_, other) = garble(&circuit, GarblingConfig::default(), Block::from(6_u128)).unwrap();
        assert!(!garbled.verify(&circuit, &VerifyKeys::new(other.input_keys())));
        assert!(!garbled.verify(&circuit, &VerifyKeys::new(&keys.input_keys()[1..])));
    }

    #[test]
    fn verify_translate_rejects_foreign_keys() {
        let circuit = adder();
        let (garbled, keys) =
            garble(&circuit, GarblingConfig::default(), Block::from(5_u128)).unwrap();
        let inputs = keys.garbled_inputs(&[true, true, false]).unwrap();
        let outputs = garbled.evaluate(&circuit, &inputs).unwrap();
        assert_eq!(
            Some(vec![false, true]),
            garbled.verify_translate(&outputs, keys.output_keys())
        );
        let mut forged = outputs.clone();
        forged[0] = forged[0] ^ Block::ONE;
        assert_eq!(None, garbled.verify_translate(&forged, keys.output_keys()));
    }
}
