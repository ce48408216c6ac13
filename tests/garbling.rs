use proptest::prelude::*;
use yao_gc::{
    Block, GarblingConfig, GarblingVariant, VerifyKeys, garble, variant::TableShape,
};

mod common;

use common::{all_configs, arbitrary_circuit, load, to_bits};

#[test]
fn and_circuit_truth_table() {
    let circuit = load("and.txt");
    for config in all_configs() {
        let (garbled, keys) = garble(&circuit, config, Block::from(2024_u128)).unwrap();
        for (x, y, expected) in [
            (false, false, false),
            (false, true, false),
            (true, false, false),
            (true, true, true),
        ] {
            let mut inputs = keys.garbled_inputs_for(&circuit, 1, &[x]).unwrap();
            inputs.extend(keys.garbled_inputs_for(&circuit, 2, &[y]).unwrap());
            let outputs = garbled.evaluate(&circuit, &inputs).unwrap();
            assert_eq!(vec![expected], garbled.translate(&outputs).unwrap(), "{config:?}");
        }
    }
}

#[test]
fn not_gate_is_free_with_free_xor() {
    let circuit = load("not.txt");
    for config in all_configs() {
        let (garbled, keys) = garble(&circuit, config, Block::from(7_u128)).unwrap();
        if config.variant.free_xor() && !config.unlinkable_outputs {
            assert_eq!(0, garbled.garbled_table_size(), "{config:?}");
        }
        for x in [false, true] {
            let inputs = keys.garbled_inputs(&[x]).unwrap();
            let outputs = garbled.evaluate(&circuit, &inputs).unwrap();
            assert_eq!(vec![!x], garbled.translate(&outputs).unwrap(), "{config:?}");
        }
    }
}

#[test]
fn adder_adds() {
    let circuit = load("adder_4bit.txt");
    let config = GarblingConfig::default();
    let (garbled, keys) = garble(&circuit, config, Block::from(1_u128)).unwrap();
    for a in 0..16_u64 {
        for b in 0..16_u64 {
            let mut bits = to_bits(a, 4);
            bits.extend(to_bits(b, 4));
            let inputs = keys.garbled_inputs(&bits).unwrap();
            let outputs = garbled.evaluate(&circuit, &inputs).unwrap();
            assert_eq!(to_bits(a + b, 5), garbled.translate(&outputs).unwrap());
        }
    }
}

#[test]
fn table_sizes_of_the_adder() {
    // 7 XOR gates, 10 AND / OR gates
    let circuit = load("adder_4bit.txt");
    assert_eq!(7, circuit.number_of_linear_gates());
    let cases = [
        (GarblingVariant::Standard, 17 * 4 * 16),
        (GarblingVariant::FreeXor, 10 * 4 * 16),
        (GarblingVariant::RowReduction, 10 * 3 * 16),
        (GarblingVariant::HalfGates, 10 * 2 * 16),
        (GarblingVariant::FourToTwo, 17 * (2 * 16 + 1)),
    ];
    for (variant, bytes) in cases {
        let config = GarblingConfig::PRESETS
            .into_iter()
            .find(|c| c.variant == variant)
            .unwrap();
        let (garbled, _) = garble(&circuit, config, Block::ONE).unwrap();
        assert_eq!(bytes, garbled.garbled_table_size(), "{variant:?}");
        assert_eq!(bytes, garbled.garbled_table().to_bytes().len(), "{variant:?}");
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn garble_evaluate_round_trip(
        circuit in arbitrary_circuit(),
        bits in any::<u64>(),
        seed in any::<u128>(),
    ) {
        let inputs = to_bits(bits, circuit.number_of_inputs());
        let expected = circuit.evaluate_plain(&inputs).unwrap();
        for config in all_configs() {
            let (garbled, keys) = garble(&circuit, config, Block::from(seed)).unwrap();
            let outputs = garbled
                .evaluate(&circuit, &keys.garbled_inputs(&inputs).unwrap())
                .unwrap();
            for (pair, (key, bit)) in keys.output_keys().iter().zip(outputs.iter().zip(&expected)) {
                prop_assert_eq!(pair.select(*bit), *key);
            }
            prop_assert_eq!(&expected, &garbled.translate(&outputs).unwrap());
        }
    }

    #[test]
    fn table_size_formula(circuit in arbitrary_circuit(), seed in any::<u128>()) {
        for config in all_configs() {
            let (garbled, _) = garble(&circuit, config, Block::from(seed)).unwrap();
            let non_free = if config.variant.free_xor() {
                circuit.number_of_gates() - circuit.number_of_linear_gates()
            } else {
                circuit.number_of_gates()
            };
            let mut bytes = non_free * config.variant.rows_per_gate() * 16;
            if config.unlinkable_outputs {
                bytes += circuit.number_of_outputs() * 2 * 16;
            }
            if config.variant == GarblingVariant::FourToTwo {
                bytes += non_free;
            }
            prop_assert_eq!(bytes, garbled.garbled_table_size());
            prop_assert_eq!(bytes, TableShape::of(&circuit, &config).bytes());
            prop_assert_eq!(bytes, garbled.garbled_table().to_bytes().len());
        }
    }

    #[test]
    fn free_xor_outputs_share_the_global_offset(circuit in arbitrary_circuit(), seed in any::<u128>()) {
        for config in all_configs().into_iter().filter(|c| c.variant.free_xor()) {
            let (garbled, keys) = garble(&circuit, config, Block::from(seed)).unwrap();
            let inputs = keys.input_keys();
            let delta = inputs[0].zero ^ inputs[0].one;
            let verify_keys = VerifyKeys::new(inputs).with_seed(Block::from(seed));
            let internal = garbled.internal_verify(&circuit, &verify_keys).unwrap();
            prop_assert_eq!(keys.output_keys(), &internal[..]);
            for pair in inputs.iter().chain(keys.output_keys()) {
                prop_assert_ne!(pair.zero.signal_bit(), pair.one.signal_bit());
                if !config.unlinkable_outputs || inputs.contains(pair) {
                    prop_assert_eq!(delta, pair.zero ^ pair.one);
                }
            }
        }
    }
}
