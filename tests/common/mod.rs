#![allow(dead_code)]

use std::path::Path;

use proptest::{collection::vec, prelude::*};
use yao_gc::{
    CircuitSpec, Gate, GarblingConfig, TruthTable,
    variant::{GarblingVariant, KeyMode},
};

/// Loads a circuit from the `circuits/` directory.
pub fn load(name: &str) -> CircuitSpec {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("circuits")
        .join(name);
    CircuitSpec::load(&path).unwrap_or_else(|e| panic!("could not load {name}: {e}"))
}

/// The `n` least significant bits of `bits`, least significant first.
pub fn to_bits(bits: u64, n: usize) -> Vec<bool> {
    (0..n).map(|i| (bits >> i) & 1 == 1).collect()
}

/// Every valid configuration, including unlinkable outputs.
pub fn all_configs() -> Vec<GarblingConfig> {
    let mut configs = GarblingConfig::PRESETS.to_vec();
    for variant in [
        GarblingVariant::FreeXor,
        GarblingVariant::RowReduction,
        GarblingVariant::HalfGates,
    ] {
        for key_mode in [KeyMode::Fixed, KeyMode::Seeded] {
            configs.push(GarblingConfig::new(variant, key_mode).with_unlinkable_outputs());
        }
    }
    configs
}

/// Random two-party circuits with arbitrary truth tables, wires shared
/// between gates and gates reading the same wire twice.
pub fn arbitrary_circuit() -> impl Strategy<Value = CircuitSpec> {
    (1..4usize, 1..4usize, 1..24usize)
        .prop_flat_map(|(p1, p2, gates)| {
            let inputs = p1 + p2;
            let gate_strategies: Vec<_> = (0..gates)
                .map(|g| (0..inputs + g, 0..inputs + g, 0..16u8))
                .collect();
            (
                Just(p1),
                Just(p2),
                gate_strategies,
                vec(0..inputs + gates, 1..6),
            )
        })
        .prop_map(|(p1, p2, gates, outputs)| {
            let inputs = p1 + p2;
            let gates = gates
                .into_iter()
                .enumerate()
                .map(|(g, (a, b, tt))| {
                    Gate::new(a, b, inputs + g, TruthTable::new(tt).expect("tt < 16"))
                })
                .collect();
            let party_inputs = vec![(0..p1).collect(), (p1..inputs).collect()];
            CircuitSpec::new(party_inputs, outputs, gates).expect("gates only read earlier wires")
        })
}
