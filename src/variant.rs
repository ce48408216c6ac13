//! Garbling variants and the configuration of a garbling.
//!
//! A single [`GarblingVariant`] value decides, for every gate, whether the
//! gate is free and how many table rows it owns. Garbling, evaluation and
//! verification all derive their row layout from it, so the three passes
//! walk the garbled table in lock-step.
use serde::{Deserialize, Serialize};

use crate::{
    block::Block,
    circuit::{CircuitSpec, Linear, TruthTable},
    crypto::CipherKey,
    garble::Error,
};

/// How gates are encrypted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GarblingVariant {
    /// Classic point-and-permute garbling: 4 rows for every gate, no free gates.
    /// Every wire has its own independent key pair.
    Standard,
    /// Free-XOR: linear gates are free, all others have 4 rows.
    FreeXor,
    /// Free-XOR with row reduction: the `(0,0)` row is implicit, 3 rows per gate.
    RowReduction,
    /// Free-XOR with half-gates: 2 rows per non-linear gate.
    HalfGates,
    /// 2 rows per gate plus a selector byte, without free-XOR and without a
    /// fixed-key cipher. Wire keys are used as AES keys.
    FourToTwo,
}

impl GarblingVariant {
    /// Whether the keys of every wire differ by the global offset `R`, making
    /// linear gates free.
    pub fn free_xor(&self) -> bool {
        matches!(
            self,
            GarblingVariant::FreeXor | GarblingVariant::RowReduction | GarblingVariant::HalfGates
        )
    }

    /// Table rows of every non-free gate.
    pub fn rows_per_gate(&self) -> usize {
        match self {
            GarblingVariant::Standard | GarblingVariant::FreeXor => 4,
            GarblingVariant::RowReduction => 3,
            GarblingVariant::HalfGates | GarblingVariant::FourToTwo => 2,
        }
    }

    /// Cipher tweaks consumed by every non-free gate.
    pub(crate) fn tweaks_per_gate(&self) -> usize {
        match self {
            GarblingVariant::HalfGates => 2,
            _ => 1,
        }
    }

    pub(crate) fn gate_kind(&self, truth_table: TruthTable) -> GateKind {
        if let Some(linear) = truth_table.linear().filter(|_| self.free_xor()) {
            return GateKind::Free(linear);
        }
        match (self, truth_table.and_form()) {
            (GarblingVariant::HalfGates, Some((alpha, beta, gamma))) => {
                GateKind::HalfAnd { alpha, beta, gamma }
            }
            _ => GateKind::Rows,
        }
    }
}

/// How a single gate is garbled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GateKind {
    /// Computed by XORing keys, no rows.
    Free(Linear),
    /// `((x ^ alpha) & (y ^ beta)) ^ gamma` as two half-gates.
    HalfAnd { alpha: bool, beta: bool, gamma: bool },
    /// One row per input combination, minus the rows the variant elides.
    Rows,
}

/// Which key the row encryption cipher is keyed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyMode {
    /// The public, hard-coded [`crate::crypto::FIXED_KEY`].
    Fixed,
    /// A per-circuit key derived from the garbling seed.
    Seeded,
}

/// Everything that determines how a circuit is garbled, except the seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GarblingConfig {
    /// The gate encryption scheme.
    pub variant: GarblingVariant,
    /// The key of the row encryption cipher.
    pub key_mode: KeyMode,
    /// Re-randomizes the output keys so that `k0 ^ k1` differs per output.
    ///
    /// Only available for free-XOR variants.
    pub unlinkable_outputs: bool,
}

impl GarblingConfig {
    /// A configuration without unlinkable outputs.
    pub const fn new(variant: GarblingVariant, key_mode: KeyMode) -> Self {
        Self {
            variant,
            key_mode,
            unlinkable_outputs: false,
        }
    }

    /// The same configuration with unlinkable outputs enabled.
    pub const fn with_unlinkable_outputs(self) -> Self {
        Self {
            unlinkable_outputs: true,
            ..self
        }
    }

    /// Fixed key, free-XOR and half-gates.
    pub const fn fixed_key_free_xor_half_gates() -> Self {
        Self::new(GarblingVariant::HalfGates, KeyMode::Fixed)
    }

    /// Fixed key, free-XOR and row reduction.
    pub const fn fixed_key_free_xor_row_reduction() -> Self {
        Self::new(GarblingVariant::RowReduction, KeyMode::Fixed)
    }

    /// Fixed key, free-XOR and 4-row tables.
    pub const fn fixed_key_free_xor_standard() -> Self {
        Self::new(GarblingVariant::FreeXor, KeyMode::Fixed)
    }

    /// Fixed key and 4-row tables for every gate.
    pub const fn fixed_key_standard() -> Self {
        Self::new(GarblingVariant::Standard, KeyMode::Fixed)
    }

    /// Seeded key, free-XOR and half-gates.
    pub const fn no_fixed_key_free_xor_half_gates() -> Self {
        Self::new(GarblingVariant::HalfGates, KeyMode::Seeded)
    }

    /// The four-to-two scheme, which never uses a fixed key.
    pub const fn no_fixed_key_four_to_two() -> Self {
        Self::new(GarblingVariant::FourToTwo, KeyMode::Seeded)
    }

    /// All presets.
    pub const PRESETS: [Self; 6] = [
        Self::fixed_key_free_xor_half_gates(),
        Self::fixed_key_free_xor_row_reduction(),
        Self::fixed_key_free_xor_standard(),
        Self::fixed_key_standard(),
        Self::no_fixed_key_free_xor_half_gates(),
        Self::no_fixed_key_four_to_two(),
    ];

    /// Rejects combinations that cannot be garbled.
    pub fn validate(&self) -> Result<(), Error> {
        if self.unlinkable_outputs && !self.variant.free_xor() {
            return Err(Error::UnlinkableOutputsRequireFreeXor(self.variant));
        }
        if self.variant == GarblingVariant::FourToTwo && self.key_mode == KeyMode::Fixed {
            return Err(Error::IncompatibleConfig {
                variant: self.variant,
                key_mode: self.key_mode,
            });
        }
        Ok(())
    }

    pub(crate) fn cipher_key(&self, seed: Block) -> CipherKey {
        match self.key_mode {
            KeyMode::Fixed => CipherKey::Fixed,
            KeyMode::Seeded => CipherKey::from_seed(seed),
        }
    }
}

impl Default for GarblingConfig {
    fn default() -> Self {
        Self::fixed_key_free_xor_half_gates()
    }
}

/// The layout of a garbled table: gate rows, then the rows of the
/// unlinkability layer, then one selector byte per four-to-two gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableShape {
    /// Gates that own table rows.
    pub non_free_gates: usize,
    /// Rows owned by every non-free gate.
    pub rows_per_gate: usize,
    /// Outputs re-randomized by the unlinkability layer (2 rows each).
    pub unlinkable_outputs: usize,
    /// Selector bytes (four-to-two only).
    pub selectors: usize,
}

impl TableShape {
    /// The layout of `circuit` garbled with `config`.
    pub fn of(circuit: &CircuitSpec, config: &GarblingConfig) -> Self {
        let variant = config.variant;
        let non_free_gates = if variant.free_xor() {
            circuit.number_of_gates() - circuit.number_of_linear_gates()
        } else {
            circuit.number_of_gates()
        };
        Self {
            non_free_gates,
            rows_per_gate: variant.rows_per_gate(),
            unlinkable_outputs: if config.unlinkable_outputs {
                circuit.number_of_outputs()
            } else {
                0
            },
            selectors: if variant == GarblingVariant::FourToTwo {
                non_free_gates
            } else {
                0
            },
        }
    }

    /// Rows of all gates, in front of the output rows.
    pub fn gate_rows(&self) -> usize {
        self.non_free_gates * self.rows_per_gate
    }

    /// Total number of 128-bit rows.
    pub fn rows(&self) -> usize {
        self.gate_rows() + 2 * self.unlinkable_outputs
    }

    /// Size of the flat table in bytes.
    pub fn bytes(&self) -> usize {
        self.rows() * Block::BYTES + self.selectors
    }
}

#[cfg(test)]
mod tests {
    use super::{GarblingConfig, GarblingVariant, KeyMode, TableShape};
    use crate::{circuit::CircuitSpec, garble::Error};

    #[test]
    fn presets_are_valid() {
        for config in GarblingConfig::PRESETS {
            config.validate().unwrap();
        }
        assert_eq!(
            GarblingConfig::fixed_key_free_xor_half_gates(),
            GarblingConfig::default()
        );
    }

    #[test]
    fn invalid_combinations() {
        assert!(matches!(
            GarblingConfig::fixed_key_standard()
                .with_unlinkable_outputs()
                .validate(),
            Err(Error::UnlinkableOutputsRequireFreeXor(GarblingVariant::Standard))
        ));
        assert!(matches!(
            GarblingConfig::new(GarblingVariant::FourToTwo, KeyMode::Fixed).validate(),
            Err(Error::IncompatibleConfig { .. })
        ));
        GarblingConfig::no_fixed_key_free_xor_half_gates()
            .with_unlinkable_outputs()
            .validate()
            .unwrap();
    }

    #[test]
    fn table_shape_counts_only_non_free_gates() {
        // AND(a, b) -> 2; XOR(2, a) -> 3; NOT 3 -> 4
        let circuit: CircuitSpec =
            "3 2\n1 1 0\n2 1 1\n2 3 4\n2 1 0 1 2 0001\n2 1 2 0 3 0110\n1 1 3 4 1\n"
                .parse()
                .unwrap();
        let cases = [
            (GarblingConfig::fixed_key_standard(), 3 * 4 * 16),
            (GarblingConfig::fixed_key_free_xor_standard(), 4 * 16),
            (GarblingConfig::fixed_key_free_xor_row_reduction(), 3 * 16),
            (GarblingConfig::fixed_key_free_xor_half_gates(), 2 * 16),
            (GarblingConfig::no_fixed_key_four_to_two(), 3 * (2 * 16 + 1)),
            (
                GarblingConfig::fixed_key_free_xor_half_gates().with_unlinkable_outputs(),
                2 * 16 + 2 * 2 * 16,
            ),
        ];
        for (config, bytes) in cases {
            assert_eq!(bytes, TableShape::of(&circuit, &config).bytes(), "{config:?}");
        }
    }
}
