//! Garbled Boolean circuits for Yao-style secure two-party computation.
//!
//! A garbler turns a Boolean circuit into a garbled circuit: every wire gets
//! two random 128-bit keys, one per logical value, and every gate becomes a
//! small table of encrypted rows. An evaluator holding one key per input
//! wire can recover one key per output wire, and nothing else, and decodes
//! the output keys with the translation table.
//!
//! ## Garbling variants
//!
//! | [`GarblingVariant`] | rows per non-free gate | free gates |
//! |---|---|---|
//! | `Standard` | 4 | none |
//! | `FreeXor` | 4 | linear (XOR, XNOR, NOT, ...) |
//! | `RowReduction` | 3 | linear |
//! | `HalfGates` | 2 | linear |
//! | `FourToTwo` | 2 + selector byte | none, no fixed-key cipher |
//!
//! Rows are encrypted with the fixed-key hash `H(K) = π(K) ^ K`, keyed with a
//! public constant or with a key derived from the garbling seed
//! ([`KeyMode`]). Free-XOR variants can re-randomize the output keys so that
//! they do not reveal the global offset ([`GarblingConfig::unlinkable_outputs`]).
//!
//! ## Main Components
//!
//! * [`circuit`]: the circuit text format and plaintext evaluation.
//! * [`garble()`], [`GarbledCircuit::evaluate`] and [`GarbledCircuit::translate`]:
//!   the garbling and evaluation engines.
//! * [`verify`]: checking a garbling against both keys of every input wire.
//! * [`channel`], [`ot`] and [`protocol`]: the transport and oblivious
//!   transfer boundaries, and a semi-honest two-party protocol built on them.
//!
//! ## Example
//!
//! ```
//! use yao_gc::{Block, CircuitSpec, GarblingConfig, garble};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let circuit: CircuitSpec = "1 2\n1 1 0\n2 1 1\n1 2\n2 1 0 1 2 0001\n".parse()?;
//! let (garbled, keys) = garble(&circuit, GarblingConfig::default(), Block::from(42_u128))?;
//!
//! let inputs = keys.garbled_inputs(&[true, true])?;
//! let outputs = garbled.evaluate(&circuit, &inputs)?;
//! assert_eq!(vec![true], garbled.translate(&outputs)?);
//! # Ok(())
//! # }
//! ```
#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod block;
pub mod channel;
pub mod circuit;
pub mod crypto;
pub mod data_types;
pub mod eval;
pub mod garble;
pub mod ot;
pub mod protocol;
pub mod variant;
pub mod verify;

pub use block::Block;
pub use circuit::{CircuitSpec, Gate, TruthTable};
pub use data_types::{Label, LabelPair};
pub use garble::{GarbledCircuit, GarblingOutput, garble};
pub use variant::{GarblingConfig, GarblingVariant, KeyMode};
pub use verify::VerifyKeys;
