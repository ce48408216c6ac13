//! Boolean circuit descriptions and the text format they are loaded from.
//!
//! A circuit file is a sequence of whitespace separated tokens:
//!
//! ```text
//! <numberOfGates> <numberOfParties>
//! <party> <numInputs> <inputWire>...          (once per party, parties are numbered from 1)
//! <numOutputs> <outputWire>...
//! <inFan> <outFan> <in0> [<in1>] <out> <tt>   (once per gate)
//! ```
//!
//! `tt` is a binary literal of at most four digits listing the gate output
//! for the inputs `(0,0), (0,1), (1,0), (1,1)`, e.g. `0001` for AND. A token
//! starting with `#` comments out the rest of its line.
use std::{collections::BTreeMap, fs, path::Path, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{Level, debug, instrument, trace};

/// Index of a wire in a circuit.
pub type WireId = usize;

/// Errors raised while loading or using a circuit description.
#[derive(Debug, Error)]
pub enum Error {
    /// The circuit file could not be read.
    #[error("could not read circuit file: {0}")]
    Io(#[from] std::io::Error),
    /// The description ended before all declared rows were read.
    #[error("unexpected end of circuit description while reading {0}")]
    UnexpectedEof(&'static str),
    /// A token could not be parsed as the expected kind of value.
    #[error("line {line}: expected {expected}, found `{token}`")]
    InvalidToken {
        /// Line of the offending token (1-based).
        line: usize,
        /// What the parser was looking for.
        expected: &'static str,
        /// The offending token.
        token: String,
    },
    /// A party header names a party outside `1..=parties` or one seen before.
    #[error("line {line}: party {party} is not in 1..={parties} or is declared twice")]
    InvalidParty {
        /// Line of the party header.
        line: usize,
        /// The declared party number.
        party: usize,
        /// The number of parties from the circuit header.
        parties: usize,
    },
    /// A gate row with a fan-in other than 1 or 2.
    #[error("line {line}: gate has fan-in {fan_in}, expected 1 or 2")]
    InvalidFanIn {
        /// Line of the gate row.
        line: usize,
        /// The declared fan-in.
        fan_in: usize,
    },
    /// A gate row with a fan-out other than 1.
    #[error("line {line}: gate has fan-out {fan_out}, expected 1")]
    InvalidFanOut {
        /// Line of the gate row.
        line: usize,
        /// The declared fan-out.
        fan_out: usize,
    },
    /// A truth table that is not a binary literal in `[0, 15]`.
    #[error("line {line}: truth table `{token}` is not a binary literal in [0, 15]")]
    InvalidTruthTable {
        /// Line of the gate row.
        line: usize,
        /// The offending token.
        token: String,
    },
    /// A deserialized truth table encoding outside `[0, 15]`.
    #[error("truth table {0} is not in [0, 15]")]
    TruthTableOutOfRange(u8),
    /// A wire id beyond the highest wire id defined by the circuit.
    #[error("wire {wire} exceeds the wire index space (last wire index {last_wire_index})")]
    WireOutOfRange {
        /// The referenced wire.
        wire: WireId,
        /// The highest wire id defined by the circuit.
        last_wire_index: WireId,
    },
    /// A gate reads a wire that is only defined by a later gate.
    #[error("gate {gate} reads wire {wire} before it is defined")]
    UndefinedWire {
        /// Index of the gate in file order.
        gate: usize,
        /// The wire read by the gate.
        wire: WireId,
    },
    /// A wire is defined twice (as an input or a gate output).
    #[error("wire {0} is defined more than once")]
    DuplicateWire(WireId),
    /// A circuit output that is neither an input nor a gate output.
    #[error("output wire {0} is neither a circuit input nor a gate output")]
    UnknownOutputWire(WireId),
    /// Tokens after the last declared gate.
    #[error("line {line}: unexpected token `{token}` after the last gate")]
    TrailingTokens {
        /// Line of the first superfluous token.
        line: usize,
        /// The first superfluous token.
        token: String,
    },
    /// The requested party is not part of the circuit.
    #[error("party {0} does not exist")]
    NoSuchParty(usize),
    /// The number of provided input bits does not match the circuit.
    #[error("expected {expected} input bits, got {actual}")]
    WrongInputSize {
        /// The number of input wires of the circuit (or party).
        expected: usize,
        /// The number of provided bits.
        actual: usize,
    },
}

/// The truth table of a two-input gate, as an integer in `[0, 15]`.
///
/// The most significant of the four bits is the output for the inputs
/// `(0,0)`, the least significant the output for `(1,1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct TruthTable(u8);

/// A truth table of the form `a·x ^ b·y ^ constant`.
///
/// Under free-XOR these gates need no garbled rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Linear {
    pub(crate) a: bool,
    pub(crate) b: bool,
    pub(crate) constant: bool,
}

impl TruthTable {
    /// `x & y`
    pub const AND: Self = Self(0b0001);
    /// `x | y`
    pub const OR: Self = Self(0b0111);
    /// `x ^ y`
    pub const XOR: Self = Self(0b0110);
    /// `!(x ^ y)`
    pub const XNOR: Self = Self(0b1001);
    /// `!(x & y)`
    pub const NAND: Self = Self(0b1110);
    /// `!x`, i.e. `x ^ 1`. Fan-in-1 rows are loaded as this table.
    pub const NOT: Self = Self(0b1100);

    /// Creates a truth table from its integer encoding.
    pub fn new(bits: u8) -> Option<Self> {
        (bits < 16).then_some(Self(bits))
    }

    /// Parses a binary literal such as `0110` (leading zeros may be omitted).
    pub fn from_binary_literal(literal: &str) -> Option<Self> {
        if literal.is_empty() || literal.len() > 4 {
            return None;
        }
        let mut bits = 0;
        for c in literal.chars() {
            let bit = match c {
                '0' => 0,
                '1' => 1,
                _ => return None,
            };
            bits = (bits << 1) | bit;
        }
        Some(Self(bits))
    }

    /// The integer encoding of the table.
    pub fn bits(&self) -> u8 {
        self.0
    }

    /// The gate output for the row `2a + b`.
    #[inline]
    pub fn row(&self, row: usize) -> bool {
        (self.0 >> (3 - row)) & 1 == 1
    }

    /// The gate output for the inputs `a`, `b`.
    #[inline]
    pub fn eval(&self, a: bool, b: bool) -> bool {
        self.row(2 * a as usize + b as usize)
    }

    /// Number of rows evaluating to 1.
    pub fn weight(&self) -> u32 {
        self.0.count_ones()
    }

    /// Whether the gate ignores both of its inputs.
    pub fn is_constant(&self) -> bool {
        self.0 == 0 || self.0 == 0b1111
    }

    /// Decomposes the table into `a·x ^ b·y ^ constant`, if possible.
    pub(crate) fn linear(&self) -> Option<Linear> {
        let constant = self.row(0);
        let b = constant ^ self.row(1);
        let a = constant ^ self.row(2);
        (self.row(3) == (constant ^ a ^ b)).then_some(Linear { a, b, constant })
    }

    /// Writes the table as `((x ^ alpha) & (y ^ beta)) ^ gamma`.
    ///
    /// Exactly the tables with an odd weight have this form.
    pub(crate) fn and_form(&self) -> Option<(bool, bool, bool)> {
        let (odd_row, gamma) = match self.weight() {
            1 => ((0..4).find(|&r| self.row(r))?, false),
            3 => ((0..4).find(|&r| !self.row(r))?, true),
            _ => return None,
        };
        let x = odd_row >> 1 == 1;
        let y = odd_row & 1 == 1;
        Some((!x, !y, gamma))
    }
}

impl TryFrom<u8> for TruthTable {
    type Error = Error;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        Self::new(bits).ok_or(Error::TruthTableOutOfRange(bits))
    }
}

impl From<TruthTable> for u8 {
    fn from(table: TruthTable) -> Self {
        table.0
    }
}

/// A gate with two inputs and one output.
///
/// NOT gates are stored with `input1 == input0` and [`TruthTable::NOT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gate {
    /// First input wire.
    pub input0: WireId,
    /// Second input wire.
    pub input1: WireId,
    /// Output wire.
    pub output: WireId,
    /// The function computed by the gate.
    pub truth_table: TruthTable,
}

impl Gate {
    /// A gate computing `truth_table(input0, input1)`.
    pub fn new(input0: WireId, input1: WireId, output: WireId, truth_table: TruthTable) -> Self {
        Self {
            input0,
            input1,
            output,
            truth_table,
        }
    }

    /// A NOT gate, riding the free-XOR path as `input ^ 1`.
    pub fn not(input: WireId, output: WireId) -> Self {
        Self::new(input, input, output, TruthTable::NOT)
    }
}

/// An immutable, validated Boolean circuit.
///
/// Gates are kept in file order, which is a topological order: every gate
/// only reads circuit inputs or outputs of earlier gates. Deserialized
/// circuits are validated like loaded ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CircuitRows")]
pub struct CircuitSpec {
    party_inputs: Vec<Vec<WireId>>,
    outputs: Vec<WireId>,
    gates: Vec<Gate>,
    #[serde(skip_serializing)]
    last_wire_index: WireId,
    #[serde(skip_serializing)]
    linear_gates: usize,
}

/// The serialized form of a [`CircuitSpec`], before validation.
#[derive(Deserialize)]
struct CircuitRows {
    party_inputs: Vec<Vec<WireId>>,
    outputs: Vec<WireId>,
    gates: Vec<Gate>,
}

impl TryFrom<CircuitRows> for CircuitSpec {
    type Error = Error;

    fn try_from(rows: CircuitRows) -> Result<Self, Self::Error> {
        CircuitSpec::new(rows.party_inputs, rows.outputs, rows.gates)
    }
}

impl CircuitSpec {
    /// Validates and creates a circuit.
    ///
    /// `party_inputs[p]` are the input wires of party `p + 1`.
    pub fn new(
        party_inputs: Vec<Vec<WireId>>,
        outputs: Vec<WireId>,
        gates: Vec<Gate>,
    ) -> Result<Self, Error> {
        let last_wire_index = party_inputs
            .iter()
            .flatten()
            .copied()
            .chain(gates.iter().map(|g| g.output))
            .max()
            .unwrap_or(0);

        let mut defined = vec![false; last_wire_index + 1];
        for &wire in party_inputs.iter().flatten() {
            if std::mem::replace(&mut defined[wire], true) {
                return Err(Error::DuplicateWire(wire));
            }
        }
        for (i, gate) in gates.iter().enumerate() {
            for wire in [gate.input0, gate.input1] {
                if wire > last_wire_index {
                    return Err(Error::WireOutOfRange {
                        wire,
                        last_wire_index,
                    });
                }
                if !defined[wire] {
                    return Err(Error::UndefinedWire { gate: i, wire });
                }
            }
            if std::mem::replace(&mut defined[gate.output], true) {
                return Err(Error::DuplicateWire(gate.output));
            }
        }
        for &wire in &outputs {
            if wire > last_wire_index {
                return Err(Error::WireOutOfRange {
                    wire,
                    last_wire_index,
                });
            }
            if !defined[wire] {
                return Err(Error::UnknownOutputWire(wire));
            }
        }

        let linear_gates = gates
            .iter()
            .filter(|g| g.truth_table.linear().is_some())
            .count();
        Ok(Self {
            party_inputs,
            outputs,
            gates,
            last_wire_index,
            linear_gates,
        })
    }

    /// Loads a circuit from a file in the text format described in the module docs.
    #[instrument(level = Level::DEBUG, skip_all, fields(path = %path.as_ref().display()), err)]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let text = fs::read_to_string(path)?;
        text.parse()
    }

    /// Number of gates.
    pub fn number_of_gates(&self) -> usize {
        self.gates.len()
    }

    /// Number of parties providing inputs.
    pub fn number_of_parties(&self) -> usize {
        self.party_inputs.len()
    }

    /// Number of gates with a linear truth table (XOR, XNOR, NOT, ...).
    ///
    /// With free-XOR these are garbled without table rows.
    pub fn number_of_linear_gates(&self) -> usize {
        self.linear_gates
    }

    /// All gates in evaluation order.
    pub fn gates(&self) -> &[Gate] {
        &self.gates
    }

    /// The highest wire id in use.
    pub fn last_wire_index(&self) -> WireId {
        self.last_wire_index
    }

    /// Output wires, in output order.
    pub fn output_wires(&self) -> &[WireId] {
        &self.outputs
    }

    /// Number of output wires.
    pub fn number_of_outputs(&self) -> usize {
        self.outputs.len()
    }

    /// Input wires of all parties, party 1 first.
    pub fn input_wires(&self) -> impl Iterator<Item = WireId> + '_ {
        self.party_inputs.iter().flatten().copied()
    }

    /// Total number of input wires.
    pub fn number_of_inputs(&self) -> usize {
        self.party_inputs.iter().map(Vec::len).sum()
    }

    /// Input wires of `party` (numbered from 1).
    pub fn party_input_wires(&self, party: usize) -> Result<&[WireId], Error> {
        party
            .checked_sub(1)
            .and_then(|p| self.party_inputs.get(p))
            .map(Vec::as_slice)
            .ok_or(Error::NoSuchParty(party))
    }

    /// Number of input wires of `party` (numbered from 1).
    pub fn party_number_of_inputs(&self, party: usize) -> Result<usize, Error> {
        self.party_input_wires(party).map(<[WireId]>::len)
    }

    /// Position of the first input wire of `party` among all input wires.
    pub(crate) fn party_input_offset(&self, party: usize) -> Result<usize, Error> {
        self.party_input_wires(party)?;
        Ok(self.party_inputs[..party - 1].iter().map(Vec::len).sum())
    }

    /// Evaluates the circuit in the clear.
    ///
    /// `inputs` holds one bit per input wire, in the order of [`Self::input_wires`].
    pub fn evaluate_plain(&self, inputs: &[bool]) -> Result<Vec<bool>, Error> {
        let expected = self.number_of_inputs();
        if inputs.len() != expected {
            return Err(Error::WrongInputSize {
                expected,
                actual: inputs.len(),
            });
        }
        let mut wires = vec![false; self.last_wire_index + 1];
        for (wire, &bit) in self.input_wires().zip(inputs) {
            wires[wire] = bit;
        }
        for gate in &self.gates {
            wires[gate.output] = gate.truth_table.eval(wires[gate.input0], wires[gate.input1]);
        }
        Ok(self.outputs.iter().map(|&w| wires[w]).collect())
    }
}

impl FromStr for CircuitSpec {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut tokens = Tokens::new(text);
        let number_of_gates = tokens.number("the number of gates")?;
        let number_of_parties = tokens.number("the number of parties")?;

        // header counts are untrusted, nothing is sized by them before the rows are read
        let mut party_inputs = BTreeMap::new();
        for _ in 0..number_of_parties {
            let (line, party) = tokens.number_with_line("a party number")?;
            if !(1..=number_of_parties).contains(&party) || party_inputs.contains_key(&party) {
                return Err(Error::InvalidParty {
                    line,
                    party,
                    parties: number_of_parties,
                });
            }
            let count = tokens.number("the number of party inputs")?;
            let wires = (0..count)
                .map(|_| tokens.wire("an input wire"))
                .collect::<Result<Vec<_>, _>>()?;
            trace!(party, inputs = wires.len(), "read party inputs");
            party_inputs.insert(party, wires);
        }
        // keys are exactly 1..=number_of_parties, so values come in party order
        let party_inputs = party_inputs.into_values().collect();

        let number_of_outputs = tokens.number("the number of outputs")?;
        let outputs = (0..number_of_outputs)
            .map(|_| tokens.wire("an output wire"))
            .collect::<Result<Vec<_>, _>>()?;

        let mut gates = Vec::new();
        for _ in 0..number_of_gates {
            let (line, fan_in) = tokens.number_with_line("a gate fan-in")?;
            let fan_out = tokens.number("a gate fan-out")?;
            if fan_out != 1 {
                return Err(Error::InvalidFanOut { line, fan_out });
            }
            let gate = match fan_in {
                1 => {
                    let input = tokens.wire("a gate input wire")?;
                    let output = tokens.wire("a gate output wire")?;
                    // the truth table of a NOT row carries no information
                    tokens.token("a truth table")?;
                    Gate::not(input, output)
                }
                2 => {
                    let input0 = tokens.wire("a gate input wire")?;
                    let input1 = tokens.wire("a gate input wire")?;
                    let output = tokens.wire("a gate output wire")?;
                    let (line, literal) = tokens.token("a truth table")?;
                    let truth_table = TruthTable::from_binary_literal(literal).ok_or_else(|| {
                        Error::InvalidTruthTable {
                            line,
                            token: literal.to_string(),
                        }
                    })?;
                    Gate::new(input0, input1, output, truth_table)
                }
                _ => return Err(Error::InvalidFanIn { line, fan_in }),
            };
            gates.push(gate);
        }
        if let Some((line, token)) = tokens.next() {
            return Err(Error::TrailingTokens {
                line,
                token: token.to_string(),
            });
        }

        let circuit = CircuitSpec::new(party_inputs, outputs, gates)?;
        debug!(
            gates = circuit.number_of_gates(),
            parties = circuit.number_of_parties(),
            outputs = circuit.number_of_outputs(),
            last_wire_index = circuit.last_wire_index(),
            "loaded circuit"
        );
        Ok(circuit)
    }
}

/// Whitespace separated tokens with their line numbers, skipping `#` comments.
struct Tokens<'a> {
    inner: Box<dyn Iterator<Item = (usize, &'a str)> + 'a>,
}

impl<'a> Tokens<'a> {
    fn new(text: &'a str) -> Self {
        let inner = text.lines().enumerate().flat_map(|(i, line)| {
            line.split_whitespace()
                .take_while(|token| !token.starts_with('#'))
                .map(move |token| (i + 1, token))
        });
        Self {
            inner: Box::new(inner),
        }
    }

    fn next(&mut self) -> Option<(usize, &'a str)> {
        self.inner.next()
    }

    fn token(&mut self, expected: &'static str) -> Result<(usize, &'a str), Error> {
        self.next().ok_or(Error::UnexpectedEof(expected))
    }

    fn number_with_line(&mut self, expected: &'static str) -> Result<(usize, usize), Error> {
        let (line, token) = self.token(expected)?;
        token
            .parse::<u32>()
            .map(|n| (line, n as usize))
            .map_err(|_| Error::InvalidToken {
                line,
                expected,
                token: token.to_string(),
            })
    }

    fn number(&mut self, expected: &'static str) -> Result<usize, Error> {
        self.number_with_line(expected).map(|(_, n)| n)
    }

    fn wire(&mut self, expected: &'static str) -> Result<WireId, Error> {
        self.number(expected)
    }
}
