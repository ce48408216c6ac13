//! Semi-honest two-party computation with Yao's garbled circuits.
//!
//! Party 1 garbles, party 2 evaluates:
//!
//! 1. the garbler sends the configuration and the public cipher key, the
//!    garbled table and the translation table as flat buffers, and the keys
//!    of its own inputs;
//! 2. the evaluator obtains the keys of its inputs by oblivious transfer;
//! 3. the evaluator evaluates, translates and sends the output bits back.
//!
//! Circuits must declare exactly two parties.

use rand::random;
use thiserror::Error;
use tokio::runtime::Builder;
use tracing::{Level, debug, instrument};

use crate::{
    block::Block,
    channel::{self, Channel, MsgChannel, SimpleChannel},
    circuit::{self, CircuitSpec},
    crypto::CipherKey,
    data_types::Label,
    eval,
    garble::{self, GarbledCircuit, garble},
    ot::{KeyTransfer, TrustedDealer},
    variant::GarblingConfig,
};

/// The party that garbles the circuit.
pub const GARBLER: usize = 1;
/// The party that evaluates the circuit.
pub const EVALUATOR: usize = 2;

/// Errors raised during a protocol run.
#[derive(Debug, Error)]
pub enum Error {
    /// A message could not be sent or received.
    #[error("channel error: {0}")]
    ChannelError(#[from] channel::Error),
    /// The circuit does not fit the protocol or the inputs.
    #[error(transparent)]
    CircuitError(#[from] circuit::Error),
    /// The circuit could not be garbled, or the received tables are malformed.
    #[error(transparent)]
    GarblingError(#[from] garble::Error),
    /// The garbled circuit could not be evaluated.
    #[error(transparent)]
    EvaluationError(#[from] eval::Error),
    /// The oblivious transfer failed.
    #[error("oblivious transfer failed: {0}")]
    OtError(String),
    /// The circuit does not have exactly two parties.
    #[error("two-party protocol, but the circuit has {0} parties")]
    WrongNumberOfParties(usize),
}

fn check_parties(circuit: &CircuitSpec) -> Result<(), Error> {
    match circuit.number_of_parties() {
        2 => Ok(()),
        n => Err(Error::WrongNumberOfParties(n)),
    }
}

fn check_inputs(circuit: &CircuitSpec, party: usize, inputs: &[bool]) -> Result<(), Error> {
    let expected = circuit.party_number_of_inputs(party)?;
    if inputs.len() != expected {
        return Err(circuit::Error::WrongInputSize {
            expected,
            actual: inputs.len(),
        }
        .into());
    }
    Ok(())
}

/// Runs both parties in one process and returns the evaluator's outputs.
pub fn simulate_yao(
    circuit: &CircuitSpec,
    config: GarblingConfig,
    garbler_inputs: &[bool],
    evaluator_inputs: &[bool],
) -> Result<Vec<bool>, Error> {
    check_parties(circuit)?;
    check_inputs(circuit, GARBLER, garbler_inputs)?;
    check_inputs(circuit, EVALUATOR, evaluator_inputs)?;
    let tokio = Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("Could not start tokio runtime");
    tokio.block_on(async {
        let (garbler_channel, evaluator_channel) = SimpleChannel::pair();
        let (garbler_ot, evaluator_ot, dealer) = TrustedDealer::spawn();
        let (garbler_outputs, evaluator_outputs) = tokio::join!(
            garbler(circuit, config, garbler_inputs, garbler_channel, garbler_ot),
            evaluator(circuit, evaluator_inputs, evaluator_channel, evaluator_ot),
        );
        let outputs = evaluator_outputs?;
        garbler_outputs?;
        match dealer.await {
            Ok(Ok(())) => Ok(outputs),
            Ok(Err(e)) => Err(Error::OtError(e.to_string())),
            Err(e) => Err(Error::OtError(format!("{e:?}"))),
        }
    })
}

/// Executes the protocol as the garbler and returns the outputs reported by
/// the evaluator.
#[instrument(level = Level::DEBUG, skip_all, fields(variant = ?config.variant), err)]
pub async fn garbler<C: Channel, T: KeyTransfer>(
    circuit: &CircuitSpec,
    config: GarblingConfig,
    inputs: &[bool],
    channel: C,
    mut ot: T,
) -> Result<Vec<bool>, Error> {
    check_parties(circuit)?;
    check_inputs(circuit, GARBLER, inputs)?;
    let mut channel = MsgChannel(channel);

    let seed: Block = random();
    let (garbled, keys) = garble(circuit, config, seed)?;
    let own_keys = keys.garbled_inputs_for(circuit, GARBLER, inputs)?;

    channel
        .send("circuit header", &(garbled.config(), garbled.cipher_key()))
        .await?;
    channel
        .send_raw("garbled table", garbled.garbled_table().to_bytes())
        .await?;
    channel
        .send_raw(
            "translation table",
            garbled.translation_table().as_bytes().to_vec(),
        )
        .await?;
    channel.send("garbler input keys", &own_keys).await?;
    ot.offer(keys.party_input_keys(circuit, EVALUATOR)?)
        .await
        .map_err(|e| Error::OtError(format!("{e:?}")))?;

    let outputs = channel
        .recv_vec("outputs", circuit.number_of_outputs())
        .await?;
    debug!(table_bytes = garbled.garbled_table_size(), "garbler done");
    Ok(outputs)
}

/// Executes the protocol as the evaluator and returns the outputs.
#[instrument(level = Level::DEBUG, skip_all, err)]
pub async fn evaluator<C: Channel, T: KeyTransfer>(
    circuit: &CircuitSpec,
    inputs: &[bool],
    channel: C,
    mut ot: T,
) -> Result<Vec<bool>, Error> {
    check_parties(circuit)?;
    check_inputs(circuit, EVALUATOR, inputs)?;
    let mut channel = MsgChannel(channel);

    let (config, cipher_key): (GarblingConfig, CipherKey) =
        channel.recv("circuit header").await?;
    let mut garbled = GarbledCircuit::for_evaluation(circuit, config, cipher_key)?;
    let table = channel
        .recv_exact("garbled table", garbled.garbled_table_size())
        .await?;
    garbled.set_garbled_table(&table)?;
    let translation = channel
        .recv_exact("translation table", circuit.number_of_outputs())
        .await?;
    garbled.set_translation_table(&translation)?;

    let mut input_keys: Vec<Label> = channel
        .recv_vec(
            "garbler input keys",
            circuit.party_number_of_inputs(GARBLER)?,
        )
        .await?;
    let own_keys = ot
        .transfer(inputs)
        .await
        .map_err(|e| Error::OtError(format!("{e:?}")))?;
    input_keys.extend(own_keys);

    let output_keys = garbled.evaluate(circuit, &input_keys)?;
    let outputs = garbled.translate(&output_keys)?;
    channel.send("outputs", &outputs).await?;
    debug!(outputs = outputs.len(), "evaluator done");
    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::{Error, simulate_yao};
    use crate::{circuit::CircuitSpec, variant::GarblingConfig};

    const AND: &str = "1 2\n1 1 0\n2 1 1\n1 2\n2 1 0 1 2 0001\n";

    #[test]
    fn and_of_two_parties() {
        let circuit: CircuitSpec = AND.parse().unwrap();
        for config in GarblingConfig::PRESETS {
            for (x, y) in [(false, false), (false, true), (true, false), (true, true)] {
                let outputs = simulate_yao(&circuit, config, &[x], &[y]).unwrap();
                assert_eq!(vec![x & y], outputs, "{config:?}");
            }
        }
    }

    #[test]
    fn wrong_inputs_are_rejected_before_garbling() {
        let circuit: CircuitSpec = AND.parse().unwrap();
        let result = simulate_yao(&circuit, GarblingConfig::default(), &[true, true], &[true]);
        assert!(matches!(result, Err(Error::CircuitError(_))));
        let single: CircuitSpec = "1 1\n1 2 0 1\n1 2\n2 1 0 1 2 0001\n".parse().unwrap();
        let result = simulate_yao(&single, GarblingConfig::default(), &[true, true], &[]);
        assert!(matches!(result, Err(Error::WrongNumberOfParties(1))));
    }
}
