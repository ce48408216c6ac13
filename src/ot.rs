//! The oblivious transfer boundary.
//!
//! The evaluator obtains, for each of its input wires, the key encoding its
//! input bit, without the garbler learning the bit and without the evaluator
//! learning the other key. [`KeyTransfer`] is the contract a real 1-out-of-2
//! OT implementation fulfills; [`TrustedDealer`] simulates it with a third
//! party that both sides trust, for tests and benchmarks.

use std::fmt;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::{
    channel::{self, MsgChannel, SimpleChannel},
    data_types::{Label, LabelPair},
};

/// Errors that can occur while executing the trusted dealer.
#[derive(Debug)]
pub enum Error {
    /// The garbler offered a different number of key pairs than the
    /// evaluator has choice bits.
    LengthMismatch {
        /// Number of offered key pairs.
        pairs: usize,
        /// Number of choice bits.
        choices: usize,
    },
    /// An error occurred while trying to communicate over the channel.
    Channel(channel::Error),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::LengthMismatch { pairs, choices } => {
                write!(f, "{pairs} key pairs offered for {choices} choice bits")
            }
            Error::Channel(e) => write!(f, "Channel error: {e}"),
        }
    }
}

impl From<channel::Error> for Error {
    fn from(e: channel::Error) -> Self {
        Error::Channel(e)
    }
}

/// One end of a 1-out-of-2 oblivious transfer of wire keys.
///
/// The garbler calls [`KeyTransfer::offer`] with both keys of every input
/// wire of the evaluator, the evaluator calls [`KeyTransfer::transfer`] with
/// its input bits. Both calls must cover the same wires in the same order.
pub trait KeyTransfer {
    /// The error raised by the transfer.
    type Error: fmt::Debug;

    /// Offers both keys of each wire (garbler side).
    fn offer(
        &mut self,
        pairs: &[LabelPair],
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Receives `pairs[i].select(sigma[i])` for every wire (evaluator side).
    fn transfer(
        &mut self,
        sigma: &[bool],
    ) -> impl Future<Output = Result<Vec<Label>, Self::Error>> + Send;
}

/// A party's connection to a trusted dealer task performing the transfer.
#[derive(Debug)]
pub struct TrustedDealer(MsgChannel<SimpleChannel>);

impl TrustedDealer {
    /// Spawns the dealer on the current tokio runtime and returns the ends
    /// of garbler and evaluator, plus the handle of the dealer task.
    pub fn spawn() -> (Self, Self, JoinHandle<Result<(), Error>>) {
        let (garbler, garbler_dealer) = SimpleChannel::pair();
        let (evaluator, evaluator_dealer) = SimpleChannel::pair();
        let dealer = tokio::spawn(deal(
            MsgChannel(garbler_dealer),
            MsgChannel(evaluator_dealer),
        ));
        (
            TrustedDealer(MsgChannel(garbler)),
            TrustedDealer(MsgChannel(evaluator)),
            dealer,
        )
    }
}

/// Receives the key pairs and the choice bits and hands out the chosen keys.
async fn deal(
    mut garbler: MsgChannel<SimpleChannel>,
    mut evaluator: MsgChannel<SimpleChannel>,
) -> Result<(), Error> {
    let pairs: Vec<LabelPair> = garbler.recv("key pairs (dealer)").await?;
    let sigma: Vec<bool> = evaluator.recv("choice bits (dealer)").await?;
    if pairs.len() != sigma.len() {
        // dropping the channels closes them, the evaluator's receive fails
        return Err(Error::LengthMismatch {
            pairs: pairs.len(),
            choices: sigma.len(),
        });
    }
    let keys: Vec<Label> = pairs
        .iter()
        .zip(&sigma)
        .map(|(pair, &bit)| pair.select(bit))
        .collect();
    debug!(keys = keys.len(), "transferred keys");
    evaluator.send("chosen keys (dealer)", &keys).await?;
    Ok(())
}

impl KeyTransfer for TrustedDealer {
    type Error = Error;

    async fn offer(&mut self, pairs: &[LabelPair]) -> Result<(), Error> {
        self.0.send("key pairs (dealer)", &pairs).await?;
        Ok(())
    }

    async fn transfer(&mut self, sigma: &[bool]) -> Result<Vec<Label>, Error> {
        self.0.send("choice bits (dealer)", &sigma).await?;
        Ok(self.0.recv_vec("chosen keys (dealer)", sigma.len()).await?)
    }
}

#[cfg(test)]
mod tests {
    use rand::random;

    use super::{KeyTransfer, TrustedDealer};
    use crate::data_types::{Label, LabelPair};

    #[tokio::test]
    async fn evaluator_receives_the_chosen_keys() {
        let pairs: Vec<_> = (0..8)
            .map(|_| LabelPair::new(Label(random()), Label(random())))
            .collect();
        let sigma: Vec<bool> = (0..8).map(|_| random()).collect();
        let (mut garbler, mut evaluator, dealer) = TrustedDealer::spawn();
        garbler.offer(&pairs).await.unwrap();
        let keys = evaluator.transfer(&sigma).await.unwrap();
        dealer.await.unwrap().unwrap();
        for ((pair, bit), key) in pairs.iter().zip(sigma).zip(keys) {
            assert_eq!(pair.select(bit), key);
        }
    }

    #[tokio::test]
    async fn mismatched_lengths_fail() {
        let pairs = vec![LabelPair::new(Label(random()), Label(random())); 2];
        let (mut garbler, mut evaluator, dealer) = TrustedDealer::spawn();
        garbler.offer(&pairs).await.unwrap();
        assert!(evaluator.transfer(&[true]).await.is_err());
        assert!(dealer.await.unwrap().is_err());
    }
}
