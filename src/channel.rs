//! The transport between garbler and evaluator.
//!
//! Garbled tables, translation tables and input keys are exchanged as
//! messages over a reliable, ordered byte stream. [`Channel`] is implemented
//! by the host application; [`SimpleChannel`] connects two parties in memory.

use std::{fmt, future::Future, time::Duration};

use serde::{Serialize, de::DeserializeOwned};
use tokio::{
    sync::mpsc::{Receiver, Sender, channel, error::SendError},
    time::timeout,
};
use tracing::trace;

/// Errors related to sending / receiving / (de-)serializing messages.
#[derive(Debug)]
pub struct Error {
    /// The protocol phase during which the error occurred.
    pub phase: String,
    /// The specific error that was raised.
    pub reason: ErrorKind,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {:?}", self.phase, self.reason)
    }
}

impl std::error::Error for Error {}

/// The specific error that occurred when trying to send / receive a message.
#[derive(Debug)]
pub enum ErrorKind {
    /// The (serialized) message could not be received over the channel.
    RecvError(String),
    /// The (serialized) message could not be sent over the channel.
    SendError(String),
    /// The message could not be (de-)serialized.
    SerdeError(String),
    /// The message has not the length the receiver computed for it.
    InvalidLength {
        /// The length required by circuit and configuration.
        expected: usize,
        /// The length of the received message.
        actual: usize,
    },
}

/// A bidirectional byte channel to the other party.
///
/// Every sent message must arrive exactly once, complete and in order.
pub trait Channel {
    /// The error that can occur sending messages over the channel.
    type SendError: fmt::Debug;
    /// The error that can occur receiving messages over the channel.
    type RecvError: fmt::Debug;

    /// Sends a message to the other party.
    fn send_bytes(
        &mut self,
        msg: Vec<u8>,
    ) -> impl Future<Output = Result<(), Self::SendError>> + Send;

    /// Awaits the next message of the other party.
    fn recv_bytes(&mut self) -> impl Future<Output = Result<Vec<u8>, Self::RecvError>> + Send;
}

/// A wrapper around [`Channel`] that takes care of (de-)serializing messages.
#[derive(Debug)]
pub(crate) struct MsgChannel<C: Channel>(pub C);

impl<C: Channel> MsgChannel<C> {
    /// Serializes and sends a message to the other party.
    pub(crate) async fn send(&mut self, phase: &str, msg: &impl Serialize) -> Result<(), Error> {
        let msg = bincode::serialize(msg).map_err(|e| Error {
            phase: format!("sending {phase}"),
            reason: ErrorKind::SerdeError(format!("{e:?}")),
        })?;
        trace!(phase, bytes = msg.len(), "sending message");
        self.0.send_bytes(msg).await.map_err(|e| Error {
            phase: phase.to_string(),
            reason: ErrorKind::SendError(format!("{e:?}")),
        })
    }

    /// Receives and deserializes a message from the other party.
    pub(crate) async fn recv<T: DeserializeOwned>(&mut self, phase: &str) -> Result<T, Error> {
        let msg = self.recv_raw(phase).await?;
        bincode::deserialize(&msg).map_err(|e| Error {
            phase: format!("receiving {phase}"),
            reason: ErrorKind::SerdeError(format!("{e:?}")),
        })
    }

    /// Sends a flat buffer without a serialization layer.
    pub(crate) async fn send_raw(&mut self, phase: &str, msg: Vec<u8>) -> Result<(), Error> {
        trace!(phase, bytes = msg.len(), "sending buffer");
        self.0.send_bytes(msg).await.map_err(|e| Error {
            phase: phase.to_string(),
            reason: ErrorKind::SendError(format!("{e:?}")),
        })
    }

    async fn recv_raw(&mut self, phase: &str) -> Result<Vec<u8>, Error> {
        self.0.recv_bytes().await.map_err(|e| Error {
            phase: phase.to_string(),
            reason: ErrorKind::RecvError(format!("{e:?}")),
        })
    }

    /// Receives a flat buffer of exactly `len` bytes.
    pub(crate) async fn recv_exact(&mut self, phase: &str, len: usize) -> Result<Vec<u8>, Error> {
        let msg = self.recv_raw(phase).await?;
        if msg.len() == len {
            Ok(msg)
        } else {
            Err(Error {
                phase: phase.to_string(),
                reason: ErrorKind::InvalidLength {
                    expected: len,
                    actual: msg.len(),
                },
            })
        }
    }

    /// Receives and deserializes a Vec from the other party (while checking the length).
    pub(crate) async fn recv_vec<T: DeserializeOwned>(
        &mut self,
        phase: &str,
        len: usize,
    ) -> Result<Vec<T>, Error> {
        let v: Vec<T> = self.recv(phase).await?;
        if v.len() == len {
            Ok(v)
        } else {
            Err(Error {
                phase: phase.to_string(),
                reason: ErrorKind::InvalidLength {
                    expected: len,
                    actual: v.len(),
                },
            })
        }
    }
}

/// An in-memory channel using a bounded [`Sender`] and [`Receiver`] per direction.
#[derive(Debug)]
pub struct SimpleChannel {
    s: Sender<Vec<u8>>,
    r: Receiver<Vec<u8>>,
    timeout: Duration,
}

impl SimpleChannel {
    /// Creates two connected ends, one per party.
    pub fn pair() -> (Self, Self) {
        let buffer_capacity = 1024;
        let (send_a_to_b, recv_a_to_b) = channel(buffer_capacity);
        let (send_b_to_a, recv_b_to_a) = channel(buffer_capacity);
        let timeout = Duration::from_secs(10 * 60);
        let a = SimpleChannel {
            s: send_a_to_b,
            r: recv_b_to_a,
            timeout,
        };
        let b = SimpleChannel {
            s: send_b_to_a,
            r: recv_a_to_b,
            timeout,
        };
        (a, b)
    }

    /// Replaces the time to wait for a message before giving up.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }
}

/// The error raised by `recv` calls of a [`SimpleChannel`].
#[derive(Debug)]
pub enum AsyncRecvError {
    /// The channel has been closed.
    Closed,
    /// No message was received before the timeout.
    TimeoutElapsed,
}

impl Channel for SimpleChannel {
    type SendError = SendError<Vec<u8>>;
    type RecvError = AsyncRecvError;

    async fn send_bytes(&mut self, msg: Vec<u8>) -> Result<(), SendError<Vec<u8>>> {
        self.s.send(msg).await
    }

    async fn recv_bytes(&mut self) -> Result<Vec<u8>, AsyncRecvError> {
        match timeout(self.timeout, self.r.recv()).await {
            Ok(Some(bytes)) => Ok(bytes),
            Ok(None) => Err(AsyncRecvError::Closed),
            Err(_) => Err(AsyncRecvError::TimeoutElapsed),
        }
    }
}
