//! Routing of the messages exchanged over a [`Pipe`] during and
//! between key-exchanges.

use std::collections::VecDeque;

use futures::Future;
use futures_time::{future::FutureExt, time::Duration};

use crate::{
    wire::message::{self, Debug, Disconnect, Ignore, Message, Unimplemented},
    Error, Result,
};

mod interest;
pub use interest::{Interest, Interests};

mod keys;
pub use keys::{derive, Keys};

mod transport;
pub use transport::{Transport, TransportPair};

/// After 2 ^ 28 messages in a direction, initiate a rekey as recommended in the RFC.
pub const REKEY_THRESHOLD: u32 = 0x10000000;

/// Upper-layer messages kept aside while a key-exchange is running.
pub const BUFFER_LIMIT: usize = 256;

/// The packet-framing layer the key-exchange runs over,
/// exchanging whole payloads with the peer.
pub trait Pipe {
    /// Frame and send the `payload` with the current outgoing transport.
    fn send(&mut self, payload: &[u8]) -> impl Future<Output = Result<()>>;

    /// Receive and unframe the next payload with the current incoming transport.
    fn recv(&mut self) -> impl Future<Output = Result<Vec<u8>>>;

    /// Install the outgoing transport, used from the next sent packet on.
    fn install_tx(&mut self, transport: Transport);

    /// Install the incoming transport, used from the next received packet on.
    fn install_rx(&mut self, transport: Transport);
}

/// A wrapper around a [`Pipe`], bounding every operation with a timeout
/// and dispatching the received messages.
pub struct Stream<P> {
    inner: P,
    timeout: Duration,

    /// The message numbers currently awaited.
    interests: Interests,

    /// The session identifier derived from the first key exchange.
    session: Option<Vec<u8>>,

    /// Messages for the upper layers, received during a key-exchange.
    buffer: VecDeque<Vec<u8>>,

    /// Messages sent since the last key-exchange.
    txcount: u32,

    /// Messages received since the last key-exchange.
    rxcount: u32,
}

impl<P: Pipe> Stream<P> {
    pub(crate) fn new(inner: P, timeout: Duration) -> Self {
        Self {
            inner,
            timeout,
            interests: Default::default(),
            session: None,
            buffer: Default::default(),
            txcount: 0,
            rxcount: 0,
        }
    }

    /// Set the session identifier if unset, returning the effective one.
    pub(crate) fn with_session(&mut self, session: &[u8]) -> &[u8] {
        self.session.get_or_insert_with(|| session.to_vec())
    }

    /// The session identifier, once the first key-exchange completed.
    pub(crate) fn session_id(&self) -> Option<&[u8]> {
        self.session.as_deref()
    }

    pub(crate) fn install_tx(&mut self, transport: Transport) {
        self.inner.install_tx(transport);
        self.txcount = 0;
    }

    pub(crate) fn install_rx(&mut self, transport: Transport) {
        self.inner.install_rx(transport);
        self.rxcount = 0;
    }

    /// Whether the stream should be re-keyed.
    pub(crate) fn is_rekeyable(&self) -> bool {
        self.session.is_none() || self.txcount > REKEY_THRESHOLD || self.rxcount > REKEY_THRESHOLD
    }

    /// Register an interest for message `magic`, refusing concurrent ones.
    pub(crate) fn register(&self, magic: u8) -> Result<Interest> {
        self.interests.register(magic)
    }

    /// Send a `message` to the peer.
    pub(crate) async fn send<M: Message + std::fmt::Debug>(&mut self, message: &M) -> Result<()> {
        self.send_payload(&message.to_payload()?).await?;

        tracing::trace!("({})-> {message:?}", self.txcount.wrapping_sub(1));

        Ok(())
    }

    /// Send a raw `payload` to the peer.
    pub(crate) async fn send_payload(&mut self, payload: &[u8]) -> Result<()> {
        self.inner
            .send(payload)
            .timeout(self.timeout)
            .await
            .map_err(|_| Error::Timeout)??;

        self.txcount = self.txcount.wrapping_add(1);

        Ok(())
    }

    /// Receive the next payload from the peer, whatever it is.
    pub(crate) async fn next(&mut self) -> Result<Vec<u8>> {
        let payload = self
            .inner
            .recv()
            .timeout(self.timeout)
            .await
            .map_err(|_| Error::Timeout)??;

        self.rxcount = self.rxcount.wrapping_add(1);

        match payload.first() {
            Some(magic) => {
                tracing::trace!("<-({}) #{magic}", self.rxcount.wrapping_sub(1));

                Ok(payload)
            }
            None => Err(Error::KexError("received an empty message")),
        }
    }

    /// Wait for the message announced by `interest`, handling transport messages
    /// and buffering upper-layer ones received in the meantime.
    ///
    /// Any registered message number is delivered, the caller checks it is the one
    /// it can handle; unregistered key-exchange messages are refused.
    pub(crate) async fn expect(&mut self, interest: Interest) -> Result<Vec<u8>> {
        loop {
            let payload = self.next().await?;
            let magic = payload[0];

            if self.interests.contains(magic) {
                if magic != interest.magic() {
                    tracing::trace!(
                        "Delivering #{magic} while awaiting #{}",
                        interest.magic()
                    );
                }
                drop(interest);

                break Ok(payload);
            }

            match magic {
                message::DISCONNECT => break Err(disconnected(&payload)),
                message::IGNORE | message::DEBUG | message::UNIMPLEMENTED => skip(&payload),
                message::KEXINIT | message::NEWKEYS => break Err(Error::UnexpectedMessage(magic)),
                magic if message::KEX_METHOD_SPECIFIC.contains(&magic) => {
                    break Err(Error::UnexpectedMessage(magic))
                }
                _ if self.buffer.len() >= BUFFER_LIMIT => {
                    break Err(Error::KexError(
                        "too many messages buffered during the key-exchange",
                    ))
                }
                _ => {
                    tracing::debug!(
                        "Buffering message #{magic} received during the key-exchange"
                    );

                    self.buffer.push_back(payload);
                }
            }
        }
    }

    /// Receive the next message for the upper layers, or a `SSH_MSG_KEXINIT` from the peer.
    pub(crate) async fn recv(&mut self) -> Result<Vec<u8>> {
        if let Some(payload) = self.buffer.pop_front() {
            return Ok(payload);
        }

        loop {
            let payload = self.next().await?;
            let magic = payload[0];

            match magic {
                message::DISCONNECT => break Err(disconnected(&payload)),
                message::IGNORE | message::DEBUG | message::UNIMPLEMENTED => skip(&payload),
                message::NEWKEYS => break Err(Error::UnexpectedMessage(magic)),
                magic if message::KEX_METHOD_SPECIFIC.contains(&magic) => {
                    break Err(Error::UnexpectedMessage(magic))
                }
                _ => break Ok(payload),
            }
        }
    }
}

fn disconnected(payload: &[u8]) -> Error {
    match Disconnect::from_payload(payload) {
        Ok(Disconnect {
            reason,
            description,
            ..
        }) => tracing::warn!("Peer disconnected with reason #{reason}: {description}"),
        Err(_) => tracing::warn!("Peer disconnected with a malformed message"),
    }

    Error::Disconnected
}

fn skip(payload: &[u8]) {
    if let Ok(Ignore { data }) = Ignore::from_payload(payload) {
        tracing::debug!("Received an 'ignore' message with length {}", data.len());
    } else if let Ok(Unimplemented { seq }) = Unimplemented::from_payload(payload) {
        tracing::debug!("Received an 'unimplemented' message about packet #{seq}");
    } else if let Ok(Debug { message, .. }) = Debug::from_payload(payload) {
        tracing::debug!("Received a 'debug' message: {message}");
    }
}
