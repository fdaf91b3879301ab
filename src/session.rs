use crate::{
    algorithm::Negotiated,
    kex::Completed,
    side::Side,
    stream::{Pipe, Stream},
    wire::message::{self, Disconnect, DisconnectReason},
    Error, ErrorKind, Id, Result,
};

/// A session wrapping a [`Pipe`] to handle the **key-exchanges** over its lifetime.
pub struct Session<P, S> {
    stream: Option<Stream<P>>,
    config: S,

    peer_id: Id,

    /// The last completed key-exchange.
    last: Option<Completed>,
}

impl<P, S> Session<P, S>
where
    P: Pipe,
    S: Side,
{
    /// Create a new [`Session`] over a [`Pipe`] whose identification
    /// strings were already exchanged, the peer's being `peer_id`.
    ///
    /// The first key-exchange happens on the first use of the session.
    pub fn new(pipe: P, config: S, peer_id: Id) -> Self {
        let stream = Stream::new(pipe, config.timeout());

        tracing::debug!("Session started with peer `{peer_id}`");

        Self {
            stream: Some(stream),
            config,
            peer_id,
            last: None,
        }
    }

    /// Access the [`Id`] of the connected peer.
    pub fn peer_id(&self) -> &Id {
        &self.peer_id
    }

    /// Access initial exchange hash.
    pub fn session_id(&self) -> Option<&[u8]> {
        self.stream.as_ref().and_then(Stream::session_id)
    }

    /// Access the algorithms negociated by the last key-exchange.
    pub fn negotiated(&self) -> Option<&Negotiated> {
        self.last.as_ref().map(|last| &last.negotiated)
    }

    /// Access the exchange hash of the last key-exchange.
    pub fn exchange_hash(&self) -> Option<&[u8]> {
        self.last.as_ref().map(|last| last.exchange_hash.as_slice())
    }

    /// Initiate a key-exchange with the peer.
    pub async fn rekey(&mut self) -> Result<()> {
        self.kex(None).await
    }

    async fn kex(&mut self, peerkexinit: Option<Vec<u8>>) -> Result<()> {
        let Some(ref mut stream) = self.stream else {
            return Err(Error::Disconnected);
        };

        match self.config.kex(stream, peerkexinit, &self.peer_id).await {
            Ok(completed) => {
                self.last = Some(completed);

                Ok(())
            }
            Err(err) => {
                tracing::error!("Key-exchange failed, tearing down the session: {err}");

                if let Some(mut stream) = self.stream.take() {
                    let reason = match err.kind() {
                        ErrorKind::Validation => Some(DisconnectReason::HostKeyNotVerifiable),
                        ErrorKind::Negotiation | ErrorKind::Protocol => {
                            Some(DisconnectReason::KeyExchangeFailed)
                        }
                        ErrorKind::Timeout | ErrorKind::Transport => None,
                    };

                    if let Some(reason) = reason {
                        stream
                            .send(&Disconnect {
                                reason: reason as u32,
                                description: "Key-exchange failed, aborting.".into(),
                                language: Default::default(),
                            })
                            .await
                            .ok();
                    }
                }

                Err(err)
            }
        }
    }

    /// Receive a _payload_ from the connected peer,
    /// running the key-exchanges as needed.
    ///
    /// # Cancel safety
    /// This method is **not cancel-safe**, if used within a [`futures::select`] call,
    /// some data may be partially received.
    pub async fn recv(&mut self) -> Result<Vec<u8>> {
        loop {
            let Some(ref mut stream) = self.stream else {
                break Err(Error::Disconnected);
            };

            if stream.is_rekeyable() {
                self.kex(None).await?;

                continue;
            }

            match stream.recv().await {
                Ok(payload) if payload.first() == Some(&message::KEXINIT) => {
                    self.kex(Some(payload)).await?;
                }
                Ok(payload) => break Ok(payload),
                Err(Error::Disconnected) => {
                    drop(self.stream.take());

                    break Err(Error::Disconnected);
                }
                Err(err) => break Err(err),
            }
        }
    }

    /// Send a _payload_ to the connected peer,
    /// running the key-exchange first if needed.
    pub async fn send(&mut self, payload: &[u8]) -> Result<()> {
        if self.stream.as_ref().is_some_and(Stream::is_rekeyable) {
            self.kex(None).await?;
        }

        let Some(ref mut stream) = self.stream else {
            return Err(Error::Disconnected);
        };

        stream.send_payload(payload).await
    }

    /// Send a _disconnect message_ to the peer and shutdown the session.
    pub async fn disconnect(
        &mut self,
        reason: DisconnectReason,
        description: impl Into<String>,
    ) -> Result<()> {
        let Some(mut stream) = self.stream.take() else {
            return Err(Error::Disconnected);
        };

        stream
            .send(&Disconnect {
                reason: reason as u32,
                description: description.into(),
                language: Default::default(),
            })
            .await
    }
}
