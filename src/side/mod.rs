//! Session's [`Side`]s, either [`Client`] or [`Server`].

use futures::Future;
use futures_time::{future::FutureExt, time::Duration};

use crate::{
    kex::{Completed, Round, Step},
    stream::{Pipe, Stream},
    wire::message::{self, KexInit, Message, NewKeys},
    Error, Id, Result,
};

pub mod client;
use client::Client;

pub mod server;
use server::Server;

mod private {
    pub trait Sealed {}

    impl Sealed for super::Client {}
    impl Sealed for super::Server {}
}

/// A side of the SSH protocol, either [`Client`] or [`Server`].
pub trait Side: private::Sealed {
    /// Get the [`Id`] for this session.
    fn id(&self) -> &Id;

    /// Get the _timeout_ for this session.
    fn timeout(&self) -> Duration;

    /// Generate a [`KexInit`] message from the config.
    fn kexinit(&self) -> KexInit;

    /// Open a key-exchange [`Round`] from our `kexinit` and the `peerkexinit` payloads.
    fn round(&self, kexinit: Vec<u8>, peerkexinit: Vec<u8>, peer_id: &Id)
        -> Result<(Round, Step)>;

    /// Run the key-exchange method of the `round` up to its authentication.
    fn exchange(
        &self,
        stream: &mut Stream<impl Pipe>,
        round: &mut Round,
        step: Step,
    ) -> impl Future<Output = Result<()>>;

    /// Perform the key-exchange from this side, the peer's `SSH_MSG_KEXINIT`
    /// being provided if it has already been received.
    ///
    /// The whole round, up to the peer's `SSH_MSG_NEWKEYS`, is bounded by the _timeout_.
    fn kex(
        &self,
        stream: &mut Stream<impl Pipe>,
        peerkexinit: Option<Vec<u8>>,
        peer_id: &Id,
    ) -> impl Future<Output = Result<Completed>> {
        async move {
            run(self, stream, peerkexinit, peer_id)
                .timeout(self.timeout())
                .await
                .map_err(|_| Error::Timeout)?
        }
    }
}

async fn run<S: Side + ?Sized>(
    side: &S,
    stream: &mut Stream<impl Pipe>,
    peerkexinit: Option<Vec<u8>>,
    peer_id: &Id,
) -> Result<Completed> {
    tracing::debug!("Starting key-exchange procedure");

    let kexinit = side.kexinit().to_payload()?;

    let peerkexinit = match peerkexinit {
        Some(peerkexinit) => {
            stream.send_payload(&kexinit).await?;

            peerkexinit
        }
        None => {
            let interest = stream.register(message::KEXINIT)?;
            stream.send_payload(&kexinit).await?;

            stream.expect(interest).await?
        }
    };

    let (mut round, step) = side.round(kexinit, peerkexinit, peer_id)?;
    side.exchange(stream, &mut round, step).await?;

    let exchange_hash = round.calculate_hash()?.to_vec();
    let session_id = stream.with_session(&exchange_hash).to_vec();

    let outcome = round.finish(&session_id)?;
    let completed = Completed {
        negotiated: outcome.negotiated().clone(),
        exchange_hash,
    };
    let transport = outcome.into_transport()?;

    let interest = stream.register(message::NEWKEYS)?;

    stream.send(&NewKeys).await?;
    stream.install_tx(transport.tx);

    stream.expect(interest).await?;
    stream.install_rx(transport.rx);

    tracing::debug!(
        "Key exchange success, negociated algorithms:\ntx: {:?}\nrx: {:?}",
        completed.negotiated.client_to_server,
        completed.negotiated.server_to_client,
    );

    Ok(completed)
}

/// Drive the method messages of the `round`, from `step` until the shared secret is computed.
async fn converse(stream: &mut Stream<impl Pipe>, round: &mut Round, mut step: Step) -> Result<()> {
    loop {
        step = match step {
            Step::Send { payload, expect } => {
                let interest = stream.register(expect)?;

                stream.send_payload(&payload).await?;
                let reply = stream.expect(interest).await?;

                round.handle(&reply)?
            }
            Step::Await { expect } => {
                let interest = stream.register(expect)?;
                let message = stream.expect(interest).await?;

                round.handle(&message)?
            }
            Step::Done => break Ok(()),
        }
    }
}
