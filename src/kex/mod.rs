//! The key-exchange round, driving a method from the exchanged `SSH_MSG_KEXINIT`
//! to the derived keys, independently of any transport.
//!
//! A [`Round`] is fed the payloads of both proposals, then the peer's messages,
//! and tells the caller what to send and what to wait for through [`Step`]s.

use secrecy::ExposeSecret;
use signature::{SignatureEncoding, Signer};
use ssh_key::{PrivateKey, Signature};

use crate::{
    algorithm::{key, Compress, Crypter, Integrity, Mode, Negotiated},
    side::client::HostKeyVerifier,
    stream::{Keys, Transport, TransportPair},
    wire::{
        message::{KexInit, Message},
        Mpint,
    },
    Error, Id, Result,
};

mod curve25519;
mod dh;
mod ecdh;
mod exchange;
mod group;
mod method;

pub use dh::GexParams;
pub use ecdh::Curve;
pub use exchange::{Exchange, GroupParams, Value};
pub use group::Group;

use method::{Agreed, Handled, KexMethod, Method};

/// The role of a side in the key-exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The side that initiated the connection.
    Client,

    /// The side holding the host keys.
    Server,
}

/// What the caller has to do next to progress the round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Send `payload` to the peer, then wait for a message numbered `expect`.
    Send {
        /// The message to send.
        payload: Vec<u8>,

        /// The message number of the expected answer.
        expect: u8,
    },

    /// Wait for a message numbered `expect`.
    Await {
        /// The message number of the expected message.
        expect: u8,
    },

    /// The shared secret is computed.
    Done,
}

/// The state of a [`Round`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Nothing happened yet.
    Idle,

    /// Algorithms are negociated, waiting for the peer to open the method.
    Started,

    /// Our method message went out, waiting for the peer's answer.
    AwaitingPeerReply,

    /// The shared secret is computed.
    Completed,

    /// The round failed and can't be resumed.
    Failed,
}

/// A single key-exchange, from the proposals to the derived keys.
pub struct Round {
    role: Role,
    state: State,

    v_c: Vec<u8>,
    v_s: Vec<u8>,
    i_c: Vec<u8>,
    i_s: Vec<u8>,

    gex: GexParams,
    negotiated: Option<Negotiated>,
    method: Option<Method>,
    discard_guess: bool,

    host_key: Option<Vec<u8>>,
    agreed: Option<Agreed>,
    validated: bool,

    /// The exchange hash, computed once.
    hash: Option<Vec<u8>>,
}

impl std::fmt::Debug for Round {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Round")
            .field("role", &self.role)
            .field("state", &self.state)
            .field("negotiated", &self.negotiated)
            .field("validated", &self.validated)
            .finish_non_exhaustive()
    }
}

impl Round {
    /// Create a round between the client identified by `v_c` and the server identified by `v_s`.
    pub fn new(role: Role, v_c: &Id, v_s: &Id) -> Self {
        Self {
            role,
            state: State::Idle,
            v_c: v_c.to_string().into_bytes(),
            v_s: v_s.to_string().into_bytes(),
            i_c: Vec::new(),
            i_s: Vec::new(),
            gex: GexParams::default(),
            negotiated: None,
            method: None,
            discard_guess: false,
            host_key: None,
            agreed: None,
            validated: false,
            hash: None,
        }
    }

    /// Set the group sizes requested if a group-exchange method gets negociated.
    pub fn with_group_exchange(mut self, params: GexParams) -> Self {
        self.gex = params;

        self
    }

    /// The role of this side.
    pub fn role(&self) -> Role {
        self.role
    }

    /// The current state of the round.
    pub fn state(&self) -> State {
        self.state
    }

    /// The algorithms negociated by [`Round::start`].
    pub fn negotiated(&self) -> Option<&Negotiated> {
        self.negotiated.as_ref()
    }

    /// Whether the server must discard the client's guessed packet,
    /// the guess being wrong.
    pub fn discards_guess(&self) -> bool {
        self.role == Role::Server && self.discard_guess
    }

    fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        if result.is_err() {
            self.state = State::Failed;
        }

        result
    }

    /// Negociate the algorithms from the client's `i_c` and server's `i_s` `SSH_MSG_KEXINIT` payloads,
    /// and open the key-exchange method.
    pub fn start(&mut self, i_c: Vec<u8>, i_s: Vec<u8>) -> Result<Step> {
        if self.state != State::Idle {
            return Err(Error::KexInProgress);
        }

        let result = self.open(i_c, i_s);
        self.track(result)
    }

    fn open(&mut self, i_c: Vec<u8>, i_s: Vec<u8>) -> Result<Step> {
        let clientkex = KexInit::from_payload(&i_c)?;
        let serverkex = KexInit::from_payload(&i_s)?;

        let negotiated = Negotiated::new(&clientkex, &serverkex)?;
        self.discard_guess =
            clientkex.first_kex_packet_follows && !negotiated.guessed(&clientkex);

        let mut method = Method::new(&negotiated.kex, self.gex);
        self.state = State::Started;

        let step = method.start(self.role)?;
        if let Step::Send { .. } = step {
            self.state = State::AwaitingPeerReply;
        }

        tracing::debug!(
            "Opened `{}` as {:?}",
            negotiated.kex.as_ref(),
            self.role
        );

        self.i_c = i_c;
        self.i_s = i_s;
        self.negotiated = Some(negotiated);
        self.method = Some(method);

        Ok(step)
    }

    /// Set the public host key blob the server signs the exchange with.
    pub fn set_host_key(&mut self, k_s: Vec<u8>) {
        self.host_key = Some(k_s);
    }

    /// The server's public host key blob, once known.
    pub fn host_key(&self) -> Option<&[u8]> {
        self.host_key.as_deref()
    }

    /// Handle the peer's method-specific message.
    pub fn handle(&mut self, payload: &[u8]) -> Result<Step> {
        let magic = payload.first().copied().unwrap_or_default();

        let result = match (self.state, &mut self.method) {
            (State::Started | State::AwaitingPeerReply, Some(method)) => {
                method.handle(self.role, payload)
            }
            _ => Err(Error::UnexpectedMessage(magic)),
        };

        match self.track(result)? {
            Handled::Next(step) => {
                self.state = State::AwaitingPeerReply;

                Ok(step)
            }
            Handled::Agreed(agreed) => {
                if let Some(k_s) = &agreed.k_s {
                    self.host_key = Some(k_s.clone());
                }

                self.agreed = Some(agreed);
                self.state = State::Completed;

                tracing::debug!("Shared secret computed as {:?}", self.role);

                Ok(Step::Done)
            }
        }
    }

    /// The shared secret `K`, once computed.
    pub fn shared_secret(&self) -> Option<&Mpint> {
        self.agreed
            .as_ref()
            .map(|agreed| agreed.secret.expose_secret())
    }

    /// The exchange hash `H`, once calculated.
    pub fn exchange_hash(&self) -> Option<&[u8]> {
        self.hash.as_deref()
    }

    /// Calculate the exchange hash `H` from the transcript, caching it.
    pub fn calculate_hash(&mut self) -> Result<&[u8]> {
        if self.hash.is_none() {
            let (Some(negotiated), Some(agreed)) = (&self.negotiated, &self.agreed) else {
                return Err(Error::KexError("key-exchange is not completed"));
            };
            let k_s = self
                .host_key
                .as_deref()
                .ok_or(Error::KexError("missing server host key"))?;

            let hash = Exchange {
                v_c: &self.v_c,
                v_s: &self.v_s,
                i_c: &self.i_c,
                i_s: &self.i_s,
                k_s,
                group: agreed.group.as_ref(),
                q_c: &agreed.q_c,
                q_s: &agreed.q_s,
                k: agreed.secret.expose_secret(),
            }
            .hash(negotiated.kex.hash())?;

            self.hash = Some(hash);
        }

        self.hash
            .as_deref()
            .ok_or(Error::KexError("exchange hash is unavailable"))
    }

    /// Authenticate the exchange with the server's host key and signature,
    /// consulting the `verifier` to trust the key.
    pub fn verify(&mut self, verifier: &HostKeyVerifier) -> Result<()> {
        if self.role != Role::Client {
            return Err(Error::KexError("only the client verifies the exchange"));
        }

        let result = self.authenticate(verifier);
        self.track(result)?;

        self.validated = true;
        tracing::debug!("Server host key and exchange signature verified");

        Ok(())
    }

    fn authenticate(&mut self, verifier: &HostKeyVerifier) -> Result<()> {
        let hash = self.calculate_hash()?.to_vec();

        let (Some(negotiated), Some(agreed)) = (&self.negotiated, &self.agreed) else {
            return Err(Error::KexError("key-exchange is not completed"));
        };
        let (Some(k_s), Some(signature)) = (&agreed.k_s, &agreed.signature) else {
            return Err(Error::KexError("missing server signature"));
        };

        key::validate(&negotiated.key, k_s, signature, &hash, verifier)
    }

    /// Sign the exchange hash with the host `key`, producing the server's final reply.
    pub fn sign(&mut self, key: &PrivateKey) -> Result<Vec<u8>> {
        if self.role != Role::Server {
            return Err(Error::KexError("only the server signs the exchange"));
        }

        let result = self.reply(key);
        let reply = self.track(result)?;

        self.validated = true;

        Ok(reply)
    }

    fn reply(&mut self, key: &PrivateKey) -> Result<Vec<u8>> {
        let hash = self.calculate_hash()?.to_vec();
        let signature: Signature = Signer::try_sign(key, &hash)?;

        let (Some(method), Some(k_s)) = (&self.method, &self.host_key) else {
            return Err(Error::KexError("key-exchange is not completed"));
        };

        method.reply(k_s, &signature.to_vec())
    }

    /// Derive the session keys, using `session_id` as the session identifier,
    /// which is this round's exchange hash for the first round of a session.
    ///
    /// The round must have been authenticated, either by [`Round::verify`] or [`Round::sign`].
    pub fn finish(mut self, session_id: &[u8]) -> Result<Outcome> {
        if self.state != State::Completed || !self.validated {
            return Err(Error::KexError("key-exchange was not authenticated"));
        }

        let exchange_hash = self.calculate_hash()?.to_vec();
        let (Some(negotiated), Some(agreed)) = (self.negotiated.take(), self.agreed.take()) else {
            return Err(Error::KexError("key-exchange is not completed"));
        };

        let alg = negotiated.kex.hash();
        let secret = agreed.secret.expose_secret();

        Ok(Outcome {
            role: self.role,
            client: Keys::as_client(
                alg,
                secret,
                &exchange_hash,
                session_id,
                &negotiated.client_to_server,
            )?,
            server: Keys::as_server(
                alg,
                secret,
                &exchange_hash,
                session_id,
                &negotiated.server_to_client,
            )?,
            negotiated,
            exchange_hash,
        })
    }
}

/// The result of a completed key-exchange, holding the derived keys
/// and building the live algorithms out of them.
#[derive(Debug)]
pub struct Outcome {
    role: Role,
    negotiated: Negotiated,
    exchange_hash: Vec<u8>,

    /// Keys for the client-to-server direction.
    client: Keys,

    /// Keys for the server-to-client direction.
    server: Keys,
}

impl Outcome {
    /// The algorithms negociated for this round.
    pub fn negotiated(&self) -> &Negotiated {
        &self.negotiated
    }

    /// The exchange hash of this round.
    pub fn exchange_hash(&self) -> &[u8] {
        &self.exchange_hash
    }

    fn mode(&self, outgoing: bool) -> Mode {
        if outgoing {
            Mode::Encrypt
        } else {
            Mode::Decrypt
        }
    }

    /// The client-to-server cipher, encrypting for the client and decrypting for the server.
    pub fn create_client_cipher(&self) -> Result<Crypter> {
        self.negotiated.client_to_server.cipher.crypter(
            self.mode(self.role == Role::Client),
            self.client.key.expose_secret(),
            self.client.iv.expose_secret(),
        )
    }

    /// The server-to-client cipher, encrypting for the server and decrypting for the client.
    pub fn create_server_cipher(&self) -> Result<Crypter> {
        self.negotiated.server_to_client.cipher.crypter(
            self.mode(self.role == Role::Server),
            self.server.key.expose_secret(),
            self.server.iv.expose_secret(),
        )
    }

    /// The client-to-server MAC, if any.
    pub fn create_client_hash(&self) -> Result<Option<Integrity>> {
        self.negotiated
            .client_to_server
            .hmac
            .integrity(self.client.hmac.expose_secret())
    }

    /// The server-to-client MAC, if any.
    pub fn create_server_hash(&self) -> Result<Option<Integrity>> {
        self.negotiated
            .server_to_client
            .hmac
            .integrity(self.server.hmac.expose_secret())
    }

    /// The compression of our outgoing direction.
    pub fn create_compressor(&self) -> Compress {
        match self.role {
            Role::Client => self.negotiated.client_to_server.compress.clone(),
            Role::Server => self.negotiated.server_to_client.compress.clone(),
        }
    }

    /// The decompression of our incoming direction.
    pub fn create_decompressor(&self) -> Compress {
        match self.role {
            Role::Client => self.negotiated.server_to_client.compress.clone(),
            Role::Server => self.negotiated.client_to_server.compress.clone(),
        }
    }

    /// Build both directions of the transport, consuming the key material.
    pub fn into_transport(self) -> Result<TransportPair> {
        let client = Transport {
            cipher: self.create_client_cipher()?,
            mac: self.create_client_hash()?,
            compress: self.negotiated.client_to_server.compress.clone(),
        };
        let server = Transport {
            cipher: self.create_server_cipher()?,
            mac: self.create_server_hash()?,
            compress: self.negotiated.server_to_client.compress.clone(),
        };

        Ok(match self.role {
            Role::Client => TransportPair {
                tx: client,
                rx: server,
            },
            Role::Server => TransportPair {
                tx: server,
                rx: client,
            },
        })
    }
}

/// A summary of the last completed key-exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct Completed {
    /// The algorithms negociated in the exchange.
    pub negotiated: Negotiated,

    /// The exchange hash `H`.
    pub exchange_hash: Vec<u8>,
}
