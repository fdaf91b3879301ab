//! Client-[`Side`] implementation of the _session_.

use std::{sync::Arc, time::Duration};

use futures_time::time::Duration as Timeout;
use rand::RngCore;

use super::{converse, Side};
use crate::{
    algorithm::{Cipher, Compress, Hmac, Kex, Key},
    kex::{GexParams, Role, Round, Step},
    stream::{Pipe, Stream},
    wire::{message::KexInit, NameList},
    Id, Result,
};

#[doc(no_inline)]
pub use ssh_key::PublicKey;

/// A _client_-side session configuration.
#[derive(Debug, Clone)]
pub struct Client {
    /// [`Id`] for this _client_ session.
    pub id: Id,

    /// Timeout for sending and receiving packets.
    pub timeout: Duration,

    /// The algorithms enabled for this _client_ session.
    pub algorithms: Algorithms,

    /// Group sizes requested for the group-exchange methods.
    pub group_exchange: GexParams,

    /// The trust policy for the server's host key.
    pub verifier: HostKeyVerifier,
}

impl Default for Client {
    fn default() -> Self {
        Self {
            id: Id::v2(
                concat!(
                    env!("CARGO_PKG_NAME"),
                    "@client:",
                    env!("CARGO_PKG_VERSION")
                ),
                None::<&str>,
            ),
            timeout: Duration::from_secs(120),
            algorithms: Default::default(),
            group_exchange: Default::default(),
            verifier: Default::default(),
        }
    }
}

/// Algorithms for a _client_-side session.
#[derive(Debug, Clone)]
pub struct Algorithms {
    /// Enabled algorithms for _key-exchange_.
    pub kexs: Vec<Kex>,

    /// Enabled algorithms for _server key signature_.
    pub keys: Vec<Key>,

    /// Enabled algorithms for _encryption & decryption_.
    pub ciphers: Vec<Cipher>,

    /// Enabled algorithms for _hmac_.
    pub macs: Vec<Hmac>,

    /// Enabled algorithms for _compression_.
    pub compressions: Vec<Compress>,
}

impl Default for Algorithms {
    fn default() -> Self {
        let super::server::Algorithms {
            kexs,
            ciphers,
            macs,
            compressions,
        } = Default::default();

        Self {
            kexs,
            keys: vec![
                Key::Ed25519,
                Key::Ecdsa {
                    curve: ssh_key::EcdsaCurve::NistP384,
                },
                Key::Ecdsa {
                    curve: ssh_key::EcdsaCurve::NistP256,
                },
                Key::Rsa {
                    hash: Some(ssh_key::HashAlg::Sha512),
                },
                Key::Rsa {
                    hash: Some(ssh_key::HashAlg::Sha256),
                },
                Key::Dsa,
            ],
            ciphers,
            macs,
            compressions,
        }
    }
}

/// The trust policy consulted with the server's host key during the key-exchange.
#[derive(Clone)]
pub struct HostKeyVerifier(Arc<dyn Fn(&PublicKey) -> bool + Send + Sync>);

impl HostKeyVerifier {
    /// Trust the keys for which `verifier` returns `true`.
    pub fn new(verifier: impl Fn(&PublicKey) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(verifier))
    }

    /// Trust any key, leaving the connection open to impersonation.
    pub fn accept_any() -> Self {
        Self::new(|key| {
            tracing::warn!(
                "Accepting server host key `{}` without verification",
                key.fingerprint(Default::default())
            );

            true
        })
    }

    /// Only trust the provided `key`.
    pub fn pinned(key: PublicKey) -> Self {
        Self::new(move |candidate| candidate.key_data() == key.key_data())
    }

    /// Whether the `key` is trusted.
    pub fn check(&self, key: &PublicKey) -> bool {
        (self.0)(key)
    }
}

impl Default for HostKeyVerifier {
    fn default() -> Self {
        Self::accept_any()
    }
}

impl std::fmt::Debug for HostKeyVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("HostKeyVerifier(..)")
    }
}

impl Side for Client {
    fn id(&self) -> &Id {
        &self.id
    }

    fn timeout(&self) -> Timeout {
        self.timeout.into()
    }

    fn kexinit(&self) -> KexInit {
        let mut cookie = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut cookie);

        KexInit {
            cookie,
            kex_algorithms: NameList::new(&self.algorithms.kexs),
            server_host_key_algorithms: NameList::new(
                self.algorithms.keys.iter().map(Key::as_str),
            ),
            encryption_algorithms_client_to_server: NameList::new(&self.algorithms.ciphers),
            encryption_algorithms_server_to_client: NameList::new(&self.algorithms.ciphers),
            mac_algorithms_client_to_server: NameList::new(&self.algorithms.macs),
            mac_algorithms_server_to_client: NameList::new(&self.algorithms.macs),
            compression_algorithms_client_to_server: NameList::new(&self.algorithms.compressions),
            compression_algorithms_server_to_client: NameList::new(&self.algorithms.compressions),
            languages_client_to_server: Default::default(),
            languages_server_to_client: Default::default(),
            first_kex_packet_follows: false,
            reserved: 0,
        }
    }

    fn round(&self, kexinit: Vec<u8>, peerkexinit: Vec<u8>, peer_id: &Id) -> Result<(Round, Step)> {
        let mut round =
            Round::new(Role::Client, self.id(), peer_id).with_group_exchange(self.group_exchange);
        let step = round.start(kexinit, peerkexinit)?;

        Ok((round, step))
    }

    async fn exchange(
        &self,
        stream: &mut Stream<impl Pipe>,
        round: &mut Round,
        step: Step,
    ) -> Result<()> {
        converse(stream, round, step).await?;

        round.verify(&self.verifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha1_rsa_signatures_are_not_offered() {
        let keys = Algorithms::default().keys;

        assert!(!keys.contains(&Key::Rsa { hash: None }));
        assert!(keys.contains(&Key::Rsa {
            hash: Some(ssh_key::HashAlg::Sha512)
        }));
    }
}
