//! Server-[`Side`] implementation of the _session_.

use std::time::Duration;

use futures_time::time::Duration as Timeout;
use rand::RngCore;

use super::{converse, Side};
use crate::{
    algorithm::{key, Cipher, Compress, Hmac, Kex, Key},
    kex::{Role, Round, Step},
    stream::{Pipe, Stream},
    wire::{message::KexInit, NameList},
    Error, Id, Result,
};

#[doc(no_inline)]
pub use ssh_key::PrivateKey;

/// A _server_-side session configuration.
#[derive(Debug, Clone)]
pub struct Server {
    /// [`Id`] for this _server_ session.
    pub id: Id,

    /// Timeout for sending and receiving packets.
    pub timeout: Duration,

    /// Server keys for key-exchange signature.
    pub keys: Vec<PrivateKey>,

    /// The algorithms enabled for this _server_ session.
    pub algorithms: Algorithms,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            id: Id::v2(
                concat!(
                    env!("CARGO_PKG_NAME"),
                    "@server:",
                    env!("CARGO_PKG_VERSION")
                ),
                None::<&str>,
            ),
            timeout: Duration::from_secs(120),
            keys: Default::default(),
            algorithms: Default::default(),
        }
    }
}

/// Algorithms for a _server_-side session.
#[derive(Debug, Clone)]
pub struct Algorithms {
    /// Enabled algorithms for _key-exchange_.
    pub kexs: Vec<Kex>,

    /// Enabled algorithms for _encryption & decryption_.
    pub ciphers: Vec<Cipher>,

    /// Enabled algorithms for _hmac_.
    pub macs: Vec<Hmac>,

    /// Enabled algorithms for _compression_.
    pub compressions: Vec<Compress>,
}

impl Default for Algorithms {
    fn default() -> Self {
        Self {
            kexs: vec![
                Kex::Curve25519Sha256,
                Kex::Curve25519Sha256Libssh,
                Kex::EcdhSha2Nistp256,
                Kex::EcdhSha2Nistp384,
                Kex::EcdhSha2Nistp521,
                Kex::DiffieHellmanGroupExchangeSha256,
                Kex::DiffieHellmanGroup16Sha512,
                Kex::DiffieHellmanGroup18Sha512,
                Kex::DiffieHellmanGroup14Sha256,
                Kex::DiffieHellmanGroup14Sha1,
            ],
            ciphers: vec![
                Cipher::Aes256Gcm,
                Cipher::Aes128Gcm,
                Cipher::Aes256Ctr,
                Cipher::Aes192Ctr,
                Cipher::Aes128Ctr,
                Cipher::Aes256Cbc,
                Cipher::Aes192Cbc,
                Cipher::Aes128Cbc,
                Cipher::TDesCbc,
            ],
            macs: vec![
                Hmac::HmacSha512ETM,
                Hmac::HmacSha256ETM,
                Hmac::HmacSha512,
                Hmac::HmacSha256,
                Hmac::HmacSha1ETM,
                Hmac::HmacSha1,
                Hmac::HmacMd5ETM,
                Hmac::HmacMd5,
            ],
            compressions: vec![Compress::ZlibOpenssh, Compress::Zlib, Compress::None],
        }
    }
}

impl Server {
    /// The host key signing with the negociated `algorithm`.
    fn key(&self, algorithm: &Key) -> Result<&PrivateKey> {
        self.keys
            .iter()
            .find(|candidate| key::algorithm_of(candidate) == *algorithm)
            .ok_or(Error::UnsupportedAlgorithm)
    }
}

impl Side for Server {
    fn id(&self) -> &Id {
        &self.id
    }

    fn timeout(&self) -> Timeout {
        self.timeout.into()
    }

    fn kexinit(&self) -> KexInit {
        let mut cookie = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut cookie);

        let keys = self.keys.iter().map(key::algorithm_of).collect::<Vec<_>>();

        KexInit {
            cookie,
            kex_algorithms: NameList::new(&self.algorithms.kexs),
            server_host_key_algorithms: NameList::new(keys.iter().map(Key::as_str)),
            encryption_algorithms_client_to_server: NameList::new(&self.algorithms.ciphers),
            encryption_algorithms_server_to_client: NameList::new(&self.algorithms.ciphers),
            mac_algorithms_client_to_server: NameList::new(&self.algorithms.macs),
            mac_algorithms_server_to_client: NameList::new(&self.algorithms.macs),
            compression_algorithms_client_to_server: NameList::new(&self.algorithms.compressions),
            compression_algorithms_server_to_client: NameList::new(&self.algorithms.compressions),
            languages_client_to_server: NameList::default(),
            languages_server_to_client: NameList::default(),
            first_kex_packet_follows: false,
            reserved: 0,
        }
    }

    fn round(&self, kexinit: Vec<u8>, peerkexinit: Vec<u8>, peer_id: &Id) -> Result<(Round, Step)> {
        let mut round = Round::new(Role::Server, peer_id, self.id());
        let step = round.start(peerkexinit, kexinit)?;

        let negotiated = round
            .negotiated()
            .ok_or(Error::KexError("algorithms were not negociated"))?;
        let k_s = self.key(&negotiated.key)?.public_key().to_bytes()?;
        round.set_host_key(k_s);

        Ok((round, step))
    }

    async fn exchange(
        &self,
        stream: &mut Stream<impl Pipe>,
        round: &mut Round,
        step: Step,
    ) -> Result<()> {
        if round.discards_guess() {
            stream.next().await?;

            tracing::debug!("Discarded the client's wrongly guessed key-exchange packet");
        }

        converse(stream, round, step).await?;

        let negotiated = round
            .negotiated()
            .ok_or(Error::KexError("algorithms were not negociated"))?;
        let key = self.key(&negotiated.key)?;

        let reply = round.sign(key)?;
        stream.send_payload(&reply).await
    }
}
