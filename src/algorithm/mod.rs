//! Supported algorithms for **compression**, **encryption**, **integrity** and **key-exchange**,
//! and their negociation between both sides.

use std::str::FromStr;

use strum::Display;

use crate::{
    wire::{message::KexInit, NameList},
    Error, Result,
};

mod cipher;
pub use cipher::{Cipher, Crypter, Mode};

mod compress;
pub use compress::Compress;

mod hmac;
pub use hmac::{Hmac, Integrity};

mod kex;
pub use kex::{HashAlg, Kex};

pub(crate) mod key;
pub use key::Key;

/// The categories of algorithms negociated in a [`KexInit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Category {
    /// Key-exchange methods.
    #[strum(serialize = "key-exchange")]
    Kex,

    /// Server host key algorithms.
    #[strum(serialize = "host key")]
    HostKey,

    /// Ciphers from the client to the server.
    #[strum(serialize = "client-to-server cipher")]
    CipherClientToServer,

    /// Ciphers from the server to the client.
    #[strum(serialize = "server-to-client cipher")]
    CipherServerToClient,

    /// MACs from the client to the server.
    #[strum(serialize = "client-to-server MAC")]
    MacClientToServer,

    /// MACs from the server to the client.
    #[strum(serialize = "server-to-client MAC")]
    MacServerToClient,

    /// Compressions from the client to the server.
    #[strum(serialize = "client-to-server compression")]
    CompressClientToServer,

    /// Compressions from the server to the client.
    #[strum(serialize = "server-to-client compression")]
    CompressServerToClient,
}

impl Category {
    fn field(self, kexinit: &KexInit) -> &NameList {
        match self {
            Self::Kex => &kexinit.kex_algorithms,
            Self::HostKey => &kexinit.server_host_key_algorithms,
            Self::CipherClientToServer => &kexinit.encryption_algorithms_client_to_server,
            Self::CipherServerToClient => &kexinit.encryption_algorithms_server_to_client,
            Self::MacClientToServer => &kexinit.mac_algorithms_client_to_server,
            Self::MacServerToClient => &kexinit.mac_algorithms_server_to_client,
            Self::CompressClientToServer => &kexinit.compression_algorithms_client_to_server,
            Self::CompressServerToClient => &kexinit.compression_algorithms_server_to_client,
        }
    }
}

/// Pick the client's most preferred algorithm of `category` that the server supports.
pub(crate) fn negociate<T: FromStr>(
    category: Category,
    clientkex: &KexInit,
    serverkex: &KexInit,
) -> Result<T> {
    let (client, server) = (category.field(clientkex), category.field(serverkex));

    client
        .preferred_in(server)
        .ok_or_else(|| Error::NoCommonAlgorithm {
            category,
            client: client.clone(),
            server: server.clone(),
        })?
        .parse()
        .map_err(|_| Error::UnsupportedAlgorithm)
}

/// The algorithms used in one direction of the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Directional {
    /// The cipher.
    pub cipher: Cipher,

    /// The MAC, [`Hmac::None`] when the cipher authenticates by itself.
    pub hmac: Hmac,

    /// The compression.
    pub compress: Compress,
}

impl Directional {
    fn negociate(
        [cipher, hmac, compress]: [Category; 3],
        clientkex: &KexInit,
        serverkex: &KexInit,
    ) -> Result<Self> {
        let cipher: Cipher = negociate(cipher, clientkex, serverkex)?;

        let hmac = if cipher.is_aead() {
            Hmac::None
        } else {
            negociate(hmac, clientkex, serverkex)?
        };

        let compress = match negociate::<Compress>(compress, clientkex, serverkex) {
            Err(Error::NoCommonAlgorithm { .. }) => Compress::None,
            other => other?,
        };

        Ok(Self {
            cipher,
            hmac,
            compress,
        })
    }
}

/// The outcome of the algorithm negociation for a key-exchange round.
#[derive(Debug, Clone, PartialEq)]
pub struct Negotiated {
    /// The key-exchange method.
    pub kex: Kex,

    /// The server host key algorithm.
    pub key: Key,

    /// Algorithms from the client to the server.
    pub client_to_server: Directional,

    /// Algorithms from the server to the client.
    pub server_to_client: Directional,
}

impl Negotiated {
    /// Negociate every category from both sides' [`KexInit`], the client's preference winning.
    pub fn new(clientkex: &KexInit, serverkex: &KexInit) -> Result<Self> {
        let negotiated = Self {
            kex: negociate(Category::Kex, clientkex, serverkex)?,
            key: negociate(Category::HostKey, clientkex, serverkex)?,
            client_to_server: Directional::negociate(
                [
                    Category::CipherClientToServer,
                    Category::MacClientToServer,
                    Category::CompressClientToServer,
                ],
                clientkex,
                serverkex,
            )?,
            server_to_client: Directional::negociate(
                [
                    Category::CipherServerToClient,
                    Category::MacServerToClient,
                    Category::CompressServerToClient,
                ],
                clientkex,
                serverkex,
            )?,
        };

        tracing::debug!(
            "Negociated `{}` with `{}` host key, tx: {:?}, rx: {:?}",
            negotiated.kex.as_ref(),
            negotiated.key.as_str(),
            negotiated.client_to_server,
            negotiated.server_to_client,
        );

        Ok(negotiated)
    }

    /// Whether the client's guessed key-exchange packet, if any, was right.
    pub(crate) fn guessed(&self, clientkex: &KexInit) -> bool {
        clientkex.kex_algorithms.first() == Some(self.kex.as_ref())
            && clientkex.server_host_key_algorithms.first() == Some(self.key.as_str())
    }
}
