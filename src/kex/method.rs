use secrecy::SecretBox;

use super::{
    curve25519::X25519,
    dh::{Dh, GexParams, GroupExchange},
    ecdh::{Curve, Ecdh, Nist},
    exchange::{GroupParams, Value},
    group::Group,
    Role, Step,
};
use crate::{algorithm::Kex, wire::Mpint, Result};

/// The values both sides agreed upon once the method completed.
pub(crate) struct Agreed {
    /// The server's host key blob, as received by the client.
    pub k_s: Option<Vec<u8>>,

    /// The signature of the exchange hash, as received by the client.
    pub signature: Option<Vec<u8>>,

    pub q_c: Value,
    pub q_s: Value,
    pub group: Option<GroupParams>,

    pub secret: SecretBox<Mpint>,
}

impl Agreed {
    pub fn new(q_c: Value, q_s: Value, secret: Mpint) -> Self {
        Self {
            k_s: None,
            signature: None,
            q_c,
            q_s,
            group: None,
            secret: SecretBox::new(Box::new(secret)),
        }
    }

    pub fn signed(mut self, k_s: Vec<u8>, signature: Vec<u8>) -> Self {
        self.k_s = Some(k_s);
        self.signature = Some(signature);

        self
    }

    pub fn with_group(mut self, group: GroupParams) -> Self {
        self.group = Some(group);

        self
    }
}

/// Outcome of handling a peer message.
pub(crate) enum Handled {
    /// The exchange goes on.
    Next(Step),

    /// The shared secret is known.
    Agreed(Agreed),
}

/// The message flow of a key-exchange method, for both roles.
pub(crate) trait KexMethod {
    /// Produce the first step of the method.
    fn start(&mut self, role: Role) -> Result<Step>;

    /// Handle the peer's `payload`, expected as announced by the previous step.
    fn handle(&mut self, role: Role, payload: &[u8]) -> Result<Handled>;

    /// Build the server's final reply, carrying its host key and signature.
    fn reply(&self, k_s: &[u8], signature: &[u8]) -> Result<Vec<u8>>;
}

/// The closed set of key-exchange methods.
pub(crate) enum Method {
    Dh(Dh),
    GroupExchange(GroupExchange),
    Ecdh(Ecdh<Nist>),
    Curve25519(Ecdh<X25519>),
}

impl Method {
    pub fn new(kex: &Kex, gex: GexParams) -> Self {
        let hash = kex.hash();

        match kex {
            Kex::DiffieHellmanGroup1Sha1 => Self::Dh(Dh::new(Group::group1(), hash)),
            Kex::DiffieHellmanGroup14Sha1 | Kex::DiffieHellmanGroup14Sha256 => {
                Self::Dh(Dh::new(Group::group14(), hash))
            }
            Kex::DiffieHellmanGroup16Sha512 => Self::Dh(Dh::new(Group::group16(), hash)),
            Kex::DiffieHellmanGroup18Sha512 => Self::Dh(Dh::new(Group::group18(), hash)),
            Kex::DiffieHellmanGroupExchangeSha1 | Kex::DiffieHellmanGroupExchangeSha256 => {
                Self::GroupExchange(GroupExchange::new(gex, hash))
            }
            Kex::EcdhSha2Nistp256 => Self::Ecdh(Ecdh::new(Nist::new(Curve::NistP256))),
            Kex::EcdhSha2Nistp384 => Self::Ecdh(Ecdh::new(Nist::new(Curve::NistP384))),
            Kex::EcdhSha2Nistp521 => Self::Ecdh(Ecdh::new(Nist::new(Curve::NistP521))),
            Kex::Curve25519Sha256 | Kex::Curve25519Sha256Libssh => {
                Self::Curve25519(Ecdh::new(X25519::default()))
            }
        }
    }

    fn inner(&mut self) -> &mut dyn KexMethod {
        match self {
            Self::Dh(method) => method,
            Self::GroupExchange(method) => method,
            Self::Ecdh(method) => method,
            Self::Curve25519(method) => method,
        }
    }
}

impl KexMethod for Method {
    fn start(&mut self, role: Role) -> Result<Step> {
        self.inner().start(role)
    }

    fn handle(&mut self, role: Role, payload: &[u8]) -> Result<Handled> {
        self.inner().handle(role, payload)
    }

    fn reply(&self, k_s: &[u8], signature: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Dh(method) => method.reply(k_s, signature),
            Self::GroupExchange(method) => method.reply(k_s, signature),
            Self::Ecdh(method) => method.reply(k_s, signature),
            Self::Curve25519(method) => method.reply(k_s, signature),
        }
    }
}
