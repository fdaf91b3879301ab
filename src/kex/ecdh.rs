//! Elliptic-curve Diffie-Hellman (RFC 5656 §4), shared by the NIST curves and Curve25519.

use p256::elliptic_curve::sec1::ToEncodedPoint;

use super::{
    exchange::Value,
    method::{Agreed, Handled, KexMethod},
    Role, Step,
};
use crate::{
    wire::{
        message::{KexEcdhInit, KexEcdhReply, Message},
        Mpint,
    },
    Error, Result,
};

/// An ephemeral key agreement over a curve.
pub(crate) trait Agreement {
    /// Generate an ephemeral key-pair, returning the encoded public point.
    fn generate(&mut self) -> Vec<u8>;

    /// Consume the ephemeral secret to compute the shared secret with the `peer` point.
    fn agree(&mut self, peer: &[u8]) -> Result<Mpint>;
}

/// The `SSH_MSG_KEX_ECDH_*` message flow over an [`Agreement`].
pub(crate) struct Ecdh<A> {
    agreement: A,
    own: Option<Vec<u8>>,
}

impl<A: Agreement> Ecdh<A> {
    pub fn new(agreement: A) -> Self {
        Self {
            agreement,
            own: None,
        }
    }
}

impl<A: Agreement> KexMethod for Ecdh<A> {
    fn start(&mut self, role: Role) -> Result<Step> {
        match role {
            Role::Client => {
                let q_c = self.agreement.generate();
                let payload = KexEcdhInit { q_c: q_c.clone() }.to_payload()?;

                self.own = Some(q_c);

                Ok(Step::Send {
                    payload,
                    expect: KexEcdhReply::MAGIC,
                })
            }
            Role::Server => Ok(Step::Await {
                expect: KexEcdhInit::MAGIC,
            }),
        }
    }

    fn handle(&mut self, role: Role, payload: &[u8]) -> Result<Handled> {
        match role {
            Role::Client => {
                let KexEcdhReply {
                    k_s,
                    q_s,
                    signature,
                } = KexEcdhReply::from_payload(payload)?;
                let q_c = self
                    .own
                    .take()
                    .ok_or(Error::KexError("reply received before our init"))?;

                let secret = self.agreement.agree(&q_s)?;

                Ok(Handled::Agreed(
                    Agreed::new(Value::String(q_c), Value::String(q_s), secret)
                        .signed(k_s, signature),
                ))
            }
            Role::Server => {
                let KexEcdhInit { q_c } = KexEcdhInit::from_payload(payload)?;

                let q_s = self.agreement.generate();
                let secret = self.agreement.agree(&q_c)?;

                self.own = Some(q_s.clone());

                Ok(Handled::Agreed(Agreed::new(
                    Value::String(q_c),
                    Value::String(q_s),
                    secret,
                )))
            }
        }
    }

    fn reply(&self, k_s: &[u8], signature: &[u8]) -> Result<Vec<u8>> {
        let q_s = self
            .own
            .as_ref()
            .ok_or(Error::KexError("no ephemeral key to reply with"))?;

        KexEcdhReply {
            k_s: k_s.to_vec(),
            q_s: q_s.clone(),
            signature: signature.to_vec(),
        }
        .to_payload()
    }
}

/// The NIST curves usable for the key-exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Curve {
    /// NIST P-256, `ecdh-sha2-nistp256`.
    NistP256,

    /// NIST P-384, `ecdh-sha2-nistp384`.
    NistP384,

    /// NIST P-521, `ecdh-sha2-nistp521`.
    NistP521,
}

impl Curve {
    /// Size of a SEC1 uncompressed point, `0x04 || x || y`.
    pub fn point_size(&self) -> usize {
        match self {
            Self::NistP256 => 65,
            Self::NistP384 => 97,
            Self::NistP521 => 133,
        }
    }
}

enum Secret {
    P256(p256::ecdh::EphemeralSecret),
    P384(p384::ecdh::EphemeralSecret),
    P521(p521::ecdh::EphemeralSecret),
}

/// Key agreement over a NIST curve, points being SEC1-encoded uncompressed.
pub(crate) struct Nist {
    curve: Curve,
    secret: Option<Secret>,
}

impl Nist {
    pub fn new(curve: Curve) -> Self {
        Self {
            curve,
            secret: None,
        }
    }
}

fn invalid_point<E>(_: E) -> Error {
    Error::KexError("invalid peer point")
}

impl Agreement for Nist {
    fn generate(&mut self) -> Vec<u8> {
        let mut rng = rand::thread_rng();

        let (secret, public) = match self.curve {
            Curve::NistP256 => {
                let secret = p256::ecdh::EphemeralSecret::random(&mut rng);
                let public = secret.public_key().to_encoded_point(false);

                (Secret::P256(secret), public.as_bytes().to_vec())
            }
            Curve::NistP384 => {
                let secret = p384::ecdh::EphemeralSecret::random(&mut rng);
                let public = secret.public_key().to_encoded_point(false);

                (Secret::P384(secret), public.as_bytes().to_vec())
            }
            Curve::NistP521 => {
                let secret = p521::ecdh::EphemeralSecret::random(&mut rng);
                let public = secret.public_key().to_encoded_point(false);

                (Secret::P521(secret), public.as_bytes().to_vec())
            }
        };

        self.secret = Some(secret);

        public
    }

    fn agree(&mut self, peer: &[u8]) -> Result<Mpint> {
        let secret = self
            .secret
            .take()
            .ok_or(Error::KexError("no ephemeral secret generated"))?;

        // RFC 5656 §4 exchanges the points uncompressed only
        if peer.len() != self.curve.point_size() || peer.first() != Some(&0x04) {
            return Err(Error::KexError("peer point is not SEC1 uncompressed"));
        }

        let shared = match secret {
            Secret::P256(secret) => {
                let peer = p256::PublicKey::from_sec1_bytes(peer).map_err(invalid_point)?;

                Mpint::from_positive_bytes(secret.diffie_hellman(&peer).raw_secret_bytes())?
            }
            Secret::P384(secret) => {
                let peer = p384::PublicKey::from_sec1_bytes(peer).map_err(invalid_point)?;

                Mpint::from_positive_bytes(secret.diffie_hellman(&peer).raw_secret_bytes())?
            }
            Secret::P521(secret) => {
                let peer = p521::PublicKey::from_sec1_bytes(peer).map_err(invalid_point)?;

                Mpint::from_positive_bytes(secret.diffie_hellman(&peer).raw_secret_bytes())?
            }
        };

        Ok(shared)
    }
}
