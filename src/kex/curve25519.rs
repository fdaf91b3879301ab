use x25519_dalek::{PublicKey, StaticSecret};

use super::ecdh::Agreement;
use crate::{wire::Mpint, Error, Result};

/// Key agreement over Curve25519 (RFC 8731).
#[derive(Default)]
pub(crate) struct X25519 {
    secret: Option<StaticSecret>,
}

impl Agreement for X25519 {
    fn generate(&mut self) -> Vec<u8> {
        let secret = self
            .secret
            .insert(StaticSecret::random_from_rng(rand::thread_rng()));

        PublicKey::from(&*secret).as_bytes().to_vec()
    }

    fn agree(&mut self, peer: &[u8]) -> Result<Mpint> {
        let secret = self
            .secret
            .take()
            .ok_or(Error::KexError("no ephemeral secret generated"))?;

        let peer: [u8; 32] = peer
            .try_into()
            .map_err(|_| Error::KexError("invalid peer point length"))?;

        let shared = secret.diffie_hellman(&PublicKey::from(peer));
        if !shared.was_contributory() {
            return Err(Error::KexError("peer point of low order"));
        }

        Ok(Mpint::from_positive_bytes(shared.as_bytes())?)
    }
}
