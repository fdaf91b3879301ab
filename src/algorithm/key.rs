use signature::Verifier;
use ssh_key::{PrivateKey, PublicKey, Signature};

use crate::{side::client::HostKeyVerifier, wire::Decode, Error, Result};

pub use ssh_key::Algorithm as Key;

/// The host key algorithm a private key signs with, RSA keys signing with sha-2-512.
pub(crate) fn algorithm_of(key: &PrivateKey) -> Key {
    match key.algorithm() {
        Key::Rsa { .. } => Key::Rsa {
            hash: Some(ssh_key::HashAlg::Sha512),
        },
        algorithm => algorithm,
    }
}

/// Whether a host key of `algorithm` can be used for the `negotiated` signature algorithm.
fn compatible(negotiated: &Key, algorithm: &Key) -> bool {
    match (negotiated, algorithm) {
        (Key::Rsa { .. }, Key::Rsa { .. }) => true,
        (negotiated, algorithm) => negotiated == algorithm,
    }
}

/// Authenticate the exchange `hash` with the server host key blob `k_s`
/// and its `signature`, consulting the `verifier` for trust.
///
/// Every failure is reported as [`Error::Rejected`],
/// the precise reason only being logged.
pub(crate) fn validate(
    negotiated: &Key,
    k_s: &[u8],
    signature: &[u8],
    hash: &[u8],
    verifier: &HostKeyVerifier,
) -> Result<()> {
    let name = String::decode(&mut &k_s[..]).map_err(|_| {
        tracing::warn!("Host key blob lacks an algorithm name");

        Error::Rejected
    })?;

    let algorithm = Key::new(&name).map_err(|_| {
        tracing::warn!("Host key algorithm `{name}` is unknown");

        Error::Rejected
    })?;

    if !compatible(negotiated, &algorithm) {
        tracing::warn!(
            "Host key algorithm `{name}` doesn't match the negociated `{}`",
            negotiated.as_str()
        );

        return Err(Error::Rejected);
    }

    let key = PublicKey::from_bytes(k_s).map_err(|err| {
        tracing::warn!("Unable to parse the host key: {err}");

        Error::Rejected
    })?;

    if !verifier.check(&key) {
        tracing::warn!(
            "Host key `{}` refused by the trust policy",
            key.fingerprint(Default::default())
        );

        return Err(Error::Rejected);
    }

    let signature = Signature::try_from(signature).map_err(|err| {
        tracing::warn!("Unable to parse the exchange hash signature: {err}");

        Error::Rejected
    })?;

    if signature.algorithm() != *negotiated {
        tracing::warn!(
            "Signature algorithm `{}` doesn't match the negociated `{}`",
            signature.algorithm().as_str(),
            negotiated.as_str()
        );

        return Err(Error::Rejected);
    }

    Verifier::verify(&key, hash, &signature).map_err(|_| {
        tracing::warn!("The exchange hash signature is invalid");

        Error::Rejected
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use signature::{SignatureEncoding, Signer};

    use super::*;

    fn signed(hash: &[u8]) -> (Vec<u8>, Vec<u8>) {
        let key = PrivateKey::random(&mut rand::thread_rng(), Key::Ed25519).unwrap();
        let signature: Signature = Signer::sign(&key, hash);

        (key.public_key().to_bytes().unwrap(), signature.to_vec())
    }

    #[test]
    fn accepts_a_valid_signature() {
        let (k_s, signature) = signed(b"exchange hash");

        validate(
            &Key::Ed25519,
            &k_s,
            &signature,
            b"exchange hash",
            &HostKeyVerifier::accept_any(),
        )
        .unwrap();
    }

    #[test]
    fn rejects_a_signature_over_another_hash() {
        let (k_s, signature) = signed(b"exchange hash");

        assert!(matches!(
            validate(
                &Key::Ed25519,
                &k_s,
                &signature,
                b"another hash",
                &HostKeyVerifier::accept_any(),
            ),
            Err(Error::Rejected)
        ));
    }

    #[test]
    fn rejects_an_untrusted_key() {
        let (k_s, signature) = signed(b"exchange hash");

        assert!(matches!(
            validate(
                &Key::Ed25519,
                &k_s,
                &signature,
                b"exchange hash",
                &HostKeyVerifier::new(|_| false),
            ),
            Err(Error::Rejected)
        ));
    }

    #[test]
    fn rejects_a_mismatching_algorithm() {
        let (k_s, signature) = signed(b"exchange hash");

        assert!(matches!(
            validate(
                &Key::Ecdsa {
                    curve: ssh_key::EcdsaCurve::NistP256
                },
                &k_s,
                &signature,
                b"exchange hash",
                &HostKeyVerifier::accept_any(),
            ),
            Err(Error::Rejected)
        ));
    }
}
