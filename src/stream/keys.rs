use digest::{Digest, FixedOutputReset};
use secrecy::SecretBox;
use zeroize::Zeroizing;

use crate::{
    algorithm::{Directional, HashAlg},
    wire::{Encode, Mpint},
    Result,
};

/// Key material derived for one direction of the transport.
#[derive(Debug, Default)]
pub struct Keys {
    /// Cipher _initialization vector_.
    pub iv: SecretBox<Vec<u8>>,

    /// Cipher _key_.
    pub key: SecretBox<Vec<u8>>,

    /// Hmac _key_, left empty for AEAD ciphers.
    pub hmac: SecretBox<Vec<u8>>,
}

impl Keys {
    /// Derive the client-to-server keys, tagged `A`, `C` and `E`.
    pub(crate) fn as_client(
        alg: HashAlg,
        secret: &Mpint,
        hash: &[u8],
        session_id: &[u8],
        directional: &Directional,
    ) -> Result<Self> {
        Self::tagged([b'A', b'C', b'E'], alg, secret, hash, session_id, directional)
    }

    /// Derive the server-to-client keys, tagged `B`, `D` and `F`.
    pub(crate) fn as_server(
        alg: HashAlg,
        secret: &Mpint,
        hash: &[u8],
        session_id: &[u8],
        directional: &Directional,
    ) -> Result<Self> {
        Self::tagged([b'B', b'D', b'F'], alg, secret, hash, session_id, directional)
    }

    fn tagged(
        [iv, key, hmac]: [u8; 3],
        alg: HashAlg,
        secret: &Mpint,
        hash: &[u8],
        session_id: &[u8],
        directional: &Directional,
    ) -> Result<Self> {
        let cipher = &directional.cipher;

        Ok(Self {
            iv: derive(alg, secret, hash, iv, session_id, cipher.iv_size())?,
            key: derive(alg, secret, hash, key, session_id, cipher.key_size())?,
            hmac: if cipher.is_aead() {
                Default::default()
            } else {
                derive(alg, secret, hash, hmac, session_id, directional.hmac.size())?
            },
        })
    }
}

/// Derive `size` bytes of key material tagged with `kind`, as per RFC 4253 §7.2.
pub fn derive(
    alg: HashAlg,
    secret: &Mpint,
    hash: &[u8],
    kind: u8,
    session_id: &[u8],
    size: usize,
) -> Result<SecretBox<Vec<u8>>> {
    match alg {
        HashAlg::Sha1 => expand::<sha1::Sha1>(secret, hash, kind, session_id, size),
        HashAlg::Sha256 => expand::<sha2::Sha256>(secret, hash, kind, session_id, size),
        HashAlg::Sha384 => expand::<sha2::Sha384>(secret, hash, kind, session_id, size),
        HashAlg::Sha512 => expand::<sha2::Sha512>(secret, hash, kind, session_id, size),
    }
}

fn expand<D: Digest + FixedOutputReset>(
    secret: &Mpint,
    hash: &[u8],
    kind: u8,
    session_id: &[u8],
    size: usize,
) -> Result<SecretBox<Vec<u8>>> {
    let mut encoded = Zeroizing::new(Vec::with_capacity(secret.encoded_len()?));
    secret.encode(&mut *encoded)?;

    Ok(SecretBox::<Vec<u8>>::init_with_mut(|key| {
        if size == 0 {
            return;
        }

        let mut hasher = D::new()
            .chain_update(&*encoded)
            .chain_update(hash)
            .chain_update([kind])
            .chain_update(session_id);

        key.extend_from_slice(&hasher.finalize_reset());

        while key.len() < size {
            hasher = hasher
                .chain_update(&*encoded)
                .chain_update(hash)
                .chain_update(&*key);

            key.extend_from_slice(&hasher.finalize_reset());
        }

        key.truncate(size);
    }))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use hex_literal::hex;
    use rstest::rstest;
    use secrecy::ExposeSecret;
    use sha2::Digest;

    use super::*;
    use crate::algorithm::{Cipher, Compress, Hmac};

    fn mpint(bytes: &[u8]) -> Mpint {
        Mpint::from_positive_bytes(bytes).unwrap()
    }

    #[rstest]
    #[case(HashAlg::Sha1)]
    #[case(HashAlg::Sha256)]
    #[case(HashAlg::Sha384)]
    #[case(HashAlg::Sha512)]
    fn length_law(#[case] alg: HashAlg) {
        let secret = mpint(&[0x9c; 32]);
        let (hash, session_id) = ([0x11; 32], [0x22; 32]);

        let single = derive(alg, &secret, &hash, b'C', &session_id, alg.size()).unwrap();
        let long = derive(alg, &secret, &hash, b'C', &session_id, alg.size() * 3 + 1).unwrap();

        assert_eq!(single.expose_secret().len(), alg.size());
        assert_eq!(long.expose_secret().len(), alg.size() * 3 + 1);
        assert_eq!(
            single.expose_secret()[..],
            long.expose_secret()[..alg.size()]
        );
    }

    #[test]
    fn derivation_follows_rfc4253() {
        // K = 0x80 0x01, which needs a leading zero as a mpint
        let secret = mpint(&[0x80, 0x01]);
        let k = hex!("00000003 008001");
        let (hash, session_id) = (hex!("0102030405"), hex!("0a0b0c0d0e"));

        let k1 = sha2::Sha256::new()
            .chain_update(k)
            .chain_update(hash)
            .chain_update(b"A")
            .chain_update(session_id)
            .finalize();
        let k2 = sha2::Sha256::new()
            .chain_update(k)
            .chain_update(hash)
            .chain_update(k1)
            .finalize();

        let mut expected = k1.to_vec();
        expected.extend_from_slice(&k2[..8]);

        let derived = derive(HashAlg::Sha256, &secret, &hash, b'A', &session_id, 40).unwrap();

        assert_eq!(derived.expose_secret(), &expected);
    }

    #[test]
    fn tags_separate_the_keys() {
        let secret = mpint(&[0x42; 16]);

        let a = derive(HashAlg::Sha256, &secret, b"hash", b'A', b"session", 32).unwrap();
        let b = derive(HashAlg::Sha256, &secret, b"hash", b'B', b"session", 32).unwrap();

        assert_ne!(a.expose_secret(), b.expose_secret());
    }

    #[test]
    fn aead_skips_the_mac_key() {
        let secret = mpint(&[0x42; 16]);
        let directional = Directional {
            cipher: Cipher::Aes256Gcm,
            hmac: Hmac::HmacSha256,
            compress: Compress::None,
        };

        let keys =
            Keys::as_client(HashAlg::Sha256, &secret, b"hash", b"session", &directional).unwrap();

        assert_eq!(keys.iv.expose_secret().len(), 12);
        assert_eq!(keys.key.expose_secret().len(), 32);
        assert!(keys.hmac.expose_secret().is_empty());
    }
}
