use digest::Digest;
use ssh_encoding::{Encode, Writer};
use strum::{AsRefStr, EnumString};

use crate::Result;

/// SSH key-exchange algorithms.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, EnumString, AsRefStr)]
pub enum Kex {
    /// Curve25519 ECDH with sha-2-256 digest.
    #[strum(serialize = "curve25519-sha256")]
    Curve25519Sha256,

    /// Curve25519 ECDH with sha-2-256 digest (pre-RFC 8731).
    #[strum(serialize = "curve25519-sha256@libssh.org")]
    Curve25519Sha256Libssh,

    /// NIST P-256 ECDH with sha-2-256 digest.
    #[strum(serialize = "ecdh-sha2-nistp256")]
    EcdhSha2Nistp256,

    /// NIST P-384 ECDH with sha-2-384 digest.
    #[strum(serialize = "ecdh-sha2-nistp384")]
    EcdhSha2Nistp384,

    /// NIST P-521 ECDH with sha-2-512 digest.
    #[strum(serialize = "ecdh-sha2-nistp521")]
    EcdhSha2Nistp521,

    /// Diffie-Hellman over a server-provided group, with sha-2-256 digest.
    #[strum(serialize = "diffie-hellman-group-exchange-sha256")]
    DiffieHellmanGroupExchangeSha256,

    /// Diffie-Hellman over the 4096-bit MODP group, with sha-2-512 digest.
    #[strum(serialize = "diffie-hellman-group16-sha512")]
    DiffieHellmanGroup16Sha512,

    /// Diffie-Hellman over the 8192-bit MODP group, with sha-2-512 digest.
    #[strum(serialize = "diffie-hellman-group18-sha512")]
    DiffieHellmanGroup18Sha512,

    /// Diffie-Hellman over the 2048-bit MODP group, with sha-2-256 digest.
    #[strum(serialize = "diffie-hellman-group14-sha256")]
    DiffieHellmanGroup14Sha256,

    /// Diffie-Hellman over the 2048-bit MODP group, with sha-1 digest.
    #[strum(serialize = "diffie-hellman-group14-sha1")]
    DiffieHellmanGroup14Sha1,

    /// Diffie-Hellman over a server-provided group, with sha-1 digest.
    #[strum(serialize = "diffie-hellman-group-exchange-sha1")]
    DiffieHellmanGroupExchangeSha1,

    /// Diffie-Hellman over the 1024-bit Oakley group, with sha-1 digest.
    #[strum(serialize = "diffie-hellman-group1-sha1")]
    DiffieHellmanGroup1Sha1,
}

impl Kex {
    /// The digest used for the exchange hash and the key derivation.
    pub fn hash(&self) -> HashAlg {
        match self {
            Self::DiffieHellmanGroup1Sha1
            | Self::DiffieHellmanGroup14Sha1
            | Self::DiffieHellmanGroupExchangeSha1 => HashAlg::Sha1,
            Self::Curve25519Sha256
            | Self::Curve25519Sha256Libssh
            | Self::EcdhSha2Nistp256
            | Self::DiffieHellmanGroupExchangeSha256
            | Self::DiffieHellmanGroup14Sha256 => HashAlg::Sha256,
            Self::EcdhSha2Nistp384 => HashAlg::Sha384,
            Self::EcdhSha2Nistp521
            | Self::DiffieHellmanGroup16Sha512
            | Self::DiffieHellmanGroup18Sha512 => HashAlg::Sha512,
        }
    }
}

/// Digests a key-exchange method may rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlg {
    /// sha-1.
    Sha1,

    /// sha-2-256.
    Sha256,

    /// sha-2-384.
    Sha384,

    /// sha-2-512.
    Sha512,
}

impl HashAlg {
    /// Digest `data` in one go.
    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha1 => sha1::Sha1::digest(data).to_vec(),
            Self::Sha256 => sha2::Sha256::digest(data).to_vec(),
            Self::Sha384 => sha2::Sha384::digest(data).to_vec(),
            Self::Sha512 => sha2::Sha512::digest(data).to_vec(),
        }
    }

    /// Digest the binary representation of `value`, without buffering it.
    pub fn digest_encoded(&self, value: &impl Encode) -> Result<Vec<u8>> {
        fn digest<D: Digest>(value: &impl Encode) -> Result<Vec<u8>> {
            let mut hasher = Hasher(D::new());
            value.encode(&mut hasher)?;

            Ok(hasher.0.finalize().to_vec())
        }

        match self {
            Self::Sha1 => digest::<sha1::Sha1>(value),
            Self::Sha256 => digest::<sha2::Sha256>(value),
            Self::Sha384 => digest::<sha2::Sha384>(value),
            Self::Sha512 => digest::<sha2::Sha512>(value),
        }
    }

    /// Size in bytes of the digest output.
    pub fn size(&self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }
}

struct Hasher<D>(D);

impl<D: Digest> Writer for Hasher<D> {
    fn write(&mut self, bytes: &[u8]) -> ssh_encoding::Result<()> {
        self.0.update(bytes);

        Ok(())
    }
}
