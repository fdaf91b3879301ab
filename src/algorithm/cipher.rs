use std::fmt;

use aes_gcm::aead::{
    consts::{U12, U16},
    AeadInPlace, KeyInit,
};
use ssh_cipher::{Nonce, Tag};
use strum::{AsRefStr, EnumString};
use zeroize::Zeroizing;

use crate::{Error, Result};

/// SSH cipher algorithms.
#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, EnumString, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Cipher {
    /// AES-256 in Galois/Counter Mode (GCM).
    #[strum(serialize = "aes256-gcm@openssh.com")]
    Aes256Gcm,

    /// AES-128 in Galois/Counter Mode (GCM).
    #[strum(serialize = "aes128-gcm@openssh.com")]
    Aes128Gcm,

    /// AES-256 in counter (CTR) mode.
    Aes256Ctr,

    /// AES-192 in counter (CTR) mode.
    Aes192Ctr,

    /// AES-128 in counter (CTR) mode.
    Aes128Ctr,

    /// AES-256 in cipher block chaining (CBC) mode.
    Aes256Cbc,

    /// AES-192 in cipher block chaining (CBC) mode.
    Aes192Cbc,

    /// AES-128 in cipher block chaining (CBC) mode.
    Aes128Cbc,

    /// TripleDES in cipher block chaining (CBC) mode.
    #[strum(serialize = "3des-cbc")]
    TDesCbc,

    /// No cipher algorithm.
    #[default]
    None,
}

impl Cipher {
    fn inner(&self) -> ssh_cipher::Cipher {
        match self {
            Self::Aes256Gcm => ssh_cipher::Cipher::Aes256Gcm,
            Self::Aes128Gcm => ssh_cipher::Cipher::Aes128Gcm,
            Self::Aes256Ctr => ssh_cipher::Cipher::Aes256Ctr,
            Self::Aes192Ctr => ssh_cipher::Cipher::Aes192Ctr,
            Self::Aes128Ctr => ssh_cipher::Cipher::Aes128Ctr,
            Self::Aes256Cbc => ssh_cipher::Cipher::Aes256Cbc,
            Self::Aes192Cbc => ssh_cipher::Cipher::Aes192Cbc,
            Self::Aes128Cbc => ssh_cipher::Cipher::Aes128Cbc,
            Self::TDesCbc => ssh_cipher::Cipher::TDesCbc,
            Self::None => ssh_cipher::Cipher::None,
        }
    }

    fn is_ctr(&self) -> bool {
        matches!(self, Self::Aes256Ctr | Self::Aes192Ctr | Self::Aes128Ctr)
    }

    /// Whether the cipher authenticates the packets by itself,
    /// rendering the MAC negociation moot.
    pub fn is_aead(&self) -> bool {
        self.inner().has_tag()
    }

    /// Size of the cipher blocks, which the packet lengths must be a multiple of.
    pub fn block_size(&self) -> usize {
        self.inner().block_size()
    }

    /// Size of the key to derive for the cipher.
    pub fn key_size(&self) -> usize {
        self.inner().key_and_iv_size().map_or(0, |(key, _)| key)
    }

    /// Size of the initialization vector to derive for the cipher.
    pub fn iv_size(&self) -> usize {
        self.inner().key_and_iv_size().map_or(0, |(_, iv)| iv)
    }

    /// Size of the authentication tag appended to the packets.
    pub fn tag_size(&self) -> usize {
        if self.is_aead() {
            std::mem::size_of::<Tag>()
        } else {
            0
        }
    }

    /// Instantiate the cipher from the derived `key` and `iv`.
    pub(crate) fn crypter(&self, mode: Mode, key: &[u8], iv: &[u8]) -> Result<Crypter> {
        if key.len() != self.key_size() || iv.len() != self.iv_size() {
            return Err(Error::Cipher);
        }

        let state = match self {
            Self::None => State::None,
            Self::Aes256Gcm => State::Aes256Gcm(Gcm::new(key, iv)?),
            Self::Aes128Gcm => State::Aes128Gcm(Gcm::new(key, iv)?),
            _ => State::Block {
                key: Zeroizing::new(key.to_vec()),
                iv: Zeroizing::new(iv.to_vec()),
            },
        };

        Ok(Crypter {
            cipher: self.clone(),
            mode,
            state,
        })
    }
}

/// Whether a [`Crypter`] seals outgoing or opens incoming packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Outgoing packets.
    Encrypt,

    /// Incoming packets.
    Decrypt,
}

/// AES-GCM with the nonce handling of RFC 5647 §7.1, a fixed 4-byte field
/// followed by a 8-byte invocation counter incremented for each packet.
///
/// The packet length is authenticated as associated data, which the one-shot
/// [`ssh_cipher::Cipher`] calls do not allow.
struct Gcm<C> {
    cipher: C,
    nonce: Nonce,
}

impl<C: KeyInit + AeadInPlace<NonceSize = U12, TagSize = U16>> Gcm<C> {
    fn new(key: &[u8], iv: &[u8]) -> Result<Self> {
        Ok(Self {
            cipher: C::new_from_slice(key).map_err(|_| Error::Cipher)?,
            nonce: iv.try_into().map_err(|_| Error::Cipher)?,
        })
    }

    fn next_nonce(&mut self) -> Nonce {
        let current = self.nonce;

        let (_, invocation) = self.nonce.split_at_mut(4);
        let mut counter = [0u8; 8];
        counter.copy_from_slice(invocation);
        invocation.copy_from_slice(&u64::from_be_bytes(counter).wrapping_add(1).to_be_bytes());

        current
    }

    fn seal(&mut self, aad: &[u8], buffer: &mut [u8]) -> Result<Tag> {
        let nonce = self.next_nonce();

        self.cipher
            .encrypt_in_place_detached(&nonce.into(), aad, buffer)
            .map(Into::into)
            .map_err(|_| Error::Cipher)
    }

    fn open(&mut self, aad: &[u8], buffer: &mut [u8], tag: &[u8]) -> Result<()> {
        let nonce = self.next_nonce();
        let tag = Tag::try_from(tag).map_err(|_| Error::Cipher)?;

        self.cipher
            .decrypt_in_place_detached(&nonce.into(), aad, buffer, &tag.into())
            .map_err(|_| Error::Cipher)
    }
}

enum State {
    None,

    /// The CTR and CBC modes, re-keyed by [`ssh_cipher`] for each call,
    /// with the counter or chaining value carried over in `iv`.
    Block {
        key: Zeroizing<Vec<u8>>,
        iv: Zeroizing<Vec<u8>>,
    },

    Aes256Gcm(Gcm<aes_gcm::Aes256Gcm>),
    Aes128Gcm(Gcm<aes_gcm::Aes128Gcm>),
}

/// A live cipher instance, keyed for one direction of the transport.
pub struct Crypter {
    cipher: Cipher,
    mode: Mode,
    state: State,
}

impl fmt::Debug for Crypter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Crypter")
            .field("cipher", &self.cipher)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl Crypter {
    /// The algorithm of this instance.
    pub fn cipher(&self) -> &Cipher {
        &self.cipher
    }

    /// The direction of this instance.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Whether this instance is an AEAD, to be used with [`Self::seal`] and [`Self::open`].
    pub fn is_aead(&self) -> bool {
        self.cipher.is_aead()
    }

    /// Encrypt or decrypt `buffer` in place, depending on the [`Mode`],
    /// for the non-AEAD ciphers.
    ///
    /// The `buffer` must hold whole blocks, the keystream or the chaining
    /// carrying over from one call to the next.
    pub fn apply(&mut self, buffer: &mut [u8]) -> Result<()> {
        let (key, iv) = match &mut self.state {
            State::Block { key, iv } => (key, iv),
            State::None => return Ok(()),
            _ => return Err(Error::Cipher),
        };

        let cipher = self.cipher.inner();
        if buffer.is_empty() {
            return Ok(());
        }
        if buffer.len() % cipher.block_size() != 0 {
            return Err(Error::Cipher);
        }

        if self.cipher.is_ctr() {
            // In CTR mode, encryption and decrytion are the same
            cipher
                .encrypt(&key[..], &iv[..], buffer)
                .map_err(|_| Error::Cipher)?;

            let counter = <[u8; 16]>::try_from(&iv[..]).map_err(|_| Error::Cipher)?;
            let blocks = (buffer.len() / cipher.block_size()) as u128;
            iv.copy_from_slice(&u128::from_be_bytes(counter).wrapping_add(blocks).to_be_bytes());

            return Ok(());
        }

        let last = buffer.len() - iv.len();
        match self.mode {
            Mode::Encrypt => {
                cipher
                    .encrypt(&key[..], &iv[..], buffer)
                    .map_err(|_| Error::Cipher)?;

                iv.copy_from_slice(&buffer[last..]);
            }
            Mode::Decrypt => {
                let chain = Zeroizing::new(buffer[last..].to_vec());

                cipher
                    .decrypt(&key[..], &iv[..], buffer, None)
                    .map_err(|_| Error::Cipher)?;

                iv.copy_from_slice(&chain);
            }
        }

        Ok(())
    }

    /// Encrypt `buffer` in place while authenticating `aad` with it,
    /// returning the tag, for the AEAD ciphers.
    pub fn seal(&mut self, aad: &[u8], buffer: &mut [u8]) -> Result<Tag> {
        match (&mut self.state, self.mode) {
            (State::Aes256Gcm(gcm), Mode::Encrypt) => gcm.seal(aad, buffer),
            (State::Aes128Gcm(gcm), Mode::Encrypt) => gcm.seal(aad, buffer),
            _ => Err(Error::Cipher),
        }
    }

    /// Authenticate `aad` and `buffer` against `tag`, and decrypt `buffer` in place,
    /// for the AEAD ciphers.
    pub fn open(&mut self, aad: &[u8], buffer: &mut [u8], tag: &[u8]) -> Result<()> {
        match (&mut self.state, self.mode) {
            (State::Aes256Gcm(gcm), Mode::Decrypt) => gcm.open(aad, buffer, tag),
            (State::Aes128Gcm(gcm), Mode::Decrypt) => gcm.open(aad, buffer, tag),
            _ => Err(Error::Cipher),
        }
    }
}
