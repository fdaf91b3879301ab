use std::fmt;

use digest::{KeyInit, Mac, OutputSizeUser};
use md5::Md5;
use sha1::Sha1;
use sha2::{Sha256, Sha512};
use strum::{AsRefStr, EnumString};

use crate::{Error, Result};

/// SSH hmac algorithms.
#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, EnumString, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Hmac {
    /// HMAC with sha-2-512 digest on encrypted message.
    #[strum(serialize = "hmac-sha2-512-etm@openssh.com")]
    HmacSha512ETM,

    /// HMAC with sha-2-256 digest on encrypted message.
    #[strum(serialize = "hmac-sha2-256-etm@openssh.com")]
    HmacSha256ETM,

    /// HMAC with sha-2-512 digest.
    #[strum(serialize = "hmac-sha2-512")]
    HmacSha512,

    /// HMAC with sha-2-256 digest.
    #[strum(serialize = "hmac-sha2-256")]
    HmacSha256,

    /// HMAC with sha-1 digest on encrypted message.
    #[strum(serialize = "hmac-sha1-etm@openssh.com")]
    HmacSha1ETM,

    /// HMAC with sha-1 digest.
    HmacSha1,

    /// HMAC with md5 digest on encrypted message.
    #[strum(serialize = "hmac-md5-etm@openssh.com")]
    HmacMd5ETM,

    /// HMAC with md5 digest.
    HmacMd5,

    /// No HMAC algorithm.
    #[default]
    None,
}

impl Hmac {
    /// Size of both the key and the produced tag.
    pub fn size(&self) -> usize {
        match self {
            Self::HmacSha512ETM | Self::HmacSha512 => Sha512::output_size(),
            Self::HmacSha256ETM | Self::HmacSha256 => Sha256::output_size(),
            Self::HmacSha1ETM | Self::HmacSha1 => Sha1::output_size(),
            Self::HmacMd5ETM | Self::HmacMd5 => Md5::output_size(),
            Self::None => 0,
        }
    }

    /// Whether the tag is computed over the encrypted packet.
    pub fn etm(&self) -> bool {
        matches!(
            self,
            Self::HmacSha512ETM | Self::HmacSha256ETM | Self::HmacSha1ETM | Self::HmacMd5ETM
        )
    }

    /// Instantiate the MAC from the derived `key`, `None` standing for no integrity.
    pub(crate) fn integrity(&self, key: &[u8]) -> Result<Option<Integrity>> {
        fn keyed<D: KeyInit>(key: &[u8]) -> Result<D> {
            <D as KeyInit>::new_from_slice(key).map_err(|_| Error::KexError("invalid MAC key"))
        }

        let state = match self {
            Self::HmacSha512ETM | Self::HmacSha512 => State::Sha512(keyed(key)?),
            Self::HmacSha256ETM | Self::HmacSha256 => State::Sha256(keyed(key)?),
            Self::HmacSha1ETM | Self::HmacSha1 => State::Sha1(keyed(key)?),
            Self::HmacMd5ETM | Self::HmacMd5 => State::Md5(keyed(key)?),
            Self::None => return Ok(None),
        };

        Ok(Some(Integrity {
            hmac: self.clone(),
            state,
        }))
    }
}

#[derive(Clone)]
enum State {
    Sha512(hmac::Hmac<Sha512>),
    Sha256(hmac::Hmac<Sha256>),
    Sha1(hmac::Hmac<Sha1>),
    Md5(hmac::Hmac<Md5>),
}

/// A live MAC instance, keyed for one direction of the transport.
#[derive(Clone)]
pub struct Integrity {
    hmac: Hmac,
    state: State,
}

impl fmt::Debug for Integrity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Integrity")
            .field("hmac", &self.hmac)
            .finish_non_exhaustive()
    }
}

impl Integrity {
    /// The algorithm of this instance.
    pub fn hmac(&self) -> &Hmac {
        &self.hmac
    }

    /// Whether the tag is computed over the encrypted packet.
    pub fn is_etm(&self) -> bool {
        self.hmac.etm()
    }

    /// Compute the tag of the packet `buf` numbered `seq`.
    pub fn sign(&self, seq: u32, buf: &[u8]) -> Vec<u8> {
        fn sign<D: Mac + Clone>(mac: &D, seq: u32, buf: &[u8]) -> Vec<u8> {
            mac.clone()
                .chain_update(seq.to_be_bytes())
                .chain_update(buf)
                .finalize()
                .into_bytes()
                .to_vec()
        }

        match &self.state {
            State::Sha512(mac) => sign(mac, seq, buf),
            State::Sha256(mac) => sign(mac, seq, buf),
            State::Sha1(mac) => sign(mac, seq, buf),
            State::Md5(mac) => sign(mac, seq, buf),
        }
    }

    /// Check the `tag` of the packet `buf` numbered `seq`.
    pub fn verify(&self, seq: u32, buf: &[u8], tag: &[u8]) -> Result<()> {
        fn verify<D: Mac + Clone>(mac: &D, seq: u32, buf: &[u8], tag: &[u8]) -> Result<()> {
            Ok(mac
                .clone()
                .chain_update(seq.to_be_bytes())
                .chain_update(buf)
                .verify_slice(tag)?)
        }

        match &self.state {
            State::Sha512(mac) => verify(mac, seq, buf, tag),
            State::Sha256(mac) => verify(mac, seq, buf, tag),
            State::Sha1(mac) => verify(mac, seq, buf, tag),
            State::Md5(mac) => verify(mac, seq, buf, tag),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn tags_bind_the_sequence_number() {
        let integrity = Hmac::HmacSha256ETM.integrity(&[7; 32]).unwrap().unwrap();
        let tag = integrity.sign(3, b"packet");

        assert_eq!(tag.len(), Hmac::HmacSha256ETM.size());
        assert!(integrity.is_etm());
        integrity.verify(3, b"packet", &tag).unwrap();
        assert!(matches!(
            integrity.verify(4, b"packet", &tag),
            Err(Error::Integrity(_))
        ));
    }

    #[test]
    fn none_has_no_instance() {
        assert!(Hmac::None.integrity(&[]).unwrap().is_none());
    }
}
