use crate::algorithm::{Compress, Crypter, Integrity};

/// The live algorithms protecting one direction of the transport.
#[derive(Debug)]
pub struct Transport {
    /// Encryption or decryption, possibly authenticated.
    pub cipher: Crypter,

    /// Integrity, absent for AEAD ciphers and the `none` MAC.
    pub mac: Option<Integrity>,

    /// Compression or decompression.
    pub compress: Compress,
}

impl Transport {
    /// Whether the direction is actually protected, or still in cleartext.
    pub fn is_protected(&self) -> bool {
        self.cipher.is_aead() || self.mac.is_some()
    }
}

/// Both directions of the transport, from a side's point of view.
#[derive(Debug)]
pub struct TransportPair {
    /// The sending direction.
    pub tx: Transport,

    /// The receiving direction.
    pub rx: Transport,
}
