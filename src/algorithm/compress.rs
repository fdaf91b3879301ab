use std::io::{Read, Write};

use strum::{AsRefStr, EnumString};

use crate::Result;

/// Upper bound on the size of a decompressed payload.
const DECOMPRESSED_MAX_SIZE: u64 = 0x40000;

/// SSH compression algorithms.
#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, EnumString, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Compress {
    /// zlib compression (OpenSSH mode), only enabled once the user is authenticated.
    #[strum(serialize = "zlib@openssh.com")]
    ZlibOpenssh,

    /// zlib compression.
    Zlib,

    /// No compression algorithm.
    #[default]
    None,
}

impl Compress {
    /// Whether the framing layer has to wait for the authentication to succeed
    /// before enabling the compression.
    pub fn is_delayed(&self) -> bool {
        matches!(self, Self::ZlibOpenssh)
    }

    /// Decompress an incoming payload.
    pub fn decompress(&self, buf: Vec<u8>) -> Result<Vec<u8>> {
        match self {
            Self::ZlibOpenssh | Self::Zlib => {
                let mut buffer = Vec::with_capacity(buf.len());
                let decoder = libflate::zlib::Decoder::new(std::io::Cursor::new(buf))?;

                decoder
                    .take(DECOMPRESSED_MAX_SIZE)
                    .read_to_end(&mut buffer)?;

                Ok(buffer)
            }
            Self::None => Ok(buf),
        }
    }

    /// Compress an outgoing payload.
    pub fn compress(&self, buf: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::ZlibOpenssh | Self::Zlib => {
                let mut encoder = libflate::zlib::Encoder::new(Vec::with_capacity(buf.len()))?;

                encoder.write_all(buf)?;

                Ok(encoder.finish().into_result()?)
            }
            Self::None => Ok(buf.into()),
        }
    }
}
