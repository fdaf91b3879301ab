use thiserror::Error;

use crate::{algorithm::Category, wire::NameList};

/// The error types that can occur when manipulating this crate.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// I/O Error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Malformed binary data.
    #[error(transparent)]
    Encoding(#[from] ssh_encoding::Error),

    /// SSH Key error.
    #[error(transparent)]
    Key(#[from] ssh_key::Error),

    /// Packet integrity error.
    #[error(transparent)]
    Integrity(#[from] digest::MacError),

    /// Signature error while signing the exchange hash.
    #[error(transparent)]
    Signature(#[from] signature::Error),

    /// Error while encrypting or decrypting messages.
    #[error("The cipher ended up in an error")]
    Cipher,

    /// No common algorithm found between both sides for a category.
    #[error("Unable to negociate a common {category} algorithm, client offered `{client}`, server offered `{server}`")]
    NoCommonAlgorithm {
        /// The category that failed to negociate.
        category: Category,

        /// The client's proposal for that category.
        client: NameList,

        /// The server's proposal for that category.
        server: NameList,
    },

    /// Provided algorithm wasn't supported.
    #[error("Algorithm is unsupported")]
    UnsupportedAlgorithm,

    /// Protocol error in the key-exchange.
    #[error("Error in the key-exchange: {0}")]
    KexError(&'static str),

    /// A message arrived that the current state doesn't allow.
    #[error("Unexpected message #{0} for the current state")]
    UnexpectedMessage(u8),

    /// A key-exchange is already running on this stream.
    #[error("A key-exchange is already in progress")]
    KexInProgress,

    /// The server's host key or its signature over the exchange hash was refused.
    #[error("The server host key was rejected")]
    Rejected,

    /// The peer took too long to answer.
    #[error("Timed out while waiting for the peer")]
    Timeout,

    /// The session has been disconnected.
    #[error("The session has been disconnected")]
    Disconnected,
}

impl Error {
    /// Categorize the error for the caller.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoCommonAlgorithm { .. } | Self::UnsupportedAlgorithm => ErrorKind::Negotiation,
            Self::Encoding(_)
            | Self::Key(ssh_key::Error::Encoding(_) | ssh_key::Error::FormatEncoding)
            | Self::KexError(_)
            | Self::UnexpectedMessage(_)
            | Self::KexInProgress => ErrorKind::Protocol,
            Self::Rejected => ErrorKind::Validation,
            Self::Timeout => ErrorKind::Timeout,
            Self::Io(_)
            | Self::Key(_)
            | Self::Integrity(_)
            | Self::Signature(_)
            | Self::Cipher
            | Self::Disconnected => ErrorKind::Transport,
        }
    }
}

/// Broad classes of [`enum@Error`], as reported by [`Error::kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The two sides share no acceptable algorithm.
    Negotiation,

    /// The peer sent something malformed, out of range or out of order.
    Protocol,

    /// The exchange hash could not be authenticated.
    Validation,

    /// The peer did not answer in time.
    Timeout,

    /// The underlying transport, a key or a primitive failed.
    Transport,
}

/// A handy [`std::result::Result`] type alias bounding the [`enum@Error`] struct as `E`.
pub type Result<T, E = Error> = std::result::Result<T, E>;
