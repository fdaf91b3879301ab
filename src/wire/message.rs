//! Messages of the transport layer involved in the key-exchange.

use ssh_encoding::CheckedSum;

use super::{Decode, Encode, Mpint, NameList, Reader, Writer};
use crate::{Error, Result};

/// Message number of `SSH_MSG_DISCONNECT`.
pub const DISCONNECT: u8 = 1;
/// Message number of `SSH_MSG_IGNORE`.
pub const IGNORE: u8 = 2;
/// Message number of `SSH_MSG_UNIMPLEMENTED`.
pub const UNIMPLEMENTED: u8 = 3;
/// Message number of `SSH_MSG_DEBUG`.
pub const DEBUG: u8 = 4;
/// Message number of `SSH_MSG_KEXINIT`.
pub const KEXINIT: u8 = 20;
/// Message number of `SSH_MSG_NEWKEYS`.
pub const NEWKEYS: u8 = 21;

/// The range of message numbers reserved to the key-exchange methods.
pub const KEX_METHOD_SPECIFIC: std::ops::RangeInclusive<u8> = 30..=49;

/// A message of the SSH protocol, identified by its message number.
///
/// The [`Encode`] and [`Decode`] implementations handle the message fields,
/// without the message number.
pub trait Message: Encode + Decode<Error = Error> {
    /// The message number, first byte of the payload.
    const MAGIC: u8;

    /// Serialize the message into a payload.
    fn to_payload(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity([1, self.encoded_len()?].checked_sum()?);

        Self::MAGIC.encode(&mut buf)?;
        self.encode(&mut buf)?;

        Ok(buf)
    }

    /// Deserialize the message from a payload, checking the message number
    /// and refusing trailing bytes.
    fn from_payload(mut payload: &[u8]) -> Result<Self> {
        match u8::decode(&mut payload)? {
            magic if magic == Self::MAGIC => {
                let message = Self::decode(&mut payload)?;

                Ok(payload.finish(message)?)
            }
            magic => Err(Error::UnexpectedMessage(magic)),
        }
    }
}

/// A `boolean`, any non-zero value being `true`.
fn boolean(reader: &mut impl Reader) -> Result<bool> {
    Ok(u8::decode(reader)? != 0)
}

macro_rules! message {
    (
        $(#[$meta:meta])*
        $name:ident = $magic:literal {
            $($(#[$fmeta:meta])* $field:ident: $ty:ty),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            $($(#[$fmeta])* pub $field: $ty,)*
        }

        impl Encode for $name {
            fn encoded_len(&self) -> ssh_encoding::Result<usize> {
                [0 $(, self.$field.encoded_len()?)*].checked_sum()
            }

            fn encode(&self, writer: &mut impl Writer) -> ssh_encoding::Result<()> {
                $(self.$field.encode(writer)?;)*

                Ok(())
            }
        }

        impl Decode for $name {
            type Error = Error;

            fn decode(reader: &mut impl Reader) -> Result<Self> {
                Ok(Self {
                    $($field: <$ty>::decode(reader)?,)*
                })
            }
        }

        impl Message for $name {
            const MAGIC: u8 = $magic;
        }
    };
}

message! {
    /// The `SSH_MSG_DISCONNECT` message.
    Disconnect = 1 {
        /// Reason code for the disconnection.
        reason: u32,
        /// Human-readable description.
        description: String,
        /// Language tag of the description.
        language: String,
    }
}

message! {
    /// The `SSH_MSG_IGNORE` message.
    Ignore = 2 {
        /// Arbitrary data.
        data: Vec<u8>,
    }
}

message! {
    /// The `SSH_MSG_UNIMPLEMENTED` message.
    Unimplemented = 3 {
        /// Sequence number of the rejected packet.
        seq: u32,
    }
}

/// The `SSH_MSG_DEBUG` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Debug {
    /// Whether the message should be shown to the user.
    pub always_display: bool,
    /// The debug message.
    pub message: String,
    /// Language tag of the message.
    pub language: String,
}

impl Encode for Debug {
    fn encoded_len(&self) -> ssh_encoding::Result<usize> {
        [1, self.message.encoded_len()?, self.language.encoded_len()?].checked_sum()
    }

    fn encode(&self, writer: &mut impl Writer) -> ssh_encoding::Result<()> {
        u8::from(self.always_display).encode(writer)?;
        self.message.encode(writer)?;
        self.language.encode(writer)
    }
}

impl Decode for Debug {
    type Error = Error;

    fn decode(reader: &mut impl Reader) -> Result<Self> {
        Ok(Self {
            always_display: boolean(reader)?,
            message: String::decode(reader)?,
            language: String::decode(reader)?,
        })
    }
}

impl Message for Debug {
    const MAGIC: u8 = DEBUG;
}

/// Reason codes of the [`Disconnect`] message used by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum DisconnectReason {
    /// `SSH_DISCONNECT_PROTOCOL_ERROR`.
    ProtocolError = 2,
    /// `SSH_DISCONNECT_KEY_EXCHANGE_FAILED`.
    KeyExchangeFailed = 3,
    /// `SSH_DISCONNECT_HOST_KEY_NOT_VERIFIABLE`.
    HostKeyNotVerifiable = 9,
    /// `SSH_DISCONNECT_BY_APPLICATION`.
    ByApplication = 11,
}

/// The `SSH_MSG_KEXINIT` message, the algorithm proposal of a side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KexInit {
    /// Random bytes.
    pub cookie: [u8; 16],
    /// Key-exchange algorithms.
    pub kex_algorithms: NameList,
    /// Host key algorithms.
    pub server_host_key_algorithms: NameList,
    /// Ciphers, client to server.
    pub encryption_algorithms_client_to_server: NameList,
    /// Ciphers, server to client.
    pub encryption_algorithms_server_to_client: NameList,
    /// MACs, client to server.
    pub mac_algorithms_client_to_server: NameList,
    /// MACs, server to client.
    pub mac_algorithms_server_to_client: NameList,
    /// Compressions, client to server.
    pub compression_algorithms_client_to_server: NameList,
    /// Compressions, server to client.
    pub compression_algorithms_server_to_client: NameList,
    /// Languages, client to server.
    pub languages_client_to_server: NameList,
    /// Languages, server to client.
    pub languages_server_to_client: NameList,
    /// Whether a guessed key-exchange packet follows.
    pub first_kex_packet_follows: bool,
    /// Reserved for future extension.
    pub reserved: u32,
}

impl KexInit {
    fn lists(&self) -> [&NameList; 10] {
        [
            &self.kex_algorithms,
            &self.server_host_key_algorithms,
            &self.encryption_algorithms_client_to_server,
            &self.encryption_algorithms_server_to_client,
            &self.mac_algorithms_client_to_server,
            &self.mac_algorithms_server_to_client,
            &self.compression_algorithms_client_to_server,
            &self.compression_algorithms_server_to_client,
            &self.languages_client_to_server,
            &self.languages_server_to_client,
        ]
    }
}

impl Encode for KexInit {
    fn encoded_len(&self) -> ssh_encoding::Result<usize> {
        let lists = self
            .lists()
            .into_iter()
            .map(Encode::encoded_len)
            .collect::<ssh_encoding::Result<Vec<_>>>()?;

        [self.cookie.len(), lists.checked_sum()?, 1, 4].checked_sum()
    }

    fn encode(&self, writer: &mut impl Writer) -> ssh_encoding::Result<()> {
        // The cookie is a raw `byte[16]`, without a length prefix
        writer.write(&self.cookie)?;

        for list in self.lists() {
            list.encode(writer)?;
        }

        u8::from(self.first_kex_packet_follows).encode(writer)?;
        self.reserved.encode(writer)
    }
}

impl Decode for KexInit {
    type Error = Error;

    fn decode(reader: &mut impl Reader) -> Result<Self> {
        let mut cookie = [0u8; 16];
        reader.read(&mut cookie)?;

        Ok(Self {
            cookie,
            kex_algorithms: NameList::decode(reader)?,
            server_host_key_algorithms: NameList::decode(reader)?,
            encryption_algorithms_client_to_server: NameList::decode(reader)?,
            encryption_algorithms_server_to_client: NameList::decode(reader)?,
            mac_algorithms_client_to_server: NameList::decode(reader)?,
            mac_algorithms_server_to_client: NameList::decode(reader)?,
            compression_algorithms_client_to_server: NameList::decode(reader)?,
            compression_algorithms_server_to_client: NameList::decode(reader)?,
            languages_client_to_server: NameList::decode(reader)?,
            languages_server_to_client: NameList::decode(reader)?,
            first_kex_packet_follows: boolean(reader)?,
            reserved: u32::decode(reader)?,
        })
    }
}

impl Message for KexInit {
    const MAGIC: u8 = KEXINIT;
}

/// The `SSH_MSG_NEWKEYS` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewKeys;

impl Encode for NewKeys {
    fn encoded_len(&self) -> ssh_encoding::Result<usize> {
        Ok(0)
    }

    fn encode(&self, _: &mut impl Writer) -> ssh_encoding::Result<()> {
        Ok(())
    }
}

impl Decode for NewKeys {
    type Error = Error;

    fn decode(_: &mut impl Reader) -> Result<Self> {
        Ok(Self)
    }
}

impl Message for NewKeys {
    const MAGIC: u8 = NEWKEYS;
}

message! {
    /// The `SSH_MSG_KEXDH_INIT` message (RFC 4253 §8).
    KexdhInit = 30 {
        /// The client's exchange value.
        e: Mpint,
    }
}

message! {
    /// The `SSH_MSG_KEXDH_REPLY` message (RFC 4253 §8).
    KexdhReply = 31 {
        /// The server's public host key.
        k_s: Vec<u8>,
        /// The server's exchange value.
        f: Mpint,
        /// Signature of the exchange hash.
        signature: Vec<u8>,
    }
}

message! {
    /// The `SSH_MSG_KEX_ECDH_INIT` message (RFC 5656 §4).
    KexEcdhInit = 30 {
        /// The client's ephemeral public key.
        q_c: Vec<u8>,
    }
}

message! {
    /// The `SSH_MSG_KEX_ECDH_REPLY` message (RFC 5656 §4).
    KexEcdhReply = 31 {
        /// The server's public host key.
        k_s: Vec<u8>,
        /// The server's ephemeral public key.
        q_s: Vec<u8>,
        /// Signature of the exchange hash.
        signature: Vec<u8>,
    }
}

message! {
    /// The `SSH_MSG_KEX_DH_GEX_REQUEST` message (RFC 4419 §3).
    KexDhGexRequest = 34 {
        /// Minimal size in bits of an acceptable group.
        min: u32,
        /// Preferred size in bits of the group.
        n: u32,
        /// Maximal size in bits of an acceptable group.
        max: u32,
    }
}

message! {
    /// The `SSH_MSG_KEX_DH_GEX_GROUP` message (RFC 4419 §3).
    KexDhGexGroup = 31 {
        /// The safe prime.
        p: Mpint,
        /// The generator.
        g: Mpint,
    }
}

message! {
    /// The `SSH_MSG_KEX_DH_GEX_INIT` message (RFC 4419 §3).
    KexDhGexInit = 32 {
        /// The client's exchange value.
        e: Mpint,
    }
}

message! {
    /// The `SSH_MSG_KEX_DH_GEX_REPLY` message (RFC 4419 §3).
    KexDhGexReply = 33 {
        /// The server's public host key.
        k_s: Vec<u8>,
        /// The server's exchange value.
        f: Mpint,
        /// Signature of the exchange hash.
        signature: Vec<u8>,
    }
}
