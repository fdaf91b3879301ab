use ssh_encoding::{CheckedSum, Encode, Writer};

use crate::{
    algorithm::HashAlg,
    wire::Mpint,
    Result,
};

/// An exchange value, encoded as a `mpint` by the finite-field methods
/// and as a `string` by the elliptic-curve ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// A finite-field value, `e` or `f`.
    Mpint(Mpint),

    /// An elliptic-curve point, `Q_C` or `Q_S`.
    String(Vec<u8>),
}

impl Encode for Value {
    fn encoded_len(&self) -> ssh_encoding::Result<usize> {
        match self {
            Self::Mpint(mpint) => mpint.encoded_len(),
            Self::String(string) => string.encoded_len(),
        }
    }

    fn encode(&self, writer: &mut impl Writer) -> ssh_encoding::Result<()> {
        match self {
            Self::Mpint(mpint) => mpint.encode(writer),
            Self::String(string) => string.encode(writer),
        }
    }
}

/// The group negociated by the group-exchange methods, along with the request that led to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupParams {
    /// Minimal size requested by the client.
    pub min: u32,

    /// Preferred size requested by the client.
    pub n: u32,

    /// Maximal size requested by the client.
    pub max: u32,

    /// The prime sent by the server.
    pub p: Mpint,

    /// The generator sent by the server.
    pub g: Mpint,
}

impl Encode for GroupParams {
    fn encoded_len(&self) -> ssh_encoding::Result<usize> {
        [12, self.p.encoded_len()?, self.g.encoded_len()?].checked_sum()
    }

    fn encode(&self, writer: &mut impl Writer) -> ssh_encoding::Result<()> {
        self.min.encode(writer)?;
        self.n.encode(writer)?;
        self.max.encode(writer)?;
        self.p.encode(writer)?;
        self.g.encode(writer)
    }
}

/// The transcript of a key-exchange, hashed into the exchange hash `H`.
#[derive(Debug)]
pub struct Exchange<'e> {
    /// Client's identification string, without the line terminator.
    pub v_c: &'e [u8],

    /// Server's identification string, without the line terminator.
    pub v_s: &'e [u8],

    /// Payload of the client's `SSH_MSG_KEXINIT`.
    pub i_c: &'e [u8],

    /// Payload of the server's `SSH_MSG_KEXINIT`.
    pub i_s: &'e [u8],

    /// The server's public host key blob.
    pub k_s: &'e [u8],

    /// The negociated group, for the group-exchange methods.
    pub group: Option<&'e GroupParams>,

    /// The client's exchange value.
    pub q_c: &'e Value,

    /// The server's exchange value.
    pub q_s: &'e Value,

    /// The shared secret.
    pub k: &'e Mpint,
}

/// The transcript, in the order all key-exchange methods agree on.
impl Encode for Exchange<'_> {
    fn encoded_len(&self) -> ssh_encoding::Result<usize> {
        [
            self.v_c.encoded_len()?,
            self.v_s.encoded_len()?,
            self.i_c.encoded_len()?,
            self.i_s.encoded_len()?,
            self.k_s.encoded_len()?,
            self.group.map_or(Ok(0), Encode::encoded_len)?,
            self.q_c.encoded_len()?,
            self.q_s.encoded_len()?,
            self.k.encoded_len()?,
        ]
        .checked_sum()
    }

    fn encode(&self, writer: &mut impl Writer) -> ssh_encoding::Result<()> {
        self.v_c.encode(writer)?;
        self.v_s.encode(writer)?;
        self.i_c.encode(writer)?;
        self.i_s.encode(writer)?;
        self.k_s.encode(writer)?;

        if let Some(group) = self.group {
            group.encode(writer)?;
        }

        self.q_c.encode(writer)?;
        self.q_s.encode(writer)?;
        self.k.encode(writer)
    }
}

impl Exchange<'_> {
    /// Compute the exchange hash with the method's digest.
    pub fn hash(&self, alg: HashAlg) -> Result<Vec<u8>> {
        alg.digest_encoded(self)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use hex_literal::hex;
    use sha2::Digest;

    use super::*;

    fn mpint(bytes: &[u8]) -> Mpint {
        Mpint::from_positive_bytes(bytes).unwrap()
    }

    fn transcript<'e>(q_c: &'e Value, q_s: &'e Value, k: &'e Mpint) -> Exchange<'e> {
        Exchange {
            v_c: b"SSH-2.0-client",
            v_s: b"SSH-2.0-server",
            i_c: &[20, 1, 2, 3],
            i_s: &[20, 4, 5, 6],
            k_s: b"host key",
            group: None,
            q_c,
            q_s,
            k,
        }
    }

    #[test]
    fn hash_is_deterministic() {
        let (q_c, q_s) = (Value::String(vec![1; 32]), Value::String(vec![2; 32]));
        let k = mpint(&[0x80, 0x01]);

        let first = transcript(&q_c, &q_s, &k).hash(HashAlg::Sha256).unwrap();
        let second = transcript(&q_c, &q_s, &k).hash(HashAlg::Sha256).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 32);
        assert_eq!(
            transcript(&q_c, &q_s, &k)
                .hash(HashAlg::Sha512)
                .unwrap()
                .len(),
            64
        );
    }

    #[test]
    fn any_field_changes_the_hash() {
        let (q_c, q_s) = (Value::String(vec![1; 32]), Value::String(vec![2; 32]));
        let k = mpint(&[0x42]);
        let reference = transcript(&q_c, &q_s, &k).hash(HashAlg::Sha1).unwrap();

        let other = Value::String(vec![3; 32]);
        assert_ne!(
            transcript(&other, &q_s, &k).hash(HashAlg::Sha1).unwrap(),
            reference
        );

        let mut swapped = transcript(&q_c, &q_s, &k);
        std::mem::swap(&mut swapped.i_c, &mut swapped.i_s);
        assert_ne!(swapped.hash(HashAlg::Sha1).unwrap(), reference);
    }

    #[test]
    fn fields_are_laid_out_in_order() {
        let (q_c, q_s) = (Value::Mpint(mpint(&[0x05])), Value::Mpint(mpint(&[0xf0])));
        let k = mpint(&[0x01]);
        let group = GroupParams {
            min: 1024,
            n: 2048,
            max: 8192,
            p: mpint(&[0x17]),
            g: mpint(&[0x02]),
        };

        let mut exchange = transcript(&q_c, &q_s, &k);
        exchange.group = Some(&group);

        let mut expected = Vec::new();
        expected.extend_from_slice(b"\0\0\0\x0eSSH-2.0-client");
        expected.extend_from_slice(b"\0\0\0\x0eSSH-2.0-server");
        expected.extend_from_slice(&[0, 0, 0, 4, 20, 1, 2, 3]);
        expected.extend_from_slice(&[0, 0, 0, 4, 20, 4, 5, 6]);
        expected.extend_from_slice(b"\0\0\0\x08host key");
        expected.extend_from_slice(&hex!("00000400 00000800 00002000"));
        expected.extend_from_slice(&[0, 0, 0, 1, 0x17, 0, 0, 0, 1, 0x02]);
        expected.extend_from_slice(&[0, 0, 0, 1, 0x05, 0, 0, 0, 2, 0x00, 0xf0]);
        expected.extend_from_slice(&[0, 0, 0, 1, 0x01]);

        let mut encoded = Vec::new();
        exchange.encode(&mut encoded).unwrap();

        assert_eq!(encoded, expected);
        assert_eq!(exchange.encoded_len().unwrap(), expected.len());
        assert_eq!(
            exchange.hash(HashAlg::Sha256).unwrap(),
            sha2::Sha256::digest(&expected).to_vec()
        );
    }
}
