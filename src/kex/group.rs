use hex_literal::hex;
use num_bigint::{BigUint, RandBigInt};

use zeroize::Zeroizing;

use crate::{algorithm::HashAlg, wire::Mpint, Error, Result};

/// Oakley group 2 from RFC 2409, 1024 bits.
const GROUP1: [u8; 128] = hex!(
    "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD129024E088A67CC74"
    "020BBEA63B139B22514A08798E3404DDEF9519B3CD3A431B302B0A6DF25F1437"
    "4FE1356D6D51C245E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED"
    "EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE65381FFFFFFFFFFFFFFFF"
);

/// MODP group 14 from RFC 3526, 2048 bits.
const GROUP14: [u8; 256] = hex!(
    "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD129024E088A67CC74"
    "020BBEA63B139B22514A08798E3404DDEF9519B3CD3A431B302B0A6DF25F1437"
    "4FE1356D6D51C245E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED"
    "EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3DC2007CB8A163BF05"
    "98DA48361C55D39A69163FA8FD24CF5F83655D23DCA3AD961C62F356208552BB"
    "9ED529077096966D670C354E4ABC9804F1746C08CA18217C32905E462E36CE3B"
    "E39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9DE2BCBF695581718"
    "3995497CEA956AE515D2261898FA051015728E5A8AACAA68FFFFFFFFFFFFFFFF"
);

/// MODP group 16 from RFC 3526, 4096 bits.
const GROUP16: [u8; 512] = hex!(
    "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD129024E088A67CC74"
    "020BBEA63B139B22514A08798E3404DDEF9519B3CD3A431B302B0A6DF25F1437"
    "4FE1356D6D51C245E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED"
    "EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3DC2007CB8A163BF05"
    "98DA48361C55D39A69163FA8FD24CF5F83655D23DCA3AD961C62F356208552BB"
    "9ED529077096966D670C354E4ABC9804F1746C08CA18217C32905E462E36CE3B"
    "E39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9DE2BCBF695581718"
    "3995497CEA956AE515D2261898FA051015728E5A8AAAC42DAD33170D04507A33"
    "A85521ABDF1CBA64ECFB850458DBEF0A8AEA71575D060C7DB3970F85A6E1E4C7"
    "ABF5AE8CDB0933D71E8C94E04A25619DCEE3D2261AD2EE6BF12FFA06D98A0864"
    "D87602733EC86A64521F2B18177B200CBBE117577A615D6C770988C0BAD946E2"
    "08E24FA074E5AB3143DB5BFCE0FD108E4B82D120A92108011A723C12A787E6D7"
    "88719A10BDBA5B2699C327186AF4E23C1A946834B6150BDA2583E9CA2AD44CE8"
    "DBBBC2DB04DE8EF92E8EFC141FBECAA6287C59474E6BC05D99B2964FA090C3A2"
    "233BA186515BE7ED1F612970CEE2D7AFB81BDD762170481CD0069127D5B05AA9"
    "93B4EA988D8FDDC186FFB7DC90A6C08F4DF435C934063199FFFFFFFFFFFFFFFF"
);

/// MODP group 18 from RFC 3526, 8192 bits.
const GROUP18: [u8; 1024] = hex!(
    "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD129024E088A67CC74"
    "020BBEA63B139B22514A08798E3404DDEF9519B3CD3A431B302B0A6DF25F1437"
    "4FE1356D6D51C245E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED"
    "EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3DC2007CB8A163BF05"
    "98DA48361C55D39A69163FA8FD24CF5F83655D23DCA3AD961C62F356208552BB"
    "9ED529077096966D670C354E4ABC9804F1746C08CA18217C32905E462E36CE3B"
    "E39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9DE2BCBF695581718"
    "3995497CEA956AE515D2261898FA051015728E5A8AAAC42DAD33170D04507A33"
    "A85521ABDF1CBA64ECFB850458DBEF0A8AEA71575D060C7DB3970F85A6E1E4C7"
    "ABF5AE8CDB0933D71E8C94E04A25619DCEE3D2261AD2EE6BF12FFA06D98A0864"
    "D87602733EC86A64521F2B18177B200CBBE117577A615D6C770988C0BAD946E2"
    "08E24FA074E5AB3143DB5BFCE0FD108E4B82D120A92108011A723C12A787E6D7"
    "88719A10BDBA5B2699C327186AF4E23C1A946834B6150BDA2583E9CA2AD44CE8"
    "DBBBC2DB04DE8EF92E8EFC141FBECAA6287C59474E6BC05D99B2964FA090C3A2"
    "233BA186515BE7ED1F612970CEE2D7AFB81BDD762170481CD0069127D5B05AA9"
    "93B4EA988D8FDDC186FFB7DC90A6C08F4DF435C93402849236C3FAB4D27C7026"
    "C1D4DCB2602646DEC9751E763DBA37BDF8FF9406AD9E530EE5DB382F413001AE"
    "B06A53ED9027D831179727B0865A8918DA3EDBEBCF9B14ED44CE6CBACED4BB1B"
    "DB7F1447E6CC254B332051512BD7AF426FB8F401378CD2BF5983CA01C64B92EC"
    "F032EA15D1721D03F482D7CE6E74FEF6D55E702F46980C82B5A84031900B1C9E"
    "59E7C97FBEC7E8F323A97A7E36CC88BE0F1D45B7FF585AC54BD407B22B4154AA"
    "CC8F6D7EBF48E1D814CC5ED20F8037E0A79715EEF29BE32806A1D58BB7C5DA76"
    "F550AA3D8A1FBFF0EB19CCB1A313D55CDA56C9EC2EF29632387FE8D76E3C0468"
    "043E8F663F4860EE12BF2D5B0B7474D6E694F91E6DBE115974A3926F12FEE5E4"
    "38777CB6A932DF8CD8BEC4D073B931BA3BC832B68D9DD300741FA7BF8AFC47ED"
    "2576F6936BA424663AAB639C5AE4F5683423B4742BF1C978238F16CBE39D652D"
    "E3FDB8BEFC848AD922222E04A4037C0713EB57A81A23F0C73473FC646CEA306B"
    "4BCBC8862F8385DDFA9D4B7FA2C087E879683303ED5BDD3A062B3CF5B3A278A6"
    "6D2A13F83F44F82DDF310EE074AB6A364597E899A0255DC164F31CC50846851D"
    "F9AB48195DED7EA1B1D510BD7EE74D73FAF36BC31ECFA268359046F4EB879F92"
    "4009438B481C6CD7889A002ED5EE382BC9190DA6FC026E479558E4475677E9AA"
    "9E3050E2765694DFC81F56E880B96E7160C980DD98EDD3DFFFFFFFFFFFFFFFFF"
);

/// A prime field and its generator, for the finite-field Diffie-Hellman methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    /// The safe prime.
    pub p: BigUint,

    /// The generator.
    pub g: BigUint,
}

impl Group {
    /// The 1024-bit group of `diffie-hellman-group1-sha1`.
    pub fn group1() -> Self {
        Self::from_prime(&GROUP1)
    }

    /// The 2048-bit group of `diffie-hellman-group14-*`.
    pub fn group14() -> Self {
        Self::from_prime(&GROUP14)
    }

    /// The 4096-bit group of `diffie-hellman-group16-sha512`.
    pub fn group16() -> Self {
        Self::from_prime(&GROUP16)
    }

    /// The 8192-bit group of `diffie-hellman-group18-sha512`.
    pub fn group18() -> Self {
        Self::from_prime(&GROUP18)
    }

    fn from_prime(p: &[u8]) -> Self {
        Self {
            p: BigUint::from_bytes_be(p),
            g: BigUint::from(2u8),
        }
    }

    /// Size of the prime in bits.
    pub fn bits(&self) -> u64 {
        self.p.bits()
    }

    /// Refuse exchange values outside of `(1, p - 1)`, which would
    /// confine the shared secret to a trivial subgroup.
    pub(crate) fn check(&self, value: &BigUint) -> Result<()> {
        let one = BigUint::from(1u8);

        if value <= &one || value >= &(&self.p - &one) {
            return Err(Error::KexError("exchange value out of range"));
        }

        Ok(())
    }

    /// Generate a private exponent sized after `hash`, along with its exchange value.
    pub(crate) fn keypair(&self, hash: HashAlg) -> (BigUint, BigUint) {
        let bits = (hash.size() as u64 * 16)
            .max(1024)
            .min(self.bits().saturating_sub(1));
        let mut rng = rand::thread_rng();

        loop {
            let x = rng.gen_biguint(bits);
            let e = self.g.modpow(&x, &self.p);

            if x > BigUint::from(1u8) && self.check(&e).is_ok() {
                break (x, e);
            }
        }
    }

    /// Compute the shared secret from our private exponent `x` and the peer's value.
    pub(crate) fn agree(&self, x: &BigUint, peer: &BigUint) -> Result<Mpint> {
        self.check(peer)?;

        let secret = Zeroizing::new(peer.modpow(x, &self.p).to_bytes_be());

        Ok(Mpint::from_positive_bytes(&secret)?)
    }
}

/// Encode a non-negative integer as a `mpint`.
pub(crate) fn mpint(value: &BigUint) -> Result<Mpint> {
    Ok(Mpint::from_positive_bytes(&value.to_bytes_be())?)
}

/// Decode a `mpint` received from the peer, refusing negative values.
pub(crate) fn biguint(value: &Mpint) -> Result<BigUint> {
    if value.as_bytes().is_empty() {
        return Ok(BigUint::default());
    }

    value
        .as_positive_bytes()
        .map(BigUint::from_bytes_be)
        .ok_or(Error::KexError("negative exchange value"))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Group::group1(), 1024)]
    #[case(Group::group14(), 2048)]
    #[case(Group::group16(), 4096)]
    #[case(Group::group18(), 8192)]
    fn primes_have_their_nominal_size(#[case] group: Group, #[case] bits: u64) {
        assert_eq!(group.bits(), bits);
        assert_eq!(group.g, BigUint::from(2u8));
        assert!(group.p.bit(0));
    }

    #[test]
    fn trivial_values_are_refused() {
        let group = Group::group14();
        let one = BigUint::from(1u8);

        assert!(group.check(&BigUint::default()).is_err());
        assert!(group.check(&one).is_err());
        assert!(group.check(&(&group.p - &one)).is_err());
        assert!(group.check(&group.p).is_err());
        assert!(group.check(&BigUint::from(2u8)).is_ok());
    }

    #[test]
    fn mpints_convert_both_ways() {
        let zero = BigUint::default();
        assert!(mpint(&zero).unwrap().as_bytes().is_empty());
        assert_eq!(biguint(&mpint(&zero).unwrap()).unwrap(), zero);

        let high = BigUint::from(0x80u8);
        assert_eq!(mpint(&high).unwrap().as_bytes(), [0x00, 0x80]);
        assert_eq!(biguint(&mpint(&high).unwrap()).unwrap(), high);

        let negative = Mpint::from_bytes(&[0xff, 0x01]).unwrap();
        assert!(biguint(&negative).is_err());
    }

    #[test]
    fn both_sides_agree() {
        let group = Group::group1();

        let (x, e) = group.keypair(HashAlg::Sha1);
        let (y, f) = group.keypair(HashAlg::Sha1);

        assert_eq!(group.agree(&x, &f).unwrap(), group.agree(&y, &e).unwrap());
    }
}
