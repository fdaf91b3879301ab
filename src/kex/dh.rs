//! Finite-field Diffie-Hellman, over fixed groups (RFC 4253 §8, RFC 8268)
//! or over a group provided by the server (RFC 4419).

use num_bigint::BigUint;

use super::{
    exchange::{GroupParams, Value},
    group::{biguint, mpint, Group},
    method::{Agreed, Handled, KexMethod},
    Role, Step,
};
use crate::{
    algorithm::HashAlg,
    wire::message::{
        KexDhGexGroup, KexDhGexInit, KexDhGexReply, KexDhGexRequest, KexdhInit, KexdhReply,
        Message,
    },
    Error, Result,
};

/// Group sizes, in bits, requested by the client for the group-exchange methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GexParams {
    /// Minimal size of an acceptable group.
    pub min: u32,

    /// Preferred size of the group.
    pub n: u32,

    /// Maximal size of an acceptable group.
    pub max: u32,
}

impl Default for GexParams {
    fn default() -> Self {
        Self {
            min: 1024,
            n: 1024,
            max: 8192,
        }
    }
}

impl GexParams {
    fn validate(&self) -> Result<()> {
        if self.min > self.n || self.n > self.max {
            return Err(Error::KexError("inconsistent group-exchange request"));
        }

        Ok(())
    }

    /// Pick the smallest built-in group at least as large as the preferred size,
    /// or the largest one that fits the requested bounds.
    fn choose(&self) -> Result<Group> {
        self.validate()?;

        let (min, n, max) = (self.min as u64, self.n as u64, self.max as u64);
        let candidates: Vec<_> = [Group::group14(), Group::group16(), Group::group18()]
            .into_iter()
            .filter(|group| (min..=max).contains(&group.bits()))
            .collect();

        candidates
            .iter()
            .find(|group| group.bits() >= n)
            .or(candidates.last())
            .cloned()
            .ok_or(Error::KexError("no group fits the requested sizes"))
    }

    /// Check the group sent by the server against our request.
    fn accept(&self, group: &Group) -> Result<()> {
        if !(self.min as u64..=self.max as u64).contains(&group.bits()) {
            return Err(Error::KexError("group size outside of the requested bounds"));
        }

        if !group.p.bit(0) {
            return Err(Error::KexError("group modulus is even"));
        }

        group.check(&group.g)
    }
}

/// The key-pair generated for one side of the exchange.
struct KeyPair {
    x: BigUint,
    e: BigUint,
}

/// Diffie-Hellman over a fixed group.
pub(crate) struct Dh {
    group: Group,
    hash: HashAlg,
    own: Option<KeyPair>,
}

impl Dh {
    pub fn new(group: Group, hash: HashAlg) -> Self {
        Self {
            group,
            hash,
            own: None,
        }
    }
}

impl KexMethod for Dh {
    fn start(&mut self, role: Role) -> Result<Step> {
        match role {
            Role::Client => {
                let (x, e) = self.group.keypair(self.hash);
                let payload = KexdhInit {
                    e: mpint(&e)?,
                }
                .to_payload()?;

                self.own = Some(KeyPair { x, e });

                Ok(Step::Send {
                    payload,
                    expect: KexdhReply::MAGIC,
                })
            }
            Role::Server => Ok(Step::Await {
                expect: KexdhInit::MAGIC,
            }),
        }
    }

    fn handle(&mut self, role: Role, payload: &[u8]) -> Result<Handled> {
        match role {
            Role::Client => {
                let KexdhReply { k_s, f, signature } = KexdhReply::from_payload(payload)?;
                let KeyPair { x, e } = self
                    .own
                    .take()
                    .ok_or(Error::KexError("reply received before our init"))?;

                let f = biguint(&f)?;
                let secret = self.group.agree(&x, &f)?;

                Ok(Handled::Agreed(
                    Agreed::new(
                        Value::Mpint(mpint(&e)?),
                        Value::Mpint(mpint(&f)?),
                        secret,
                    )
                    .signed(k_s, signature),
                ))
            }
            Role::Server => {
                let KexdhInit { e } = KexdhInit::from_payload(payload)?;

                let e = biguint(&e)?;
                self.group.check(&e)?;

                let (y, f) = self.group.keypair(self.hash);
                let secret = self.group.agree(&y, &e)?;
                let agreed = Agreed::new(
                    Value::Mpint(mpint(&e)?),
                    Value::Mpint(mpint(&f)?),
                    secret,
                );

                self.own = Some(KeyPair { x: y, e: f });

                Ok(Handled::Agreed(agreed))
            }
        }
    }

    fn reply(&self, k_s: &[u8], signature: &[u8]) -> Result<Vec<u8>> {
        let own = self
            .own
            .as_ref()
            .ok_or(Error::KexError("no exchange value to reply with"))?;

        KexdhReply {
            k_s: k_s.to_vec(),
            f: mpint(&own.e)?,
            signature: signature.to_vec(),
        }
        .to_payload()
    }
}

/// Diffie-Hellman over a group negociated with the server.
pub(crate) struct GroupExchange {
    hash: HashAlg,

    /// Our request as a client, or the peer's as a server.
    params: Option<GexParams>,
    group: Option<Group>,
    own: Option<KeyPair>,
}

impl GroupExchange {
    pub fn new(params: GexParams, hash: HashAlg) -> Self {
        Self {
            hash,
            params: Some(params),
            group: None,
            own: None,
        }
    }

    fn transcript(&self) -> Result<GroupParams> {
        let (Some(params), Some(group)) = (&self.params, &self.group) else {
            return Err(Error::KexError("group was not negociated"));
        };

        Ok(GroupParams {
            min: params.min,
            n: params.n,
            max: params.max,
            p: mpint(&group.p)?,
            g: mpint(&group.g)?,
        })
    }
}

impl KexMethod for GroupExchange {
    fn start(&mut self, role: Role) -> Result<Step> {
        match role {
            Role::Client => {
                let params = self
                    .params
                    .ok_or(Error::KexError("missing group-exchange request"))?;
                params.validate()?;

                Ok(Step::Send {
                    payload: KexDhGexRequest {
                        min: params.min,
                        n: params.n,
                        max: params.max,
                    }
                    .to_payload()?,
                    expect: KexDhGexGroup::MAGIC,
                })
            }
            Role::Server => {
                self.params = None;

                Ok(Step::Await {
                    expect: KexDhGexRequest::MAGIC,
                })
            }
        }
    }

    fn handle(&mut self, role: Role, payload: &[u8]) -> Result<Handled> {
        match (role, &self.group) {
            (Role::Client, None) => {
                let KexDhGexGroup { p, g } = KexDhGexGroup::from_payload(payload)?;
                let params = self
                    .params
                    .ok_or(Error::KexError("missing group-exchange request"))?;

                let group = Group {
                    p: biguint(&p)?,
                    g: biguint(&g)?,
                };
                params.accept(&group)?;

                tracing::debug!("Server provided a {}-bit group", group.bits());

                let (x, e) = group.keypair(self.hash);
                let payload = KexDhGexInit {
                    e: mpint(&e)?,
                }
                .to_payload()?;

                self.group = Some(group);
                self.own = Some(KeyPair { x, e });

                Ok(Handled::Next(Step::Send {
                    payload,
                    expect: KexDhGexReply::MAGIC,
                }))
            }
            (Role::Client, Some(group)) => {
                let KexDhGexReply { k_s, f, signature } = KexDhGexReply::from_payload(payload)?;
                let KeyPair { x, e } = self
                    .own
                    .take()
                    .ok_or(Error::KexError("reply received before our init"))?;

                let f = biguint(&f)?;
                let secret = group.agree(&x, &f)?;

                Ok(Handled::Agreed(
                    Agreed::new(
                        Value::Mpint(mpint(&e)?),
                        Value::Mpint(mpint(&f)?),
                        secret,
                    )
                    .signed(k_s, signature)
                    .with_group(self.transcript()?),
                ))
            }
            (Role::Server, None) => {
                let KexDhGexRequest { min, n, max } = KexDhGexRequest::from_payload(payload)?;
                let params = GexParams { min, n, max };

                let group = params.choose()?;
                let payload = KexDhGexGroup {
                    p: mpint(&group.p)?,
                    g: mpint(&group.g)?,
                }
                .to_payload()?;

                tracing::debug!(
                    "Client requested a group in {min}..={max} bits, sending {} bits",
                    group.bits()
                );

                self.params = Some(params);
                self.group = Some(group);

                Ok(Handled::Next(Step::Send {
                    payload,
                    expect: KexDhGexInit::MAGIC,
                }))
            }
            (Role::Server, Some(group)) => {
                let KexDhGexInit { e } = KexDhGexInit::from_payload(payload)?;

                let e = biguint(&e)?;
                group.check(&e)?;

                let (y, f) = group.keypair(self.hash);
                let secret = group.agree(&y, &e)?;
                let agreed = Agreed::new(
                    Value::Mpint(mpint(&e)?),
                    Value::Mpint(mpint(&f)?),
                    secret,
                )
                .with_group(self.transcript()?);

                self.own = Some(KeyPair { x: y, e: f });

                Ok(Handled::Agreed(agreed))
            }
        }
    }

    fn reply(&self, k_s: &[u8], signature: &[u8]) -> Result<Vec<u8>> {
        let own = self
            .own
            .as_ref()
            .ok_or(Error::KexError("no exchange value to reply with"))?;

        KexDhGexReply {
            k_s: k_s.to_vec(),
            f: mpint(&own.e)?,
            signature: signature.to_vec(),
        }
        .to_payload()
    }
}
