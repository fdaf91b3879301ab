use std::sync::Arc;

use dashmap::DashSet;

use crate::{Error, Result};

/// The set of message numbers currently awaited on a stream.
#[derive(Debug, Clone, Default)]
pub struct Interests(Arc<DashSet<u8>>);

impl Interests {
    /// Register an interest for message `magic`, released when the returned guard drops.
    pub fn register(&self, magic: u8) -> Result<Interest> {
        if !self.0.insert(magic) {
            return Err(Error::KexInProgress);
        }

        tracing::trace!("Registered interest for message #{magic}");

        Ok(Interest {
            magic,
            interests: self.0.clone(),
        })
    }

    /// Whether some task awaits message `magic`.
    pub fn contains(&self, magic: u8) -> bool {
        self.0.contains(&magic)
    }
}

/// A registered interest in a message number.
#[derive(Debug)]
pub struct Interest {
    magic: u8,
    interests: Arc<DashSet<u8>>,
}

impl Interest {
    /// The awaited message number.
    pub fn magic(&self) -> u8 {
        self.magic
    }
}

impl Drop for Interest {
    fn drop(&mut self) {
        if self.interests.remove(&self.magic).is_some() {
            tracing::trace!("Unregistered interest for message #{}", self.magic);
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn interest_is_scoped() {
        let interests = Interests::default();

        let interest = interests.register(31).unwrap();
        assert!(interests.contains(31));
        assert_eq!(interest.magic(), 31);

        drop(interest);
        assert!(!interests.contains(31));
        assert!(interests.register(31).is_ok());
    }

    #[test]
    fn double_registration_is_refused() {
        let interests = Interests::default();

        let _interest = interests.register(20).unwrap();

        assert!(matches!(interests.register(20), Err(Error::KexInProgress)));
        assert!(interests.register(21).is_ok());
    }
}
