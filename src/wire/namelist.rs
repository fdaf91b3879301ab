use std::fmt;

use super::{Decode, Encode, Reader, Writer};

/// A comma-separated list of algorithm names, in order of preference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameList(Vec<String>);

impl NameList {
    /// Create a [`NameList`] from the provided names.
    pub fn new<T: AsRef<str>>(names: impl IntoIterator<Item = T>) -> Self {
        Self(
            names
                .into_iter()
                .map(|name| name.as_ref().to_string())
                .collect(),
        )
    }

    /// The most preferred name of the list.
    pub fn first(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    /// Whether the list holds `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|item| item == name)
    }

    /// Iterate over the names, in order of preference.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Pick the first name of `self` that `other` also holds,
    /// making `self` the list whose preference wins.
    pub fn preferred_in(&self, other: &Self) -> Option<&str> {
        self.iter().find(|name| other.contains(name))
    }
}

impl From<&str> for NameList {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            Self::default()
        } else {
            Self::new(value.split(','))
        }
    }
}

impl fmt::Display for NameList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(","))
    }
}

impl Encode for NameList {
    fn encoded_len(&self) -> ssh_encoding::Result<usize> {
        self.to_string().encoded_len()
    }

    fn encode(&self, writer: &mut impl Writer) -> ssh_encoding::Result<()> {
        self.to_string().encode(writer)
    }
}

/// A `name-list` is a single `string`, names being US-ASCII and comma-separated.
impl Decode for NameList {
    type Error = ssh_encoding::Error;

    fn decode(reader: &mut impl Reader) -> ssh_encoding::Result<Self> {
        let names = String::decode(reader)?;

        if !names.is_ascii() {
            return Err(ssh_encoding::Error::CharacterEncoding);
        }

        Ok(Self::from(names.as_str()))
    }
}
