use std::{fmt, str::FromStr};

use crate::{Error, Result};

/// The identification string a side sends before the binary protocol starts,
/// `SSH-protoversion-softwareversion SP comments`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Id {
    protoversion: String,
    softwareversion: String,
    comments: Option<String>,
}

impl Id {
    /// Create an [`Id`] for the `2.0` version of the protocol.
    pub fn v2(softwareversion: impl Into<String>, comments: Option<impl Into<String>>) -> Self {
        Self {
            protoversion: "2.0".into(),
            softwareversion: softwareversion.into(),
            comments: comments.map(Into::into),
        }
    }

    /// The protocol version.
    pub fn protoversion(&self) -> &str {
        &self.protoversion
    }

    /// The software version.
    pub fn softwareversion(&self) -> &str {
        &self.softwareversion
    }

    /// The optional comments.
    pub fn comments(&self) -> Option<&str> {
        self.comments.as_deref()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SSH-{}-{}", self.protoversion, self.softwareversion)?;

        if let Some(comments) = &self.comments {
            write!(f, " {comments}")?;
        }

        Ok(())
    }
}

impl FromStr for Id {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let line = s.trim_end_matches(['\r', '\n']);
        let rest = line
            .strip_prefix("SSH-")
            .ok_or(Error::KexError("identification string lacks the `SSH-` prefix"))?;

        let (id, comments) = match rest.split_once(' ') {
            Some((id, comments)) => (id, Some(comments.to_string())),
            None => (rest, None),
        };
        let (protoversion, softwareversion) = id
            .split_once('-')
            .ok_or(Error::KexError("identification string lacks a software version"))?;

        if !matches!(protoversion, "2.0" | "1.99") {
            return Err(Error::KexError("unsupported protocol version"));
        }

        Ok(Self {
            protoversion: protoversion.into(),
            softwareversion: softwareversion.into(),
            comments,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn parses_openssh_banner() {
        let id: Id = "SSH-2.0-OpenSSH_9.6p1 Ubuntu-3ubuntu13\r\n".parse().unwrap();

        assert_eq!(id.softwareversion(), "OpenSSH_9.6p1");
        assert_eq!(id.comments(), Some("Ubuntu-3ubuntu13"));
        assert_eq!(id.to_string(), "SSH-2.0-OpenSSH_9.6p1 Ubuntu-3ubuntu13");
    }

    #[test]
    fn refuses_version_one() {
        assert!("SSH-1.5-old".parse::<Id>().is_err());
    }
}
