//! The SSH binary representation of data types, as described in RFC 4251 §5,
//! and the messages of the key-exchange built upon them.
//!
//! The primitive types are encoded with [`ssh_encoding`], and multiple precision
//! integers are [`ssh_key::Mpint`]s.

#[doc(no_inline)]
pub use ssh_encoding::{Decode, Encode, Reader, Writer};
#[doc(no_inline)]
pub use ssh_key::Mpint;

mod namelist;
pub use namelist::NameList;

pub mod message;
