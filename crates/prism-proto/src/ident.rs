// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Script and asset identifiers.
//!
//! Hosts hand identifiers over as raw bytes, symbolic text, or integers.
//! All of them coerce to wire bytes through their UTF-8 textual form, so
//! `Ident::from("overlay")` and `Ident::Bytes(b"overlay".to_vec())` name
//! the same script. Empty identifiers are legal.

/// A script/asset identifier as supplied by the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ident {
    Bytes(Vec<u8>),
    Text(String),
    Int(i64),
}

impl Ident {
    /// The wire form of this identifier.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Ident::Bytes(b) => b.clone(),
            Ident::Text(s) => s.as_bytes().to_vec(),
            Ident::Int(i) => i.to_string().into_bytes(),
        }
    }
}

impl From<&str> for Ident {
    fn from(s: &str) -> Self {
        Ident::Text(s.to_string())
    }
}

impl From<String> for Ident {
    fn from(s: String) -> Self {
        Ident::Text(s)
    }
}

impl From<Vec<u8>> for Ident {
    fn from(b: Vec<u8>) -> Self {
        Ident::Bytes(b)
    }
}

impl From<&[u8]> for Ident {
    fn from(b: &[u8]) -> Self {
        Ident::Bytes(b.to_vec())
    }
}

impl From<i64> for Ident {
    fn from(i: i64) -> Self {
        Ident::Int(i)
    }
}

impl From<u32> for Ident {
    fn from(i: u32) -> Self {
        Ident::Int(i64::from(i))
    }
}
