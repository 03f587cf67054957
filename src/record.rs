// dkim-validator – validation of DKIM signatures in email messages
// Copyright © 2022–2023 David Bürgin <dbuergin@gluet.ch>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later
// version.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.

//! DKIM public key records.
//!
//! See RFC 6376, section 3.6.1.

use std::{
    collections::HashMap,
    error::Error,
    fmt::{self, Display, Formatter},
    str::FromStr,
};

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum KeyRecordError {
    InvalidFormat,
}

impl Display for KeyRecordError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidFormat => write!(f, "DKIM TXT record has invalid format"),
        }
    }
}

impl Error for KeyRecordError {}

/// A DKIM public key record, as a map of tag names to raw values.
///
/// The record is parsed permissively: any `tag=value` pairs are accepted, and
/// values are interpreted only by the accessor methods.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct KeyRecord(HashMap<Box<str>, Box<str>>);

impl KeyRecord {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(|v| v.as_ref())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The v= tag, the record version.
    pub fn version(&self) -> Option<&str> {
        self.get("v")
    }

    /// The h= tag, the acceptable hash algorithms.
    pub fn hash_algorithms(&self) -> Option<Vec<&str>> {
        self.get("h").map(parse_colon_separated_tag_value)
    }

    /// The k= tag, the key type.
    pub fn key_type(&self) -> Option<&str> {
        self.get("k")
    }

    /// The s= tag, the service types the key may be used for.
    pub fn service_types(&self) -> Option<Vec<&str>> {
        self.get("s").map(parse_colon_separated_tag_value)
    }

    /// The n= tag, notes.
    pub fn notes(&self) -> Option<&str> {
        self.get("n")
    }

    /// The p= tag, the Base64-encoded public key data. An empty value means
    /// that the key has been revoked.
    pub fn public_key(&self) -> Option<&str> {
        self.get("p")
    }
}

impl FromStr for KeyRecord {
    type Err = KeyRecordError;

    /// Parses the text of a DNS TXT record.
    ///
    /// The record is split on `;`; each segment is trimmed, and empty segments
    /// are skipped. Every other segment must be of the form `tag=value`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut tags = HashMap::new();

        for segment in s.trim().split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let (name, value) = segment.split_once('=').ok_or(KeyRecordError::InvalidFormat)?;
            tags.insert(name.trim().into(), value.trim().into());
        }

        Ok(Self(tags))
    }
}

fn parse_colon_separated_tag_value(value: &str) -> Vec<&str> {
    value.split(':').map(str::trim).collect()
}
