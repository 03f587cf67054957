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

//! The *DKIM-Signature* header and its tags.
//!
//! Tags are extracted into a map of raw string values, keyed by tag name.
//! Values are not validated on extraction: each tag value is interpreted only
//! where it is used.

mod names;

pub use names::{validate_domain, validate_selector};

use crate::{header::Header, parse, util::CanonicalStr};
use bstr::ByteSlice;
use std::{
    borrow::Cow,
    collections::{hash_map, HashMap},
    error::Error,
    fmt::{self, Display, Formatter},
    str::FromStr,
};

/// The name of a tag in a *DKIM-Signature* header.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum DkimTag {
    V,
    A,
    B,
    Bh,
    C,
    D,
    H,
    I,
    L,
    Q,
    S,
    T,
    X,
    Z,
    Unknown(Box<str>),
}

impl DkimTag {
    /// The tags that every signature must carry, in the order they are checked.
    pub const REQUIRED: [Self; 7] = [Self::V, Self::A, Self::B, Self::Bh, Self::D, Self::H, Self::S];

    pub fn name(&self) -> &str {
        match self {
            Self::V => "v",
            Self::A => "a",
            Self::B => "b",
            Self::Bh => "bh",
            Self::C => "c",
            Self::D => "d",
            Self::H => "h",
            Self::I => "i",
            Self::L => "l",
            Self::Q => "q",
            Self::S => "s",
            Self::T => "t",
            Self::X => "x",
            Self::Z => "z",
            Self::Unknown(name) => name,
        }
    }
}

// Tag names are case-sensitive.
impl From<&str> for DkimTag {
    fn from(name: &str) -> Self {
        match name {
            "v" => Self::V,
            "a" => Self::A,
            "b" => Self::B,
            "bh" => Self::Bh,
            "c" => Self::C,
            "d" => Self::D,
            "h" => Self::H,
            "i" => Self::I,
            "l" => Self::L,
            "q" => Self::Q,
            "s" => Self::S,
            "t" => Self::T,
            "x" => Self::X,
            "z" => Self::Z,
            name => Self::Unknown(name.into()),
        }
    }
}

impl Display for DkimTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The tags of a *DKIM-Signature* header, mapped to their raw values.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DkimTags(HashMap<DkimTag, Box<str>>);

impl DkimTags {
    pub fn get(&self, tag: &DkimTag) -> Option<&str> {
        self.0.get(tag).map(|v| v.as_ref())
    }

    pub fn contains(&self, tag: &DkimTag) -> bool {
        self.0.contains_key(tag)
    }

    /// Inserts a tag, replacing an earlier value for the same tag.
    pub fn insert(&mut self, tag: DkimTag, value: impl Into<Box<str>>) {
        self.0.insert(tag, value.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> hash_map::Iter<'_, DkimTag, Box<str>> {
        self.0.iter()
    }
}

impl<'a> IntoIterator for &'a DkimTags {
    type Item = (&'a DkimTag, &'a Box<str>);
    type IntoIter = hash_map::Iter<'a, DkimTag, Box<str>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// An error indicating that tags were requested from a header that is not a
/// *DKIM-Signature* header.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct NotDkimSignature;

impl Display for NotDkimSignature {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "attempted to extract DKIM tags from a non-DKIM header")
    }
}

impl Error for NotDkimSignature {}

/// Extracts the tags from a *DKIM-Signature* header.
///
/// The header value is taken with all whitespace removed. Empty segments and
/// segments with an empty tag name are ignored. When a tag occurs more than
/// once, the last occurrence wins.
///
/// # Errors
///
/// Fails if the header is not a *DKIM-Signature* header.
///
/// # Examples
///
/// ```
/// use dkim_validator::{signature::{extract_dkim_tags, DkimTag}, Header};
///
/// let header: Header = "DKIM-Signature: v=1; s=sel; d=example.\r\n\tcom;\r\n".parse()?;
///
/// let tags = extract_dkim_tags(&header)?;
///
/// assert_eq!(tags.len(), 3);
/// assert_eq!(tags.get(&DkimTag::D), Some("example.com"));
/// # Ok::<_, Box<dyn std::error::Error>>(())
/// ```
pub fn extract_dkim_tags(header: &Header) -> Result<DkimTags, NotDkimSignature> {
    if !header.is_dkim_signature() {
        return Err(NotDkimSignature);
    }

    let value = header.value_without_spaces();
    let value = value.to_str_lossy();

    let mut tags = DkimTags::default();

    for segment in value.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        let (name, value) = segment.split_once('=').unwrap_or((segment, ""));
        if name.is_empty() {
            continue;
        }
        tags.insert(DkimTag::from(name), value);
    }

    Ok(tags)
}

/// Removes the value of the b= tag from a tag list, leaving `b=` in place.
///
/// The value extends from the `=` to the next `;` or the end of input,
/// including any folding whitespace. Only a tag named exactly `b` is affected.
pub fn strip_b_tag_value(value: &[u8]) -> Cow<'_, [u8]> {
    fn b_tag_prefix_len(s: &[u8]) -> Option<usize> {
        let i = s.find_byte(b'=')?;
        (parse::trim_fws(&s[..i]) == b"b").then_some(i + 1)
    }

    let mut start = 0;

    loop {
        let end = value[start..].find_byte(b';').map_or(value.len(), |i| start + i);

        if let Some(n) = b_tag_prefix_len(&value[start..end]) {
            let mut result = value[..(start + n)].to_vec();
            result.extend(&value[end..]);
            return Cow::Owned(result);
        }

        if end == value.len() {
            return Cow::Borrowed(value);
        }

        start = end + 1;
    }
}

/// A canonicalization algorithm.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum CanonicalizationAlgorithm {
    /// The *simple* canonicalization algorithm.
    #[default]
    Simple,
    /// The *relaxed* canonicalization algorithm.
    Relaxed,
}

impl CanonicalStr for CanonicalizationAlgorithm {
    fn canonical_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Relaxed => "relaxed",
        }
    }
}

impl Display for CanonicalizationAlgorithm {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_str())
    }
}

impl FromStr for CanonicalizationAlgorithm {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simple" => Ok(Self::Simple),
            "relaxed" => Ok(Self::Relaxed),
            _ => Err("unknown canonicalization algorithm"),
        }
    }
}

/// A pair of header/body canonicalization algorithms.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Canonicalization {
    /// The header canonicalization.
    pub header: CanonicalizationAlgorithm,
    /// The body canonicalization.
    pub body: CanonicalizationAlgorithm,
}

impl Display for Canonicalization {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.header, self.body)
    }
}

/// An error that occurs when parsing an a= tag value.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct InvalidAlgorithmSpecifier;

impl Display for InvalidAlgorithmSpecifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "invalid signature algorithm specifier")
    }
}

impl Error for InvalidAlgorithmSpecifier {}

/// A signature algorithm as given in the a= tag, in the form
/// `<key type>-<hash function>`.
///
/// Both parts are names starting with a letter followed by letters or digits.
/// They are not interpreted further; whether they name a supported key type or
/// hash function is checked separately.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct SignatureAlgorithm {
    pub key_type: Box<str>,
    pub hash_function: Box<str>,
}

impl FromStr for SignatureAlgorithm {
    type Err = InvalidAlgorithmSpecifier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        fn is_alg_name(s: &str) -> bool {
            s.starts_with(|c: char| c.is_ascii_alphabetic())
                && s.chars().all(|c| c.is_ascii_alphanumeric())
        }

        match s.split_once('-') {
            Some((key_type, hash_function)) if is_alg_name(key_type) && is_alg_name(hash_function) => {
                Ok(Self {
                    key_type: key_type.into(),
                    hash_function: hash_function.into(),
                })
            }
            _ => Err(InvalidAlgorithmSpecifier),
        }
    }
}

impl Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.key_type, self.hash_function)
    }
}
