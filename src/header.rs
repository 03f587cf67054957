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

//! Representation of a single header field.

use crate::{
    encoded_word,
    parse::{self, CRLF, SP},
    signature::strip_b_tag_value,
};
use bstr::ByteSlice;
use std::{
    borrow::Cow,
    error::Error,
    fmt::{self, Display, Formatter},
    str::FromStr,
};

const DKIM_SIGNATURE: &str = "dkim-signature";

/// An error that occurs when parsing a header field.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum HeaderError {
    Empty,
    FoldedFirstLine,
    InvalidLine,
}

impl Display for HeaderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty header"),
            Self::FoldedFirstLine => write!(f, "invalid header starting with a folded line"),
            Self::InvalidLine => write!(f, "invalid header line"),
        }
    }
}

impl Error for HeaderError {}

/// A header field, with its label, value, and original text.
///
/// A header is constructed from one complete header field, that is, the label
/// line plus any folded continuation lines, each terminated with CRLF.
#[derive(Clone, Eq, PartialEq)]
pub struct Header {
    raw: Box<[u8]>,
    label: Box<str>,
    value: Box<[u8]>,
}

impl Header {
    /// Parses a single header field.
    ///
    /// # Errors
    ///
    /// Fails if the input is empty, if the first line is a continuation line,
    /// or if some line is neither a `label: value` line nor a continuation
    /// line.
    pub fn parse(raw: &[u8]) -> Result<Self, HeaderError> {
        if raw.is_empty() {
            return Err(HeaderError::Empty);
        }

        let mut label = None;
        let mut value = Vec::with_capacity(raw.len());

        for (i, line) in parse::trim_end_line_breaks(raw).split_str(CRLF).enumerate() {
            if line.first().copied().is_some_and(parse::is_wsp) {
                if i == 0 {
                    return Err(HeaderError::FoldedFirstLine);
                }
                value.push(SP);
                value.extend(parse::trim_start_wsp(line));
                value.extend(CRLF);
            } else if i == 0 {
                let (name, rest) = split_label_line(line).ok_or(HeaderError::InvalidLine)?;
                label = Some(name);
                value.extend(rest);
                value.extend(CRLF);
            } else {
                return Err(HeaderError::InvalidLine);
            }
        }

        let label = label.ok_or(HeaderError::InvalidLine)?;
        let value = parse::trim_end_line_breaks(&value);

        Ok(Self {
            raw: raw.into(),
            label: label.into(),
            value: value.into(),
        })
    }

    /// The entire original header text, including label, folding, and final
    /// line break.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// The label as written.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn lower_label(&self) -> String {
        self.label.to_ascii_lowercase()
    }

    /// The header value as found after the colon, with fold points reduced to
    /// a line break and one space.
    pub fn raw_value(&self) -> &[u8] {
        &self.value
    }

    /// The header value with RFC 2047 encoded-words decoded.
    ///
    /// Only values that begin with an encoded-word are decoded. A value whose
    /// encoded-words cannot be decoded is returned as is.
    pub fn decoded_value(&self) -> Cow<'_, [u8]> {
        if !self.value.starts_with(b"=?") {
            return Cow::Borrowed(&self.value);
        }

        match encoded_word::decode(&self.value) {
            Ok(s) => Cow::Owned(s),
            Err(_) => Cow::Borrowed(&self.value),
        }
    }

    /// The decoded header value, unfolded.
    pub fn unfolded_value(&self) -> Vec<u8> {
        parse::unfold(&self.decoded_value())
    }

    /// The decoded and unfolded header value with all spaces and tabs removed.
    pub fn value_without_spaces(&self) -> Vec<u8> {
        let mut value = self.unfolded_value();
        value.retain(|&b| !parse::is_wsp(b));
        value
    }

    pub fn is_dkim_signature(&self) -> bool {
        self.label.eq_ignore_ascii_case(DKIM_SIGNATURE)
    }

    /// Returns the header canonicalized with the *simple* algorithm.
    ///
    /// The *simple* algorithm leaves the header unchanged. If `strip_b_value`
    /// is set and this is a *DKIM-Signature* header, the b= tag value is
    /// removed. When b= is the final tag, the removed value includes the final
    /// line break.
    pub fn simple_canonicalized(&self, strip_b_value: bool) -> Cow<'_, [u8]> {
        if !(strip_b_value && self.is_dkim_signature()) {
            return Cow::Borrowed(&self.raw);
        }

        // The label line was validated during parsing, the colon is present.
        let colon = self.raw.find_byte(b':').map_or(0, |i| i + 1);
        let (label_part, value_part) = self.raw.split_at(colon);

        match strip_b_tag_value(value_part) {
            Cow::Borrowed(_) => Cow::Borrowed(&self.raw),
            Cow::Owned(stripped) => {
                let mut result = label_part.to_vec();
                result.extend(stripped);
                Cow::Owned(result)
            }
        }
    }

    /// Returns the header canonicalized with the *relaxed* algorithm.
    ///
    /// The label is lowercased, whitespace in the value is compressed to single
    /// spaces and trimmed, and the result is terminated with CRLF. If
    /// `strip_b_value` is set and this is a *DKIM-Signature* header, the b=
    /// tag value is removed.
    pub fn relaxed_canonicalized(&self, strip_b_value: bool) -> Vec<u8> {
        let label = self.label.trim().to_ascii_lowercase();
        let value = compress_whitespace(&self.unfolded_value());

        let value = if strip_b_value && self.is_dkim_signature() {
            strip_b_tag_value(&value).into_owned()
        } else {
            value
        };

        let mut result = Vec::with_capacity(label.len() + value.len() + 3);
        result.extend(label.bytes());
        result.push(b':');
        result.extend(value);
        result.extend(CRLF);
        result
    }
}

impl FromStr for Header {
    type Err = HeaderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s.as_bytes())
    }
}

impl fmt::Debug for Header {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Header")
            .field("label", &self.label)
            .field("value", &self.value.as_bstr())
            .finish()
    }
}

// The label is everything before the first colon, with trailing WSP removed. It
// must be a non-empty run of printable ASCII.
fn split_label_line(line: &[u8]) -> Option<(&str, &[u8])> {
    let colon = line.iter().skip(1).position(|&b| b == b':')? + 1;

    let label = parse::trim_end_wsp(&line[..colon]);
    if label.is_empty() || !label.iter().all(|b| b.is_ascii_graphic()) {
        return None;
    }
    let label = std::str::from_utf8(label).ok()?;

    let value = parse::trim_start_wsp(&line[(colon + 1)..]);

    Some((label, value))
}

// Each run of whitespace becomes a single space, and leading and trailing
// whitespace is removed.
fn compress_whitespace(value: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(value.len());

    let mut compressing = false;
    for &b in value.trim_with(|c| c.is_ascii_whitespace()) {
        if b.is_ascii_whitespace() {
            if !compressing {
                result.push(SP);
                compressing = true;
            }
        } else {
            result.push(b);
            compressing = false;
        }
    }

    result
}
