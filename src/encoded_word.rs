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

//! Decoding of MIME encoded-words in header values.
//!
//! See RFC 2047. Only the charsets UTF-8, US-ASCII, and ISO-8859-1 are decoded
//! exactly; text in any other charset is decoded as UTF-8 with replacement
//! characters.

use crate::parse::is_fws;
use base64ct::{Base64, Base64Unpadded, Encoding};
use bstr::ByteSlice;
use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};
use tracing::warn;

/// An error that occurs when an encoded-word carries ill-formed encoded text.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct EncodedWordError;

impl Display for EncodedWordError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "failed to decode encoded-word")
    }
}

impl Error for EncodedWordError {}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Encoding2047 {
    Q,
    B,
}

struct EncodedWord<'a> {
    charset: &'a str,
    encoding: Encoding2047,
    text: &'a [u8],
}

/// Decodes all encoded-words in the given header value.
///
/// Decoded text is UTF-8. Bytes outside encoded-words are kept as they are,
/// except linear whitespace that separates two adjacent encoded-words, which is
/// dropped. A sequence `=?` that does not start a well-formed encoded-word is
/// kept as literal text.
pub fn decode(value: &[u8]) -> Result<Vec<u8>, EncodedWordError> {
    let mut result = Vec::with_capacity(value.len());

    let mut rest = value;
    let mut pending_space: &[u8] = &[];
    let mut after_word = false;

    while !rest.is_empty() {
        if let Some((word, len)) = strip_encoded_word(rest) {
            let text = decode_word(&word)?;
            // whitespace between two encoded-words is not displayed
            if !after_word {
                result.extend(pending_space);
            }
            pending_space = &[];
            result.extend(text.as_bytes());
            rest = &rest[len..];
            after_word = true;
        } else {
            let next_ws = rest.iter().position(|&b| is_fws(b));
            match next_ws {
                Some(0) => {
                    let n = rest.iter().position(|&b| !is_fws(b)).unwrap_or(rest.len());
                    result.extend(pending_space);
                    pending_space = &rest[..n];
                    rest = &rest[n..];
                }
                _ => {
                    result.extend(pending_space);
                    pending_space = &[];
                    let n = next_ws.unwrap_or(rest.len());
                    result.extend(&rest[..n]);
                    rest = &rest[n..];
                    after_word = false;
                }
            }
        }
    }

    result.extend(pending_space);

    Ok(result)
}

// encoded-word = "=?" charset "?" encoding "?" encoded-text "?="
fn strip_encoded_word(input: &[u8]) -> Option<(EncodedWord<'_>, usize)> {
    let s = input.strip_prefix(b"=?")?;

    let charset_len = s.iter().position(|&b| b == b'?')?;
    let charset = std::str::from_utf8(&s[..charset_len]).ok()?;
    if charset.is_empty() || !charset.bytes().all(|b| b.is_ascii_graphic()) {
        return None;
    }
    let s = &s[(charset_len + 1)..];

    let encoding = match s.first()? {
        b'Q' | b'q' => Encoding2047::Q,
        b'B' | b'b' => Encoding2047::B,
        _ => return None,
    };
    let s = s.get(1..)?.strip_prefix(b"?")?;

    let text_len = s.find(b"?=")?;
    let text = &s[..text_len];
    if text.iter().any(|&b| is_fws(b)) {
        return None;
    }

    let len = 2 + charset_len + 1 + 2 + text_len + 2;

    Some((EncodedWord { charset, encoding, text }, len))
}

fn decode_word(word: &EncodedWord<'_>) -> Result<String, EncodedWordError> {
    let bytes = match word.encoding {
        Encoding2047::Q => decode_q(word.text)?,
        Encoding2047::B => Base64::decode_vec(&word.text.to_str_lossy())
            .or_else(|_| Base64Unpadded::decode_vec(&word.text.to_str_lossy()))
            .map_err(|_| EncodedWordError)?,
    };

    // RFC 2231 allows a language suffix: charset*language
    let charset = word.charset.split('*').next().unwrap_or_default();

    if charset.eq_ignore_ascii_case("iso-8859-1") || charset.eq_ignore_ascii_case("latin1") {
        Ok(bytes.iter().map(|&b| char::from(b)).collect())
    } else {
        if !(charset.eq_ignore_ascii_case("utf-8") || charset.eq_ignore_ascii_case("us-ascii")) {
            warn!(%charset, "decoding encoded-word in unsupported charset as UTF-8");
        }
        match String::from_utf8(bytes) {
            Ok(s) => Ok(s),
            Err(e) => {
                warn!(%charset, "invalid bytes in encoded-word replaced");
                Ok(String::from_utf8_lossy(e.as_bytes()).into_owned())
            }
        }
    }
}

fn decode_q(text: &[u8]) -> Result<Vec<u8>, EncodedWordError> {
    let mut result = Vec::with_capacity(text.len());

    let mut bytes = text.iter();
    while let Some(&b) = bytes.next() {
        match b {
            b'_' => result.push(b' '),
            b'=' => {
                let d1 = bytes.next().filter(|c| c.is_ascii_hexdigit()).ok_or(EncodedWordError)?;
                let d2 = bytes.next().filter(|c| c.is_ascii_hexdigit()).ok_or(EncodedWordError)?;
                result.push(u8_from_digits(*d1, *d2));
            }
            b => result.push(b),
        }
    }

    Ok(result)
}

fn u8_from_digits(c1: u8, c2: u8) -> u8 {
    fn to_u8(c: u8) -> u8 {
        match c {
            b'0'..=b'9' => c - b'0',
            b'A'..=b'F' => c - b'A' + 0xa,
            b'a'..=b'f' => c - b'a' + 0xa,
            _ => unreachable!(),
        }
    }

    debug_assert!(c1.is_ascii_hexdigit() && c2.is_ascii_hexdigit());

    to_u8(c1) * 0x10 + to_u8(c2)
}
