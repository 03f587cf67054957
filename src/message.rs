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

//! Email message parsing.

use crate::{
    header::{Header, HeaderError},
    parse::{self, CRLF},
};
use bstr::ByteSlice;
use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    sync::OnceLock,
};
use tracing::trace;

/// An error that occurs when splitting a message into header and body.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MessageError {
    Empty,
    MissingBodySeparator,
}

impl Display for MessageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty message"),
            Self::MissingBodySeparator => write!(f, "message has no header/body separator"),
        }
    }
}

impl Error for MessageError {}

/// An email message, split into header block and body.
///
/// Line breaks in the message are normalized to CRLF on construction. The
/// header block is parsed into [`Header`]s on first access, and the result of
/// parsing is kept for later accesses.
pub struct Message {
    raw_headers: Box<[u8]>,
    body: Box<[u8]>,
    headers: OnceLock<Result<Vec<Header>, HeaderError>>,
}

impl Message {
    /// Creates a message from raw message bytes.
    ///
    /// # Errors
    ///
    /// Fails if the input is empty, or if it contains no empty line separating
    /// header and body.
    ///
    /// # Examples
    ///
    /// ```
    /// use dkim_validator::Message;
    ///
    /// let message = Message::new("From: me@example.com\nSubject: hi\n\nHello!\n")?;
    ///
    /// assert_eq!(message.raw_headers(), b"From: me@example.com\r\nSubject: hi\r\n");
    /// assert_eq!(message.body(), b"Hello!\r\n");
    /// assert_eq!(message.headers_named("subject")?.len(), 1);
    /// # Ok::<_, Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(raw: impl AsRef<[u8]>) -> Result<Self, MessageError> {
        let raw = raw.as_ref();

        if raw.is_empty() {
            return Err(MessageError::Empty);
        }

        let raw = parse::normalize_line_breaks(raw);

        let i = raw.find(b"\r\n\r\n").ok_or(MessageError::MissingBodySeparator)?;

        // The first CRLF of the separator terminates the last header.
        let raw_headers = &raw[..(i + 2)];
        let body = &raw[(i + 4)..];

        trace!(header_len = raw_headers.len(), body_len = body.len(), "split message");

        Ok(Self {
            raw_headers: raw_headers.into(),
            body: body.into(),
            headers: OnceLock::new(),
        })
    }

    /// The header block, including the final CRLF.
    pub fn raw_headers(&self) -> &[u8] {
        &self.raw_headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// All header fields in order of appearance.
    ///
    /// # Errors
    ///
    /// Fails if some header in the header block is ill-formed.
    pub fn headers(&self) -> Result<&[Header], HeaderError> {
        match self.headers.get_or_init(|| parse_header_block(&self.raw_headers)) {
            Ok(headers) => Ok(headers),
            Err(e) => Err(*e),
        }
    }

    /// All header fields with the given label, compared case-insensitively.
    pub fn headers_named(&self, label: &str) -> Result<Vec<&Header>, HeaderError> {
        let headers = self.headers()?;
        Ok(headers
            .iter()
            .filter(|h| h.label().eq_ignore_ascii_case(label))
            .collect())
    }

    /// All *DKIM-Signature* header fields, with their index among all headers.
    pub fn dkim_signatures(&self) -> Result<Vec<(usize, &Header)>, HeaderError> {
        let headers = self.headers()?;
        Ok(headers
            .iter()
            .enumerate()
            .filter(|(_, h)| h.is_dkim_signature())
            .collect())
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("raw_headers", &self.raw_headers.as_bstr())
            .field("body", &self.body.as_bstr())
            .finish()
    }
}

// A line that does not start with WSP begins a new header. Following lines
// that start with WSP belong to the same header.
fn parse_header_block(block: &[u8]) -> Result<Vec<Header>, HeaderError> {
    let mut units: Vec<Vec<u8>> = vec![];

    for line in block.split_str(CRLF).filter(|l| !l.is_empty()) {
        match units.last_mut() {
            Some(unit) if line.first().copied().is_some_and(parse::is_wsp) => {
                unit.extend(line);
                unit.extend(CRLF);
            }
            _ => {
                let mut unit = line.to_vec();
                unit.extend(CRLF);
                units.push(unit);
            }
        }
    }

    let headers = units
        .iter()
        .map(|unit| Header::parse(unit))
        .collect::<Result<Vec<_>, _>>()?;

    trace!(count = headers.len(), "parsed header block");

    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bstr::BStr;

    const MESSAGE: &str = "A: X\r\nB : Y\t\r\n\tZ  \r\n\r\n C \r\nD \t E\r\n\r\n\r\n";

    #[test]
    fn new_splits_header_and_body() {
        let message = Message::new(MESSAGE).unwrap();

        assert_eq!(BStr::new(message.raw_headers()), BStr::new("A: X\r\nB : Y\t\r\n\tZ  \r\n"));
        assert_eq!(BStr::new(message.body()), BStr::new(" C \r\nD \t E\r\n\r\n\r\n"));
    }

    #[test]
    fn new_normalizes_line_breaks() {
        let message = Message::new("A: X\nB: Y\r\r\nbody\rmore\n").unwrap();

        assert_eq!(BStr::new(message.raw_headers()), BStr::new("A: X\r\nB: Y\r\n"));
        assert_eq!(BStr::new(message.body()), BStr::new("body\r\nmore\r\n"));
    }

    #[test]
    fn new_invalid() {
        assert_eq!(Message::new("").unwrap_err(), MessageError::Empty);
        assert_eq!(
            Message::new("A: X\r\nB: Y\r\n").unwrap_err(),
            MessageError::MissingBodySeparator
        );
    }

    #[test]
    fn headers_parsed() {
        let message = Message::new(MESSAGE).unwrap();

        let headers = message.headers().unwrap();

        assert_eq!(headers.len(), 2);
        assert_eq!(headers[1].label(), "B");
        assert_eq!(headers[1].lower_label(), "b");
        assert_eq!(BStr::new(&headers[1].unfolded_value()), BStr::new("Y\t Z  "));
    }

    #[test]
    fn headers_named_case_insensitive() {
        let message = Message::new("B: 1\r\nA: 2\r\nb: 3\r\n\r\n").unwrap();

        let headers = message.headers_named("B").unwrap();

        assert_eq!(headers.len(), 2);
        assert_eq!(headers[0].raw_value(), b"1");
        assert_eq!(headers[1].raw_value(), b"3");

        assert!(message.headers_named("C").unwrap().is_empty());
    }

    #[test]
    fn headers_encoded() {
        let message = Message::new(
            "Subject: =?UTF-8?Q?J=C3=BCrgen_and_the_caf=C3=A9?=\r\n\
            To: =?UTF-8?B?SsO8cmdlbiA8anVlcmdlbkBleGFtcGxlLmNvbT4=?=\r\n\r\n",
        )
        .unwrap();

        let headers = message.headers().unwrap();

        assert_eq!(BStr::new(&headers[0].decoded_value()), BStr::new("Jürgen and the café"));
        assert_eq!(BStr::new(&headers[1].decoded_value()), BStr::new("Jürgen <juergen@example.com>"));
    }

    #[test]
    fn headers_invalid_header_is_cached() {
        let message = Message::new(" A: X\r\nB: Y\r\n\r\nbody").unwrap();

        assert_eq!(message.headers().unwrap_err(), HeaderError::FoldedFirstLine);
        assert_eq!(message.headers().unwrap_err(), HeaderError::FoldedFirstLine);

        let message = Message::new("A: X\r\n123\r\n\r\nbody").unwrap();

        assert_eq!(message.headers().unwrap_err(), HeaderError::InvalidLine);
    }

    #[test]
    fn dkim_signatures_found() {
        let message = Message::new(
            "Received: x\r\nDKIM-Signature: v=1\r\nFrom: y\r\ndkim-signature: v=1\r\n\r\n",
        )
        .unwrap();

        let sigs = message.dkim_signatures().unwrap();

        assert_eq!(sigs.iter().map(|(i, _)| *i).collect::<Vec<_>>(), [1, 3]);
    }
}
