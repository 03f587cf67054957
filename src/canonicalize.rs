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

//! Canonicalization of header and body.
//!
//! See RFC 6376, section 3.4.

use crate::{
    header::Header,
    parse::{is_wsp, CR, CRLF, LF, SP},
    signature::CanonicalizationAlgorithm,
};
use std::{
    borrow::Cow,
    error::Error,
    fmt::{self, Display, Formatter},
};

/// A canonicalizer for the message body.
///
/// CRLF, stray CR, and stray LF are all recognised as line breaks. Empty lines
/// at the end of the body are removed, and the body is terminated with exactly
/// one CRLF; an empty body canonicalizes to a single CRLF. The *relaxed*
/// algorithm additionally drops trailing whitespace on each line and reduces
/// all other whitespace runs to a single space.
pub struct BodyCanonicalizer {
    kind: CanonicalizationAlgorithm,
    pending_cr: bool,
    pending_wsp: bool,  // relaxed only: whitespace seen but not yet written
    line_has_content: bool,
    empty_lines: usize,  // number of empty lines seen and not yet written
    output_written: bool,
}

impl BodyCanonicalizer {
    pub fn new(kind: CanonicalizationAlgorithm) -> Self {
        Self {
            kind,
            pending_cr: false,
            pending_wsp: false,
            line_has_content: false,
            empty_lines: 0,
            output_written: false,
        }
    }

    pub fn simple() -> Self {
        Self::new(CanonicalizationAlgorithm::Simple)
    }

    pub fn relaxed() -> Self {
        Self::new(CanonicalizationAlgorithm::Relaxed)
    }

    /// Canonicalizes a chunk of the body, and returns the output produced so
    /// far. Output held back for the remaining input is produced later.
    pub fn canonicalize_chunk(&mut self, bytes: &[u8]) -> Vec<u8> {
        let mut result = Vec::with_capacity(bytes.len());

        for &b in bytes {
            if self.pending_cr {
                self.pending_cr = false;
                self.end_line(&mut result);
                if b == LF {
                    continue;
                }
            }

            match b {
                CR => self.pending_cr = true,
                LF => self.end_line(&mut result),
                b if is_wsp(b) && self.kind == CanonicalizationAlgorithm::Relaxed => {
                    self.pending_wsp = true;
                }
                b => {
                    if !self.line_has_content {
                        self.flush_empty_lines(&mut result);
                        self.line_has_content = true;
                    }
                    if self.pending_wsp {
                        result.push(SP);
                        self.pending_wsp = false;
                    }
                    result.push(b);
                    self.output_written = true;
                }
            }
        }

        result
    }

    /// Finishes canonicalization and returns the final output.
    pub fn finish(mut self) -> Vec<u8> {
        let mut result = vec![];

        if self.pending_cr {
            self.end_line(&mut result);
        }

        // unterminated last line, relaxed trailing whitespace is dropped
        if self.line_has_content {
            result.extend(CRLF);
        } else if !self.output_written {
            result.extend(CRLF);  // empty body is CRLF
        }

        result
    }

    fn end_line(&mut self, result: &mut Vec<u8>) {
        self.pending_wsp = false;

        if self.line_has_content {
            result.extend(CRLF);
            self.line_has_content = false;
        } else {
            self.empty_lines += 1;
        }
    }

    // write out remembered empty lines before content that follows them
    fn flush_empty_lines(&mut self, result: &mut Vec<u8>) {
        for _ in 0..self.empty_lines {
            result.extend(CRLF);
        }
        if self.empty_lines > 0 {
            self.output_written = true;
        }
        self.empty_lines = 0;
    }
}

/// Canonicalizes a complete message body.
///
/// If `length` is greater than zero, the canonicalized body is truncated to at
/// most that many bytes.
///
/// # Examples
///
/// ```
/// use dkim_validator::{canonicalize::canonicalize_body, CanonicalizationAlgorithm};
///
/// let body = b" C \r\nD \t E\r\n\r\n\r\n";
///
/// assert_eq!(canonicalize_body(CanonicalizationAlgorithm::Relaxed, body, None), b" C\r\nD E\r\n");
/// assert_eq!(canonicalize_body(CanonicalizationAlgorithm::Simple, body, None), b" C \r\nD \t E\r\n");
/// ```
pub fn canonicalize_body(
    algorithm: CanonicalizationAlgorithm,
    body: &[u8],
    length: Option<usize>,
) -> Vec<u8> {
    let mut canonicalizer = BodyCanonicalizer::new(algorithm);

    let mut result = canonicalizer.canonicalize_chunk(body);
    result.extend(canonicalizer.finish());

    if let Some(len) = length.filter(|&n| n > 0) {
        result.truncate(len);
    }

    result
}

/// An error that occurs when canonicalizing headers.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum CanonicalizeError {
    NoHeaders,
}

impl Display for CanonicalizeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoHeaders => write!(f, "no headers to canonicalize"),
        }
    }
}

impl Error for CanonicalizeError {}

/// Canonicalizes a header with the given algorithm.
pub fn canonicalize_header(
    header: &Header,
    algorithm: CanonicalizationAlgorithm,
    strip_b_value: bool,
) -> Cow<'_, [u8]> {
    match algorithm {
        CanonicalizationAlgorithm::Simple => header.simple_canonicalized(strip_b_value),
        CanonicalizationAlgorithm::Relaxed => header.relaxed_canonicalized(strip_b_value).into(),
    }
}

/// Canonicalizes the given headers in order and concatenates the results.
///
/// # Errors
///
/// Fails if there are no headers.
pub fn canonicalize_headers<'a, I>(
    headers: I,
    algorithm: CanonicalizationAlgorithm,
) -> Result<Vec<u8>, CanonicalizeError>
where
    I: IntoIterator<Item = &'a Header>,
{
    let mut result = vec![];
    let mut count = 0;

    for header in headers {
        result.extend(canonicalize_header(header, algorithm, false).as_ref());
        count += 1;
    }

    if count == 0 {
        return Err(CanonicalizeError::NoHeaders);
    }

    Ok(result)
}
