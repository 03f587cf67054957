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

//! Common parsing utilities.

use std::borrow::Cow;

pub const CR: u8 = b'\r';
pub const LF: u8 = b'\n';
pub const SP: u8 = b' ';
pub const CRLF: &[u8] = b"\r\n";

// RFC 5234, appendix B.1

pub fn is_wsp(b: u8) -> bool {
    matches!(b, b' ' | b'\t')
}

/// Folding whitespace characters: WSP and the line break characters.
pub fn is_fws(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n')
}

pub fn trim_fws(input: &[u8]) -> &[u8] {
    let start = input.iter().position(|&b| !is_fws(b)).unwrap_or(input.len());
    let end = input.iter().rposition(|&b| !is_fws(b)).map_or(start, |i| i + 1);
    &input[start..end]
}

pub fn trim_start_wsp(input: &[u8]) -> &[u8] {
    let start = input.iter().position(|&b| !is_wsp(b)).unwrap_or(input.len());
    &input[start..]
}

pub fn trim_end_wsp(input: &[u8]) -> &[u8] {
    let end = input.iter().rposition(|&b| !is_wsp(b)).map_or(0, |i| i + 1);
    &input[..end]
}

/// Strips all trailing CR and LF characters.
pub fn trim_end_line_breaks(input: &[u8]) -> &[u8] {
    let end = input.iter().rposition(|&b| b != CR && b != LF).map_or(0, |i| i + 1);
    &input[..end]
}

/// Converts every line break (CRLF, stray CR, stray LF) to CRLF.
///
/// The input is only copied when it contains a line break that is not already
/// CRLF.
pub fn normalize_line_breaks(input: &[u8]) -> Cow<'_, [u8]> {
    let is_normalized = input.iter().enumerate().all(|(i, &b)| match b {
        CR => input.get(i + 1) == Some(&LF),
        LF => i > 0 && input[i - 1] == CR,
        _ => true,
    });

    if is_normalized {
        return Cow::Borrowed(input);
    }

    let mut result = Vec::with_capacity(input.len() + input.len() / 32);

    let mut bytes = input.iter().peekable();
    while let Some(&b) = bytes.next() {
        match b {
            CR => {
                bytes.next_if_eq(&&LF);
                result.extend(CRLF);
            }
            LF => result.extend(CRLF),
            b => result.push(b),
        }
    }

    Cow::Owned(result)
}

/// Unfolds a header value by replacing each CRLF together with the run of WSP
/// following it with a single space.
pub fn unfold(input: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(input.len());

    let mut i = 0;
    while i < input.len() {
        if input[i..].starts_with(CRLF) && input.get(i + 2).copied().is_some_and(is_wsp) {
            result.push(SP);
            i += 2;
            while input.get(i).copied().is_some_and(is_wsp) {
                i += 1;
            }
        } else {
            result.push(input[i]);
            i += 1;
        }
    }

    result
}
