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

//! A library for validating *DomainKeys Identified Mail* (DKIM) signatures
//! as described in [RFC 6376].
//!
//! The high-level API validates all DKIM signatures in an email message and
//! reports, for each signature, which checks passed and which check failed.
//! For convenience, all the relevant items are re-exported at the top level.
//!
//! The building blocks of validation are available as well, in modules of
//! their own: message and header parsing, DKIM tag extraction, header and body
//! canonicalization, public key record lookup, and signature verification.
//!
//! # Usage
//!
//! The type [`Validator`] provides the entry point to validating a
//! [`Message`]. The validator is given a [`LookupTxt`] implementation, which
//! it uses to look up public key records in DNS.
//!
//! See the example for `Validator` for basic usage.
//!
//! # Cargo features
//!
//! The feature **`hickory-resolver`** makes an implementation of
//! [`LookupTxt`][crate::verifier::LookupTxt] available for the Hickory DNS
//! resolver.
//!
//! The feature **`pre-rfc8301`** reverts cryptographic algorithm and key usage
//! back to before [RFC 8301]: it lowers the minimum RSA key size to 512 bits,
//! and enables dependency `sha1` and thereby the insecure, historic SHA-1 hash
//! algorithm. This is a legacy compatibility feature, its use is strongly
//! discouraged.
//!
//! [RFC 6376]: https://www.rfc-editor.org/rfc/rfc6376
//! [RFC 8301]: https://www.rfc-editor.org/rfc/rfc8301

pub mod canonicalize;
pub mod crypto;
pub mod encoded_word;
pub mod header;
pub mod message;
mod parse;
pub mod record;
pub mod signature;
mod util;
pub mod verifier;

pub use crate::{
    crypto::{validate_signature, CryptoError},
    header::{Header, HeaderError},
    message::{Message, MessageError},
    record::KeyRecord,
    signature::{
        extract_dkim_tags, validate_domain, validate_selector, CanonicalizationAlgorithm,
        DkimTag, DkimTags, SignatureAlgorithm,
    },
    util::{decode_base64, encode_base64, Base64Error, CanonicalStr},
    verifier::{
        fetch_public_keys, Config, DnsError, LookupTxt, ValidationFailure, ValidationResult,
        ValidationResults, Validator, ValidatorError,
    },
};
