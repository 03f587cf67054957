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

use crate::{crypto::CryptoError, signature::DkimTag, verifier::query::DnsError};
use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

/// The reason a DKIM signature failed to validate.
///
/// Each variant corresponds to one check of the validation procedure. The
/// `Display` implementation gives the message recorded as the fail entry of
/// the signature’s [`ValidationResult`][crate::verifier::ValidationResult].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ValidationFailure {
    NoSignature,
    NotDkimSignature,
    MissingRequiredTag(DkimTag),
    InvalidDomain,
    InvalidSelector,
    IncompatibleVersion(Box<str>),
    UnknownHeaderCanonicalization(Box<str>),
    UnknownBodyCanonicalization(Box<str>),
    InvalidBodyLength(Box<str>),
    BodyTooShort { declared: usize, actual: usize },
    IdentityDomainMismatch(Box<str>),
    FromHeaderNotSigned(Box<str>),
    InvalidTimestamp { tag: DkimTag, value: Box<str> },
    SignatureExpired,
    ExpiryBeforeTimestamp,
    UnknownQueryMethod(Box<str>),
    InvalidKeySelector { selector: Box<str>, domain: Box<str> },
    KeyNotFound,
    KeyRecordFormat,
    KeyLookupTimeout,
    KeyLookup,
    InvalidAlgorithm,
    UnavailableHashAlgorithm(Box<str>),
    BodyHashMismatch,
    KeyVersionMismatch { domain: Box<str>, key_index: usize },
    KeyHashAlgorithmMismatch { domain: Box<str>, key_index: usize },
    KeyTypeMismatch { domain: Box<str>, key_index: usize },
    KeyServiceType { domain: Box<str>, key_index: usize, service: Box<str> },
    KeyRevoked { domain: Box<str>, key_index: usize },
    MissingPublicKey { domain: Box<str>, key_index: usize },
    SignatureNotVerified { domain: Box<str>, selector: Box<str>, key_index: usize },
    Crypto(CryptoError),
}

impl ValidationFailure {
    /// Whether the failure is temporary, that is, the same signature might
    /// validate when tried again later. Only failures of the public key
    /// lookup are temporary.
    pub fn is_temporary(&self) -> bool {
        matches!(
            self,
            Self::InvalidKeySelector { .. }
                | Self::KeyNotFound
                | Self::KeyRecordFormat
                | Self::KeyLookupTimeout
                | Self::KeyLookup
        )
    }

    pub(crate) fn from_dns_error(error: DnsError, domain: &str, selector: &str) -> Self {
        match error {
            DnsError::InvalidSelector => Self::InvalidKeySelector {
                selector: selector.into(),
                domain: domain.into(),
            },
            DnsError::NotFound => Self::KeyNotFound,
            DnsError::InvalidFormat => Self::KeyRecordFormat,
            DnsError::Timeout => Self::KeyLookupTimeout,
            DnsError::Lookup(_) => Self::KeyLookup,
        }
    }
}

impl Display for ValidationFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSignature => write!(f, "Message does not contain a DKIM signature."),
            Self::NotDkimSignature => write!(f, "Header is not a DKIM signature"),
            Self::MissingRequiredTag(tag) => write!(f, "DKIM signature missing required tag: {tag}"),
            Self::InvalidDomain => write!(f, "Signing domain is invalid"),
            Self::InvalidSelector => write!(f, "Signing selector is invalid"),
            Self::IncompatibleVersion(v) => write!(f, "Incompatible DKIM version: {v}"),
            Self::UnknownHeaderCanonicalization(alg) => {
                write!(f, "Unknown header canonicalization algorithm: {alg}")
            }
            Self::UnknownBodyCanonicalization(alg) => {
                write!(f, "Unknown body canonicalization algorithm: {alg}")
            }
            Self::InvalidBodyLength(l) => write!(f, "Invalid body length tag: {l}"),
            Self::BodyTooShort { declared, actual } => write!(f, "Body too short: {declared}/{actual}"),
            Self::IdentityDomainMismatch(i) => {
                write!(f, "Agent or user identifier does not match domain: {i}")
            }
            Self::FromHeaderNotSigned(h) => {
                write!(f, "From header not included in signed header list: {h}")
            }
            Self::InvalidTimestamp { tag, value } => write!(f, "Invalid {tag} tag: {value}"),
            Self::SignatureExpired => write!(f, "Signature has expired."),
            Self::ExpiryBeforeTimestamp => write!(f, "Expiry time is before signature time."),
            Self::UnknownQueryMethod(_) => write!(
                f,
                "Public key unavailable (unknown q= query format), skipping signature"
            ),
            Self::InvalidKeySelector { selector, domain } => {
                write!(f, "Invalid selector: {selector} for domain: {domain}")
            }
            Self::KeyNotFound => write!(f, "Public key not found in DNS, skipping signature"),
            Self::KeyRecordFormat => {
                write!(f, "Public key record has invalid format, skipping signature")
            }
            Self::KeyLookupTimeout => write!(f, "Public key lookup timed out, skipping signature"),
            Self::KeyLookup => write!(f, "Public key lookup failed, skipping signature"),
            Self::InvalidAlgorithm => {
                write!(f, "'a' tag uses an invalid signature algorithm specifier")
            }
            Self::UnavailableHashAlgorithm(hash) => {
                write!(f, "Signature algorithm {hash} is not available")
            }
            Self::BodyHashMismatch => {
                write!(f, "Computed body hash does not match signature body hash")
            }
            Self::KeyVersionMismatch { domain, key_index } => write!(
                f,
                "Public key version does not match signature version ({domain} key #{key_index})"
            ),
            Self::KeyHashAlgorithmMismatch { domain, key_index } => write!(
                f,
                "Public key hash algorithm does not match signature hash algorithm ({domain} key #{key_index})"
            ),
            Self::KeyTypeMismatch { domain, key_index } => write!(
                f,
                "Public key type does not match signature key type ({domain} key #{key_index})"
            ),
            Self::KeyServiceType { domain, key_index, service } => write!(
                f,
                "Public key service type does not permit email usage ({domain} key #{key_index}) {service}"
            ),
            Self::KeyRevoked { domain, key_index } => {
                write!(f, "Public key has been revoked ({domain} key #{key_index})")
            }
            Self::MissingPublicKey { domain, key_index } => {
                write!(f, "Public key record has no key data ({domain} key #{key_index})")
            }
            Self::SignatureNotVerified { domain, selector, key_index } => write!(
                f,
                "DKIM signature did not verify ({domain}/{selector} key #{key_index})"
            ),
            Self::Crypto(error) => error.fmt(f),
        }
    }
}

impl Error for ValidationFailure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Crypto(error) => Some(error),
            _ => None,
        }
    }
}
