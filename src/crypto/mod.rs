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

//! Cryptographic primitives for signature verification.
//!
//! # Public key formats
//!
//! Public keys published in DNS come in more than one format, and key reading
//! is therefore lenient.
//!
//! For RSA, section 3.6.1 of RFC 6376 specifies the RSAPublicKey format, while
//! the example in appendix C of the same RFC uses SubjectPublicKeyInfo. The
//! latter has become the de facto standard. RSA keys are read as
//! SubjectPublicKeyInfo first, and as RSAPublicKey second.
//!
//! For Ed25519, RFC 8463 specifies the 32 raw public key bytes. OpenSSL,
//! however, emits Ed25519 public keys as SubjectPublicKeyInfo, and such keys
//! are found in DNS, too. Ed25519 keys are read as raw bytes first, and as
//! SubjectPublicKeyInfo second.
//!
//! Since [`validate_signature`] is not told the key type, it tries the RSA
//! formats before the Ed25519 formats.

mod ed25519;
mod hash;
mod rsa;

pub use self::{
    ed25519::{read_ed25519_verifying_key, verify_ed25519},
    hash::{body_hash, digest_slices},
    rsa::{read_rsa_public_key, verify_rsa},
};

use crate::util::{self, CanonicalStr};
use ::rsa::RsaPublicKey;
use ed25519_dalek::VerifyingKey as Ed25519VerifyingKey;
use pkcs8::der::pem;
use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};
use tracing::trace;

const PEM_LINE_WIDTH: usize = 64;
const PEM_PUBLIC_KEY_BEGIN: &str = "-----BEGIN PUBLIC KEY-----";
const PEM_PUBLIC_KEY_END: &str = "-----END PUBLIC KEY-----";

/// An error that occurs when verifying a signature.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum CryptoError {
    /// The signature data is not valid Base64.
    InvalidEncoding,
    /// The verification engine failed, for example because the key is
    /// malformed. Carries the engine’s error text.
    VerificationFailed(String),
}

impl Display for CryptoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEncoding => write!(f, "signature is not valid Base64"),
            Self::VerificationFailed(msg) => write!(f, "signature verification failed: {msg}"),
        }
    }
}

impl Error for CryptoError {}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum KeyType {
    Rsa,
    Ed25519,
}

impl CanonicalStr for KeyType {
    fn canonical_str(&self) -> &'static str {
        match self {
            Self::Rsa => "rsa",
            Self::Ed25519 => "ed25519",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum HashAlgorithm {
    Sha256,
    #[cfg(feature = "pre-rfc8301")]
    Sha1,
}

impl HashAlgorithm {
    /// All hash algorithms available in this build.
    pub fn all() -> Vec<Self> {
        vec![
            Self::Sha256,
            #[cfg(feature = "pre-rfc8301")]
            Self::Sha1,
        ]
    }

    /// Looks up an available hash algorithm by its name as used in the a= tag.
    pub fn from_name(s: &str) -> Option<Self> {
        Self::all().into_iter().find(|h| h.canonical_str() == s)
    }

    pub fn is_available(s: &str) -> bool {
        Self::from_name(s).is_some()
    }
}

impl CanonicalStr for HashAlgorithm {
    fn canonical_str(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            #[cfg(feature = "pre-rfc8301")]
            Self::Sha1 => "sha1",
        }
    }
}

impl Display for HashAlgorithm {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_str())
    }
}

#[derive(Debug)]
pub enum VerifyingKey {
    Rsa(RsaPublicKey),
    Ed25519(Ed25519VerifyingKey),
}

impl VerifyingKey {
    /// Reads a public key from DER data, trying the RSA formats first and the
    /// Ed25519 formats second.
    pub fn from_key_data(key_data: &[u8]) -> Result<Self, CryptoError> {
        let rsa_error = match read_rsa_public_key(key_data) {
            Ok(public_key) => return Ok(Self::Rsa(public_key)),
            Err(e) => e,
        };

        read_ed25519_verifying_key(key_data)
            .map(Self::Ed25519)
            .map_err(|_| rsa_error)
    }

    pub fn key_type(&self) -> KeyType {
        match self {
            Self::Rsa(_) => KeyType::Rsa,
            Self::Ed25519(_) => KeyType::Ed25519,
        }
    }
}

/// Wraps Base64 public key data in PEM armor, unless it already is.
///
/// Whitespace in the key data is removed, and the Base64 text is broken into
/// lines of 64 characters.
pub fn wrap_public_key_pem(public_key: &str) -> String {
    if public_key.trim_start().starts_with(PEM_PUBLIC_KEY_BEGIN) {
        return public_key.trim().to_owned() + "\n";
    }

    let key: String = public_key.chars().filter(|c| !c.is_ascii_whitespace()).collect();

    let mut pem = String::with_capacity(key.len() + key.len() / PEM_LINE_WIDTH + 64);
    pem.push_str(PEM_PUBLIC_KEY_BEGIN);
    pem.push('\n');
    for line in key.as_bytes().chunks(PEM_LINE_WIDTH) {
        pem.push_str(&String::from_utf8_lossy(line));
        pem.push('\n');
    }
    pem.push_str(PEM_PUBLIC_KEY_END);
    pem.push('\n');
    pem
}

/// Verifies a signature over some signed text.
///
/// `public_key` is the Base64 public key data from the p= tag, raw or already
/// wrapped in PEM armor; `signature` is the Base64 signature from the b= tag;
/// `hash` names the hash algorithm. Returns whether the signature matches.
///
/// # Errors
///
/// Fails with [`CryptoError::InvalidEncoding`] if the signature is not valid
/// Base64, and with [`CryptoError::VerificationFailed`] if the key is
/// malformed or verification could not be performed.
pub fn validate_signature(
    public_key: &str,
    signature: &str,
    text: &[u8],
    hash: &str,
) -> Result<bool, CryptoError> {
    let signature_data = util::decode_base64(signature).map_err(|_| CryptoError::InvalidEncoding)?;

    let hash_alg = HashAlgorithm::from_name(hash).ok_or_else(|| {
        CryptoError::VerificationFailed(format!("unknown hash algorithm {hash}"))
    })?;

    let pem = wrap_public_key_pem(public_key);

    let (_, key_data) = pem::decode_vec(pem.as_bytes())
        .map_err(|e| CryptoError::VerificationFailed(e.to_string()))?;

    let verifying_key = VerifyingKey::from_key_data(&key_data)?;

    let data_hash = digest_slices(hash_alg, [text]);

    let result = match &verifying_key {
        VerifyingKey::Rsa(pk) => verify_rsa(hash_alg, pk, &data_hash, &signature_data),
        VerifyingKey::Ed25519(pk) => verify_ed25519(pk, &data_hash, &signature_data),
    };

    match &result {
        Ok(true) => trace!(key_type = verifying_key.key_type().canonical_str(), "signature verified"),
        Ok(false) => trace!(key_type = verifying_key.key_type().canonical_str(), "signature did not verify"),
        Err(e) => trace!("verification engine error: {e}"),
    }

    result
}
