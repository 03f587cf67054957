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

use crate::crypto::{CryptoError, HashAlgorithm};
use rsa::{
    pkcs1::DecodeRsaPublicKey, pkcs8::DecodePublicKey, traits::PublicKeyParts, Pkcs1v15Sign,
    RsaPublicKey,
};
#[cfg(feature = "pre-rfc8301")]
use sha1::Sha1;
use sha2::Sha256;

#[cfg(not(feature = "pre-rfc8301"))]
const MIN_KEY_BITS: usize = 1024;
#[cfg(feature = "pre-rfc8301")]
const MIN_KEY_BITS: usize = 512;

pub fn get_public_key_size(k: &RsaPublicKey) -> usize {
    k.size() * 8
}

pub fn read_rsa_public_key(key_data: &[u8]) -> Result<RsaPublicKey, CryptoError> {
    // First try reading data as SubjectPublicKeyInfo, then as RSAPublicKey.
    let public_key = RsaPublicKey::from_public_key_der(key_data)
        .or_else(|_| RsaPublicKey::from_pkcs1_der(key_data))
        .map_err(|_| CryptoError::VerificationFailed("invalid public key data".into()))?;

    let bits = get_public_key_size(&public_key);
    if bits < MIN_KEY_BITS {
        return Err(CryptoError::VerificationFailed(format!(
            "RSA key size {bits} below minimum of {MIN_KEY_BITS} bits"
        )));
    }

    Ok(public_key)
}

/// Verifies an RSA PKCS#1 v1.5 signature over a precomputed digest.
///
/// A signature that does not match is `Ok(false)`; other failures of the RSA
/// engine are errors.
pub fn verify_rsa(
    hash_alg: HashAlgorithm,
    public_key: &RsaPublicKey,
    data_hash: &[u8],
    signature_data: &[u8],
) -> Result<bool, CryptoError> {
    let result = match hash_alg {
        HashAlgorithm::Sha256 => {
            public_key.verify(Pkcs1v15Sign::new::<Sha256>(), data_hash, signature_data)
        }
        #[cfg(feature = "pre-rfc8301")]
        HashAlgorithm::Sha1 => {
            public_key.verify(Pkcs1v15Sign::new::<Sha1>(), data_hash, signature_data)
        }
    };

    match result {
        Ok(()) => Ok(true),
        Err(rsa::Error::Verification) => Ok(false),
        Err(e) => Err(CryptoError::VerificationFailed(e.to_string())),
    }
}
