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

use crate::crypto::CryptoError;
use ed25519_dalek::{pkcs8::DecodePublicKey, Signature, Verifier, VerifyingKey};

pub fn read_ed25519_verifying_key(key_data: &[u8]) -> Result<VerifyingKey, CryptoError> {
    // First try reading data as raw key bytes, then as SubjectPublicKeyInfo.
    VerifyingKey::try_from(key_data)
        .or_else(|_| VerifyingKey::from_public_key_der(key_data))
        .map_err(|_| CryptoError::VerificationFailed("invalid Ed25519 public key data".into()))
}

/// Verifies an Ed25519 signature over a precomputed digest (RFC 8463).
pub fn verify_ed25519(
    verifying_key: &VerifyingKey,
    data_hash: &[u8],
    signature_data: &[u8],
) -> Result<bool, CryptoError> {
    let signature = Signature::from_slice(signature_data)
        .map_err(|e| CryptoError::VerificationFailed(e.to_string()))?;

    Ok(verifying_key.verify(data_hash, &signature).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64ct::{Base64, Encoding};

    #[test]
    fn read_ed25519_key() {
        // raw public key bytes, from RFC 8463, appendix A.2
        let raw = Base64::decode_vec("11qYAYKxCrfVS/7TyWQHOg7hcvPapiMlrwIaaPcHURo=").unwrap();
        let raw_key = read_ed25519_verifying_key(&raw).unwrap();

        // the same key as SubjectPublicKeyInfo
        let spki = Base64::decode_vec("MCowBQYDK2VwAyEA11qYAYKxCrfVS/7TyWQHOg7hcvPapiMlrwIaaPcHURo=")
            .unwrap();
        let spki_key = read_ed25519_verifying_key(&spki).unwrap();

        assert_eq!(raw_key, spki_key);

        assert!(read_ed25519_verifying_key(b"short").is_err());
    }

    #[test]
    fn verify_ed25519_bad_signature_length() {
        let raw = Base64::decode_vec("11qYAYKxCrfVS/7TyWQHOg7hcvPapiMlrwIaaPcHURo=").unwrap();
        let key = read_ed25519_verifying_key(&raw).unwrap();

        assert!(verify_ed25519(&key, b"abc", b"123").is_err());
        assert_eq!(verify_ed25519(&key, b"abc", &[0; 64]), Ok(false));
    }
}
