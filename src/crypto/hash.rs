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

use crate::{crypto::HashAlgorithm, util};
use digest::Digest;
#[cfg(feature = "pre-rfc8301")]
use sha1::Sha1;
use sha2::Sha256;

/// Computes the digest of the concatenation of some byte slices.
pub fn digest_slices<I, T>(hash_alg: HashAlgorithm, slices: I) -> Box<[u8]>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    fn digest_with<D: Digest, I, T>(slices: I) -> Box<[u8]>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let mut hasher = D::new();
        for bytes in slices {
            hasher.update(bytes.as_ref());
        }
        Box::from(&hasher.finalize()[..])
    }

    match hash_alg {
        HashAlgorithm::Sha256 => digest_with::<Sha256, _, _>(slices),
        #[cfg(feature = "pre-rfc8301")]
        HashAlgorithm::Sha1 => digest_with::<Sha1, _, _>(slices),
    }
}

/// Computes the body hash of a canonicalized body, in Base64 as found in the
/// bh= tag.
pub fn body_hash(hash_alg: HashAlgorithm, canonical_body: &[u8]) -> String {
    util::encode_base64(digest_slices(hash_alg, [canonical_body]))
}
