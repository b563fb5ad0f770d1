// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use alloy::primitives::{keccak256, Bytes, B256};
use rand::RngCore;
use std::fmt;
use zeroize::Zeroizing;

const KEY_LEN: usize = 32;

/// Ephemeral key pair the coprocessor re-encrypts plaintexts under. Generated once per session;
/// the private half is wiped on drop.
pub struct DecryptionKeypair {
    public_key: Bytes,
    private_key: Zeroizing<Vec<u8>>,
}

impl DecryptionKeypair {
    pub fn generate<R: RngCore>(rng: &mut R) -> Self {
        let mut private_key = Zeroizing::new(vec![0u8; KEY_LEN]);
        rng.fill_bytes(&mut private_key);
        let public_key = Bytes::from(keccak256(private_key.as_slice()).to_vec());
        Self {
            public_key,
            private_key,
        }
    }

    pub fn random() -> Self {
        Self::generate(&mut rand::thread_rng())
    }

    pub fn public_key(&self) -> &Bytes {
        &self.public_key
    }

    pub fn private_key(&self) -> &[u8] {
        &self.private_key
    }

    /// Identifies this key pair in the signature cache.
    pub fn fingerprint(&self) -> B256 {
        keccak256(&self.public_key)
    }
}

impl fmt::Debug for DecryptionKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptionKeypair")
            .field("fingerprint", &self.fingerprint())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_keypairs_have_distinct_fingerprints() {
        let a = DecryptionKeypair::random();
        let b = DecryptionKeypair::random();
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.private_key().len(), KEY_LEN);
        assert!(!format!("{a:?}").contains(&hex::encode(a.private_key())));
    }
}
