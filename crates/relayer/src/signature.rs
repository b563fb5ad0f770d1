// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use alloy::{
    primitives::{Address, Bytes, B256},
    sol_types::Eip712Domain,
};
use std::{
    collections::HashMap,
    time::{SystemTime, UNIX_EPOCH},
};
use thermo_evm::DecryptAuthorization;
use tracing::{debug, trace};

/// Seconds since the unix epoch.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

fn normalize(contracts: &[Address]) -> Vec<Address> {
    let mut contracts = contracts.to_vec();
    contracts.sort();
    contracts.dedup();
    contracts
}

/// Identity of a cached authorization.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignatureKey {
    pub user: Address,
    pub contracts: Vec<Address>,
    pub public_key_fingerprint: B256,
}

impl SignatureKey {
    pub fn new(user: Address, contracts: &[Address], public_key_fingerprint: B256) -> Self {
        Self {
            user,
            contracts: normalize(contracts),
            public_key_fingerprint,
        }
    }
}

/// A wallet-signed decryption authorization together with what it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptionSignature {
    pub user: Address,
    pub contracts: Vec<Address>,
    pub public_key: Bytes,
    pub public_key_fingerprint: B256,
    pub signature: Bytes,
    pub valid_from: u64,
    pub duration_days: u64,
    pub valid_until: u64,
}

impl DecryptionSignature {
    pub fn new(
        user: Address,
        authorization: &DecryptAuthorization,
        public_key_fingerprint: B256,
        signature: Bytes,
    ) -> Self {
        Self {
            user,
            contracts: authorization.message.contractAddresses.clone(),
            public_key: authorization.message.publicKey.clone(),
            public_key_fingerprint,
            signature,
            valid_from: authorization.start_timestamp(),
            duration_days: authorization.duration_days(),
            valid_until: authorization.valid_until(),
        }
    }

    pub fn key(&self) -> SignatureKey {
        SignatureKey::new(self.user, &self.contracts, self.public_key_fingerprint)
    }

    pub fn is_valid_at(&self, now: u64) -> bool {
        self.valid_until > self.valid_from && self.valid_from <= now && now < self.valid_until
    }

    /// Rebuild the typed payload that was signed, for verification under `domain`.
    pub fn authorization(&self, domain: Eip712Domain) -> DecryptAuthorization {
        DecryptAuthorization::new(
            domain,
            self.public_key.clone(),
            &self.contracts,
            self.valid_from,
            self.duration_days,
        )
    }

    pub fn covers(&self, contract: &Address) -> bool {
        self.contracts.binary_search(contract).is_ok()
    }
}

/// In-memory store of decryption authorizations for the lifetime of the process.
#[derive(Debug, Default)]
pub struct SignatureCache {
    entries: HashMap<SignatureKey, DecryptionSignature>,
}

impl SignatureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expired entries found on lookup are dropped. Entries whose window has not opened yet
    /// are a miss but stay cached.
    pub fn get(
        &mut self,
        user: Address,
        contracts: &[Address],
        public_key_fingerprint: B256,
        now: u64,
    ) -> Option<DecryptionSignature> {
        let key = SignatureKey::new(user, contracts, public_key_fingerprint);
        match self.entries.get(&key) {
            Some(entry) if entry.is_valid_at(now) => {
                trace!(user = %user, "Decryption signature cache hit");
                Some(entry.clone())
            }
            Some(entry) if entry.valid_until > entry.valid_from && now < entry.valid_from => {
                trace!(
                    user = %user,
                    valid_from = entry.valid_from,
                    "Decryption signature not valid yet"
                );
                None
            }
            Some(_) => {
                debug!(user = %user, "Evicting expired decryption signature");
                self.entries.remove(&key);
                None
            }
            None => None,
        }
    }

    pub fn put(&mut self, signature: DecryptionSignature) {
        self.entries.insert(signature.key(), signature);
    }

    pub fn evict(&mut self, key: &SignatureKey) -> Option<DecryptionSignature> {
        self.entries.remove(key)
    }

    /// Drop everything signed by `user`.
    pub fn evict_user(&mut self, user: Address) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| key.user != user);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;
    use thermo_evm::decryption_domain;

    const USER: Address = address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
    const OTHER: Address = address!("0x70997970C51812dc3A010C7d01b50e0d17dc79C8");
    const A: Address = address!("0x5FbDB2315678afecb367f032d93F642f64180aa3");
    const B: Address = address!("0x9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0");

    fn signature(user: Address, contracts: &[Address], fp: B256, start: u64) -> DecryptionSignature {
        let auth = DecryptAuthorization::new(
            decryption_domain(31337, A),
            Bytes::from_static(b"pk"),
            contracts,
            start,
            1,
        );
        DecryptionSignature::new(user, &auth, fp, Bytes::from_static(b"sig"))
    }

    #[test]
    fn test_lookup_is_order_independent() {
        let fp = B256::with_last_byte(1);
        let mut cache = SignatureCache::new();
        cache.put(signature(USER, &[A, B], fp, 100));

        assert!(cache.get(USER, &[B, A], fp, 200).is_some());
        assert!(cache.get(USER, &[A], fp, 200).is_none());
        assert!(cache.get(USER, &[A, B], B256::with_last_byte(2), 200).is_none());
        assert!(cache.get(OTHER, &[A, B], fp, 200).is_none());
    }

    #[test]
    fn test_expired_entries_are_evicted_on_read() {
        let fp = B256::with_last_byte(1);
        let mut cache = SignatureCache::new();
        cache.put(signature(USER, &[A], fp, 100));

        let expires = 100 + 86_400;
        assert!(cache.get(USER, &[A], fp, expires - 1).is_some());
        assert!(cache.get(USER, &[A], fp, expires).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_not_yet_valid_is_a_miss_but_kept() {
        let fp = B256::with_last_byte(1);
        let mut cache = SignatureCache::new();
        cache.put(signature(USER, &[A], fp, 1_000));
        assert!(cache.get(USER, &[A], fp, 999).is_none());
        assert_eq!(cache.len(), 1);
        assert!(cache.get(USER, &[A], fp, 1_000).is_some());
    }

    #[test]
    fn test_evict_user() {
        let fp = B256::with_last_byte(1);
        let mut cache = SignatureCache::new();
        cache.put(signature(USER, &[A], fp, 100));
        cache.put(signature(USER, &[A, B], fp, 100));
        cache.put(signature(OTHER, &[A], fp, 100));

        assert_eq!(cache.evict_user(USER), 2);
        assert_eq!(cache.len(), 1);

        let key = SignatureKey::new(OTHER, &[A], fp);
        assert!(cache.evict(&key).is_some());
        assert!(cache.is_empty());
    }
}
