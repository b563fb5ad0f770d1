// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use alloy::primitives::{Address, Bytes, B256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque on-chain reference to a ciphertext. The all-zero value means nothing has been stored
/// yet.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct CiphertextHandle(B256);

impl CiphertextHandle {
    pub const UNINITIALIZED: CiphertextHandle = CiphertextHandle(B256::ZERO);

    pub fn new(raw: B256) -> Self {
        Self(raw)
    }

    pub fn is_initialized(&self) -> bool {
        !self.0.is_zero()
    }

    pub fn as_b256(&self) -> B256 {
        self.0
    }
}

impl From<B256> for CiphertextHandle {
    fn from(value: B256) -> Self {
        Self(value)
    }
}

impl From<CiphertextHandle> for B256 {
    fn from(value: CiphertextHandle) -> Self {
        value.0
    }
}

impl fmt::Display for CiphertextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for CiphertextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_initialized() {
            write!(f, "CiphertextHandle({})", self.0)
        } else {
            write!(f, "CiphertextHandle(uninitialized)")
        }
    }
}

/// A handle together with the contract that is allowed to use it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandleContractPair {
    pub handle: CiphertextHandle,
    pub contract_address: Address,
}

/// Ciphertext registered with the coprocessor, ready to go into a transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedInput {
    pub handles: Vec<CiphertextHandle>,
    pub input_proof: Bytes,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel() {
        assert!(!CiphertextHandle::UNINITIALIZED.is_initialized());
        assert!(!CiphertextHandle::default().is_initialized());
        assert!(CiphertextHandle::new(B256::with_last_byte(1)).is_initialized());
        assert_eq!(
            format!("{:?}", CiphertextHandle::UNINITIALIZED),
            "CiphertextHandle(uninitialized)"
        );
    }
}
