// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::{CoprocessorError, DecryptionKeypair, DecryptionSignature};
use alloy::{
    primitives::{Address, U256},
    sol_types::Eip712Domain,
};
use async_trait::async_trait;
use std::{collections::HashMap, sync::Arc};
use thermo_evm::{CiphertextHandle, DecryptAuthorization, EncryptedInput, HandleContractPair};

/// Encrypt/decrypt primitives of an FHE coprocessor bound to one chain.
#[async_trait]
pub trait Coprocessor: Send + Sync {
    fn chain_id(&self) -> u64;

    /// EIP-712 domain user decryption authorizations are signed under.
    fn decryption_domain(&self) -> Eip712Domain;

    /// Encrypt a 32 bit reading for `contract`, to be submitted by `user`.
    async fn encrypt(
        &self,
        value: u32,
        contract: Address,
        user: Address,
    ) -> Result<EncryptedInput, CoprocessorError>;

    /// Decrypt every pair in one round-trip.
    async fn decrypt(
        &self,
        pairs: &[HandleContractPair],
        signature: &DecryptionSignature,
    ) -> Result<HashMap<CiphertextHandle, U256>, CoprocessorError>;
}

/// A connected coprocessor plus the key pair the current user decrypts under.
pub struct Session {
    coprocessor: Arc<dyn Coprocessor>,
    keypair: DecryptionKeypair,
}

impl Session {
    pub fn new(coprocessor: Arc<dyn Coprocessor>) -> Self {
        Self {
            coprocessor,
            keypair: DecryptionKeypair::random(),
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.coprocessor.chain_id()
    }

    pub fn coprocessor(&self) -> Arc<dyn Coprocessor> {
        self.coprocessor.clone()
    }

    pub fn keypair(&self) -> &DecryptionKeypair {
        &self.keypair
    }

    /// Typed payload the wallet must sign to decrypt handles of `contracts`.
    pub fn authorization(
        &self,
        contracts: &[Address],
        start_timestamp: u64,
        duration_days: u64,
    ) -> DecryptAuthorization {
        DecryptAuthorization::new(
            self.coprocessor.decryption_domain(),
            self.keypair.public_key().clone(),
            contracts,
            start_timestamp,
            duration_days,
        )
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("chain_id", &self.chain_id())
            .field("keypair", &self.keypair)
            .finish()
    }
}
