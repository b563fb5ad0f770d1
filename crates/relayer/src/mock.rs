// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::{unix_now, Coprocessor, CoprocessorError, DecryptionSignature};
use alloy::{
    primitives::{address, keccak256, Address, Bytes, B256, U256},
    sol_types::Eip712Domain,
};
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use thermo_evm::{
    decryption_domain, CiphertextHandle, ContractConnector, EncryptedInput, HandleContractPair,
    SubmissionReceipt, TemperatureCheckApi, FEVER_THRESHOLD_TENTHS,
};
use tracing::{debug, info};

/// Verifying contract of the decryption domain on development chains.
pub const MOCK_DECRYPTION_VERIFIER: Address =
    address!("0xb6E160B1ff80D67Bfe90A85eE06Ce0A2613607D1");

#[derive(Debug)]
struct PendingInput {
    value: U256,
    contract: Address,
    user: Address,
}

#[derive(Debug, Default)]
struct FhevmState {
    nonce: u64,
    cleartexts: HashMap<CiphertextHandle, U256>,
    acl: HashMap<CiphertextHandle, HashSet<Address>>,
    inputs: HashMap<CiphertextHandle, PendingInput>,
}

/// In-process FHE coprocessor for development chains. Every handle maps to a cleartext kept in
/// memory, guarded by an access list like the real ACL contract.
#[derive(Debug)]
pub struct MockFhevm {
    chain_id: u64,
    verifying_contract: Address,
    state: Mutex<FhevmState>,
}

impl MockFhevm {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            verifying_contract: MOCK_DECRYPTION_VERIFIER,
            state: Mutex::new(FhevmState::default()),
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn decryption_domain(&self) -> Eip712Domain {
        decryption_domain(self.chain_id, self.verifying_contract)
    }

    fn state(&self) -> MutexGuard<'_, FhevmState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_handle(&self, state: &mut FhevmState, seed: &[u8]) -> CiphertextHandle {
        state.nonce += 1;
        let mut preimage = seed.to_vec();
        preimage.extend_from_slice(&self.chain_id.to_be_bytes());
        preimage.extend_from_slice(&state.nonce.to_be_bytes());
        CiphertextHandle::new(keccak256(preimage))
    }

    /// Register an input ciphertext that only `user` may submit to `contract`.
    pub fn encrypt_input(&self, value: u32, contract: Address, user: Address) -> EncryptedInput {
        let mut state = self.state();
        let mut seed = contract.to_vec();
        seed.extend_from_slice(user.as_slice());
        let handle = self.next_handle(&mut state, &seed);
        state.inputs.insert(
            handle,
            PendingInput {
                value: U256::from(value),
                contract,
                user,
            },
        );
        debug!(handle = %handle, "Registered mock input");

        let mut proof = vec![1u8, 0u8];
        proof.extend_from_slice(handle.as_b256().as_slice());
        proof.push(0);
        EncryptedInput {
            handles: vec![handle],
            input_proof: Bytes::from(proof),
        }
    }

    /// Consume an input on behalf of `contract`, returning its value. Inputs are single use.
    pub fn verify_input(
        &self,
        handle: CiphertextHandle,
        proof: &[u8],
        contract: Address,
        user: Address,
    ) -> Result<U256> {
        if proof.len() < 34 || &proof[2..34] != handle.as_b256().as_slice() {
            bail!("Input proof does not match handle {handle}");
        }
        let mut state = self.state();
        let Some(input) = state.inputs.remove(&handle) else {
            bail!("Unknown or already used input handle {handle}");
        };
        if input.contract != contract || input.user != user {
            bail!("Input {handle} was not encrypted for this contract and sender");
        }
        Ok(input.value)
    }

    /// Store a computation result and return the handle that refers to it.
    pub fn store(&self, value: U256, tag: &[u8]) -> CiphertextHandle {
        let mut state = self.state();
        let handle = self.next_handle(&mut state, tag);
        state.cleartexts.insert(handle, value);
        handle
    }

    pub fn allow(&self, handle: CiphertextHandle, account: Address) {
        self.state().acl.entry(handle).or_default().insert(account);
    }

    pub fn is_allowed(&self, handle: &CiphertextHandle, account: &Address) -> bool {
        self.state()
            .acl
            .get(handle)
            .is_some_and(|accounts| accounts.contains(account))
    }

    /// Cleartext behind `handle`, bypassing authorization.
    pub fn cleartext(&self, handle: &CiphertextHandle) -> Option<U256> {
        self.state().cleartexts.get(handle).copied()
    }

    /// Check the signed authorization and release the plaintext of every pair.
    pub fn user_decrypt(
        &self,
        pairs: &[HandleContractPair],
        signature: &DecryptionSignature,
        now: u64,
    ) -> Result<HashMap<CiphertextHandle, U256>, CoprocessorError> {
        let authorization = signature.authorization(self.decryption_domain());
        let signer = authorization
            .recover_signer(&signature.signature)
            .map_err(|e| CoprocessorError::Decryption(e.to_string()))?;
        if signer != signature.user {
            return Err(CoprocessorError::Decryption(format!(
                "Signature was produced by {signer}, not {}",
                signature.user
            )));
        }
        if !signature.is_valid_at(now) {
            return Err(CoprocessorError::Decryption(
                "Decryption signature is expired or not yet valid".into(),
            ));
        }

        let state = self.state();
        let mut results = HashMap::with_capacity(pairs.len());
        for pair in pairs {
            if !signature.covers(&pair.contract_address) {
                return Err(CoprocessorError::Decryption(format!(
                    "Contract {} is not covered by the signature",
                    pair.contract_address
                )));
            }
            let Some(value) = state.cleartexts.get(&pair.handle) else {
                return Err(CoprocessorError::Decryption(format!(
                    "Unknown handle {}",
                    pair.handle
                )));
            };
            let allowed = |account: &Address| {
                state
                    .acl
                    .get(&pair.handle)
                    .is_some_and(|accounts| accounts.contains(account))
            };
            if !allowed(&signature.user) || !allowed(&pair.contract_address) {
                return Err(CoprocessorError::Decryption(format!(
                    "{} is not allowed to decrypt {}",
                    signature.user, pair.handle
                )));
            }
            results.insert(pair.handle, *value);
        }
        Ok(results)
    }
}

/// [`Coprocessor`] served by a [`MockFhevm`].
#[derive(Debug, Clone)]
pub struct MockCoprocessor {
    fhevm: Arc<MockFhevm>,
}

impl MockCoprocessor {
    pub fn new(fhevm: Arc<MockFhevm>) -> Self {
        Self { fhevm }
    }
}

#[async_trait]
impl Coprocessor for MockCoprocessor {
    fn chain_id(&self) -> u64 {
        self.fhevm.chain_id()
    }

    fn decryption_domain(&self) -> Eip712Domain {
        self.fhevm.decryption_domain()
    }

    async fn encrypt(
        &self,
        value: u32,
        contract: Address,
        user: Address,
    ) -> Result<EncryptedInput, CoprocessorError> {
        Ok(self.fhevm.encrypt_input(value, contract, user))
    }

    async fn decrypt(
        &self,
        pairs: &[HandleContractPair],
        signature: &DecryptionSignature,
    ) -> Result<HashMap<CiphertextHandle, U256>, CoprocessorError> {
        self.fhevm.user_decrypt(pairs, signature, unix_now())
    }
}

#[derive(Debug, Default)]
struct Readings {
    temperature: HashMap<Address, CiphertextHandle>,
    fever: HashMap<Address, CiphertextHandle>,
    transactions: u64,
}

/// The temperature check contract evaluated in-process against a [`MockFhevm`].
#[derive(Debug)]
pub struct MockTemperatureCheck {
    fhevm: Arc<MockFhevm>,
    address: Address,
    readings: Mutex<Readings>,
}

impl MockTemperatureCheck {
    pub fn new(fhevm: Arc<MockFhevm>, address: Address) -> Self {
        Self {
            fhevm,
            address,
            readings: Mutex::new(Readings::default()),
        }
    }

    fn readings(&self) -> MutexGuard<'_, Readings> {
        self.readings.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl TemperatureCheckApi for MockTemperatureCheck {
    fn address(&self) -> Address {
        self.address
    }

    async fn get_temperature_handle(&self, user: Address) -> Result<CiphertextHandle> {
        Ok(self
            .readings()
            .temperature
            .get(&user)
            .copied()
            .unwrap_or(CiphertextHandle::UNINITIALIZED))
    }

    async fn get_fever_handle(&self, user: Address) -> Result<CiphertextHandle> {
        Ok(self
            .readings()
            .fever
            .get(&user)
            .copied()
            .unwrap_or(CiphertextHandle::UNINITIALIZED))
    }

    async fn submit_temperature(
        &self,
        sender: Address,
        input: EncryptedInput,
    ) -> Result<SubmissionReceipt> {
        let Some(handle) = input.handles.first() else {
            bail!("Encrypted input carries no handle");
        };
        let value = self
            .fhevm
            .verify_input(*handle, &input.input_proof, self.address, sender)?;

        let is_fever = value >= U256::from(FEVER_THRESHOLD_TENTHS);
        let temperature = self.fhevm.store(value, b"temperature");
        let fever = self.fhevm.store(U256::from(is_fever as u8), b"fever");
        for handle in [temperature, fever] {
            self.fhevm.allow(handle, self.address);
            self.fhevm.allow(handle, sender);
        }

        let mut readings = self.readings();
        readings.temperature.insert(sender, temperature);
        readings.fever.insert(sender, fever);
        readings.transactions += 1;

        let mut preimage = sender.to_vec();
        preimage.extend_from_slice(&readings.transactions.to_be_bytes());
        let receipt = SubmissionReceipt {
            transaction_hash: B256::from(keccak256(preimage)),
            block_number: Some(readings.transactions),
        };
        info!(sender = %sender, tx = %receipt.transaction_hash, "Mock temperature submitted");
        Ok(receipt)
    }
}

/// Hands out one shared [`MockTemperatureCheck`] per address so state survives reconnects.
#[derive(Debug)]
pub struct MockConnector {
    fhevm: Arc<MockFhevm>,
    contracts: Mutex<HashMap<Address, Arc<MockTemperatureCheck>>>,
}

impl MockConnector {
    pub fn new(fhevm: Arc<MockFhevm>) -> Self {
        Self {
            fhevm,
            contracts: Mutex::new(HashMap::new()),
        }
    }

    pub fn contract(&self, address: Address) -> Arc<MockTemperatureCheck> {
        self.contracts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(address)
            .or_insert_with(|| Arc::new(MockTemperatureCheck::new(self.fhevm.clone(), address)))
            .clone()
    }
}

impl ContractConnector for MockConnector {
    fn temperature_check(&self, address: Address) -> Arc<dyn TemperatureCheckApi> {
        self.contract(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::signers::{local::PrivateKeySigner, SignerSync};
    use thermo_evm::DecryptAuthorization;

    const CONTRACT: Address = address!("0x5FbDB2315678afecb367f032d93F642f64180aa3");

    fn sign(
        fhevm: &MockFhevm,
        signer: &PrivateKeySigner,
        contracts: &[Address],
        start: u64,
    ) -> anyhow::Result<DecryptionSignature> {
        let auth = DecryptAuthorization::new(
            fhevm.decryption_domain(),
            Bytes::from_static(b"pk"),
            contracts,
            start,
            1,
        );
        let sig = signer.sign_hash_sync(&auth.signing_hash())?;
        Ok(DecryptionSignature::new(
            signer.address(),
            &auth,
            B256::ZERO,
            Bytes::from(sig.as_bytes().to_vec()),
        ))
    }

    async fn submit(
        fhevm: &Arc<MockFhevm>,
        contract: &MockTemperatureCheck,
        user: Address,
        tenths: u32,
    ) -> anyhow::Result<Vec<HandleContractPair>> {
        let input = fhevm.encrypt_input(tenths, CONTRACT, user);
        contract.submit_temperature(user, input).await?;
        let pairs = vec![
            HandleContractPair {
                handle: contract.get_temperature_handle(user).await?,
                contract_address: CONTRACT,
            },
            HandleContractPair {
                handle: contract.get_fever_handle(user).await?,
                contract_address: CONTRACT,
            },
        ];
        Ok(pairs)
    }

    #[tokio::test]
    async fn test_contract_evaluates_threshold() -> anyhow::Result<()> {
        let fhevm = Arc::new(MockFhevm::new(31337));
        let contract = MockTemperatureCheck::new(fhevm.clone(), CONTRACT);
        let user = PrivateKeySigner::random();

        assert!(!contract
            .get_temperature_handle(user.address())
            .await?
            .is_initialized());

        let pairs = submit(&fhevm, &contract, user.address(), 375).await?;
        assert_eq!(fhevm.cleartext(&pairs[0].handle), Some(U256::from(375)));
        assert_eq!(fhevm.cleartext(&pairs[1].handle), Some(U256::from(1)));
        for pair in &pairs {
            assert!(fhevm.is_allowed(&pair.handle, &user.address()));
            assert!(fhevm.is_allowed(&pair.handle, &CONTRACT));
            assert!(!fhevm.is_allowed(&pair.handle, &PrivateKeySigner::random().address()));
        }

        let pairs = submit(&fhevm, &contract, user.address(), 374).await?;
        assert_eq!(fhevm.cleartext(&pairs[1].handle), Some(U256::ZERO));
        Ok(())
    }

    #[tokio::test]
    async fn test_input_is_bound_to_sender() -> anyhow::Result<()> {
        let fhevm = Arc::new(MockFhevm::new(31337));
        let contract = MockTemperatureCheck::new(fhevm.clone(), CONTRACT);
        let user = PrivateKeySigner::random().address();
        let other = PrivateKeySigner::random().address();

        let input = fhevm.encrypt_input(370, CONTRACT, user);
        assert!(contract.submit_temperature(other, input.clone()).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_user_decrypt_checks_signer_and_acl() -> anyhow::Result<()> {
        let fhevm = Arc::new(MockFhevm::new(31337));
        let contract = MockTemperatureCheck::new(fhevm.clone(), CONTRACT);
        let user = PrivateKeySigner::random();
        let stranger = PrivateKeySigner::random();
        let now = unix_now();

        let pairs = submit(&fhevm, &contract, user.address(), 376).await?;

        let signature = sign(&fhevm, &user, &[CONTRACT], now)?;
        let plain = fhevm.user_decrypt(&pairs, &signature, now)?;
        assert_eq!(plain[&pairs[0].handle], U256::from(376));
        assert_eq!(plain[&pairs[1].handle], U256::from(1));

        let not_allowed = sign(&fhevm, &stranger, &[CONTRACT], now)?;
        assert!(matches!(
            fhevm.user_decrypt(&pairs, &not_allowed, now),
            Err(CoprocessorError::Decryption(_))
        ));

        let mut forged = signature.clone();
        forged.user = stranger.address();
        assert!(fhevm.user_decrypt(&pairs, &forged, now).is_err());

        assert!(fhevm
            .user_decrypt(&pairs, &signature, now + 2 * 86_400)
            .is_err());

        let unknown = [HandleContractPair {
            handle: CiphertextHandle::new(B256::with_last_byte(9)),
            contract_address: CONTRACT,
        }];
        assert!(fhevm.user_decrypt(&unknown, &signature, now).is_err());
        Ok(())
    }
}
