// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::Gate;
use alloy::{
    primitives::{Address, U256},
    sol_types::Eip712Domain,
};
use async_trait::async_trait;
use futures::{future::BoxFuture, FutureExt};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};
use thermo_evm::{CiphertextHandle, EncryptedInput, HandleContractPair};
use thermo_relayer::{
    Coprocessor, CoprocessorError, CoprocessorFactory, DecryptionSignature, MockCoprocessor,
    MockFhevm, SessionError,
};

/// Wraps the in-process coprocessor, recording every call and holding decrypts at a gate.
pub struct ControlledCoprocessor {
    inner: MockCoprocessor,
    pub decrypt_gate: Gate,
    encrypt_calls: AtomicUsize,
    batches: Mutex<Vec<Vec<HandleContractPair>>>,
    reject_next: Mutex<Option<CoprocessorError>>,
}

impl ControlledCoprocessor {
    pub fn new(fhevm: Arc<MockFhevm>) -> Self {
        Self {
            inner: MockCoprocessor::new(fhevm),
            decrypt_gate: Gate::open(),
            encrypt_calls: AtomicUsize::new(0),
            batches: Mutex::new(vec![]),
            reject_next: Mutex::new(None),
        }
    }

    pub fn decrypt_calls(&self) -> usize {
        self.batches.lock().unwrap().len()
    }

    /// Handles requested by each decrypt call, in call order.
    pub fn batches(&self) -> Vec<Vec<HandleContractPair>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn encrypt_calls(&self) -> usize {
        self.encrypt_calls.load(Ordering::SeqCst)
    }

    /// Fail the next decrypt with `error` regardless of its input.
    pub fn reject_next_decrypt(&self, error: CoprocessorError) {
        *self.reject_next.lock().unwrap() = Some(error);
    }
}

#[async_trait]
impl Coprocessor for ControlledCoprocessor {
    fn chain_id(&self) -> u64 {
        self.inner.chain_id()
    }

    fn decryption_domain(&self) -> Eip712Domain {
        self.inner.decryption_domain()
    }

    async fn encrypt(
        &self,
        value: u32,
        contract: Address,
        user: Address,
    ) -> Result<EncryptedInput, CoprocessorError> {
        self.encrypt_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.encrypt(value, contract, user).await
    }

    async fn decrypt(
        &self,
        pairs: &[HandleContractPair],
        signature: &DecryptionSignature,
    ) -> Result<HashMap<CiphertextHandle, U256>, CoprocessorError> {
        self.batches.lock().unwrap().push(pairs.to_vec());
        self.decrypt_gate.pass().await;
        if let Some(error) = self.reject_next.lock().unwrap().take() {
            return Err(error);
        }
        self.inner.decrypt(pairs, signature).await
    }
}

/// Session factory handing out one shared [`ControlledCoprocessor`]. Handshakes can be held at
/// a gate or made to fail.
pub struct ControlledFactory {
    pub coprocessor: Arc<ControlledCoprocessor>,
    pub connect_gate: Arc<Gate>,
    connects: AtomicUsize,
    unreachable: AtomicBool,
}

impl ControlledFactory {
    pub fn new(fhevm: Arc<MockFhevm>) -> Self {
        Self {
            coprocessor: Arc::new(ControlledCoprocessor::new(fhevm)),
            connect_gate: Arc::new(Gate::open()),
            connects: AtomicUsize::new(0),
            unreachable: AtomicBool::new(false),
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }
}

impl CoprocessorFactory for ControlledFactory {
    fn connect(
        &self,
        chain_id: u64,
    ) -> BoxFuture<'static, Result<Arc<dyn Coprocessor>, SessionError>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let unreachable = self.unreachable.load(Ordering::SeqCst);
        let gate = self.connect_gate.clone();
        let coprocessor = self.coprocessor.clone();
        async move {
            gate.pass().await;
            if unreachable {
                return Err(SessionError::Unreachable {
                    url: format!("mock://{chain_id}"),
                    reason: "connection refused".into(),
                });
            }
            Ok(coprocessor as Arc<dyn Coprocessor>)
        }
        .boxed()
    }
}
