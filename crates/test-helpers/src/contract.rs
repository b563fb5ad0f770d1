// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::Gate;
use alloy::primitives::Address;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};
use thermo_evm::{
    CiphertextHandle, ContractConnector, EncryptedInput, SubmissionReceipt, TemperatureCheckApi,
};
use thermo_relayer::{MockFhevm, MockTemperatureCheck};

/// The mock contract with counted, gateable reads.
pub struct ControlledContract {
    inner: Arc<MockTemperatureCheck>,
    pub read_gate: Gate,
    reads: AtomicUsize,
    submissions: AtomicUsize,
    failing: AtomicBool,
}

impl ControlledContract {
    pub fn new(fhevm: Arc<MockFhevm>, address: Address) -> Self {
        Self {
            inner: Arc::new(MockTemperatureCheck::new(fhevm, address)),
            read_gate: Gate::open(),
            reads: AtomicUsize::new(0),
            submissions: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    pub fn inner(&self) -> Arc<MockTemperatureCheck> {
        self.inner.clone()
    }

    /// Number of handle reads; a refresh performs two.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    /// Make every call fail as if the RPC endpoint were down.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("RPC endpoint unavailable"));
        }
        Ok(())
    }

    async fn read(&self) -> Result<()> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.read_gate.pass().await;
        self.check()
    }
}

#[async_trait]
impl TemperatureCheckApi for ControlledContract {
    fn address(&self) -> Address {
        self.inner.address()
    }

    async fn get_temperature_handle(&self, user: Address) -> Result<CiphertextHandle> {
        self.read().await?;
        self.inner.get_temperature_handle(user).await
    }

    async fn get_fever_handle(&self, user: Address) -> Result<CiphertextHandle> {
        self.read().await?;
        self.inner.get_fever_handle(user).await
    }

    async fn submit_temperature(
        &self,
        sender: Address,
        input: EncryptedInput,
    ) -> Result<SubmissionReceipt> {
        self.check()?;
        self.submissions.fetch_add(1, Ordering::SeqCst);
        self.inner.submit_temperature(sender, input).await
    }
}

/// Always hands out the same [`ControlledContract`], whatever address is asked for.
pub struct ControlledConnector {
    pub contract: Arc<ControlledContract>,
}

impl ControlledConnector {
    pub fn new(contract: Arc<ControlledContract>) -> Self {
        Self { contract }
    }
}

impl ContractConnector for ControlledConnector {
    fn temperature_check(&self, _address: Address) -> Arc<dyn TemperatureCheckApi> {
        self.contract.clone()
    }
}
