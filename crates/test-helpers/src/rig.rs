// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::{ControlledConnector, ControlledContract, ControlledCoprocessor, ControlledFactory, TestWallet};
use alloy::primitives::{address, Address};
use anyhow::Result;
use std::sync::Arc;
use thermo_config::{DEFAULT_MOCK_CONTRACT, HARDHAT_CHAIN_ID};
use thermo_evm::{BindingResolver, ProviderContext, TemperatureCheckApi};
use thermo_relayer::{MockFhevm, SessionManager};

pub const SEPOLIA_CHAIN_ID: u64 = 11155111;
pub const SEPOLIA_CONTRACT: Address = address!("0x9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0");

/// A development chain and a "remote" chain wired to controllable fakes.
pub struct TestRig {
    pub fhevm: Arc<MockFhevm>,
    pub factory: Arc<ControlledFactory>,
    pub sepolia_factory: Arc<ControlledFactory>,
    pub sessions: SessionManager,
    pub resolver: BindingResolver,
    pub contract: Arc<ControlledContract>,
    pub wallet: Arc<TestWallet>,
    pub context: ProviderContext,
}

impl Default for TestRig {
    fn default() -> Self {
        Self::new()
    }
}

impl TestRig {
    pub fn new() -> Self {
        Self::with_wallet(TestWallet::new(HARDHAT_CHAIN_ID))
    }

    pub fn with_wallet(wallet: TestWallet) -> Self {
        let fhevm = Arc::new(MockFhevm::new(HARDHAT_CHAIN_ID));
        let factory = Arc::new(ControlledFactory::new(fhevm.clone()));
        let sepolia_factory = Arc::new(ControlledFactory::new(Arc::new(MockFhevm::new(
            SEPOLIA_CHAIN_ID,
        ))));

        let sessions = SessionManager::new()
            .with_factory(HARDHAT_CHAIN_ID, factory.clone())
            .with_factory(SEPOLIA_CHAIN_ID, sepolia_factory.clone());
        let resolver = BindingResolver::new()
            .with_mock_chain(HARDHAT_CHAIN_ID, DEFAULT_MOCK_CONTRACT)
            .with_deployment(SEPOLIA_CHAIN_ID, "sepolia", SEPOLIA_CONTRACT);

        let contract = Arc::new(ControlledContract::new(fhevm.clone(), DEFAULT_MOCK_CONTRACT));
        let wallet = Arc::new(wallet);
        let context = ProviderContext::new(
            HARDHAT_CHAIN_ID,
            wallet.clone(),
            Arc::new(ControlledConnector::new(contract.clone())),
        );

        Self {
            fhevm,
            factory,
            sepolia_factory,
            sessions,
            resolver,
            contract,
            wallet,
            context,
        }
    }

    pub fn coprocessor(&self) -> Arc<ControlledCoprocessor> {
        self.factory.coprocessor.clone()
    }

    pub fn account(&self) -> Address {
        self.context.account()
    }

    /// The same provider after the user switched networks.
    pub fn on_chain(&self, chain_id: u64) -> ProviderContext {
        self.context.with_chain(chain_id)
    }

    /// The same provider after the user switched to a fresh account.
    pub fn with_account(&self, wallet: Arc<TestWallet>) -> ProviderContext {
        self.context.with_wallet(wallet)
    }

    /// Submit a reading for the rig's account without going through a client.
    pub async fn submit_directly(&self, tenths: u32) -> Result<()> {
        let contract = self.contract.inner();
        let input = self
            .fhevm
            .encrypt_input(tenths, contract.address(), self.account());
        contract.submit_temperature(self.account(), input).await?;
        Ok(())
    }
}
