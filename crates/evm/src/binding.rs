// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use alloy::primitives::Address;
use anyhow::Result;
use std::collections::{BTreeSet, HashMap};
use thermo_config::AppConfig;
use tracing::trace;

/// Where the contract lives on a given chain, if anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainBinding {
    pub chain_id: u64,
    pub contract_address: Option<Address>,
    pub is_mock_chain: bool,
}

impl ChainBinding {
    pub fn not_deployed(chain_id: u64) -> Self {
        Self {
            chain_id,
            contract_address: None,
            is_mock_chain: false,
        }
    }

    pub fn is_deployed(&self) -> bool {
        self.contract_address.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub chain_name: String,
    pub address: Address,
}

/// Static per-chain deployment table plus the set of development chains whose coprocessor runs
/// in-process.
#[derive(Debug, Clone, Default)]
pub struct BindingResolver {
    deployments: HashMap<u64, Deployment>,
    mock_chains: HashMap<u64, Address>,
}

impl BindingResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let mut resolver = Self::new();
        for chain in config.chains() {
            let address = chain.contracts.temperature_check.address()?;
            resolver = resolver.with_deployment(chain.chain_id, &chain.name, address);
        }
        for mock in config.mock_chains() {
            resolver = resolver.with_mock_chain(mock.chain_id, mock.contract_address());
        }
        Ok(resolver)
    }

    pub fn with_deployment(mut self, chain_id: u64, chain_name: &str, address: Address) -> Self {
        self.deployments.insert(
            chain_id,
            Deployment {
                chain_name: chain_name.to_owned(),
                address,
            },
        );
        self
    }

    pub fn with_mock_chain(mut self, chain_id: u64, address: Address) -> Self {
        self.mock_chains.insert(chain_id, address);
        self
    }

    /// Never fails: unknown chains resolve to a binding that is not deployed.
    pub fn resolve(&self, chain_id: u64) -> ChainBinding {
        if let Some(address) = self.mock_chains.get(&chain_id) {
            return ChainBinding {
                chain_id,
                contract_address: Some(*address),
                is_mock_chain: true,
            };
        }

        match self.deployments.get(&chain_id) {
            Some(deployment) => ChainBinding {
                chain_id,
                contract_address: Some(deployment.address),
                is_mock_chain: false,
            },
            None => {
                trace!(chain_id, "No deployment for chain");
                ChainBinding::not_deployed(chain_id)
            }
        }
    }

    pub fn is_mock_chain(&self, chain_id: u64) -> bool {
        self.mock_chains.contains_key(&chain_id)
    }

    pub fn mock_chain_ids(&self) -> BTreeSet<u64> {
        self.mock_chains.keys().copied().collect()
    }

    pub fn deployment(&self, chain_id: u64) -> Option<&Deployment> {
        self.deployments.get(&chain_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    const SEPOLIA: Address = address!("0x9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0");
    const LOCAL: Address = address!("0x5FbDB2315678afecb367f032d93F642f64180aa3");

    fn resolver() -> BindingResolver {
        BindingResolver::new()
            .with_deployment(11155111, "sepolia", SEPOLIA)
            .with_mock_chain(31337, LOCAL)
    }

    #[test]
    fn test_resolves_deployments_and_mocks() {
        let resolver = resolver();

        let sepolia = resolver.resolve(11155111);
        assert_eq!(sepolia.contract_address, Some(SEPOLIA));
        assert!(!sepolia.is_mock_chain);

        let local = resolver.resolve(31337);
        assert_eq!(local.contract_address, Some(LOCAL));
        assert!(local.is_mock_chain);
        assert_eq!(resolver.mock_chain_ids(), BTreeSet::from([31337]));
    }

    #[test]
    fn test_unknown_chain_is_not_deployed() {
        let resolver = resolver();
        for chain_id in [0, 1, 10, 137, 8453] {
            let binding = resolver.resolve(chain_id);
            assert_eq!(binding, ChainBinding::not_deployed(chain_id));
            assert!(!binding.is_deployed());
        }
    }

    #[test]
    fn test_mock_takes_precedence() {
        let resolver = resolver().with_deployment(31337, "hardhat", SEPOLIA);
        let binding = resolver.resolve(31337);
        assert!(binding.is_mock_chain);
        assert_eq!(binding.contract_address, Some(LOCAL));
    }

    #[test]
    fn test_from_default_config() -> Result<()> {
        let resolver = BindingResolver::from_config(&AppConfig::default())?;
        let binding = resolver.resolve(thermo_config::HARDHAT_CHAIN_ID);
        assert!(binding.is_mock_chain);
        assert_eq!(
            binding.contract_address,
            Some(thermo_config::DEFAULT_MOCK_CONTRACT)
        );
        Ok(())
    }
}
