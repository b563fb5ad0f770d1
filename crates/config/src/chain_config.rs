// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::{
    contract::ContractAddresses,
    rpc::{RpcAuth, RPC},
};
use alloy_primitives::{address, Address};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// Chain id of the local hardhat/anvil development node.
pub const HARDHAT_CHAIN_ID: u64 = 31337;

/// Address the first contract deployed by the default hardhat account lands at.
pub const DEFAULT_MOCK_CONTRACT: Address = address!("0x5FbDB2315678afecb367f032d93F642f64180aa3");

/// A live network the contract is deployed on, served by a remote relayer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ChainConfig {
    pub enabled: Option<bool>,
    pub name: String,
    pub chain_id: u64,
    pub rpc_url: String,
    #[serde(default)]
    pub rpc_auth: RpcAuth,
    pub contracts: ContractAddresses,
    /// Base url of the FHE relayer for this network
    pub relayer_url: Option<String>,
    /// Verifying contract of the EIP-712 domain used for user decryption
    pub decryption_verifier: Option<Address>,
}

impl ChainConfig {
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub fn rpc_url(&self) -> Result<RPC> {
        RPC::from_url(&self.rpc_url)
            .map_err(|e| anyhow!("Failed to parse RPC URL for chain {}: {}", self.name, e))
    }

    pub fn relayer_url(&self) -> Result<Option<Url>> {
        self.relayer_url
            .as_deref()
            .map(|url| {
                Url::parse(url).map_err(|e| {
                    anyhow!("Failed to parse relayer URL for chain {}: {}", self.name, e)
                })
            })
            .transpose()
    }
}

/// A development chain whose coprocessor runs in-process.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MockChainConfig {
    pub chain_id: u64,
    #[serde(default = "default_mock_name")]
    pub name: String,
    /// Defaults to [`DEFAULT_MOCK_CONTRACT`]
    pub temperature_check: Option<Address>,
}

fn default_mock_name() -> String {
    "hardhat".to_string()
}

impl MockChainConfig {
    pub fn contract_address(&self) -> Address {
        self.temperature_check.unwrap_or(DEFAULT_MOCK_CONTRACT)
    }
}

impl Default for MockChainConfig {
    fn default() -> Self {
        Self {
            chain_id: HARDHAT_CHAIN_ID,
            name: default_mock_name(),
            temperature_check: None,
        }
    }
}
