// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use anyhow::Result;
use thermo_config::AppConfig;
use thermo_evm::BindingResolver;
use tracing::instrument;

/// Chain ids to report: the requested one, or every configured chain.
fn chain_ids(config: &AppConfig, chain_id: Option<u64>) -> Vec<u64> {
    match chain_id {
        Some(id) => vec![id],
        None => config
            .mock_chains()
            .iter()
            .map(|c| c.chain_id)
            .chain(config.chains().map(|c| c.chain_id))
            .collect(),
    }
}

pub fn describe(resolver: &BindingResolver, chain_id: u64) -> String {
    let binding = resolver.resolve(chain_id);
    let Some(address) = binding.contract_address else {
        return format!("{chain_id}\tnot deployed");
    };
    let network = if binding.is_mock_chain {
        "mock".to_string()
    } else {
        resolver
            .deployment(chain_id)
            .map(|d| d.chain_name.clone())
            .unwrap_or_default()
    };
    format!("{chain_id}\t{address}\t{network}")
}

#[instrument(skip(config))]
pub fn execute(config: &AppConfig, chain_id: Option<u64>) -> Result<()> {
    let resolver = BindingResolver::from_config(config)?;
    for id in chain_ids(config, chain_id) {
        println!("{}", describe(&resolver, id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;
    use thermo_config::{DEFAULT_MOCK_CONTRACT, HARDHAT_CHAIN_ID};

    #[test]
    fn test_describe() {
        let resolver = BindingResolver::new()
            .with_mock_chain(HARDHAT_CHAIN_ID, DEFAULT_MOCK_CONTRACT)
            .with_deployment(
                11155111,
                "sepolia",
                address!("0x9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0"),
            );

        assert_eq!(
            describe(&resolver, HARDHAT_CHAIN_ID),
            format!("31337\t{DEFAULT_MOCK_CONTRACT}\tmock")
        );
        assert!(describe(&resolver, 11155111).ends_with("\tsepolia"));
        assert_eq!(describe(&resolver, 1), "1\tnot deployed");
    }

    #[test]
    fn test_default_config_lists_dev_chain() {
        assert_eq!(chain_ids(&AppConfig::default(), None), vec![HARDHAT_CHAIN_ID]);
        assert_eq!(chain_ids(&AppConfig::default(), Some(5)), vec![5]);
    }
}
