// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use alloy::primitives::{address, Address, Bytes};
use anyhow::Result;
use std::sync::Arc;
use thermo_config::{AppConfig, DEFAULT_MOCK_CONTRACT, HARDHAT_CHAIN_ID};
use thermo_evm::{
    decryption_domain, BindingResolver, ContractConnector, DecryptAuthorization, LocalWallet,
    ProviderContext, TemperatureCheckApi, Wallet,
};

const VERIFIER: Address = address!("0xb6E160B1ff80D67Bfe90A85eE06Ce0A2613607D1");
const SEPOLIA_CONTRACT: Address = address!("0x9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0");

struct NoContracts;

impl ContractConnector for NoContracts {
    fn temperature_check(&self, _address: Address) -> Arc<dyn TemperatureCheckApi> {
        unreachable!("contracts are not used in these tests")
    }
}

fn context(wallet: LocalWallet) -> ProviderContext {
    ProviderContext::new(HARDHAT_CHAIN_ID, Arc::new(wallet), Arc::new(NoContracts))
}

#[tokio::test]
async fn test_local_wallet_signs_recoverable_authorization() -> Result<()> {
    let wallet = LocalWallet::random(HARDHAT_CHAIN_ID);
    let authorization = DecryptAuthorization::new(
        decryption_domain(HARDHAT_CHAIN_ID, VERIFIER),
        Bytes::from_static(b"public key"),
        &[DEFAULT_MOCK_CONTRACT],
        1_700_000_000,
        365,
    );

    let signature = wallet.sign_typed_data(&authorization).await?;
    assert_eq!(signature.len(), 65);
    assert_eq!(authorization.recover_signer(&signature)?, wallet.address());
    assert_eq!(wallet.chain_id().await?, HARDHAT_CHAIN_ID);
    Ok(())
}

#[test]
fn test_provider_context_identity() {
    let first = context(LocalWallet::random(HARDHAT_CHAIN_ID));
    let second = context(LocalWallet::random(HARDHAT_CHAIN_ID));
    assert_ne!(first.provider_id, second.provider_id);
    assert_eq!(first, first.clone());

    let switched_chain = first.with_chain(11155111);
    assert_ne!(first, switched_chain);
    assert_ne!(first.session_identity(), switched_chain.session_identity());

    let switched_account = first.with_wallet(Arc::new(LocalWallet::random(HARDHAT_CHAIN_ID)));
    assert_ne!(first, switched_account);
    assert_eq!(first.session_identity(), switched_account.session_identity());
}

#[test]
fn test_resolver_from_config() -> Result<()> {
    let config = AppConfig::from_yaml_str(
        r#"
chains:
  - name: sepolia
    chain_id: 11155111
    rpc_url: "https://sepolia.example.org"
    contracts:
      temperature_check: "0x9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0"
    relayer_url: "https://relayer.example.org"
    decryption_verifier: "0xb6E160B1ff80D67Bfe90A85eE06Ce0A2613607D1"
"#,
    )?;
    let resolver = BindingResolver::from_config(&config)?;

    let sepolia = resolver.resolve(11155111);
    assert_eq!(sepolia.contract_address, Some(SEPOLIA_CONTRACT));
    assert!(!sepolia.is_mock_chain);

    let local = resolver.resolve(HARDHAT_CHAIN_ID);
    assert_eq!(local.contract_address, Some(DEFAULT_MOCK_CONTRACT));
    assert!(local.is_mock_chain);

    assert!(!resolver.resolve(1).is_deployed());
    Ok(())
}
