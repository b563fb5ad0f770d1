// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use thermo_config::AppConfig;
use thermo_evm::{
    helpers::{load_signer_from_env, ProviderConfig},
    AlloyConnector, LocalWallet, ProviderContext,
};
use tracing::info;

pub const PRIVATE_KEY_VAR: &str = "PRIVATE_KEY";

/// Whether the chain provider must be able to send transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

/// Wallet and contracts for a configured live chain, signing with the key in `PRIVATE_KEY`.
pub async fn live_context(
    config: &AppConfig,
    chain_id: u64,
    access: Access,
) -> Result<ProviderContext> {
    if config.mock_chain(chain_id).is_some() {
        bail!(
            "Chain {chain_id} is a development chain simulated in-process. Use `thermo dev` instead."
        );
    }
    let chain = config
        .chain(chain_id)
        .with_context(|| format!("Chain {chain_id} is not configured"))?;

    let signer = load_signer_from_env(PRIVATE_KEY_VAR)?;
    let provider_config = ProviderConfig::from_chain(chain)?;
    let provider = match access {
        Access::Read => provider_config.create_readonly_provider().await?,
        Access::Write => provider_config.create_signer_provider(&signer).await?,
    };
    let wallet = LocalWallet::new(signer, chain_id);
    info!(chain = %chain.name, account = %wallet.signer().address(), "Using wallet");

    Ok(ProviderContext::new(
        chain_id,
        Arc::new(wallet),
        Arc::new(AlloyConnector::new(provider.provider().clone())),
    ))
}
