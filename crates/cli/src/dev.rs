// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::helpers::client::{render, ClientHandle};
use anyhow::{Context, Result};
use std::sync::Arc;
use thermo_client::ThermoClient;
use thermo_config::AppConfig;
use thermo_evm::{celsius_to_tenths, BindingResolver, LocalWallet, ProviderContext};
use thermo_relayer::{MockConnector, MockFhevm, SessionManager};
use tracing::{info, instrument};

/// Drive a complete cycle against a throwaway in-process chain with a random wallet.
#[instrument(skip(config))]
pub async fn execute(config: &AppConfig, celsius: f64) -> Result<()> {
    let tenths = celsius_to_tenths(celsius)
        .with_context(|| format!("{celsius} is not a valid temperature"))?;
    let chain = config.mock_chains().first().cloned().unwrap_or_default();

    let fhevm = Arc::new(MockFhevm::new(chain.chain_id));
    let sessions = SessionManager::new().with_mock_instance(fhevm.clone());
    let resolver =
        BindingResolver::new().with_mock_chain(chain.chain_id, chain.contract_address());
    let wallet = Arc::new(LocalWallet::random(chain.chain_id));
    let context = ProviderContext::new(chain.chain_id, wallet, Arc::new(MockConnector::new(fhevm)));
    info!(chain = %chain.name, account = %context.account(), "Starting development cycle");

    let client = ThermoClient::new(resolver, sessions, config.decryption().duration_days);
    let mut client = ClientHandle::connect(client, context).await?;

    client.submit(tenths).await?;
    client.refresh().await?;
    let view = client.decrypt().await?;

    println!("{}", render(&view));
    Ok(())
}
