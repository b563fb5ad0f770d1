// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::helpers::{
    client::ClientHandle,
    provider::{live_context, Access},
};
use anyhow::{Context, Result};
use thermo_client::ThermoClient;
use thermo_config::AppConfig;
use thermo_evm::celsius_to_tenths;
use thermo_relayer::SessionManager;
use tracing::{info, instrument};

#[instrument(skip(config))]
pub async fn execute(config: &AppConfig, chain_id: u64, celsius: f64) -> Result<()> {
    let tenths = celsius_to_tenths(celsius)
        .with_context(|| format!("{celsius} is not a valid temperature"))?;
    let context = live_context(config, chain_id, Access::Write).await?;

    let client = ThermoClient::from_config(config, SessionManager::from_config(config)?)?;
    let mut client = ClientHandle::connect(client, context).await?;
    let view = client.submit(tenths).await?;
    info!(tenths, "Reading submitted");

    if let Some(message) = view.state.message {
        println!("{message}");
    }
    Ok(())
}
