// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::helpers::{
    client::{render, ClientHandle},
    provider::{live_context, Access},
};
use anyhow::Result;
use thermo_client::ThermoClient;
use thermo_config::AppConfig;
use thermo_relayer::SessionManager;
use tracing::instrument;

#[instrument(skip(config))]
pub async fn execute(config: &AppConfig, chain_id: u64) -> Result<()> {
    let context = live_context(config, chain_id, Access::Read).await?;

    let client = ThermoClient::from_config(config, SessionManager::from_config(config)?)?;
    let mut client = ClientHandle::connect(client, context).await?;
    let view = client.decrypt().await?;

    println!("{}", render(&view));
    Ok(())
}
