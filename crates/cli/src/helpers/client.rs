// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use actix::{Actor, Addr};
use anyhow::{anyhow, bail, Result};
use std::time::Duration;
use thermo_client::{
    ClientView, DecryptResults, GetClientView, OpOutcome, ProviderChanged, Refresh,
    SessionStatus, SubmitTemperature, ThermoClient,
};
use thermo_evm::ProviderContext;
use tokio::{sync::watch, time::timeout};
use tracing::debug;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(60);

/// A started client bound to one provider context.
pub struct ClientHandle {
    addr: Addr<ThermoClient>,
    view: watch::Receiver<ClientView>,
}

impl ClientHandle {
    /// Start `client`, hand it `context` and wait until the session is up and the handles are
    /// loaded.
    pub async fn connect(client: ThermoClient, context: ProviderContext) -> Result<Self> {
        let view = client.subscribe();
        let addr = client.start();
        addr.send(ProviderChanged(Some(context))).await?;

        let mut handle = Self { addr, view };
        let view = handle
            .wait(|v| {
                !v.state.is_deployed
                    || matches!(
                        v.state.session_status,
                        SessionStatus::Ready | SessionStatus::Disconnected
                    )
            })
            .await?;

        if !view.state.session_ready() {
            bail!(
                "{}",
                view.state.message.unwrap_or_else(|| "Not connected".into())
            );
        }
        handle.refresh().await?;
        Ok(handle)
    }

    async fn wait(&mut self, pred: impl FnMut(&ClientView) -> bool) -> Result<ClientView> {
        let view = timeout(CONNECT_TIMEOUT, self.view.wait_for(pred))
            .await
            .map_err(|_| anyhow!("Timed out waiting for the client"))??;
        Ok(view.clone())
    }

    /// Reload the handles, waiting out a refresh that is already in flight.
    pub async fn refresh(&mut self) -> Result<ClientView> {
        match self.addr.send(Refresh).await? {
            OpOutcome::Skipped => {
                debug!("Refresh already running");
                self.wait(|v| !v.state.is_refreshing).await
            }
            outcome => {
                completed(outcome)?;
                self.view().await
            }
        }
    }

    pub async fn submit(&mut self, tenths: u32) -> Result<ClientView> {
        completed(self.addr.send(SubmitTemperature { tenths }).await?)?;
        self.view().await
    }

    pub async fn decrypt(&mut self) -> Result<ClientView> {
        match self.addr.send(DecryptResults).await? {
            OpOutcome::Skipped => debug!("Nothing to decrypt"),
            outcome => completed(outcome)?,
        }
        self.view().await
    }

    pub async fn view(&self) -> Result<ClientView> {
        Ok(self.addr.send(GetClientView).await?)
    }
}

fn completed(outcome: OpOutcome) -> Result<()> {
    match outcome {
        OpOutcome::Completed => Ok(()),
        OpOutcome::Failed(e) => Err(e.into()),
        other => bail!("Operation did not complete: {other:?}"),
    }
}

/// Human readable summary of a view.
pub fn render(view: &ClientView) -> String {
    let state = &view.state;
    let mut lines = vec![
        format!("chain:       {}", state.chain_id.map_or("-".into(), |id| id.to_string())),
        format!("account:     {}", state.account.map_or("-".into(), |a| a.to_string())),
        format!(
            "contract:    {}",
            state.contract_address.map_or("not deployed".into(), |a| a.to_string())
        ),
        format!("session:     {}", state.session_status),
        format!("data:        {}", view.data_status()),
    ];
    if let Some(celsius) = state.clear_temperature {
        lines.push(format!("temperature: {celsius:.1} C"));
    }
    lines.push(format!("condition:   {}", view.condition()));
    if let Some(message) = &state.message {
        lines.push(format!("status:      {message}"));
    }
    lines.join("\n")
}
