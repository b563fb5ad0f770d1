// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::handle::{CiphertextHandle, EncryptedInput};
use alloy::{
    primitives::{Address, B256},
    providers::Provider,
    sol,
};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

sol! {
    #[derive(Debug)]
    #[sol(rpc)]
    contract TemperatureCheck {
        function submitTemperature(bytes32 encryptedTemperature, bytes calldata inputProof) external;
        function getTemperature(address user) external view returns (bytes32);
        function getFeverStatus(address user) external view returns (bytes32);
    }
}

/// Readings are stored as tenths of a degree Celsius.
pub const TEMPERATURE_SCALE: f64 = 10.0;

/// `temperature >= FEVER_THRESHOLD_TENTHS` is reported as fever (37.5 C).
pub const FEVER_THRESHOLD_TENTHS: u32 = 375;

/// Convert degrees Celsius to the fixed point representation submitted on chain.
pub fn celsius_to_tenths(celsius: f64) -> Option<u32> {
    let tenths = (celsius * TEMPERATURE_SCALE).round();
    (tenths.is_finite() && tenths >= 0.0 && tenths <= u32::MAX as f64).then_some(tenths as u32)
}

pub fn tenths_to_celsius(tenths: u32) -> f64 {
    tenths as f64 / TEMPERATURE_SCALE
}

/// Outcome of a mined submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub transaction_hash: B256,
    pub block_number: Option<u64>,
}

/// Read/write surface of the deployed temperature check contract.
#[async_trait]
pub trait TemperatureCheckApi: Send + Sync {
    fn address(&self) -> Address;

    /// Handle of the last temperature `user` submitted
    async fn get_temperature_handle(&self, user: Address) -> Result<CiphertextHandle>;

    /// Handle of the encrypted `temperature >= threshold` flag for `user`
    async fn get_fever_handle(&self, user: Address) -> Result<CiphertextHandle>;

    /// Submit an encrypted reading and wait for it to be mined
    async fn submit_temperature(
        &self,
        sender: Address,
        input: EncryptedInput,
    ) -> Result<SubmissionReceipt>;
}

/// Produces contract clients for whatever chain the current provider is connected to.
pub trait ContractConnector: Send + Sync {
    fn temperature_check(&self, address: Address) -> Arc<dyn TemperatureCheckApi>;
}

/// [`TemperatureCheckApi`] over an alloy provider.
#[derive(Clone)]
pub struct AlloyTemperatureCheck<P> {
    provider: P,
    address: Address,
}

impl<P: Provider + Clone + 'static> AlloyTemperatureCheck<P> {
    pub fn new(provider: P, address: Address) -> Self {
        Self { provider, address }
    }

    fn contract(&self) -> TemperatureCheck::TemperatureCheckInstance<P> {
        TemperatureCheck::new(self.address, self.provider.clone())
    }
}

#[async_trait]
impl<P: Provider + Clone + 'static> TemperatureCheckApi for AlloyTemperatureCheck<P> {
    fn address(&self) -> Address {
        self.address
    }

    async fn get_temperature_handle(&self, user: Address) -> Result<CiphertextHandle> {
        let handle = self
            .contract()
            .getTemperature(user)
            .call()
            .await
            .context("getTemperature call failed")?;
        Ok(CiphertextHandle::new(handle))
    }

    async fn get_fever_handle(&self, user: Address) -> Result<CiphertextHandle> {
        let handle = self
            .contract()
            .getFeverStatus(user)
            .call()
            .await
            .context("getFeverStatus call failed")?;
        Ok(CiphertextHandle::new(handle))
    }

    async fn submit_temperature(
        &self,
        sender: Address,
        input: EncryptedInput,
    ) -> Result<SubmissionReceipt> {
        let Some(handle) = input.handles.first() else {
            bail!("Encrypted input carries no handle");
        };

        let pending = self
            .contract()
            .submitTemperature(handle.as_b256(), input.input_proof)
            .from(sender)
            .send()
            .await
            .context("submitTemperature transaction was not accepted")?;
        debug!(tx = %pending.tx_hash(), "submitTemperature sent");

        let receipt = pending.get_receipt().await?;
        if !receipt.status() {
            return Err(anyhow!(
                "submitTemperature reverted in transaction {}",
                receipt.transaction_hash
            ));
        }
        info!(tx = %receipt.transaction_hash, block = ?receipt.block_number, "submitTemperature mined");

        Ok(SubmissionReceipt {
            transaction_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
        })
    }
}

/// Connects contracts through a single alloy provider.
#[derive(Clone)]
pub struct AlloyConnector<P> {
    provider: P,
}

impl<P: Provider + Clone + 'static> AlloyConnector<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

impl<P: Provider + Clone + 'static> ContractConnector for AlloyConnector<P> {
    fn temperature_check(&self, address: Address) -> Arc<dyn TemperatureCheckApi> {
        Arc::new(AlloyTemperatureCheck::new(self.provider.clone(), address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_point_conversion() {
        assert_eq!(celsius_to_tenths(37.6), Some(376));
        assert_eq!(celsius_to_tenths(38.0), Some(380));
        assert_eq!(celsius_to_tenths(-1.0), None);
        assert_eq!(celsius_to_tenths(f64::NAN), None);
        assert_eq!(tenths_to_celsius(376), 37.6);
        assert_eq!(tenths_to_celsius(FEVER_THRESHOLD_TENTHS), 37.5);
    }
}
