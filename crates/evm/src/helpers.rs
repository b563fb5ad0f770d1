// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use alloy::{
    network::EthereumWallet,
    providers::{DynProvider, Provider, ProviderBuilder},
    signers::local::PrivateKeySigner,
    transports::{
        http::{
            reqwest::{
                header::{HeaderMap, HeaderValue, AUTHORIZATION},
                Client,
            },
            Http,
        },
        ws::WsConnect,
        Authorization,
    },
};
use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use std::{env, sync::Arc};
use thermo_config::{ChainConfig, RpcAuth, RPC};
use tracing::info;

pub trait AuthConversions {
    fn to_header_value(&self) -> Option<HeaderValue>;
    fn to_ws_auth(&self) -> Option<Authorization>;
}

impl AuthConversions for RpcAuth {
    fn to_header_value(&self) -> Option<HeaderValue> {
        match self {
            RpcAuth::None => None,
            RpcAuth::Basic { username, password } => {
                let credentials = STANDARD.encode(format!("{}:{}", username, password));
                HeaderValue::from_str(&format!("Basic {}", credentials)).ok()
            }
            RpcAuth::Bearer(token) => HeaderValue::from_str(&format!("Bearer {}", token)).ok(),
        }
    }

    fn to_ws_auth(&self) -> Option<Authorization> {
        match self {
            RpcAuth::None => None,
            RpcAuth::Basic { username, password } => Some(Authorization::basic(username, password)),
            RpcAuth::Bearer(token) => Some(Authorization::bearer(token)),
        }
    }
}

/// A provider paired with the chain id it reported on connect.
#[derive(Clone)]
pub struct EthProvider<P> {
    provider: Arc<P>,
    chain_id: u64,
}

impl<P: Provider + Clone> EthProvider<P> {
    pub async fn new(provider: P) -> Result<Self> {
        let chain_id = provider.get_chain_id().await?;
        Ok(Self {
            provider: Arc::new(provider),
            chain_id,
        })
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }
}

pub struct ProviderConfig {
    rpc: RPC,
    auth: RpcAuth,
    expected_chain_id: Option<u64>,
}

impl ProviderConfig {
    pub fn new(rpc: RPC, auth: RpcAuth) -> Self {
        Self {
            rpc,
            auth,
            expected_chain_id: None,
        }
    }

    pub fn from_chain(chain: &ChainConfig) -> Result<Self> {
        Ok(Self {
            rpc: chain.rpc_url()?,
            auth: chain.rpc_auth.clone(),
            expected_chain_id: Some(chain.chain_id),
        })
    }

    pub async fn create_readonly_provider(&self) -> Result<EthProvider<DynProvider>> {
        let provider = if self.rpc.is_websocket() {
            ProviderBuilder::new()
                .connect_ws(self.create_ws_connect()?)
                .await
                .context("Failed to connect to WebSocket RPC. Check if the node is running and URL is correct.")?
        } else {
            ProviderBuilder::new().connect_client(self.create_http_client()?)
        };

        self.checked(EthProvider::new(provider.erased()).await?)
    }

    pub async fn create_signer_provider(
        &self,
        signer: &PrivateKeySigner,
    ) -> Result<EthProvider<DynProvider>> {
        let wallet = EthereumWallet::from(signer.clone());

        let provider = if self.rpc.is_websocket() {
            ProviderBuilder::new()
                .wallet(wallet)
                .connect_ws(self.create_ws_connect()?)
                .await
                .context("Failed to connect to WebSocket RPC. Check if the node is running and URL is correct.")?
        } else {
            ProviderBuilder::new()
                .wallet(wallet)
                .connect_client(self.create_http_client()?)
        };

        self.checked(EthProvider::new(provider.erased()).await?)
    }

    fn checked<P: Provider + Clone>(&self, provider: EthProvider<P>) -> Result<EthProvider<P>> {
        if let Some(expected) = self.expected_chain_id {
            if provider.chain_id() != expected {
                bail!(
                    "RPC {} reports chain id {} but the configuration expects {}",
                    self.rpc.url(),
                    provider.chain_id(),
                    expected
                );
            }
        }
        info!(chain_id = provider.chain_id(), rpc = %self.rpc.url(), "Connected provider");
        Ok(provider)
    }

    fn create_ws_connect(&self) -> Result<WsConnect> {
        let mut ws_connect = WsConnect::new(self.rpc.as_ws_url()?);

        if let Some(auth) = self.auth.to_ws_auth() {
            ws_connect = ws_connect.with_auth(auth);
        }

        Ok(ws_connect)
    }

    fn create_http_client(&self) -> Result<alloy::rpc::client::RpcClient> {
        let mut headers = HeaderMap::new();
        if let Some(auth_header) = self.auth.to_header_value() {
            headers.insert(AUTHORIZATION, auth_header);
        }

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        let http = Http::with_client(client, self.rpc.as_http_url()?.parse()?);
        Ok(alloy::rpc::client::RpcClient::new(http, self.rpc.is_local()))
    }
}

/// Read a private key from `var` and remove it from the environment.
pub fn load_signer_from_env(var: &str) -> Result<PrivateKeySigner> {
    let private_key = env::var(var).with_context(|| format!("{var} is not set"))?;
    env::remove_var(var);
    private_key
        .parse()
        .with_context(|| format!("{var} does not hold a valid private key"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_headers() {
        assert!(RpcAuth::None.to_header_value().is_none());

        let basic = RpcAuth::Basic {
            username: "user".into(),
            password: "pass".into(),
        };
        assert_eq!(
            basic.to_header_value().unwrap().to_str().unwrap(),
            "Basic dXNlcjpwYXNz"
        );

        let bearer = RpcAuth::Bearer("token".into());
        assert_eq!(
            bearer.to_header_value().unwrap().to_str().unwrap(),
            "Bearer token"
        );
        assert!(bearer.to_ws_auth().is_some());
    }
}
