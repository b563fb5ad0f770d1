// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::authorization::DecryptAuthorization;
use crate::temperature_check::ContractConnector;
use alloy::{
    primitives::{Address, Bytes},
    signers::{local::PrivateKeySigner, SignerSync},
};
use async_trait::async_trait;
use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("User rejected the signature request")]
    UserRejected,
    #[error("Wallet unavailable: {0}")]
    Unavailable(String),
}

/// The account that owns the readings and authorizes their decryption.
#[async_trait]
pub trait Wallet: Send + Sync {
    fn address(&self) -> Address;

    async fn chain_id(&self) -> Result<u64, WalletError>;

    /// May wait indefinitely for the user.
    async fn sign_typed_data(&self, payload: &DecryptAuthorization) -> Result<Bytes, WalletError>;
}

/// Wallet backed by a private key held in memory.
pub struct LocalWallet {
    signer: PrivateKeySigner,
    chain_id: u64,
}

impl LocalWallet {
    pub fn new(signer: PrivateKeySigner, chain_id: u64) -> Self {
        Self { signer, chain_id }
    }

    pub fn random(chain_id: u64) -> Self {
        Self::new(PrivateKeySigner::random(), chain_id)
    }

    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }
}

#[async_trait]
impl Wallet for LocalWallet {
    fn address(&self) -> Address {
        self.signer.address()
    }

    async fn chain_id(&self) -> Result<u64, WalletError> {
        Ok(self.chain_id)
    }

    async fn sign_typed_data(&self, payload: &DecryptAuthorization) -> Result<Bytes, WalletError> {
        let signature = self
            .signer
            .sign_hash_sync(&payload.signing_hash())
            .map_err(|e| WalletError::Unavailable(e.to_string()))?;
        Ok(Bytes::from(signature.as_bytes().to_vec()))
    }
}

/// Identity of a connected provider. A new id is issued every time the user reconnects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderId(u64);

static NEXT_PROVIDER_ID: AtomicU64 = AtomicU64::new(1);

impl ProviderId {
    pub fn next() -> Self {
        Self(NEXT_PROVIDER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "provider#{}", self.0)
    }
}

/// Everything the client needs from the currently connected wallet. Two contexts compare equal
/// when they point at the same provider, chain and account.
#[derive(Clone)]
pub struct ProviderContext {
    pub provider_id: ProviderId,
    pub chain_id: u64,
    pub wallet: Arc<dyn Wallet>,
    pub contracts: Arc<dyn ContractConnector>,
}

impl ProviderContext {
    pub fn new(
        chain_id: u64,
        wallet: Arc<dyn Wallet>,
        contracts: Arc<dyn ContractConnector>,
    ) -> Self {
        Self {
            provider_id: ProviderId::next(),
            chain_id,
            wallet,
            contracts,
        }
    }

    /// Same provider switched to another network
    pub fn with_chain(&self, chain_id: u64) -> Self {
        Self {
            chain_id,
            ..self.clone()
        }
    }

    /// Same provider switched to another account
    pub fn with_wallet(&self, wallet: Arc<dyn Wallet>) -> Self {
        Self {
            wallet,
            ..self.clone()
        }
    }

    pub fn account(&self) -> Address {
        self.wallet.address()
    }

    /// Provider and chain; a change of either invalidates the coprocessor session.
    pub fn session_identity(&self) -> (ProviderId, u64) {
        (self.provider_id, self.chain_id)
    }
}

impl PartialEq for ProviderContext {
    fn eq(&self, other: &Self) -> bool {
        self.session_identity() == other.session_identity() && self.account() == other.account()
    }
}

impl Eq for ProviderContext {}

impl fmt::Debug for ProviderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderContext")
            .field("provider_id", &self.provider_id)
            .field("chain_id", &self.chain_id)
            .field("account", &self.account())
            .finish()
    }
}
