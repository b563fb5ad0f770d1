// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::Gate;
use alloy::primitives::{Address, Bytes};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use thermo_evm::{DecryptAuthorization, LocalWallet, Wallet, WalletError};

/// A local wallet whose signature prompts can be counted, held open or rejected.
pub struct TestWallet {
    inner: LocalWallet,
    pub sign_gate: Gate,
    sign_requests: AtomicUsize,
    reject: AtomicBool,
}

impl TestWallet {
    pub fn new(chain_id: u64) -> Self {
        Self {
            inner: LocalWallet::random(chain_id),
            sign_gate: Gate::open(),
            sign_requests: AtomicUsize::new(0),
            reject: AtomicBool::new(false),
        }
    }

    pub fn rejecting(chain_id: u64) -> Self {
        let wallet = Self::new(chain_id);
        wallet.set_reject(true);
        wallet
    }

    pub fn sign_requests(&self) -> usize {
        self.sign_requests.load(Ordering::SeqCst)
    }

    pub fn set_reject(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }
}

#[async_trait]
impl Wallet for TestWallet {
    fn address(&self) -> Address {
        self.inner.address()
    }

    async fn chain_id(&self) -> Result<u64, WalletError> {
        self.inner.chain_id().await
    }

    async fn sign_typed_data(&self, payload: &DecryptAuthorization) -> Result<Bytes, WalletError> {
        self.sign_requests.fetch_add(1, Ordering::SeqCst);
        self.sign_gate.pass().await;
        if self.reject.load(Ordering::SeqCst) {
            return Err(WalletError::UserRejected);
        }
        self.inner.sign_typed_data(payload).await
    }
}
