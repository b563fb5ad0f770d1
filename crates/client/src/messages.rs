// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::{ClientError, ClientView};
use actix::Message;
use thermo_evm::{celsius_to_tenths, ProviderContext};
use tokio::sync::watch;

/// How an operation ended. Failures are already reflected in the state's message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpOutcome {
    Completed,
    /// The guard flag did not allow the operation.
    Skipped,
    /// The context changed while the operation was in flight.
    Discarded,
    Failed(ClientError),
}

/// The wallet connected, disconnected, or switched network or account.
#[derive(Message, Clone, Debug)]
#[rtype(result = "()")]
pub struct ProviderChanged(pub Option<ProviderContext>);

/// Re-read the ciphertext handles from the contract.
#[derive(Message, Clone, Copy, Debug, Default)]
#[rtype(result = "OpOutcome")]
pub struct Refresh;

/// Decrypt every pending handle in one coprocessor call.
#[derive(Message, Clone, Copy, Debug, Default)]
#[rtype(result = "OpOutcome")]
pub struct DecryptResults;

/// Encrypt and submit a reading in tenths of a degree Celsius.
#[derive(Message, Clone, Copy, Debug)]
#[rtype(result = "OpOutcome")]
pub struct SubmitTemperature {
    pub tenths: u32,
}

impl SubmitTemperature {
    pub fn from_celsius(celsius: f64) -> Option<Self> {
        celsius_to_tenths(celsius).map(|tenths| Self { tenths })
    }
}

/// Retry coprocessor session creation after a failed handshake.
#[derive(Message, Clone, Copy, Debug, Default)]
#[rtype(result = "()")]
pub struct Reconnect;

#[derive(Message, Clone, Copy, Debug, Default)]
#[rtype(result = "ClientView")]
pub struct GetClientView;

#[derive(Message, Clone, Copy, Debug, Default)]
#[rtype(result = "watch::Receiver<ClientView>")]
pub struct SubscribeView;
