// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use thermo_evm::WalletError;
use thermo_relayer::{CoprocessorError, SessionError};
use thiserror::Error;

/// Everything that can go wrong in a client operation. None of these are fatal: they end up in
/// the state's message and the flags.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("Contract is not deployed on chain {0}")]
    BindingAbsent(u64),

    #[error("FHE coprocessor unavailable: {0}")]
    SessionUnavailable(String),

    #[error("Signature request was rejected")]
    UserRejectedSignature,

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Result computed against outdated state was discarded")]
    StaleResultDiscarded,

    #[error("Chain call failed: {0}")]
    Transport(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Wallet error: {0}")]
    Wallet(String),
}

impl From<CoprocessorError> for ClientError {
    fn from(value: CoprocessorError) -> Self {
        match value {
            CoprocessorError::Decryption(reason) => ClientError::Decryption(reason),
            CoprocessorError::Encryption(reason) => ClientError::Encryption(reason),
            CoprocessorError::Transport(reason) => ClientError::Transport(reason),
        }
    }
}

impl From<WalletError> for ClientError {
    fn from(value: WalletError) -> Self {
        match value {
            WalletError::UserRejected => ClientError::UserRejectedSignature,
            WalletError::Unavailable(reason) => ClientError::Wallet(reason),
        }
    }
}

impl From<SessionError> for ClientError {
    fn from(value: SessionError) -> Self {
        ClientError::SessionUnavailable(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_errors_map_to_client_errors() {
        assert_eq!(
            ClientError::from(WalletError::UserRejected),
            ClientError::UserRejectedSignature
        );
        assert_eq!(
            ClientError::from(WalletError::Unavailable("no account".into())),
            ClientError::Wallet("no account".into())
        );
        assert_eq!(
            ClientError::from(SessionError::NotConfigured(1)).to_string(),
            "FHE coprocessor unavailable: No coprocessor is configured for chain 1"
        );
    }
}
