// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use thiserror::Error;

/// Failure establishing a coprocessor session. Cloneable so that every caller waiting on a
/// shared handshake receives the same error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("No coprocessor is configured for chain {0}")]
    NotConfigured(u64),

    #[error("Relayer at {url} is unreachable: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("Relayer handshake returned an invalid response: {0}")]
    InvalidHandshake(String),
}

/// Failure of an individual encrypt or decrypt call against an established session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoprocessorError {
    /// The coprocessor refused the batch: bad or expired signature, missing permission or an
    /// unknown handle.
    #[error("Decryption rejected: {0}")]
    Decryption(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Coprocessor transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for CoprocessorError {
    fn from(value: reqwest::Error) -> Self {
        CoprocessorError::Transport(value.to_string())
    }
}
