// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use alloy::primitives::Address;
use std::fmt;
use thermo_evm::CiphertextHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Idle,
    Connecting,
    Ready,
    Disconnected,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionStatus::Idle => "Idle",
            SessionStatus::Connecting => "Connecting",
            SessionStatus::Ready => "Connected",
            SessionStatus::Disconnected => "Disconnected",
        };
        f.write_str(label)
    }
}

/// What the decrypted fever flag says about the reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Fever,
    Normal,
    Unknown,
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Condition::Fever => "Fever Detected",
            Condition::Normal => "Normal Temperature",
            Condition::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataStatus {
    Decrypted,
    Encrypted,
    NoData,
}

impl fmt::Display for DataStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DataStatus::Decrypted => "Decrypted",
            DataStatus::Encrypted => "Encrypted",
            DataStatus::NoData => "No Data",
        };
        f.write_str(label)
    }
}

/// Observable state of the client. Only the client actor mutates it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClientState {
    pub chain_id: Option<u64>,
    pub account: Option<Address>,
    pub contract_address: Option<Address>,
    pub is_deployed: bool,
    pub is_mock_chain: bool,
    pub session_status: SessionStatus,
    pub temperature_handle: CiphertextHandle,
    pub fever_handle: CiphertextHandle,
    /// Degrees Celsius
    pub clear_temperature: Option<f64>,
    pub clear_fever_result: Option<bool>,
    pub is_refreshing: bool,
    pub is_decrypting: bool,
    pub is_submitting: bool,
    pub awaiting_signature: bool,
    pub message: Option<String>,
}

impl ClientState {
    pub fn handles(&self) -> (CiphertextHandle, CiphertextHandle) {
        (self.temperature_handle, self.fever_handle)
    }

    /// Stored handles that have no plaintext yet.
    pub fn pending_handles(&self) -> Vec<CiphertextHandle> {
        let mut pending = Vec::with_capacity(2);
        if self.temperature_handle.is_initialized() && self.clear_temperature.is_none() {
            pending.push(self.temperature_handle);
        }
        if self.fever_handle.is_initialized() && self.clear_fever_result.is_none() {
            pending.push(self.fever_handle);
        }
        pending
    }

    pub fn has_pending_handles(&self) -> bool {
        !self.pending_handles().is_empty()
    }

    pub fn session_ready(&self) -> bool {
        self.session_status == SessionStatus::Ready
    }

    pub fn can_decrypt(&self) -> bool {
        self.has_pending_handles() && self.session_ready() && !self.is_decrypting
    }

    pub fn can_get_temperature(&self) -> bool {
        self.is_deployed && self.session_ready() && !self.is_refreshing
    }

    pub fn can_submit(&self) -> bool {
        self.is_deployed && self.session_ready() && !self.is_submitting && self.account.is_some()
    }

    pub fn has_data(&self) -> bool {
        self.temperature_handle.is_initialized()
    }

    pub fn is_decrypted(&self) -> bool {
        self.clear_temperature.is_some()
    }

    pub fn condition(&self) -> Condition {
        match self.clear_fever_result {
            Some(true) => Condition::Fever,
            Some(false) => Condition::Normal,
            None => Condition::Unknown,
        }
    }

    pub fn data_status(&self) -> DataStatus {
        if self.is_decrypted() {
            DataStatus::Decrypted
        } else if self.has_data() {
            DataStatus::Encrypted
        } else {
            DataStatus::NoData
        }
    }

    pub fn flags(&self) -> Flags {
        Flags {
            can_decrypt: self.can_decrypt(),
            can_get_temperature: self.can_get_temperature(),
            can_submit: self.can_submit(),
            has_data: self.has_data(),
            is_decrypted: self.is_decrypted(),
        }
    }

    /// Store freshly read handles. A handle that changed loses its plaintext. Returns whether
    /// anything changed.
    pub(crate) fn set_handles(
        &mut self,
        temperature: CiphertextHandle,
        fever: CiphertextHandle,
    ) -> bool {
        let mut changed = false;
        if self.temperature_handle != temperature {
            self.temperature_handle = temperature;
            self.clear_temperature = None;
            changed = true;
        }
        if self.fever_handle != fever {
            self.fever_handle = fever;
            self.clear_fever_result = None;
            changed = true;
        }
        changed
    }

    /// Forget everything tied to the current account.
    pub(crate) fn reset_readings(&mut self) {
        self.set_handles(CiphertextHandle::UNINITIALIZED, CiphertextHandle::UNINITIALIZED);
        self.is_refreshing = false;
        self.is_decrypting = false;
        self.is_submitting = false;
        self.awaiting_signature = false;
    }
}

/// Derived flags, recomputed from [`ClientState`] on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags {
    pub can_decrypt: bool,
    pub can_get_temperature: bool,
    pub can_submit: bool,
    pub has_data: bool,
    pub is_decrypted: bool,
}

/// Snapshot published to observers after every transition.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClientView {
    pub state: ClientState,
    pub flags: Flags,
    pub generation: u64,
}

impl ClientView {
    pub fn new(state: &ClientState, generation: u64) -> Self {
        Self {
            state: state.clone(),
            flags: state.flags(),
            generation,
        }
    }

    pub fn condition(&self) -> Condition {
        self.state.condition()
    }

    pub fn data_status(&self) -> DataStatus {
        self.state.data_status()
    }

    /// Label for the decrypt action.
    pub fn decrypt_label(&self) -> &'static str {
        if self.state.is_decrypting {
            "Decrypting..."
        } else if self.flags.can_decrypt {
            "Decrypt Results"
        } else {
            "Nothing to decrypt"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::B256;

    fn handle(b: u8) -> CiphertextHandle {
        CiphertextHandle::new(B256::with_last_byte(b))
    }

    fn ready() -> ClientState {
        ClientState {
            is_deployed: true,
            session_status: SessionStatus::Ready,
            account: Some(Address::ZERO),
            ..Default::default()
        }
    }

    #[test]
    fn test_flags_need_deployment_and_session() {
        let state = ClientState::default();
        assert_eq!(state.flags(), Flags::default());

        let mut state = ready();
        assert!(state.can_get_temperature());
        assert!(!state.can_decrypt());

        state.session_status = SessionStatus::Disconnected;
        assert!(!state.can_get_temperature());
        assert!(!state.can_submit());
    }

    #[test]
    fn test_pending_handles() {
        let mut state = ready();
        state.set_handles(handle(1), handle(2));
        assert_eq!(state.pending_handles(), vec![handle(1), handle(2)]);
        assert!(state.can_decrypt());

        state.clear_temperature = Some(37.6);
        state.clear_fever_result = Some(true);
        assert!(!state.has_pending_handles());

        state.is_decrypting = true;
        state.set_handles(handle(1), handle(3));
        assert_eq!(state.clear_temperature, Some(37.6));
        assert_eq!(state.clear_fever_result, None);
        assert!(!state.can_decrypt());
    }

    #[test]
    fn test_changed_handle_clears_plaintext() {
        let mut state = ready();
        state.set_handles(handle(1), handle(2));
        state.clear_temperature = Some(38.0);
        state.clear_fever_result = Some(true);

        assert!(!state.set_handles(handle(1), handle(2)));
        assert!(state.is_decrypted());

        assert!(state.set_handles(handle(4), handle(5)));
        assert_eq!(state.clear_temperature, None);
        assert_eq!(state.clear_fever_result, None);
    }

    #[test]
    fn test_rendering() {
        let mut state = ready();
        assert_eq!(state.data_status().to_string(), "No Data");
        assert_eq!(state.condition(), Condition::Unknown);

        state.set_handles(handle(1), handle(2));
        assert_eq!(state.data_status().to_string(), "Encrypted");
        assert_eq!(ClientView::new(&state, 0).decrypt_label(), "Decrypt Results");

        state.clear_temperature = Some(38.0);
        state.clear_fever_result = Some(true);
        assert_eq!(state.data_status().to_string(), "Decrypted");
        assert_eq!(state.condition().to_string(), "Fever Detected");
        assert_eq!(ClientView::new(&state, 0).decrypt_label(), "Nothing to decrypt");

        state.clear_fever_result = Some(false);
        assert_eq!(state.condition().to_string(), "Normal Temperature");
    }
}
