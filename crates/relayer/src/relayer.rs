// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::{Coprocessor, CoprocessorError, DecryptionSignature, SessionError};
use alloy::{
    primitives::{Address, Bytes, B256, U256},
    sol_types::Eip712Domain,
};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{collections::HashMap, fmt, sync::Arc, time::Duration};
use thermo_config::ChainConfig;
use thermo_evm::{decryption_domain, CiphertextHandle, EncryptedInput, HandleContractPair};
use tracing::{debug, info, warn};
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Network public key the relayer hands out during the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PublicKeyInfo {
    pub data_id: String,
    pub urls: Vec<String>,
}

/// Produces raw FHE ciphertext for an input. The relayer only verifies and registers it.
pub trait InputEncryptor: Send + Sync {
    fn encrypt_u32(
        &self,
        public_key: &PublicKeyInfo,
        value: u32,
        contract: Address,
        user: Address,
        chain_id: u64,
    ) -> anyhow::Result<Bytes>;
}

#[derive(Clone)]
pub struct RelayerConfig {
    pub url: Url,
    pub chain_id: u64,
    pub decryption_verifier: Address,
    pub encryptor: Option<Arc<dyn InputEncryptor>>,
}

impl RelayerConfig {
    pub fn new(url: Url, chain_id: u64, decryption_verifier: Address) -> Self {
        Self {
            url,
            chain_id,
            decryption_verifier,
            encryptor: None,
        }
    }

    /// `None` when the chain has no relayer configured.
    pub fn from_chain(chain: &ChainConfig) -> anyhow::Result<Option<Self>> {
        let Some(url) = chain.relayer_url()? else {
            return Ok(None);
        };
        let Some(verifier) = chain.decryption_verifier else {
            anyhow::bail!(
                "Chain '{}' has a relayer_url but no decryption_verifier",
                chain.name
            );
        };
        Ok(Some(Self::new(url, chain.chain_id, verifier)))
    }

    pub fn with_encryptor(mut self, encryptor: Arc<dyn InputEncryptor>) -> Self {
        self.encryptor = Some(encryptor);
        self
    }
}

impl fmt::Debug for RelayerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayerConfig")
            .field("url", &self.url.as_str())
            .field("chain_id", &self.chain_id)
            .field("decryption_verifier", &self.decryption_verifier)
            .field("encryptor", &self.encryptor.is_some())
            .finish()
    }
}

#[derive(Deserialize)]
struct Envelope<T> {
    response: T,
}

#[derive(Deserialize)]
struct KeyUrlResponse {
    fhe_key_info: Vec<FheKeyInfo>,
}

#[derive(Deserialize)]
struct FheKeyInfo {
    fhe_public_key: PublicKeyInfo,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InputProofRequest {
    contract_address: Address,
    user_address: Address,
    ciphertext_with_input_verification: String,
    contract_chain_id: String,
    extra_data: String,
}

#[derive(Deserialize)]
struct InputProofResponse {
    handles: Vec<B256>,
    signatures: Vec<Bytes>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserDecryptRequest {
    handle_contract_pairs: Vec<WirePair>,
    request_validity: RequestValidity,
    contracts_chain_id: String,
    contract_addresses: Vec<Address>,
    user_address: Address,
    signature: String,
    public_key: String,
    extra_data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WirePair {
    handle: B256,
    contract_address: Address,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestValidity {
    start_timestamp: String,
    duration_days: String,
}

#[derive(Deserialize)]
struct Plaintext {
    handle: B256,
    value: U256,
}

#[derive(Deserialize)]
struct RelayerErrorBody {
    message: Option<String>,
}

/// Assemble the on-chain input proof: handle count, signer count, handles, signatures, extra
/// data.
fn encode_input_proof(handles: &[B256], signatures: &[Bytes]) -> Result<Bytes, CoprocessorError> {
    let handle_count = u8::try_from(handles.len())
        .map_err(|_| CoprocessorError::Encryption("Too many handles in input proof".into()))?;
    let signer_count = u8::try_from(signatures.len())
        .map_err(|_| CoprocessorError::Encryption("Too many signatures in input proof".into()))?;

    let mut proof = vec![handle_count, signer_count];
    for handle in handles {
        proof.extend_from_slice(handle.as_slice());
    }
    for signature in signatures {
        proof.extend_from_slice(signature);
    }
    proof.push(0);
    Ok(Bytes::from(proof))
}

/// Coprocessor reached over the HTTP relayer API.
pub struct RelayerClient {
    http: reqwest::Client,
    config: RelayerConfig,
    public_key: PublicKeyInfo,
}

impl RelayerClient {
    /// Perform the handshake: fetch the network public key.
    pub async fn connect(config: RelayerConfig) -> Result<Self, SessionError> {
        let unreachable = |reason: String| SessionError::Unreachable {
            url: config.url.to_string(),
            reason,
        };

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| unreachable(e.to_string()))?;

        let url = config
            .url
            .join("v1/keyurl")
            .map_err(|e| SessionError::InvalidHandshake(e.to_string()))?;
        debug!(url = %url, "Fetching relayer key url");

        let response = http
            .get(url)
            .send()
            .await
            .map_err(|e| unreachable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(unreachable(format!("HTTP {}", response.status())));
        }

        let body: Envelope<KeyUrlResponse> = response
            .json()
            .await
            .map_err(|e| SessionError::InvalidHandshake(e.to_string()))?;
        let public_key = body
            .response
            .fhe_key_info
            .into_iter()
            .next()
            .map(|info| info.fhe_public_key)
            .ok_or_else(|| SessionError::InvalidHandshake("No FHE public key offered".into()))?;

        info!(
            chain_id = config.chain_id,
            relayer = %config.url,
            key_id = %public_key.data_id,
            "Connected to relayer"
        );

        Ok(Self {
            http,
            config,
            public_key,
        })
    }

    pub fn public_key(&self) -> &PublicKeyInfo {
        &self.public_key
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Result<T, (u16, String)>, CoprocessorError> {
        let url = self
            .config
            .url
            .join(path)
            .map_err(|e| CoprocessorError::Transport(e.to_string()))?;
        let response = self.http.post(url).json(body).send().await?;
        let status = response.status();
        if status.is_success() {
            let body: Envelope<T> = response.json().await?;
            return Ok(Ok(body.response));
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<RelayerErrorBody>(&text)
            .ok()
            .and_then(|b| b.message)
            .unwrap_or(text);
        Ok(Err((status.as_u16(), message)))
    }
}

#[async_trait]
impl Coprocessor for RelayerClient {
    fn chain_id(&self) -> u64 {
        self.config.chain_id
    }

    fn decryption_domain(&self) -> Eip712Domain {
        decryption_domain(self.config.chain_id, self.config.decryption_verifier)
    }

    async fn encrypt(
        &self,
        value: u32,
        contract: Address,
        user: Address,
    ) -> Result<EncryptedInput, CoprocessorError> {
        let Some(encryptor) = &self.config.encryptor else {
            return Err(CoprocessorError::Encryption(
                "No input encryptor is configured for this relayer".into(),
            ));
        };
        let ciphertext = encryptor
            .encrypt_u32(&self.public_key, value, contract, user, self.config.chain_id)
            .map_err(|e| CoprocessorError::Encryption(e.to_string()))?;

        let request = InputProofRequest {
            contract_address: contract,
            user_address: user,
            ciphertext_with_input_verification: hex::encode(&ciphertext),
            contract_chain_id: format!("{:#x}", self.config.chain_id),
            extra_data: "0x00".into(),
        };
        let response: InputProofResponse = self
            .post("v1/input-proof", &request)
            .await?
            .map_err(|(status, message)| {
                CoprocessorError::Encryption(format!("Input rejected ({status}): {message}"))
            })?;

        if response.handles.is_empty() {
            return Err(CoprocessorError::Encryption(
                "Relayer returned no handles for input".into(),
            ));
        }

        Ok(EncryptedInput {
            input_proof: encode_input_proof(&response.handles, &response.signatures)?,
            handles: response.handles.into_iter().map(CiphertextHandle::from).collect(),
        })
    }

    async fn decrypt(
        &self,
        pairs: &[HandleContractPair],
        signature: &DecryptionSignature,
    ) -> Result<HashMap<CiphertextHandle, U256>, CoprocessorError> {
        let request = UserDecryptRequest {
            handle_contract_pairs: pairs
                .iter()
                .map(|pair| WirePair {
                    handle: pair.handle.as_b256(),
                    contract_address: pair.contract_address,
                })
                .collect(),
            request_validity: RequestValidity {
                start_timestamp: signature.valid_from.to_string(),
                duration_days: signature.duration_days.to_string(),
            },
            contracts_chain_id: self.config.chain_id.to_string(),
            contract_addresses: signature.contracts.clone(),
            user_address: signature.user,
            signature: hex::encode(&signature.signature),
            public_key: hex::encode(&signature.public_key),
            extra_data: "0x00".into(),
        };

        let plaintexts: Vec<Plaintext> = self
            .post("v1/user-decrypt", &request)
            .await?
            .map_err(|(status, message)| {
                if status >= 500 {
                    CoprocessorError::Transport(format!("Relayer error ({status}): {message}"))
                } else {
                    CoprocessorError::Decryption(message)
                }
            })?;

        let results: HashMap<_, _> = plaintexts
            .into_iter()
            .map(|p| (CiphertextHandle::from(p.handle), p.value))
            .collect();
        if let Some(missing) = pairs.iter().find(|p| !results.contains_key(&p.handle)) {
            warn!(handle = %missing.handle, "Relayer omitted a requested handle");
            return Err(CoprocessorError::Decryption(format!(
                "No plaintext returned for handle {}",
                missing.handle
            )));
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_proof_layout() -> Result<(), CoprocessorError> {
        let handles = [B256::with_last_byte(1), B256::with_last_byte(2)];
        let signatures = [Bytes::from(vec![7u8; 65])];
        let proof = encode_input_proof(&handles, &signatures)?;

        assert_eq!(proof.len(), 2 + 64 + 65 + 1);
        assert_eq!(proof[0], 2);
        assert_eq!(proof[1], 1);
        assert_eq!(&proof[2..34], handles[0].as_slice());
        assert_eq!(proof[proof.len() - 1], 0);
        Ok(())
    }
}
