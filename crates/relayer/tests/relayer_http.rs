// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use actix_web::{web, App, HttpResponse, HttpServer};
use alloy::primitives::{address, Address, Bytes, B256, U256};
use anyhow::Result;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use thermo_evm::{CiphertextHandle, HandleContractPair, LocalWallet, Wallet};
use thermo_relayer::{
    Coprocessor, CoprocessorError, DecryptionKeypair, DecryptionSignature, InputEncryptor,
    PublicKeyInfo, RelayerClient, RelayerConfig, SessionError,
};
use url::Url;

const CHAIN_ID: u64 = 11155111;
const VERIFIER: Address = address!("0xb6E160B1ff80D67Bfe90A85eE06Ce0A2613607D1");
const CONTRACT: Address = address!("0x9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0");

type Seen = web::Data<Mutex<Vec<Value>>>;

async fn keyurl() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "response": {
            "fhe_key_info": [
                { "fhe_public_key": { "data_id": "fhe-public-key", "urls": ["https://keys.test/pk"] } }
            ],
            "crs": {}
        }
    }))
}

async fn input_proof(body: web::Json<Value>, seen: Seen) -> HttpResponse {
    seen.lock().unwrap().push(body.0.clone());
    HttpResponse::Ok().json(json!({
        "response": {
            "handles": [B256::with_last_byte(0xaa)],
            "signatures": [format!("0x{}", "11".repeat(65))]
        }
    }))
}

async fn user_decrypt(body: web::Json<Value>, seen: Seen) -> HttpResponse {
    seen.lock().unwrap().push(body.0.clone());
    if body["signature"] == "00" {
        return HttpResponse::BadRequest().json(json!({ "message": "Invalid EIP-712 signature" }));
    }
    let plaintexts: Vec<Value> = body["handleContractPairs"]
        .as_array()
        .unwrap()
        .iter()
        .enumerate()
        .map(|(i, pair)| {
            let value = if i == 0 { "0x178" } else { "0x1" };
            json!({ "handle": pair["handle"], "value": value })
        })
        .collect();
    HttpResponse::Ok().json(json!({ "response": plaintexts }))
}

fn start_relayer(seen: Seen) -> std::io::Result<Url> {
    let server = HttpServer::new(move || {
        App::new()
            .app_data(seen.clone())
            .route("/v1/keyurl", web::get().to(keyurl))
            .route("/v1/input-proof", web::post().to(input_proof))
            .route("/v1/user-decrypt", web::post().to(user_decrypt))
    })
    .workers(1)
    .bind(("127.0.0.1", 0))?;
    let addr = server.addrs()[0];
    actix_web::rt::spawn(server.run());
    Ok(Url::parse(&format!("http://{addr}/")).unwrap())
}

struct FixedEncryptor;

impl InputEncryptor for FixedEncryptor {
    fn encrypt_u32(
        &self,
        public_key: &PublicKeyInfo,
        value: u32,
        _contract: Address,
        _user: Address,
        _chain_id: u64,
    ) -> anyhow::Result<Bytes> {
        assert_eq!(public_key.data_id, "fhe-public-key");
        Ok(Bytes::from(value.to_be_bytes().to_vec()))
    }
}

async fn sign(
    client: &RelayerClient,
    wallet: &LocalWallet,
    keypair: &DecryptionKeypair,
) -> Result<DecryptionSignature> {
    let auth = thermo_evm::DecryptAuthorization::new(
        client.decryption_domain(),
        keypair.public_key().clone(),
        &[CONTRACT],
        1_700_000_000,
        365,
    );
    let signature = wallet.sign_typed_data(&auth).await?;
    Ok(DecryptionSignature::new(
        wallet.address(),
        &auth,
        keypair.fingerprint(),
        signature,
    ))
}

#[actix::test]
async fn test_handshake_and_batched_decrypt() -> Result<()> {
    let seen: Seen = web::Data::new(Mutex::new(vec![]));
    let url = start_relayer(seen.clone())?;

    let client = RelayerClient::connect(RelayerConfig::new(url, CHAIN_ID, VERIFIER)).await?;
    assert_eq!(client.public_key().urls, vec!["https://keys.test/pk".to_string()]);

    let wallet = LocalWallet::random(CHAIN_ID);
    let keypair = DecryptionKeypair::random();
    let signature = sign(&client, &wallet, &keypair).await?;

    let pairs: Vec<_> = [1u8, 2]
        .into_iter()
        .map(|b| HandleContractPair {
            handle: CiphertextHandle::new(B256::with_last_byte(b)),
            contract_address: CONTRACT,
        })
        .collect();
    let plain = client.decrypt(&pairs, &signature).await?;
    assert_eq!(plain[&pairs[0].handle], U256::from(376));
    assert_eq!(plain[&pairs[1].handle], U256::from(1));

    let requests = seen.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request["handleContractPairs"].as_array().unwrap().len(), 2);
    assert_eq!(request["contractsChainId"], CHAIN_ID.to_string());
    assert_eq!(request["requestValidity"]["durationDays"], "365");
    assert_eq!(request["publicKey"], hex::encode(keypair.public_key()));
    Ok(())
}

#[actix::test]
async fn test_rejected_decrypt_is_a_decryption_error() -> Result<()> {
    let seen: Seen = web::Data::new(Mutex::new(vec![]));
    let url = start_relayer(seen)?;
    let client = RelayerClient::connect(RelayerConfig::new(url, CHAIN_ID, VERIFIER)).await?;

    let wallet = LocalWallet::random(CHAIN_ID);
    let mut signature = sign(&client, &wallet, &DecryptionKeypair::random()).await?;
    signature.signature = Bytes::from_static(&[0]);

    let pairs = [HandleContractPair {
        handle: CiphertextHandle::new(B256::with_last_byte(1)),
        contract_address: CONTRACT,
    }];
    let err = client.decrypt(&pairs, &signature).await.unwrap_err();
    assert_eq!(
        err,
        CoprocessorError::Decryption("Invalid EIP-712 signature".into())
    );
    Ok(())
}

#[actix::test]
async fn test_encrypt_registers_input() -> Result<()> {
    let seen: Seen = web::Data::new(Mutex::new(vec![]));
    let url = start_relayer(seen.clone())?;

    let bare = RelayerClient::connect(RelayerConfig::new(url.clone(), CHAIN_ID, VERIFIER)).await?;
    let user = LocalWallet::random(CHAIN_ID).address();
    assert!(matches!(
        bare.encrypt(376, CONTRACT, user).await,
        Err(CoprocessorError::Encryption(_))
    ));

    let config = RelayerConfig::new(url, CHAIN_ID, VERIFIER).with_encryptor(Arc::new(FixedEncryptor));
    let client = RelayerClient::connect(config).await?;
    let input = client.encrypt(376, CONTRACT, user).await?;

    assert_eq!(
        input.handles,
        vec![CiphertextHandle::new(B256::with_last_byte(0xaa))]
    );
    assert_eq!(input.input_proof[0], 1);
    assert_eq!(input.input_proof[1], 1);

    let requests = seen.lock().unwrap().clone();
    assert_eq!(
        requests[0]["ciphertextWithInputVerification"],
        hex::encode(376u32.to_be_bytes())
    );
    assert_eq!(requests[0]["contractChainId"], "0xaa36a7");
    Ok(())
}

#[actix::test]
async fn test_unreachable_relayer() {
    let url = Url::parse("http://127.0.0.1:1/").unwrap();
    let result = RelayerClient::connect(RelayerConfig::new(url, CHAIN_ID, VERIFIER)).await;
    assert!(matches!(result, Err(SessionError::Unreachable { .. })));
}
