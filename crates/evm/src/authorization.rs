// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use alloy::{
    primitives::{Address, Bytes, Signature, B256, U256},
    sol,
    sol_types::{eip712_domain, Eip712Domain, SolStruct},
};
use anyhow::{Context, Result};

const SECONDS_PER_DAY: u64 = 86_400;

sol! {
    /// Typed payload a user signs to let the coprocessor re-encrypt their ciphertexts under
    /// `publicKey`.
    #[derive(Debug, PartialEq, Eq)]
    struct UserDecryptRequestVerification {
        bytes publicKey;
        address[] contractAddresses;
        uint256 startTimestamp;
        uint256 durationDays;
        bytes extraData;
    }
}

pub fn decryption_domain(chain_id: u64, verifying_contract: Address) -> Eip712Domain {
    eip712_domain! {
        name: "Decryption",
        version: "1",
        chain_id: chain_id,
        verifying_contract: verifying_contract,
    }
}

/// A decryption authorization waiting to be signed by the wallet.
#[derive(Debug, Clone)]
pub struct DecryptAuthorization {
    pub domain: Eip712Domain,
    pub message: UserDecryptRequestVerification,
}

impl DecryptAuthorization {
    /// `contracts` is sorted so the signed payload does not depend on caller ordering.
    pub fn new(
        domain: Eip712Domain,
        public_key: Bytes,
        contracts: &[Address],
        start_timestamp: u64,
        duration_days: u64,
    ) -> Self {
        let mut contract_addresses = contracts.to_vec();
        contract_addresses.sort();
        contract_addresses.dedup();
        Self {
            domain,
            message: UserDecryptRequestVerification {
                publicKey: public_key,
                contractAddresses: contract_addresses,
                startTimestamp: U256::from(start_timestamp),
                durationDays: U256::from(duration_days),
                extraData: Bytes::from_static(&[0u8]),
            },
        }
    }

    pub fn signing_hash(&self) -> B256 {
        self.message.eip712_signing_hash(&self.domain)
    }

    pub fn start_timestamp(&self) -> u64 {
        self.message.startTimestamp.saturating_to()
    }

    pub fn duration_days(&self) -> u64 {
        self.message.durationDays.saturating_to()
    }

    pub fn valid_until(&self) -> u64 {
        self.start_timestamp()
            .saturating_add(self.duration_days().saturating_mul(SECONDS_PER_DAY))
    }

    /// Address that produced `signature` over this payload.
    pub fn recover_signer(&self, signature: &[u8]) -> Result<Address> {
        let signature =
            Signature::try_from(signature).context("Malformed decryption signature")?;
        signature
            .recover_address_from_prehash(&self.signing_hash())
            .context("Could not recover signer from decryption signature")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;
    use alloy::signers::{local::PrivateKeySigner, SignerSync};

    const VERIFIER: Address = address!("0xb6E160B1ff80D67Bfe90A85eE06Ce0A2613607D1");
    const A: Address = address!("0x5FbDB2315678afecb367f032d93F642f64180aa3");
    const B: Address = address!("0x9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0");

    #[test]
    fn test_contract_order_does_not_change_hash() {
        let domain = decryption_domain(31337, VERIFIER);
        let key = Bytes::from_static(b"pk");
        let one = DecryptAuthorization::new(domain.clone(), key.clone(), &[A, B], 1_000, 365);
        let two = DecryptAuthorization::new(domain, key, &[B, A, B], 1_000, 365);
        assert_eq!(one.signing_hash(), two.signing_hash());
        assert_eq!(one.valid_until(), 1_000 + 365 * SECONDS_PER_DAY);
    }

    #[test]
    fn test_recover_signer() -> Result<()> {
        let signer = PrivateKeySigner::random();
        let auth = DecryptAuthorization::new(
            decryption_domain(11155111, VERIFIER),
            Bytes::from_static(b"pk"),
            &[A],
            1_700_000_000,
            1,
        );
        let signature = signer.sign_hash_sync(&auth.signing_hash())?;
        assert_eq!(auth.recover_signer(&signature.as_bytes())?, signer.address());

        let other_chain = DecryptAuthorization::new(
            decryption_domain(1, VERIFIER),
            Bytes::from_static(b"pk"),
            &[A],
            1_700_000_000,
            1,
        );
        assert_ne!(
            other_chain.recover_signer(&signature.as_bytes())?,
            signer.address()
        );
        Ok(())
    }
}
