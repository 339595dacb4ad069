// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Test doubles for the instance, its factory and the wallet signer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use alloy::dyn_abi::TypedData;
use alloy::primitives::{address, Address};
use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Notify;

use crate::instance::{
    DecryptedValue, DecryptedValues, FhevmInstance, Handle, InstanceConfig, InstanceError,
    InstanceFactory, Keypair, PublicKeyMaterial, PublicParamsMap, PublicParamsMaterial,
    UserDecryptPayload,
};
use crate::signer::{DecryptSigner, SignerError};
use crate::storage::CachedSignature;

/// Hardhat test account #0.
pub const HARDHAT_KEY_0: &str =
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

pub const HARDHAT_ADDRESS_0: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

/// Chain id the mock instance puts in its typed-data domain.
pub const MOCK_GATEWAY_CHAIN_ID: u64 = 55815;

pub const MOCK_KEY_ID: &str = "mock-key-id";

const MOCK_VERIFYING_CONTRACT: &str = "0xa02Cda4Ca3a71D7C46997716F4283aa851C28812";

/// The FHECounter contract from the Hardhat template.
pub fn contract() -> Address {
    address!("5FbDB2315678afecb367f032d93F642f64180aa3")
}

/// A `UserDecryptRequestVerification` payload; `chain_id == 0` leaves the
/// domain without a chain id.
pub fn sample_typed_data(
    chain_id: u64,
    public_key: &str,
    start_timestamp: u64,
    duration_days: u32,
) -> TypedData {
    let mut domain_type = vec![
        json!({ "name": "name", "type": "string" }),
        json!({ "name": "version", "type": "string" }),
    ];
    let mut domain = json!({
        "name": "Decryption",
        "version": "1",
        "verifyingContract": MOCK_VERIFYING_CONTRACT,
    });
    if chain_id != 0 {
        domain_type.push(json!({ "name": "chainId", "type": "uint256" }));
        domain["chainId"] = json!(chain_id);
    }
    domain_type.push(json!({ "name": "verifyingContract", "type": "address" }));

    serde_json::from_value(json!({
        "types": {
            "EIP712Domain": domain_type,
            "UserDecryptRequestVerification": [
                { "name": "publicKey", "type": "bytes" },
                { "name": "contractAddresses", "type": "address[]" },
                { "name": "startTimestamp", "type": "uint256" },
                { "name": "durationDays", "type": "uint256" }
            ]
        },
        "primaryType": "UserDecryptRequestVerification",
        "domain": domain,
        "message": {
            "publicKey": public_key,
            "contractAddresses": [contract().to_string()],
            "startTimestamp": start_timestamp,
            "durationDays": duration_days
        }
    }))
    .expect("valid typed data")
}

pub fn sample_params() -> PublicParamsMap {
    [8u16, 64]
        .into_iter()
        .map(|bits| {
            (
                bits,
                PublicParamsMaterial {
                    public_params_id: format!("params-{bits}"),
                    public_params: vec![bits as u8; 4],
                },
            )
        })
        .collect()
}

fn signature_record(start_timestamp: u64, expires_at_ms: i64) -> CachedSignature {
    CachedSignature {
        signature: format!("0x{}", "ab".repeat(65)),
        public_key: format!("0x{:064x}", 1),
        private_key: format!("0x{:064x}", 2),
        user_address: HARDHAT_ADDRESS_0.to_string().to_lowercase(),
        contract_address: contract().to_string().to_lowercase(),
        chain_id: MOCK_GATEWAY_CHAIN_ID,
        start_timestamp,
        duration_days: 7,
        expires_at_ms,
        cached_at_ms: 0,
    }
}

/// A signature whose window lies far in the future.
pub fn valid_signature() -> CachedSignature {
    let start = 4_000_000_000;
    signature_record(start, CachedSignature::expiry_ms(start, 7))
}

pub fn cached_signature_expiring_at(expires_at_ms: i64) -> CachedSignature {
    signature_record(0, expires_at_ms)
}

/// Handle `0x0a` decrypts to 10; anything that is not hex is malformed.
fn value_for(handle: &str) -> Result<DecryptedValue, InstanceError> {
    let digits = handle.strip_prefix("0x").unwrap_or(handle);
    u64::from_str_radix(digits, 16)
        .map(DecryptedValue::from)
        .map_err(|_| InstanceError::InvalidHandle(handle.to_string()))
}

// =============================================================================
// MockInstance
// =============================================================================

pub struct MockInstance {
    domain_chain_id: u64,
    omit: Option<Handle>,
    keypairs: AtomicUsize,
    public_decrypts: AtomicUsize,
    user_decrypts: AtomicUsize,
    last_user_decrypt: Mutex<Option<UserDecryptPayload>>,
}

impl Default for MockInstance {
    fn default() -> Self {
        Self {
            domain_chain_id: MOCK_GATEWAY_CHAIN_ID,
            omit: None,
            keypairs: AtomicUsize::new(0),
            public_decrypts: AtomicUsize::new(0),
            user_decrypts: AtomicUsize::new(0),
            last_user_decrypt: Mutex::new(None),
        }
    }
}

impl MockInstance {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without_domain_chain_id(mut self) -> Self {
        self.domain_chain_id = 0;
        self
    }

    /// Leave `handle` out of user-decrypt results.
    pub fn omitting(mut self, handle: &str) -> Self {
        self.omit = Some(handle.to_string());
        self
    }

    pub fn public_decrypt_calls(&self) -> usize {
        self.public_decrypts.load(Ordering::SeqCst)
    }

    pub fn user_decrypt_calls(&self) -> usize {
        self.user_decrypts.load(Ordering::SeqCst)
    }

    pub fn last_user_decrypt(&self) -> Option<UserDecryptPayload> {
        self.last_user_decrypt.lock().unwrap().clone()
    }
}

#[async_trait]
impl FhevmInstance for MockInstance {
    fn get_public_key(&self) -> Option<PublicKeyMaterial> {
        Some(PublicKeyMaterial {
            public_key_id: MOCK_KEY_ID.to_string(),
            public_key: vec![1, 2, 3],
        })
    }

    fn get_public_params(&self, bits: u16) -> Option<PublicParamsMaterial> {
        Some(PublicParamsMaterial {
            public_params_id: format!("mock-params-{bits}"),
            public_params: bits.to_be_bytes().to_vec(),
        })
    }

    fn generate_keypair(&self) -> Keypair {
        let n = self.keypairs.fetch_add(1, Ordering::SeqCst) + 1;
        Keypair {
            public_key: format!("0x{n:064x}"),
            private_key: format!("0x{:064x}", n + 1_000_000),
        }
    }

    fn create_eip712(
        &self,
        public_key: &str,
        _contract_addresses: &[Address],
        start_timestamp: u64,
        duration_days: u32,
    ) -> Result<TypedData, InstanceError> {
        Ok(sample_typed_data(
            self.domain_chain_id,
            public_key,
            start_timestamp,
            duration_days,
        ))
    }

    async fn user_decrypt(
        &self,
        payload: UserDecryptPayload,
    ) -> Result<DecryptedValues, InstanceError> {
        self.user_decrypts.fetch_add(1, Ordering::SeqCst);
        let mut values = HashMap::new();
        for pair in &payload.handle_contract_pairs {
            if self.omit.as_deref() == Some(pair.handle.as_str()) {
                continue;
            }
            values.insert(pair.handle.clone(), value_for(&pair.handle)?);
        }
        *self.last_user_decrypt.lock().unwrap() = Some(payload);
        Ok(values)
    }

    async fn public_decrypt(&self, handles: &[Handle]) -> Result<DecryptedValues, InstanceError> {
        self.public_decrypts.fetch_add(1, Ordering::SeqCst);
        handles
            .iter()
            .map(|handle| Ok((handle.clone(), value_for(handle)?)))
            .collect()
    }
}

// =============================================================================
// MockFactory
// =============================================================================

pub struct MockFactory {
    pub instance: Arc<MockInstance>,
    fail: bool,
    gate: Option<Arc<Notify>>,
    creations: AtomicUsize,
    last_config: Mutex<Option<InstanceConfig>>,
}

impl MockFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::build(false, None))
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self::build(true, None))
    }

    /// Factory that blocks in `create_instance` until `gate` is notified.
    pub fn gated(gate: Arc<Notify>) -> Arc<Self> {
        Arc::new(Self::build(false, Some(gate)))
    }

    fn build(fail: bool, gate: Option<Arc<Notify>>) -> Self {
        Self {
            instance: Arc::new(MockInstance::new()),
            fail,
            gate,
            creations: AtomicUsize::new(0),
            last_config: Mutex::new(None),
        }
    }

    pub fn creations(&self) -> usize {
        self.creations.load(Ordering::SeqCst)
    }

    pub fn last_config(&self) -> Option<InstanceConfig> {
        self.last_config.lock().unwrap().clone()
    }
}

#[async_trait]
impl InstanceFactory for MockFactory {
    async fn create_instance(
        &self,
        config: InstanceConfig,
    ) -> Result<Arc<dyn FhevmInstance>, InstanceError> {
        self.creations.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        *self.last_config.lock().unwrap() = Some(config);
        if self.fail {
            return Err(InstanceError::Network("relayer unreachable".into()));
        }
        Ok(self.instance.clone())
    }
}

// =============================================================================
// CountingSigner
// =============================================================================

/// Signer that counts prompts and returns a fake 65-byte signature.
pub struct CountingSigner {
    reject: bool,
    signs: AtomicUsize,
    last_primary_type: Mutex<Option<String>>,
}

impl CountingSigner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::build(false))
    }

    pub fn rejecting() -> Arc<Self> {
        Arc::new(Self::build(true))
    }

    fn build(reject: bool) -> Self {
        Self {
            reject,
            signs: AtomicUsize::new(0),
            last_primary_type: Mutex::new(None),
        }
    }

    pub fn sign_count(&self) -> usize {
        self.signs.load(Ordering::SeqCst)
    }

    pub fn last_primary_type(&self) -> Option<String> {
        self.last_primary_type.lock().unwrap().clone()
    }
}

#[async_trait]
impl DecryptSigner for CountingSigner {
    fn address(&self) -> Address {
        HARDHAT_ADDRESS_0
    }

    async fn sign_typed_data(&self, payload: &TypedData) -> Result<String, SignerError> {
        let n = self.signs.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_primary_type.lock().unwrap() = Some(payload.primary_type.clone());
        if self.reject {
            return Err(SignerError::Rejected("user rejected the request".into()));
        }
        Ok(format!("0x{n:0130x}"))
    }
}
