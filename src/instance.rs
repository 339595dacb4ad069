// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Boundary to the external FHEVM cryptographic instance.
//!
//! The key generation, the EIP-712 payload layout and the decryption math are
//! all owned by the instance; this crate only sequences calls into it. An
//! [`InstanceFactory`] plays the role of the loaded SDK module: the client
//! owns one and asks it for a fresh instance on `initialize()`.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use alloy::dyn_abi::TypedData;
use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::chains::ChainConfig;

/// Opaque reference to an encrypted on-chain value (bytes32 hex).
pub type Handle = String;

/// Decrypted plaintexts keyed by handle.
pub type DecryptedValues = HashMap<Handle, DecryptedValue>;

/// Public params keyed by encryption bit width.
pub type PublicParamsMap = BTreeMap<u16, PublicParamsMaterial>;

/// Bit widths the relayer publishes public params for.
pub const DEFAULT_ENCRYPTION_BIT_WIDTHS: [u16; 8] = [2, 8, 16, 32, 64, 128, 160, 256];

/// A single plaintext returned by the oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecryptedValue {
    Uint(U256),
    Bool(bool),
    Address(Address),
}

impl DecryptedValue {
    pub fn as_uint(&self) -> Option<U256> {
        match self {
            DecryptedValue::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DecryptedValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<Address> {
        match self {
            DecryptedValue::Address(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<u64> for DecryptedValue {
    fn from(v: u64) -> Self {
        DecryptedValue::Uint(U256::from(v))
    }
}

impl From<bool> for DecryptedValue {
    fn from(v: bool) -> Self {
        DecryptedValue::Bool(v)
    }
}

/// Network public key as published by the KMS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyMaterial {
    pub public_key_id: String,
    pub public_key: Vec<u8>,
}

/// Public parameters (CRS) for one encryption bit width.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicParamsMaterial {
    pub public_params_id: String,
    pub public_params: Vec<u8>,
}

/// Ephemeral keypair bound into one user-decryption authorization.
#[derive(Clone, PartialEq, Eq)]
pub struct Keypair {
    pub public_key: String,
    pub private_key: String,
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleContractPair {
    pub handle: Handle,
    pub contract_address: Address,
}

/// Everything the oracle needs to authorize and run a user decryption.
#[derive(Debug, Clone)]
pub struct UserDecryptPayload {
    pub handle_contract_pairs: Vec<HandleContractPair>,
    pub keypair: Keypair,
    /// Signature hex without the `0x` prefix.
    pub signature: String,
    pub contract_addresses: Vec<Address>,
    pub user_address: Address,
    pub start_timestamp: u64,
    pub duration_days: u32,
}

/// Opaque EIP-1193 provider handle, passed through to the instance untouched.
#[async_trait]
pub trait Eip1193Provider: Send + Sync {
    async fn request(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value, InstanceError>;
}

/// How the instance reaches the chain.
#[derive(Clone)]
pub enum NetworkProvider {
    /// JSON-RPC endpoint URL (validated at client construction).
    Rpc(String),
    /// Injected provider.
    Eip1193(Arc<dyn Eip1193Provider>),
}

impl fmt::Debug for NetworkProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkProvider::Rpc(url) => f.debug_tuple("Rpc").field(url).finish(),
            NetworkProvider::Eip1193(_) => f.write_str("Eip1193(..)"),
        }
    }
}

impl From<Url> for NetworkProvider {
    fn from(url: Url) -> Self {
        NetworkProvider::Rpc(url.to_string())
    }
}

/// Inputs for constructing an instance.
#[derive(Debug, Clone)]
pub struct InstanceConfig {
    pub chain: ChainConfig,
    pub network: NetworkProvider,
    /// Cached key material; when present the instance skips the fetch.
    pub public_key: Option<PublicKeyMaterial>,
    pub public_params: Option<PublicParamsMap>,
}

/// Errors surfaced by the instance, its factory, or a provider.
#[derive(Debug, thiserror::Error)]
pub enum InstanceError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Relayer error: {0}")]
    Relayer(String),

    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    #[error("EIP-712 error: {0}")]
    Eip712(String),

    #[error("Key material error: {0}")]
    KeyMaterial(String),

    #[error("Unsupported chain: {0}")]
    UnsupportedChain(u64),
}

/// A ready FHEVM instance.
#[async_trait]
pub trait FhevmInstance: Send + Sync {
    fn get_public_key(&self) -> Option<PublicKeyMaterial>;

    fn get_public_params(&self, bits: u16) -> Option<PublicParamsMaterial>;

    fn generate_keypair(&self) -> Keypair;

    /// Build the `UserDecryptRequestVerification` typed-data payload.
    fn create_eip712(
        &self,
        public_key: &str,
        contract_addresses: &[Address],
        start_timestamp: u64,
        duration_days: u32,
    ) -> Result<TypedData, InstanceError>;

    async fn user_decrypt(
        &self,
        payload: UserDecryptPayload,
    ) -> Result<DecryptedValues, InstanceError>;

    async fn public_decrypt(&self, handles: &[Handle]) -> Result<DecryptedValues, InstanceError>;
}

/// Constructs instances; stands in for the loaded SDK module.
#[async_trait]
pub trait InstanceFactory: Send + Sync {
    async fn create_instance(
        &self,
        config: InstanceConfig,
    ) -> Result<Arc<dyn FhevmInstance>, InstanceError>;

    /// Bit widths to collect public params for after a fresh fetch.
    fn encryption_bit_widths(&self) -> &[u16] {
        &DEFAULT_ENCRYPTION_BIT_WIDTHS
    }
}
