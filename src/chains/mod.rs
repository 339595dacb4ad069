// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! FHEVM chain configuration.
//!
//! A client is configured either with a fully resolved [`ChainConfig`] or
//! with a [`ChainConfigLoader`] that produces one on demand. The loader is
//! awaited exactly once, inside `initialize()`, before any key material is
//! read.

pub mod definitions;

use std::fmt;
use std::sync::Arc;

use alloy::primitives::Address;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::instance::InstanceError;

pub use definitions::{localhost, sepolia, LOCALHOST_CHAIN_ID, SEPOLIA_CHAIN_ID};

/// Addresses and chain ids the instance needs. Serialized in the same
/// camelCase shape the relayer SDK uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainConfig {
    pub chain_id: u64,
    pub gateway_chain_id: u64,
    pub acl_contract_address: Address,
    pub kms_contract_address: Address,
    pub input_verifier_contract_address: Address,
    pub verifying_contract_address_decryption: Address,
    pub verifying_contract_address_input_verification: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relayer_url: Option<Url>,
    /// RPC endpoint baked into the chain definition; makes the client
    /// provider optional.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<Url>,
}

impl ChainConfig {
    /// Check that every field the instance relies on is set.
    ///
    /// Returns the name of the first unset field.
    pub fn ensure_resolved(&self) -> Result<(), &'static str> {
        if self.chain_id == 0 {
            return Err("chainId");
        }
        if self.gateway_chain_id == 0 {
            return Err("gatewayChainId");
        }
        let addresses = [
            ("aclContractAddress", self.acl_contract_address),
            ("kmsContractAddress", self.kms_contract_address),
            (
                "inputVerifierContractAddress",
                self.input_verifier_contract_address,
            ),
            (
                "verifyingContractAddressDecryption",
                self.verifying_contract_address_decryption,
            ),
            (
                "verifyingContractAddressInputVerification",
                self.verifying_contract_address_input_verification,
            ),
        ];
        for (name, addr) in addresses {
            if addr == Address::ZERO {
                return Err(name);
            }
        }
        Ok(())
    }

    /// Lower-cased ACL address, the key for cached public material.
    pub fn acl_cache_key(&self) -> String {
        self.acl_contract_address.to_string().to_lowercase()
    }
}

/// Produces a chain configuration once its source is available.
#[async_trait]
pub trait ChainConfigLoader: Send + Sync {
    async fn load_configuration(&self) -> Result<ChainConfig, InstanceError>;
}

/// Where a client gets its chain configuration from.
#[derive(Clone)]
pub enum ChainSource {
    Resolved(ChainConfig),
    Deferred(Arc<dyn ChainConfigLoader>),
}

impl ChainSource {
    pub async fn load_configuration(&self) -> Result<ChainConfig, InstanceError> {
        match self {
            ChainSource::Resolved(chain) => Ok(chain.clone()),
            ChainSource::Deferred(loader) => loader.load_configuration().await,
        }
    }

    /// The resolved config, if known without awaiting.
    pub fn resolved(&self) -> Option<&ChainConfig> {
        match self {
            ChainSource::Resolved(chain) => Some(chain),
            ChainSource::Deferred(_) => None,
        }
    }
}

impl fmt::Debug for ChainSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainSource::Resolved(chain) => f.debug_tuple("Resolved").field(chain).finish(),
            ChainSource::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

impl From<ChainConfig> for ChainSource {
    fn from(chain: ChainConfig) -> Self {
        ChainSource::Resolved(chain)
    }
}

/// All built-in chains.
pub fn chains() -> Vec<ChainConfig> {
    vec![sepolia()]
}

/// Look up a built-in chain by id.
pub fn get_chain_by_id(chain_id: u64) -> Option<ChainConfig> {
    chains().into_iter().find(|c| c.chain_id == chain_id)
}

pub fn is_supported_chain(chain_id: u64) -> bool {
    chains().iter().any(|c| c.chain_id == chain_id)
}

pub fn supported_chain_ids() -> Vec<u64> {
    chains().iter().map(|c| c.chain_id).collect()
}
