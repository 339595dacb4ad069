// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Client construction parameters and their validation.

use std::fmt;
use std::sync::Arc;

use url::Url;

use crate::chains::{ChainConfig, ChainSource};
use crate::decryption::CacheType;
use crate::error::{messages, FhevmError};
use crate::instance::NetworkProvider;
use crate::storage::{MemoryStorage, SessionStorage, StorageAdapter};

/// Everything a client needs before `initialize()`.
#[derive(Clone)]
pub struct ClientConfig {
    /// RPC URL or injected provider. Optional only when the resolved chain
    /// carries its own `network`.
    pub provider: Option<NetworkProvider>,
    pub chain: Option<ChainSource>,
    /// Cache for public key material and `Persistent` signatures.
    pub storage: Arc<dyn StorageAdapter>,
    /// Cache for `Session` signatures.
    pub session_storage: Arc<dyn StorageAdapter>,
    /// Policy applied to requests that do not name one.
    pub default_cache_type: CacheType,
    /// Emit lifecycle debug events.
    pub debug: bool,
}

impl ClientConfig {
    /// Config with in-memory caches and no signature caching by default.
    pub fn new(provider: Option<NetworkProvider>, chain: impl Into<ChainSource>) -> Self {
        Self {
            provider,
            chain: Some(chain.into()),
            storage: Arc::new(MemoryStorage::default()),
            session_storage: Arc::new(SessionStorage::new()),
            default_cache_type: CacheType::None,
            debug: false,
        }
    }

    pub fn with_storage(mut self, storage: Arc<dyn StorageAdapter>) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_session_storage(mut self, storage: Arc<dyn StorageAdapter>) -> Self {
        self.session_storage = storage;
        self
    }

    pub fn with_default_cache_type(mut self, cache_type: CacheType) -> Self {
        self.default_cache_type = cache_type;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Signature backend for a cache policy; `None` never caches.
    pub fn signature_storage(&self, cache_type: CacheType) -> Option<&Arc<dyn StorageAdapter>> {
        match cache_type {
            CacheType::None => None,
            CacheType::Session => Some(&self.session_storage),
            CacheType::Persistent => Some(&self.storage),
        }
    }

    /// The provider to hand to the instance for `chain`.
    pub(crate) fn network_for(&self, chain: &ChainConfig) -> Option<NetworkProvider> {
        self.provider
            .clone()
            .or_else(|| chain.network.clone().map(NetworkProvider::from))
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("provider", &self.provider)
            .field("chain", &self.chain)
            .field("storage", &self.storage.kind())
            .field("session_storage", &self.session_storage.kind())
            .field("default_cache_type", &self.default_cache_type)
            .field("debug", &self.debug)
            .finish()
    }
}

/// Validate a config before any async work starts.
pub fn validate_config(config: &ClientConfig) -> Result<(), FhevmError> {
    let Some(chain) = &config.chain else {
        return Err(FhevmError::invalid_config(messages::CHAIN_REQUIRED));
    };

    if let Some(resolved) = chain.resolved() {
        if resolved.chain_id == 0 {
            return Err(FhevmError::invalid_config(messages::CHAIN_ID_POSITIVE));
        }
    }

    match &config.provider {
        Some(NetworkProvider::Rpc(url)) => {
            if url.trim().is_empty() {
                return Err(FhevmError::invalid_config(messages::PROVIDER_REQUIRED));
            }
            Url::parse(url)
                .map_err(|e| FhevmError::invalid_config(format!("Invalid RPC URL: {e}")))?;
        }
        Some(NetworkProvider::Eip1193(_)) => {}
        None => {
            // A deferred chain cannot vouch for a network until it loads
            let chain_has_network = chain
                .resolved()
                .map(|c| c.network.is_some())
                .unwrap_or(false);
            if !chain_has_network {
                return Err(FhevmError::invalid_config(messages::PROVIDER_REQUIRED));
            }
        }
    }

    Ok(())
}
