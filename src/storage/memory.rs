// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Process-lifetime cache backend.
//!
//! Always available, so it is the fallback whenever no persistent medium
//! exists. Signatures sit in an LRU bounded by capacity; public material is
//! one entry per ACL address and is never evicted.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use lru::LruCache;

use super::{
    messages, CachedPublicKey, CachedSignature, SignatureCacheKey, StorageAdapter, StorageError,
    StorageKind,
};
use crate::instance::PublicParamsMap;

/// Default number of signatures kept before the least recently used is dropped.
pub const DEFAULT_SIGNATURE_CAPACITY: usize = 256;

/// In-process storage adapter.
pub struct MemoryStorage {
    public_keys: Mutex<HashMap<String, CachedPublicKey>>,
    public_params: Mutex<HashMap<String, PublicParamsMap>>,
    signatures: Mutex<LruCache<SignatureCacheKey, CachedSignature>>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new(DEFAULT_SIGNATURE_CAPACITY)
    }
}

impl MemoryStorage {
    /// Create a store holding at most `signature_capacity` signatures.
    pub fn new(signature_capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(signature_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            public_keys: Mutex::new(HashMap::new()),
            public_params: Mutex::new(HashMap::new()),
            signatures: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Number of signatures currently held, expired ones included.
    pub fn signature_count(&self) -> usize {
        lock(&self.signatures, "signature_count", messages::GET_FAILED)
            .map(|cache| cache.len())
            .unwrap_or(0)
    }
}

/// Lock `mutex`, logging `message` if a panicking holder poisoned it.
fn lock<'a, T>(
    mutex: &'a Mutex<T>,
    operation: &'static str,
    message: &'static str,
) -> Option<MutexGuard<'a, T>> {
    match mutex.lock() {
        Ok(guard) => Some(guard),
        Err(_) => {
            tracing::warn!(
                operation,
                error = %StorageError::Poisoned,
                "{}",
                message
            );
            None
        }
    }
}

#[async_trait]
impl StorageAdapter for MemoryStorage {
    fn kind(&self) -> StorageKind {
        StorageKind::Memory
    }

    async fn get_public_key(&self, contract_address: &str) -> Option<CachedPublicKey> {
        let keys = lock(&self.public_keys, "get_public_key", messages::GET_FAILED)?;
        keys.get(&contract_address.to_lowercase()).cloned()
    }

    async fn set_public_key(&self, contract_address: &str, key_id: &str, key_bytes: &[u8]) {
        if let Some(mut keys) = lock(&self.public_keys, "set_public_key", messages::SET_FAILED)
        {
            keys.insert(
                contract_address.to_lowercase(),
                CachedPublicKey {
                    public_key_id: key_id.to_string(),
                    public_key: key_bytes.to_vec(),
                    cached_at_ms: chrono::Utc::now().timestamp_millis(),
                },
            );
        }
    }

    async fn get_public_params(&self, contract_address: &str) -> Option<PublicParamsMap> {
        let params = lock(
            &self.public_params,
            "get_public_params",
            messages::GET_FAILED,
        )?;
        params.get(&contract_address.to_lowercase()).cloned()
    }

    async fn set_public_params(&self, contract_address: &str, params: &PublicParamsMap) {
        if let Some(mut map) = lock(
            &self.public_params,
            "set_public_params",
            messages::SET_FAILED,
        ) {
            map.insert(contract_address.to_lowercase(), params.clone());
        }
    }

    async fn get_signature(&self, key: &SignatureCacheKey) -> Option<CachedSignature> {
        let mut cache = lock(&self.signatures, "get_signature", messages::GET_FAILED)?;
        if let Some(entry) = cache.get(key) {
            if !entry.is_expired() {
                return Some(entry.clone());
            }
            // Expired, drop it
            cache.pop(key);
        }
        None
    }

    async fn set_signature(&self, key: &SignatureCacheKey, signature: CachedSignature) {
        if let Some(mut cache) = lock(&self.signatures, "set_signature", messages::SET_FAILED) {
            cache.put(key.clone(), signature);
        }
    }

    async fn clear_signatures(&self) {
        if let Some(mut cache) =
            lock(&self.signatures, "clear_signatures", messages::CLEAR_FAILED)
        {
            cache.clear();
        }
    }

    async fn clear_public_keys(&self) {
        if let Some(mut keys) =
            lock(&self.public_keys, "clear_public_keys", messages::CLEAR_FAILED)
        {
            keys.clear();
        }
    }

    async fn clear_public_params(&self) {
        if let Some(mut params) = lock(
            &self.public_params,
            "clear_public_params",
            messages::CLEAR_FAILED,
        ) {
            params.clear();
        }
    }
}
