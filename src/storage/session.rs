// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session-scoped signature cache.
//!
//! Behaves like browser session storage: a string key/value area that lives
//! as long as the session handle. Share one `Arc<SessionStorage>` across
//! client rebuilds to keep signatures; drop it or call
//! [`SessionStorage::end_session`] to forget them.
//!
//! Only signatures are stored here. Public key and params calls are
//! accepted and ignored.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{
    messages, CachedPublicKey, CachedSignature, SignatureCacheKey, StorageAdapter, StorageError,
    StorageKind,
};
use crate::instance::PublicParamsMap;

/// Prefix for every signature entry in the session area.
pub const SIGNATURE_PREFIX: &str = "fhevm-signature:";

#[derive(Default)]
pub struct SessionStorage {
    items: Mutex<HashMap<String, String>>,
}

impl SessionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget every entry, as when the session closes.
    pub fn end_session(&self) {
        match self.items.lock() {
            Ok(mut items) => items.clear(),
            Err(_) => warn_poisoned("end_session", messages::CLEAR_FAILED),
        }
    }

    /// Raw entry count, used to observe purges.
    pub fn len(&self) -> usize {
        self.items.lock().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write a raw string value; lets callers seed records directly.
    pub fn set_item(&self, key: &str, value: String) {
        match self.items.lock() {
            Ok(mut items) => {
                items.insert(key.to_string(), value);
            }
            Err(_) => warn_poisoned("set_item", messages::SET_FAILED),
        }
    }

    fn item_key(key: &SignatureCacheKey) -> String {
        format!("{SIGNATURE_PREFIX}{key}")
    }
}

fn warn_poisoned(operation: &'static str, message: &str) {
    tracing::warn!(operation, error = %StorageError::Poisoned, "{}", message);
}

#[async_trait]
impl StorageAdapter for SessionStorage {
    fn kind(&self) -> StorageKind {
        StorageKind::Session
    }

    async fn get_public_key(&self, _contract_address: &str) -> Option<CachedPublicKey> {
        None
    }

    async fn set_public_key(&self, _contract_address: &str, _key_id: &str, _key_bytes: &[u8]) {}

    async fn get_public_params(&self, _contract_address: &str) -> Option<PublicParamsMap> {
        None
    }

    async fn set_public_params(&self, _contract_address: &str, _params: &PublicParamsMap) {}

    async fn get_signature(&self, key: &SignatureCacheKey) -> Option<CachedSignature> {
        let item_key = Self::item_key(key);
        let mut items = match self.items.lock() {
            Ok(items) => items,
            Err(_) => {
                warn_poisoned("get_signature", messages::GET_FAILED);
                return None;
            }
        };

        let raw = items.get(&item_key)?;
        let parsed = match serde_json::from_str::<CachedSignature>(raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(key = %item_key, error = %StorageError::from(e), "{}", messages::CORRUPT_RECORD);
                items.remove(&item_key);
                return None;
            }
        };

        if parsed.is_expired() {
            items.remove(&item_key);
            return None;
        }
        Some(parsed)
    }

    async fn set_signature(&self, key: &SignatureCacheKey, signature: CachedSignature) {
        let value = match serde_json::to_string(&signature) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "{}", messages::SET_FAILED);
                return;
            }
        };
        self.set_item(&Self::item_key(key), value);
    }

    async fn clear_signatures(&self) {
        match self.items.lock() {
            Ok(mut items) => items.retain(|k, _| !k.starts_with(SIGNATURE_PREFIX)),
            Err(_) => warn_poisoned("clear_signatures", messages::CLEAR_FAILED),
        }
    }

    async fn clear_public_keys(&self) {}

    async fn clear_public_params(&self) {}
}
