// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Adapters
//!
//! Caches for network public key material and user-decryption signatures.
//!
//! ## Backends
//!
//! | Backend | Lifetime | Public keys/params | Signatures |
//! |---------|----------|--------------------|------------|
//! | [`MemoryStorage`] | process | yes | yes (LRU bounded) |
//! | [`SessionStorage`] | session handle | no | yes |
//! | [`DurableStorage`] | disk (redb) | yes | yes |
//!
//! ## Failure Policy
//!
//! Caching is an optimization. Every adapter catches its own medium errors,
//! logs them with `tracing::warn!` and reports a miss. Nothing in this module
//! returns an error to the decryption protocol.

pub mod durable;
pub mod memory;
pub mod records;
pub mod session;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::instance::PublicParamsMap;

pub use durable::DurableStorage;
pub use memory::MemoryStorage;
pub use records::{CachedPublicKey, CachedSignature, SignatureCacheKey};
pub use session::SessionStorage;

/// File name of the durable cache inside the data directory.
pub const DURABLE_CACHE_FILE: &str = "fhevm-cache.redb";

/// Log messages for swallowed medium errors.
pub mod messages {
    pub const OPEN_FAILED: &str = "Failed to open cache storage";
    pub const GET_FAILED: &str = "Failed to read from cache";
    pub const SET_FAILED: &str = "Failed to write to cache";
    pub const CLEAR_FAILED: &str = "Failed to clear cache";
    pub const CORRUPT_RECORD: &str = "Discarding corrupt cache record";
}

/// Which backend an adapter is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Memory,
    Session,
    Durable,
}

/// Errors raised inside a backend. Never leaves this module.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage lock poisoned")]
    Poisoned,

    #[error("background task failed: {0}")]
    Join(String),
}

/// Uniform contract over the cache backends.
///
/// Reads return `None` for both "not found" and "medium unavailable".
/// Writes and clears are fire-and-forget acknowledgements.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    fn kind(&self) -> StorageKind;

    async fn get_public_key(&self, contract_address: &str) -> Option<CachedPublicKey>;

    async fn set_public_key(&self, contract_address: &str, key_id: &str, key_bytes: &[u8]);

    async fn get_public_params(&self, contract_address: &str) -> Option<PublicParamsMap>;

    async fn set_public_params(&self, contract_address: &str, params: &PublicParamsMap);

    /// Expired entries are purged and reported as absent.
    async fn get_signature(&self, key: &SignatureCacheKey) -> Option<CachedSignature>;

    async fn set_signature(&self, key: &SignatureCacheKey, signature: CachedSignature);

    async fn clear_signatures(&self);

    async fn clear_public_keys(&self);

    async fn clear_public_params(&self);

    async fn clear_all(&self) {
        self.clear_signatures().await;
        self.clear_public_keys().await;
        self.clear_public_params().await;
    }
}

/// Open the durable cache under `data_dir`, or fall back to memory.
///
/// With no data directory, or when the database cannot be opened, the
/// process-lifetime [`MemoryStorage`] is returned instead.
pub fn open_default_storage(data_dir: Option<&Path>) -> Arc<dyn StorageAdapter> {
    let Some(dir) = data_dir else {
        return Arc::new(MemoryStorage::default());
    };

    match DurableStorage::open(&dir.join(DURABLE_CACHE_FILE)) {
        Ok(storage) => Arc::new(storage),
        Err(e) => {
            tracing::warn!(
                path = %dir.display(),
                error = %e,
                "{}; falling back to in-memory cache",
                messages::OPEN_FAILED
            );
            Arc::new(MemoryStorage::default())
        }
    }
}
