// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Durable cache backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! One table, `records`: key → JSON bytes. The key shape tells the record
//! apart:
//!
//! - `<contract>:key` → [`CachedPublicKey`]
//! - `<contract>:params` → [`PublicParamsMap`]
//! - `signature:<user>:<chain>:<contract>` → [`CachedSignature`]
//!
//! Contract and user addresses are lower-cased. Every database call runs on
//! the blocking pool so the async caller is never stalled on disk I/O.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::de::DeserializeOwned;

use super::{
    messages, CachedPublicKey, CachedSignature, SignatureCacheKey, StorageAdapter, StorageError,
    StorageKind,
};
use crate::instance::PublicParamsMap;

/// All cache records: record key → serialized JSON.
const RECORDS: TableDefinition<&str, &[u8]> = TableDefinition::new("records");

const KEY_SUFFIX: &str = ":key";
const PARAMS_SUFFIX: &str = ":params";
const SIGNATURE_PREFIX: &str = "signature:";

type StorageResult<T> = Result<T, StorageError>;

// =============================================================================
// Record Key Helpers
// =============================================================================

fn public_key_record(contract_address: &str) -> String {
    format!("{}{KEY_SUFFIX}", contract_address.to_lowercase())
}

fn public_params_record(contract_address: &str) -> String {
    format!("{}{PARAMS_SUFFIX}", contract_address.to_lowercase())
}

fn signature_record(key: &SignatureCacheKey) -> String {
    format!("{SIGNATURE_PREFIX}{key}")
}

fn is_signature_record(key: &str) -> bool {
    key.starts_with(SIGNATURE_PREFIX)
}

fn is_public_key_record(key: &str) -> bool {
    !is_signature_record(key) && key.ends_with(KEY_SUFFIX)
}

fn is_public_params_record(key: &str) -> bool {
    !is_signature_record(key) && key.ends_with(PARAMS_SUFFIX)
}

// =============================================================================
// Synchronous Database Operations
// =============================================================================

fn read_raw(db: &Database, key: &str) -> StorageResult<Option<Vec<u8>>> {
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(RECORDS)?;
    Ok(table.get(key)?.map(|value| value.value().to_vec()))
}

fn write_raw(db: &Database, key: &str, value: &[u8]) -> StorageResult<()> {
    let write_txn = db.begin_write()?;
    {
        let mut table = write_txn.open_table(RECORDS)?;
        table.insert(key, value)?;
    }
    write_txn.commit()?;
    Ok(())
}

/// Remove `key` only if it still holds `stale`. The check and the removal
/// share one write transaction, so a record written after `stale` was read
/// is left alone.
fn remove_if_unchanged(db: &Database, key: &str, stale: &[u8]) -> StorageResult<bool> {
    let write_txn = db.begin_write()?;
    let removed = {
        let mut table = write_txn.open_table(RECORDS)?;
        let unchanged = table
            .get(key)?
            .is_some_and(|current| current.value() == stale);
        if unchanged {
            table.remove(key)?;
        }
        unchanged
    };
    write_txn.commit()?;
    Ok(removed)
}

/// Drop every record whose key matches `predicate`.
fn remove_matching(db: &Database, predicate: fn(&str) -> bool) -> StorageResult<()> {
    let write_txn = db.begin_write()?;
    {
        let mut table = write_txn.open_table(RECORDS)?;
        table.retain(|key, _| !predicate(key))?;
    }
    write_txn.commit()?;
    Ok(())
}

/// Read and decode a record. A record that fails to decode, or that
/// `is_stale` rejects, is purged and reported as absent.
fn read_record<T: DeserializeOwned>(
    db: &Database,
    key: &str,
    is_stale: fn(&T) -> bool,
) -> StorageResult<Option<T>> {
    let Some(bytes) = read_raw(db, key)? else {
        return Ok(None);
    };
    match serde_json::from_slice::<T>(&bytes) {
        Ok(record) if !is_stale(&record) => Ok(Some(record)),
        Ok(_) => {
            remove_if_unchanged(db, key, &bytes)?;
            Ok(None)
        }
        Err(e) => {
            tracing::warn!(key, error = %e, "{}", messages::CORRUPT_RECORD);
            remove_if_unchanged(db, key, &bytes)?;
            Ok(None)
        }
    }
}

fn never_stale<T>(_: &T) -> bool {
    false
}

// =============================================================================
// DurableStorage
// =============================================================================

/// Persistent storage adapter over an embedded redb file.
#[derive(Clone)]
pub struct DurableStorage {
    db: Arc<Database>,
}

impl DurableStorage {
    /// Open (or create) the cache database at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create the table so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(RECORDS)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Run a database operation on the blocking pool. Failures are logged
    /// under `message` and come back as `None`.
    async fn run<T, F>(&self, operation: &'static str, message: &'static str, f: F) -> Option<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> StorageResult<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        let result = match tokio::task::spawn_blocking(move || f(&db)).await {
            Ok(result) => result,
            Err(e) => Err(StorageError::Join(e.to_string())),
        };
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(operation, error = %e, "{}", message);
                None
            }
        }
    }

    async fn write_json<T>(&self, operation: &'static str, key: String, value: &T)
    where
        T: serde::Serialize + Sync + ?Sized,
    {
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(operation, error = %e, "{}", messages::SET_FAILED);
                return;
            }
        };
        self.run(operation, messages::SET_FAILED, move |db| {
            write_raw(db, &key, &bytes)
        })
        .await;
    }
}

#[async_trait]
impl StorageAdapter for DurableStorage {
    fn kind(&self) -> StorageKind {
        StorageKind::Durable
    }

    async fn get_public_key(&self, contract_address: &str) -> Option<CachedPublicKey> {
        let key = public_key_record(contract_address);
        self.run("get_public_key", messages::GET_FAILED, move |db| {
            read_record(db, &key, never_stale::<CachedPublicKey>)
        })
        .await
        .flatten()
    }

    async fn set_public_key(&self, contract_address: &str, key_id: &str, key_bytes: &[u8]) {
        let record = CachedPublicKey {
            public_key_id: key_id.to_string(),
            public_key: key_bytes.to_vec(),
            cached_at_ms: chrono::Utc::now().timestamp_millis(),
        };
        self.write_json("set_public_key", public_key_record(contract_address), &record)
            .await;
    }

    async fn get_public_params(&self, contract_address: &str) -> Option<PublicParamsMap> {
        let key = public_params_record(contract_address);
        self.run("get_public_params", messages::GET_FAILED, move |db| {
            read_record(db, &key, never_stale::<PublicParamsMap>)
        })
        .await
        .flatten()
    }

    async fn set_public_params(&self, contract_address: &str, params: &PublicParamsMap) {
        self.write_json(
            "set_public_params",
            public_params_record(contract_address),
            params,
        )
        .await;
    }

    async fn get_signature(&self, key: &SignatureCacheKey) -> Option<CachedSignature> {
        let record_key = signature_record(key);
        self.run("get_signature", messages::GET_FAILED, move |db| {
            read_record(db, &record_key, CachedSignature::is_expired)
        })
        .await
        .flatten()
    }

    async fn set_signature(&self, key: &SignatureCacheKey, signature: CachedSignature) {
        self.write_json("set_signature", signature_record(key), &signature)
            .await;
    }

    async fn clear_signatures(&self) {
        self.run("clear_signatures", messages::CLEAR_FAILED, |db| {
            remove_matching(db, is_signature_record)
        })
        .await;
    }

    async fn clear_public_keys(&self) {
        self.run("clear_public_keys", messages::CLEAR_FAILED, |db| {
            remove_matching(db, is_public_key_record)
        })
        .await;
    }

    async fn clear_public_params(&self) {
        self.run("clear_public_params", messages::CLEAR_FAILED, |db| {
            remove_matching(db, is_public_params_record)
        })
        .await;
    }

    async fn clear_all(&self) {
        self.run("clear_all", messages::CLEAR_FAILED, |db| {
            remove_matching(db, |_| true)
        })
        .await;
    }
}
