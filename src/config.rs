// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration Constants
//!
//! This module defines environment variable names and default values used
//! to build a [`ClientConfig`] outside of code, e.g. in a service that
//! embeds the client.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `FHEVM_CHAIN` | `sepolia`, `localhost` or a numeric chain id | `sepolia` |
//! | `FHEVM_RPC_URL` | JSON-RPC endpoint passed to the instance | Required unless the chain carries one |
//! | `FHEVM_STORAGE` | Cache backend (`durable` or `memory`) | `durable` |
//! | `FHEVM_DATA_DIR` | Directory holding the durable cache file | `./.fhevm` |
//! | `FHEVM_SIGNATURE_CACHE` | Default policy (`none`, `session`, `persistent`) | `none` |
//! | `FHEVM_SIGNATURE_CACHE_CAPACITY` | Signature entries kept by the memory backend | `256` |
//! | `FHEVM_DEBUG` | Lifecycle debug events (`1`/`true`) | off |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `fhevm_client=info` |

use std::path::PathBuf;
use std::sync::Arc;

use crate::chains::{self, ChainConfig, LOCALHOST_CHAIN_ID, SEPOLIA_CHAIN_ID};
use crate::client::ClientConfig;
use crate::decryption::CacheType;
use crate::error::FhevmError;
use crate::instance::NetworkProvider;
use crate::storage::{open_default_storage, MemoryStorage, StorageAdapter};

/// Environment variable name for the target chain.
pub const CHAIN_ENV: &str = "FHEVM_CHAIN";

/// Default chain when [`CHAIN_ENV`] is unset.
pub const DEFAULT_CHAIN: &str = "sepolia";

/// Environment variable name for the JSON-RPC endpoint.
pub const RPC_URL_ENV: &str = "FHEVM_RPC_URL";

/// Environment variable name for the cache backend.
pub const STORAGE_ENV: &str = "FHEVM_STORAGE";

/// Environment variable name for the durable cache directory.
///
/// The redb file is created inside it on first use.
pub const DATA_DIR_ENV: &str = "FHEVM_DATA_DIR";

/// Default durable cache directory.
pub const DEFAULT_DATA_DIR: &str = "./.fhevm";

/// Environment variable name for the default signature cache policy.
pub const SIGNATURE_CACHE_ENV: &str = "FHEVM_SIGNATURE_CACHE";

/// Environment variable name for the memory backend's signature capacity.
pub const SIGNATURE_CACHE_CAPACITY_ENV: &str = "FHEVM_SIGNATURE_CACHE_CAPACITY";

pub const DEBUG_ENV: &str = "FHEVM_DEBUG";

/// Environment variable name for the log output format.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Filter applied when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "fhevm_client=info";

/// Which cache backend to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// redb file under the data directory; falls back to memory if it
    /// cannot be opened.
    Durable,
    Memory,
}

/// Client settings read from the environment.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub chain: ChainConfig,
    pub rpc_url: Option<String>,
    pub storage: StorageBackend,
    pub data_dir: PathBuf,
    pub signature_cache: CacheType,
    pub signature_cache_capacity: usize,
    pub debug: bool,
}

impl EnvConfig {
    pub fn from_env() -> Result<Self, FhevmError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Parse settings from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, FhevmError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let chain_name = var(CHAIN_ENV).unwrap_or_else(|| DEFAULT_CHAIN.to_string());
        let chain = parse_chain(&chain_name)?;

        let storage = match var(STORAGE_ENV).as_deref() {
            None => StorageBackend::Durable,
            Some(v) if v.eq_ignore_ascii_case("durable") => StorageBackend::Durable,
            Some(v) if v.eq_ignore_ascii_case("memory") => StorageBackend::Memory,
            Some(other) => {
                return Err(FhevmError::invalid_config(format!(
                    "{STORAGE_ENV} must be `durable` or `memory`, got `{other}`"
                )))
            }
        };

        let signature_cache = match var(SIGNATURE_CACHE_ENV) {
            Some(v) => v
                .parse::<CacheType>()
                .map_err(|e| FhevmError::invalid_config(format!("{SIGNATURE_CACHE_ENV}: {e}")))?,
            None => CacheType::None,
        };

        let signature_cache_capacity = match var(SIGNATURE_CACHE_CAPACITY_ENV) {
            Some(v) => v
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    FhevmError::invalid_config(format!(
                        "{SIGNATURE_CACHE_CAPACITY_ENV} must be a positive integer, got `{v}`"
                    ))
                })?,
            None => crate::storage::memory::DEFAULT_SIGNATURE_CAPACITY,
        };

        let debug = var(DEBUG_ENV)
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(Self {
            chain,
            rpc_url: var(RPC_URL_ENV),
            storage,
            data_dir: var(DATA_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            signature_cache,
            signature_cache_capacity,
            debug,
        })
    }

    /// Build a [`ClientConfig`], opening the cache backend.
    ///
    /// The result still goes through validation in `create_client`.
    pub fn into_client_config(self) -> ClientConfig {
        let storage: Arc<dyn StorageAdapter> = match self.storage {
            StorageBackend::Durable => open_default_storage(Some(&self.data_dir)),
            StorageBackend::Memory => Arc::new(MemoryStorage::new(self.signature_cache_capacity)),
        };

        ClientConfig::new(self.rpc_url.map(NetworkProvider::Rpc), self.chain)
            .with_storage(storage)
            .with_default_cache_type(self.signature_cache)
            .with_debug(self.debug)
    }
}

fn parse_chain(value: &str) -> Result<ChainConfig, FhevmError> {
    let chain_id = match value.to_ascii_lowercase().as_str() {
        "sepolia" => SEPOLIA_CHAIN_ID,
        "localhost" | "hardhat" => LOCALHOST_CHAIN_ID,
        other => other.parse::<u64>().map_err(|_| {
            FhevmError::invalid_config(format!("{CHAIN_ENV}: unknown chain `{value}`"))
        })?,
    };

    if chain_id == LOCALHOST_CHAIN_ID {
        return Ok(chains::localhost());
    }
    chains::get_chain_by_id(chain_id).ok_or_else(|| {
        FhevmError::invalid_config(format!("{CHAIN_ENV}: unsupported chain id {chain_id}"))
    })
}
