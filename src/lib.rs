// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! FHEVM Client - lifecycle, caching and decryption for FHEVM instances
//!
//! This crate wraps an FHEVM instance (the relayer SDK's handle on a chain's
//! encrypted state) in a client that initializes it once, caches its public
//! key material, and performs public and user decryption. User decryption
//! asks the wallet for an EIP-712 authorization and can reuse that
//! signature until it expires.
//!
//! ## Modules
//!
//! - `client` - lifecycle state machine and the decryption entry points
//! - `decryption` - public and user decryption protocols
//! - `storage` - cache backends (memory, session, redb)
//! - `chains` - chain configuration and the built-in registry
//! - `instance` - the instance and factory seams
//! - `signer` - wallet signing seam and a local private-key signer
//! - `config` - environment-driven configuration

pub mod chains;
pub mod client;
pub mod config;
pub mod decryption;
pub mod error;
pub mod instance;
pub mod logging;
pub mod signer;
pub mod storage;

#[cfg(test)]
mod test_utils;

pub use chains::{ChainConfig, ChainConfigLoader, ChainSource};
pub use client::{create_client, ClientConfig, ClientStatus, FhevmClient};
pub use decryption::{CacheType, UserDecryptOutput, UserDecryptRequest};
pub use error::{DecryptError, ErrorCode, FhevmError, InitError};
pub use instance::{
    DecryptedValue, DecryptedValues, FhevmInstance, Handle, InstanceFactory, NetworkProvider,
};
pub use signer::{DecryptSigner, LocalDecryptSigner};
pub use storage::StorageAdapter;
