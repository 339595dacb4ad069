// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Decryption protocol.
//!
//! - `public` - handles marked publicly decryptable, no authorization
//! - `user` - handles gated by a signed, time-bounded EIP-712 authorization,
//!   with the signature cached per (user, chain, contract)

pub mod public;
pub mod user;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use alloy::primitives::Address;

use crate::instance::{DecryptedValue, DecryptedValues, FhevmInstance, Handle};
use crate::signer::DecryptSigner;
use crate::storage::StorageAdapter;

pub use public::public_decrypt;
pub use user::user_decrypt;

/// Primary type of the user-decryption authorization message.
pub const USER_DECRYPT_PRIMARY_TYPE: &str = "UserDecryptRequestVerification";

/// Validity window applied when a request does not set one.
pub const DEFAULT_DURATION_DAYS: u32 = 7;

/// How long an authorization signature may be reused.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CacheType {
    /// Always sign.
    #[default]
    None,
    /// Reuse until the session ends.
    Session,
    /// Reuse until the signature expires.
    Persistent,
}

impl CacheType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheType::None => "none",
            CacheType::Session => "session",
            CacheType::Persistent => "persistent",
        }
    }
}

impl fmt::Display for CacheType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(CacheType::None),
            "session" => Ok(CacheType::Session),
            "persistent" => Ok(CacheType::Persistent),
            other => Err(format!(
                "unknown cache type `{other}` (expected none, session or persistent)"
            )),
        }
    }
}

/// One handle or a batch. The shape of the output follows the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleSelection {
    Single(Handle),
    Batch(Vec<Handle>),
}

impl HandleSelection {
    pub fn handles(&self) -> &[Handle] {
        match self {
            HandleSelection::Single(handle) => std::slice::from_ref(handle),
            HandleSelection::Batch(handles) => handles,
        }
    }
}

/// Parameters for a user decryption.
#[derive(Clone)]
pub struct UserDecryptRequest {
    pub handles: HandleSelection,
    pub contract_address: Address,
    pub signer: Arc<dyn DecryptSigner>,
    pub duration_days: u32,
    /// `None` falls back to the client's default policy.
    pub cache_type: Option<CacheType>,
}

impl UserDecryptRequest {
    pub fn single(
        handle: impl Into<Handle>,
        contract_address: Address,
        signer: Arc<dyn DecryptSigner>,
    ) -> Self {
        Self::new(HandleSelection::Single(handle.into()), contract_address, signer)
    }

    pub fn batch<I, H>(handles: I, contract_address: Address, signer: Arc<dyn DecryptSigner>) -> Self
    where
        I: IntoIterator<Item = H>,
        H: Into<Handle>,
    {
        let handles = handles.into_iter().map(Into::into).collect();
        Self::new(HandleSelection::Batch(handles), contract_address, signer)
    }

    fn new(handles: HandleSelection, contract_address: Address, signer: Arc<dyn DecryptSigner>) -> Self {
        Self {
            handles,
            contract_address,
            signer,
            duration_days: DEFAULT_DURATION_DAYS,
            cache_type: None,
        }
    }

    pub fn with_cache_type(mut self, cache_type: CacheType) -> Self {
        self.cache_type = Some(cache_type);
        self
    }

    pub fn with_duration_days(mut self, days: u32) -> Self {
        self.duration_days = days;
        self
    }
}

impl fmt::Debug for UserDecryptRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserDecryptRequest")
            .field("handles", &self.handles)
            .field("contract_address", &self.contract_address)
            .field("signer", &self.signer.address())
            .field("duration_days", &self.duration_days)
            .field("cache_type", &self.cache_type)
            .finish()
    }
}

/// Result of a user decryption, shaped like the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserDecryptOutput {
    Single(DecryptedValue),
    Batch(DecryptedValues),
}

impl UserDecryptOutput {
    pub fn into_single(self) -> Option<DecryptedValue> {
        match self {
            UserDecryptOutput::Single(value) => Some(value),
            UserDecryptOutput::Batch(_) => None,
        }
    }

    pub fn into_batch(self) -> Option<DecryptedValues> {
        match self {
            UserDecryptOutput::Batch(values) => Some(values),
            UserDecryptOutput::Single(_) => None,
        }
    }
}

/// What a decryption call runs against.
pub struct DecryptContext<'a> {
    pub instance: &'a dyn FhevmInstance,
    /// Signature backend for the request's policy, if it caches.
    pub signature_cache: Option<&'a dyn StorageAdapter>,
    /// Used for the cache key when the typed-data domain has no chain id.
    pub fallback_chain_id: u64,
    pub debug: bool,
}
