// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Record shapes persisted by the storage adapters.

use std::fmt;

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

/// Seconds in one validity day.
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Public key cached per ACL contract address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedPublicKey {
    pub public_key_id: String,
    pub public_key: Vec<u8>,
    pub cached_at_ms: i64,
}

/// A reusable user-decryption authorization.
///
/// The ephemeral private key lives here in clear; the backends are only as
/// protected as the medium they write to.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedSignature {
    /// `0x`-prefixed signature as returned by the signer.
    pub signature: String,
    pub public_key: String,
    pub private_key: String,
    pub user_address: String,
    pub contract_address: String,
    pub chain_id: u64,
    /// Start of the validity window, seconds since the epoch.
    pub start_timestamp: u64,
    pub duration_days: u32,
    pub expires_at_ms: i64,
    pub cached_at_ms: i64,
}

impl CachedSignature {
    /// Expiry for a window starting at `start_timestamp` (seconds).
    pub fn expiry_ms(start_timestamp: u64, duration_days: u32) -> i64 {
        let end_secs = start_timestamp.saturating_add(u64::from(duration_days) * SECONDS_PER_DAY);
        i64::try_from(end_secs.saturating_mul(1000)).unwrap_or(i64::MAX)
    }

    /// Usable only strictly before `expires_at_ms`.
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at_ms
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(chrono::Utc::now().timestamp_millis())
    }
}

impl fmt::Debug for CachedSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedSignature")
            .field("user_address", &self.user_address)
            .field("contract_address", &self.contract_address)
            .field("chain_id", &self.chain_id)
            .field("start_timestamp", &self.start_timestamp)
            .field("duration_days", &self.duration_days)
            .field("expires_at_ms", &self.expires_at_ms)
            .finish_non_exhaustive()
    }
}

/// Composite signature cache key: (user, chain, contract), addresses
/// lower-cased so checksum casing never splits an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignatureCacheKey {
    user: String,
    chain_id: u64,
    contract: String,
}

impl SignatureCacheKey {
    pub fn new(user: &str, chain_id: u64, contract: &str) -> Self {
        Self {
            user: user.to_lowercase(),
            chain_id,
            contract: contract.to_lowercase(),
        }
    }

    pub fn from_addresses(user: Address, chain_id: u64, contract: Address) -> Self {
        Self::new(&user.to_string(), chain_id, &contract.to_string())
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn contract(&self) -> &str {
        &self.contract
    }
}

impl fmt::Display for SignatureCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.user, self.chain_id, self.contract)
    }
}
