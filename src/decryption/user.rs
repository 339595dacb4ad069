// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User decryption with cached authorization signatures.
//!
//! One signature covers every handle in a request, and with a caching
//! policy it is reused for later requests on the same
//! (user, chain, contract) until it expires.

use alloy::dyn_abi::TypedData;

use super::{
    DecryptContext, HandleSelection, UserDecryptOutput, UserDecryptRequest,
    USER_DECRYPT_PRIMARY_TYPE,
};
use crate::error::DecryptError;
use crate::instance::{HandleContractPair, Keypair, UserDecryptPayload};
use crate::logging::debug_if;
use crate::storage::{CachedSignature, SignatureCacheKey};

/// Signature plus the keypair and window it was issued for.
struct Authorization {
    keypair: Keypair,
    signature: String,
    start_timestamp: u64,
    duration_days: u32,
}

impl From<CachedSignature> for Authorization {
    fn from(cached: CachedSignature) -> Self {
        Self {
            keypair: Keypair {
                public_key: cached.public_key,
                private_key: cached.private_key,
            },
            signature: cached.signature,
            start_timestamp: cached.start_timestamp,
            duration_days: cached.duration_days,
        }
    }
}

/// Chain id carried in the typed-data domain, if it fits in a `u64`.
fn domain_chain_id(typed_data: &TypedData) -> Option<u64> {
    typed_data
        .domain
        .chain_id
        .and_then(|id| u64::try_from(id).ok())
}

/// Decrypt `request.handles` on behalf of the signer's account.
pub async fn user_decrypt(
    ctx: &DecryptContext<'_>,
    request: &UserDecryptRequest,
) -> Result<UserDecryptOutput, DecryptError> {
    let handles = request.handles.handles();
    if handles.is_empty() {
        return Err(DecryptError::InvalidRequest("no handles to decrypt".into()));
    }

    let user_address = request.signer.address();
    let contract_addresses = vec![request.contract_address];

    // The payload is needed for the chain id even when a cached signature
    // ends up being reused.
    let keypair = ctx.instance.generate_keypair();
    let start_timestamp = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default();
    let mut typed_data = ctx.instance.create_eip712(
        &keypair.public_key,
        &contract_addresses,
        start_timestamp,
        request.duration_days,
    )?;
    let chain_id = domain_chain_id(&typed_data).unwrap_or(ctx.fallback_chain_id);
    let cache_key =
        SignatureCacheKey::from_addresses(user_address, chain_id, request.contract_address);

    let cached = match ctx.signature_cache {
        Some(cache) => cache
            .get_signature(&cache_key)
            .await
            .filter(|signature| !signature.is_expired()),
        None => None,
    };

    let authorization = match cached {
        Some(cached) => {
            debug_if!(ctx.debug, key = %cache_key, "Reusing cached decryption signature");
            Authorization::from(cached)
        }
        None => {
            typed_data.primary_type = USER_DECRYPT_PRIMARY_TYPE.to_string();
            let signature = request.signer.sign_typed_data(&typed_data).await?;

            if let Some(cache) = ctx.signature_cache {
                let now_ms = chrono::Utc::now().timestamp_millis();
                let record = CachedSignature {
                    signature: signature.clone(),
                    public_key: keypair.public_key.clone(),
                    private_key: keypair.private_key.clone(),
                    user_address: cache_key.user().to_string(),
                    contract_address: cache_key.contract().to_string(),
                    chain_id,
                    start_timestamp,
                    duration_days: request.duration_days,
                    expires_at_ms: CachedSignature::expiry_ms(start_timestamp, request.duration_days),
                    cached_at_ms: now_ms,
                };
                cache.set_signature(&cache_key, record).await;
                debug_if!(ctx.debug, key = %cache_key, kind = ?cache.kind(), "Cached decryption signature");
            }

            Authorization {
                keypair,
                signature,
                start_timestamp,
                duration_days: request.duration_days,
            }
        }
    };

    let payload = UserDecryptPayload {
        handle_contract_pairs: handles
            .iter()
            .map(|handle| HandleContractPair {
                handle: handle.clone(),
                contract_address: request.contract_address,
            })
            .collect(),
        signature: authorization
            .signature
            .strip_prefix("0x")
            .unwrap_or(&authorization.signature)
            .to_string(),
        keypair: authorization.keypair,
        contract_addresses,
        user_address,
        start_timestamp: authorization.start_timestamp,
        duration_days: authorization.duration_days,
    };

    let mut values = ctx.instance.user_decrypt(payload).await?;

    match &request.handles {
        HandleSelection::Single(handle) => values
            .remove(handle)
            .map(UserDecryptOutput::Single)
            .ok_or_else(|| DecryptError::MissingHandle(handle.clone())),
        HandleSelection::Batch(_) => Ok(UserDecryptOutput::Batch(values)),
    }
}
