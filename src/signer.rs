// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Typed-data signers for user-decryption authorizations.
//!
//! A wallet connection implements [`DecryptSigner`] to prompt the user.
//! Server-side callers holding a key can use [`LocalDecryptSigner`], backed
//! by alloy's `PrivateKeySigner`.

use alloy::dyn_abi::TypedData;
use alloy::primitives::Address;
use alloy::signers::{local::PrivateKeySigner, Signer};
use async_trait::async_trait;
use k256::ecdsa::SigningKey;
use k256::pkcs8::DecodePrivateKey;
use k256::SecretKey;

/// Errors that can occur while producing an authorization signature.
#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    /// The user (or wallet) declined to sign.
    #[error("Signature rejected: {0}")]
    Rejected(String),

    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    #[error("Signing failed: {0}")]
    Signing(String),
}

/// Anything that can sign EIP-712 typed data on behalf of an account.
#[async_trait]
pub trait DecryptSigner: Send + Sync {
    /// Account the signature is bound to.
    fn address(&self) -> Address;

    /// Sign `payload` and return the `0x`-prefixed 65-byte signature hex.
    async fn sign_typed_data(&self, payload: &TypedData) -> Result<String, SignerError>;
}

/// Signer over an in-process secp256k1 key.
#[derive(Debug, Clone)]
pub struct LocalDecryptSigner {
    inner: PrivateKeySigner,
}

impl LocalDecryptSigner {
    pub fn new(inner: PrivateKeySigner) -> Self {
        Self { inner }
    }

    /// Create a signer from a hex private key, with or without `0x`.
    pub fn from_hex(private_key_hex: &str) -> Result<Self, SignerError> {
        let key_bytes = alloy::hex::decode(private_key_hex)
            .map_err(|e| SignerError::InvalidKey(e.to_string()))?;

        PrivateKeySigner::from_slice(&key_bytes)
            .map(Self::new)
            .map_err(|e| SignerError::InvalidKey(e.to_string()))
    }

    /// Create a signer from a PEM-encoded key (SEC1 or PKCS#8).
    pub fn from_pem(pem_bytes: &[u8]) -> Result<Self, SignerError> {
        let secret_key = secret_key_from_pem(pem_bytes)?;
        Ok(Self::new(PrivateKeySigner::from_signing_key(
            SigningKey::from(secret_key),
        )))
    }
}

#[async_trait]
impl DecryptSigner for LocalDecryptSigner {
    fn address(&self) -> Address {
        self.inner.address()
    }

    async fn sign_typed_data(&self, payload: &TypedData) -> Result<String, SignerError> {
        let signature = self
            .inner
            .sign_dynamic_typed_data(payload)
            .await
            .map_err(|e| SignerError::Signing(e.to_string()))?;
        Ok(alloy::hex::encode_prefixed(signature.as_bytes()))
    }
}

/// PEM label of a SEC1 `ECPrivateKey`, as written by `openssl ecparam`.
const SEC1_LABEL: &str = "EC PRIVATE KEY";

/// PEM label of a PKCS#8 `PrivateKeyInfo`.
const PKCS8_LABEL: &str = "PRIVATE KEY";

/// Decode a secp256k1 key, choosing the DER layout from the PEM label.
fn secret_key_from_pem(pem_bytes: &[u8]) -> Result<SecretKey, SignerError> {
    let pem_str = std::str::from_utf8(pem_bytes)
        .map_err(|e| SignerError::InvalidKey(format!("Invalid UTF-8: {e}")))?;
    let pem = pem::parse(pem_str)
        .map_err(|e| SignerError::InvalidKey(format!("Invalid PEM: {e}")))?;

    let decoded = match pem.tag() {
        SEC1_LABEL => SecretKey::from_sec1_der(pem.contents()).map_err(|e| e.to_string()),
        PKCS8_LABEL => SecretKey::from_pkcs8_der(pem.contents()).map_err(|e| e.to_string()),
        other => {
            return Err(SignerError::InvalidKey(format!(
                "Unsupported PEM label `{other}`"
            )))
        }
    };
    decoded.map_err(|e| SignerError::InvalidKey(format!("Invalid key format: {e}")))
}

/// Parse a private key from PEM format to hex string.
///
/// Accepts SEC1 (`EC PRIVATE KEY`) and PKCS#8 (`PRIVATE KEY`) files, the
/// two layouts operators export signing keys in.
///
/// # Returns
/// * `Ok(String)` - Hex-encoded private key (64 characters, no 0x prefix)
/// * `Err(SignerError::InvalidKey)` - Unreadable PEM, unknown label or bad key
pub fn pem_to_hex(pem_bytes: &[u8]) -> Result<String, SignerError> {
    let secret_key = secret_key_from_pem(pem_bytes)?;
    Ok(alloy::hex::encode(secret_key.to_bytes()))
}
