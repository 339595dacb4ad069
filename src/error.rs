// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Error taxonomy shared by the controller and the decryption engine.
//!
//! Storage-layer failures never appear here: the storage adapters log and
//! swallow them, so a broken cache only ever costs an extra signature or an
//! extra key fetch.

use std::fmt;

use crate::instance::InstanceError;
use crate::signer::SignerError;

/// Human-readable messages for configuration and lifecycle failures.
pub mod messages {
    pub const ALREADY_INITIALIZING: &str = "Already initializing";
    pub const PROVIDER_REQUIRED: &str = "Provider is required";
    pub const CHAIN_REQUIRED: &str = "Chain configuration is required";
    pub const CHAIN_ID_POSITIVE: &str = "ChainId must be positive";
    pub const INIT_FAILED: &str = "Failed to initialize FHEVM";
    pub const NOT_INITIALIZED: &str = "FHEVM client is not initialized";
    pub const DECRYPT_FAILED: &str = "Decryption failed";
}

/// Stable string codes, one per failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidConfig,
    InitFailed,
    NotInitialized,
    DecryptFailed,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidConfig => "INVALID_CONFIG",
            ErrorCode::InitFailed => "INIT_FAILED",
            ErrorCode::NotInitialized => "NOT_INITIALIZED",
            ErrorCode::DecryptFailed => "DECRYPT_FAILED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error returned by every public client operation.
#[derive(Debug, thiserror::Error)]
pub enum FhevmError {
    /// Missing provider or chain at construction. Fatal, never retried.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// `initialize()` was called while another call is still in flight.
    #[error("{}", messages::ALREADY_INITIALIZING)]
    AlreadyInitializing,

    /// Instance construction or key fetch failed; the client is now unusable.
    #[error("{}: {}", messages::INIT_FAILED, .0)]
    InitFailed(#[source] InitError),

    /// A protocol call was made before the client reached `Ready`.
    #[error("{}", messages::NOT_INITIALIZED)]
    NotInitialized,

    /// Signing, oracle or handle failure. The client stays `Ready`.
    #[error("{}: {}", messages::DECRYPT_FAILED, .0)]
    DecryptFailed(#[source] DecryptError),
}

impl FhevmError {
    pub fn code(&self) -> ErrorCode {
        match self {
            FhevmError::InvalidConfig(_) => ErrorCode::InvalidConfig,
            FhevmError::AlreadyInitializing | FhevmError::InitFailed(_) => ErrorCode::InitFailed,
            FhevmError::NotInitialized => ErrorCode::NotInitialized,
            FhevmError::DecryptFailed(_) => ErrorCode::DecryptFailed,
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        FhevmError::InvalidConfig(message.into())
    }
}

/// Causes wrapped by [`FhevmError::InitFailed`].
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("chain configuration could not be loaded: {0}")]
    ConfigLoad(String),

    #[error("chain configuration is incomplete: {0}")]
    UnresolvedChain(String),

    #[error(transparent)]
    Instance(#[from] InstanceError),

    #[error("initialization was abandoned before it completed")]
    Abandoned,

    #[error("client already failed to initialize; construct a new client")]
    Terminal,
}

/// Causes wrapped by [`FhevmError::DecryptFailed`].
#[derive(Debug, thiserror::Error)]
pub enum DecryptError {
    #[error("signing rejected: {0}")]
    Signing(#[from] SignerError),

    #[error(transparent)]
    Instance(#[from] InstanceError),

    #[error("handle missing from decryption result: {0}")]
    MissingHandle(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<DecryptError> for FhevmError {
    fn from(e: DecryptError) -> Self {
        FhevmError::DecryptFailed(e)
    }
}

impl From<InitError> for FhevmError {
    fn from(e: InitError) -> Self {
        FhevmError::InitFailed(e)
    }
}
