// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use crate::error::DecryptError;
use crate::instance::{DecryptedValues, FhevmInstance, Handle};
use crate::logging::debug_if;

/// Decrypt publicly decryptable handles. No signing, no caching: the
/// instance's answer is returned unchanged.
pub async fn public_decrypt(
    instance: &dyn FhevmInstance,
    handles: &[Handle],
    debug: bool,
) -> Result<DecryptedValues, DecryptError> {
    debug_if!(debug, handles = handles.len(), "Public decrypt");
    Ok(instance.public_decrypt(handles).await?)
}
