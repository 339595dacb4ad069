// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::fmt;

/// Lifecycle of a client's FHEVM instance.
///
/// `Idle → Initializing → Ready | Error`. `Ready` and `Error` are terminal
/// for the client; recovering from `Error` means constructing a new client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ClientStatus {
    #[default]
    Idle,
    Initializing,
    Ready,
    Error,
}

impl ClientStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientStatus::Idle => "idle",
            ClientStatus::Initializing => "initializing",
            ClientStatus::Ready => "ready",
            ClientStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ClientStatus::Ready | ClientStatus::Error)
    }
}

impl fmt::Display for ClientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
