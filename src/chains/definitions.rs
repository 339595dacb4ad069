// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Built-in chain definitions.

use alloy::primitives::address;
use url::Url;

use super::ChainConfig;

/// Ethereum Sepolia testnet.
pub const SEPOLIA_CHAIN_ID: u64 = 11155111;

/// Local Hardhat node running the FHEVM mock template.
pub const LOCALHOST_CHAIN_ID: u64 = 31337;

/// Gateway chain both definitions verify decryptions against.
pub const GATEWAY_CHAIN_ID: u64 = 55815;

const SEPOLIA_RELAYER_URL: &str = "https://relayer.testnet.zama.cloud";

/// FHEVM Sepolia testnet configuration.
pub fn sepolia() -> ChainConfig {
    ChainConfig {
        chain_id: SEPOLIA_CHAIN_ID,
        gateway_chain_id: GATEWAY_CHAIN_ID,
        acl_contract_address: address!("687820221192C5B662b25367F70076A37bc79b6c"),
        kms_contract_address: address!("1364cBBf2cDF5032C47d8226a6f6FBD2AFCDacAC"),
        input_verifier_contract_address: address!("bc91f3daD1A5F19F8390c400196e58073B6a0BC4"),
        verifying_contract_address_decryption: address!(
            "b6E160B1ff80D67Bfe90A85eE06Ce0A2613607D1"
        ),
        verifying_contract_address_input_verification: address!(
            "7048C39f048125eDa9d678AEbaDfB22F7900a29F"
        ),
        relayer_url: Url::parse(SEPOLIA_RELAYER_URL).ok(),
        network: None,
    }
}

/// Deterministic addresses from the FHEVM Hardhat template.
pub fn localhost() -> ChainConfig {
    ChainConfig {
        chain_id: LOCALHOST_CHAIN_ID,
        gateway_chain_id: GATEWAY_CHAIN_ID,
        acl_contract_address: address!("50157CFfD6bBFA2DECe204a89ec419c23ef5755D"),
        kms_contract_address: address!("1364cBBf2cDF5032C47d8226a6f6FBD2AFCDacAC"),
        input_verifier_contract_address: address!("901F8942346f7AB3a01F6D7613119Bca447Bb030"),
        verifying_contract_address_decryption: address!(
            "a02Cda4Ca3a71D7C46997716F4283aa851C28812"
        ),
        verifying_contract_address_input_verification: address!(
            "CD3ab3bd6bcc0c0bf3E27912a92043e817B1cf69"
        ),
        relayer_url: None,
        network: None,
    }
}
