// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The user's durable Ed25519 signing wallet and short-lived ephemeral keys.
//!
//! The private key is stored encrypted with AES-256-GCM under a key derived
//! by Argon2id from the keychain password. It is decrypted on demand into a
//! [`harbor_common_secret::SecretBytes`] for a single signature and wiped on
//! drop.

pub mod address;
pub mod crypto;
pub mod error;
pub mod manager;
pub mod types;

pub use address::derive_address;
pub use crypto::KdfParams;
pub use error::{WalletError, WalletResult};
pub use manager::{verify_signature, WalletManager, WalletSettings};
pub use types::{
	ephemeral_key_ttl, BalanceQuery, Balances, EphemeralKey, EphemeralKeyMetadata,
	EphemeralPermission, FixedClock, SystemClock, TxSignature, UnsignedTx, WallClock, WalletData,
	WalletInfo, EPHEMERAL_KEY_TTL_HOURS,
};
