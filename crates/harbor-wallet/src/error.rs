// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;

use thiserror::Error;

pub type WalletResult<T> = Result<T, WalletError>;

#[derive(Debug, Error)]
pub enum WalletError {
	#[error("no wallet found at {path}")]
	WalletNotFound { path: PathBuf },

	#[error("a wallet already exists at {path}")]
	WalletAlreadyExists { path: PathBuf },

	/// Authentication tag mismatch: wrong password or altered ciphertext.
	#[error("wallet decryption failed")]
	DecryptionFailed,

	#[error("encryption failed: {0}")]
	Encryption(String),

	#[error("key derivation failed: {0}")]
	Kdf(String),

	#[error("invalid key material: {0}")]
	InvalidKey(String),

	#[error("no unexpired ephemeral key is held in memory")]
	EphemeralKeyUnavailable,

	#[error("ephemeral key lacks permission {0}")]
	PermissionDenied(String),

	#[error("unknown ephemeral key permission: {0}")]
	UnknownPermission(String),

	#[error("balance query failed: {0}")]
	Balance(String),

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("serialization error: {0}")]
	Serde(#[from] serde_json::Error),

	#[error(transparent)]
	Keychain(#[from] harbor_keychain::KeychainError),
}
