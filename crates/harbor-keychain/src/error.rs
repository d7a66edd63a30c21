// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Keychain error types.

use std::path::PathBuf;

pub type KeychainResult<T> = Result<T, KeychainError>;

#[derive(Debug, thiserror::Error)]
pub enum KeychainError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("Serialization error: {0}")]
	Serde(#[from] serde_json::Error),

	#[error("Backend error: {0}")]
	Backend(String),

	/// The fallback keystore failed its integrity check. Callers treat this as
	/// absence; it is never surfaced past [`crate::KeychainStore`].
	#[error("keystore at {path} failed integrity check: {reason}")]
	TamperDetected { path: PathBuf, reason: String },

	#[error("no password backend is available to store a new password")]
	NoBackendAvailable,
}
