// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Password storage backends.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use harbor_common_secret::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::KeychainResult;

/// Where a resolved password came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PasswordSource {
	Keychain,
	File,
	Generated,
}

impl std::fmt::Display for PasswordSource {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let s = match self {
			PasswordSource::Keychain => "keychain",
			PasswordSource::File => "file",
			PasswordSource::Generated => "generated",
		};
		write!(f, "{s}")
	}
}

/// A place the encryption password can live.
///
/// The store probes backends with [`PasswordBackend::is_available`] before
/// calling anything else, so `load`/`store`/`delete` may assume the backend is
/// reachable.
#[async_trait]
pub trait PasswordBackend: Send + Sync + std::fmt::Debug {
	fn name(&self) -> &'static str;

	/// The source reported when a password is loaded from this backend.
	fn source(&self) -> PasswordSource;

	/// Deletion failures on best-effort backends are logged, not returned.
	fn best_effort_delete(&self) -> bool {
		false
	}

	/// Cheap reachability probe.
	async fn is_available(&self) -> bool;

	async fn load(&self) -> KeychainResult<Option<SecretString>>;

	async fn store(&self, password: &SecretString) -> KeychainResult<()>;

	async fn delete(&self) -> KeychainResult<()>;

	/// Describes a storage weakness worth a warning, such as a world-readable
	/// file. Checked after a successful load.
	async fn insecure_reason(&self) -> Option<String> {
		None
	}
}

/// In-memory backend. Useful for tests and for processes that must never
/// touch disk.
#[derive(Debug)]
pub struct MemoryBackend {
	password: tokio::sync::RwLock<Option<SecretString>>,
	available: AtomicBool,
	source: PasswordSource,
}

impl MemoryBackend {
	pub fn new(source: PasswordSource) -> Self {
		Self {
			password: tokio::sync::RwLock::new(None),
			available: AtomicBool::new(true),
			source,
		}
	}

	pub fn set_available(&self, available: bool) {
		self.available.store(available, Ordering::SeqCst);
	}

	pub async fn peek(&self) -> Option<SecretString> {
		self.password.read().await.clone()
	}
}

impl Default for MemoryBackend {
	fn default() -> Self {
		Self::new(PasswordSource::Keychain)
	}
}

#[async_trait]
impl PasswordBackend for MemoryBackend {
	fn name(&self) -> &'static str {
		"memory"
	}

	fn source(&self) -> PasswordSource {
		self.source
	}

	async fn is_available(&self) -> bool {
		self.available.load(Ordering::SeqCst)
	}

	async fn load(&self) -> KeychainResult<Option<SecretString>> {
		Ok(self.password.read().await.clone())
	}

	async fn store(&self, password: &SecretString) -> KeychainResult<()> {
		*self.password.write().await = Some(password.clone());
		Ok(())
	}

	async fn delete(&self) -> KeychainResult<()> {
		*self.password.write().await = None;
		Ok(())
	}
}
