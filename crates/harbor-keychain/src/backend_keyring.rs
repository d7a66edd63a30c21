// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use harbor_common_secret::SecretString;

use crate::backend::{PasswordBackend, PasswordSource};
use crate::error::{KeychainError, KeychainResult};

/// OS-native secret store (macOS Keychain, Secret Service, Windows Credential
/// Manager) via the `keyring` crate. Every call runs on the blocking pool.
#[derive(Debug, Clone)]
pub struct KeyringBackend {
	service: String,
	account: String,
}

impl KeyringBackend {
	pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
		Self {
			service: service.into(),
			account: account.into(),
		}
	}

	async fn blocking<T, F>(&self, f: F) -> KeychainResult<T>
	where
		T: Send + 'static,
		F: FnOnce(keyring::Entry) -> KeychainResult<T> + Send + 'static,
	{
		let service = self.service.clone();
		let account = self.account.clone();
		tokio::task::spawn_blocking(move || {
			let entry = keyring::Entry::new(&service, &account)
				.map_err(|e| KeychainError::Backend(e.to_string()))?;
			f(entry)
		})
		.await
		.map_err(|e| KeychainError::Backend(e.to_string()))?
	}
}

#[async_trait]
impl PasswordBackend for KeyringBackend {
	fn name(&self) -> &'static str {
		"keyring"
	}

	fn source(&self) -> PasswordSource {
		PasswordSource::Keychain
	}

	fn best_effort_delete(&self) -> bool {
		true
	}

	async fn is_available(&self) -> bool {
		let probe = self
			.blocking(|entry| match entry.get_password() {
				Ok(_) | Err(keyring::Error::NoEntry) => Ok(true),
				Err(e) => {
					tracing::debug!(error = %e, "keyring probe failed");
					Ok(false)
				}
			})
			.await;
		probe.unwrap_or(false)
	}

	async fn load(&self) -> KeychainResult<Option<SecretString>> {
		self
			.blocking(|entry| match entry.get_password() {
				Ok(password) => Ok(Some(SecretString::new(password))),
				Err(keyring::Error::NoEntry) => Ok(None),
				Err(e) => Err(KeychainError::Backend(e.to_string())),
			})
			.await
	}

	async fn store(&self, password: &SecretString) -> KeychainResult<()> {
		let data = password.clone();
		let service = self.service.clone();
		let account = self.account.clone();
		self
			.blocking(move |entry| {
				entry
					.set_password(data.expose())
					.map_err(|e| KeychainError::Backend(e.to_string()))?;

				// Read back through a fresh entry. Mock or session-only keyrings
				// accept the write but do not persist it.
				let verify = keyring::Entry::new(&service, &account)
					.map_err(|e| KeychainError::Backend(e.to_string()))?;
				match verify.get_password() {
					Ok(stored) if stored == *data.expose() => Ok(()),
					Ok(_) => Err(KeychainError::Backend(
						"keyring verification failed: stored data mismatch".to_string(),
					)),
					Err(keyring::Error::NoEntry) => Err(KeychainError::Backend(
						"keyring verification failed: password not persisted".to_string(),
					)),
					Err(e) => Err(KeychainError::Backend(format!(
						"keyring verification failed: {e}"
					))),
				}
			})
			.await
	}

	async fn delete(&self) -> KeychainResult<()> {
		self
			.blocking(|entry| match entry.delete_credential() {
				Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
				Err(e) => Err(KeychainError::Backend(e.to_string())),
			})
			.await
	}
}
