// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::Path;
use std::sync::Arc;

use harbor_common_secret::SecretString;
use harbor_security_log::{SecurityEventType, SecurityLog, Severity};
use rand::rngs::OsRng;
use rand::RngCore;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use zeroize::Zeroizing;

use crate::backend::{PasswordBackend, PasswordSource};
use crate::backend_file::FileBackend;
use crate::backend_keyring::KeyringBackend;
use crate::error::{KeychainError, KeychainResult};

/// Bytes of entropy in a freshly generated password.
pub const PASSWORD_BYTES: usize = 32;

/// A resolved password and where it came from.
#[derive(Debug, Clone)]
pub struct ResolvedPassword {
	pub password: SecretString,
	pub source: PasswordSource,
}

pub fn generate_password() -> SecretString {
	let mut bytes = Zeroizing::new([0u8; PASSWORD_BYTES]);
	OsRng.fill_bytes(bytes.as_mut());
	SecretString::new(hex::encode(bytes.as_ref()))
}

/// Owns the wallet encryption password and its ranked backends.
pub struct KeychainStore {
	backends: Vec<Arc<dyn PasswordBackend>>,
	log: SecurityLog,
	cache: Mutex<Option<ResolvedPassword>>,
}

impl KeychainStore {
	/// `backends` are tried in order; the first is the preferred home for a new
	/// password.
	pub fn new(backends: Vec<Arc<dyn PasswordBackend>>, log: SecurityLog) -> Self {
		Self {
			backends,
			log,
			cache: Mutex::new(None),
		}
	}

	/// OS keyring (when `use_native`) followed by the keystore file.
	pub fn from_config(
		config: &harbor_config::KeychainConfig,
		keystore_file: &Path,
		log: SecurityLog,
	) -> Self {
		let mut backends: Vec<Arc<dyn PasswordBackend>> = Vec::new();
		if config.use_native {
			backends.push(Arc::new(KeyringBackend::new(
				config.service.clone(),
				config.account.clone(),
			)));
		}
		backends.push(Arc::new(FileBackend::new(keystore_file)));
		Self::new(backends, log)
	}

	/// Resolve the password, creating and persisting one if none exists.
	#[instrument(skip(self))]
	pub async fn get_or_create_password(&self) -> KeychainResult<ResolvedPassword> {
		let mut cache = self.cache.lock().await;
		if let Some(cached) = cache.as_ref() {
			return Ok(cached.clone());
		}

		let mut reachable: Vec<&Arc<dyn PasswordBackend>> = Vec::new();
		for backend in &self.backends {
			if !backend.is_available().await {
				debug!(backend = backend.name(), "password backend unavailable");
				self.log.log(
					SecurityEventType::KeychainBackendUnavailable,
					json!({"backend": backend.name()}),
					Severity::Notice,
				);
				continue;
			}

			// A backend whose load errored may still hold the password, so it
			// must never receive a freshly generated one.
			match backend.load().await {
				Ok(Some(password)) => {
					if let Some(reason) = backend.insecure_reason().await {
						warn!(backend = backend.name(), %reason, "password storage is not private");
						self.log.log(
							SecurityEventType::InsecurePermissions,
							json!({"backend": backend.name(), "reason": reason}),
							Severity::Warning,
						);
					}
					self.log.record(
						SecurityEventType::KeychainPasswordLoaded,
						json!({"backend": backend.name()}),
					);
					let resolved = ResolvedPassword {
						password,
						source: backend.source(),
					};
					*cache = Some(resolved.clone());
					return Ok(resolved);
				}
				Ok(None) => {
					debug!(backend = backend.name(), "no password stored");
					reachable.push(backend);
				}
				Err(KeychainError::TamperDetected { path, reason }) => {
					warn!(path = %path.display(), %reason, "keystore failed integrity check, ignoring it");
					self.log.log(
						SecurityEventType::TamperDetected,
						json!({"backend": backend.name(), "path": path.display().to_string(), "reason": reason}),
						Severity::Critical,
					);
					reachable.push(backend);
				}
				Err(e) => {
					warn!(backend = backend.name(), error = %e, "password backend load failed");
					self.log.log(
						SecurityEventType::KeychainBackendUnavailable,
						json!({"backend": backend.name(), "error": e.to_string()}),
						Severity::Warning,
					);
				}
			}
		}

		let password = generate_password();
		for backend in reachable {
			match backend.store(&password).await {
				Ok(()) => {
					info!(backend = backend.name(), "stored new wallet encryption password");
					self.log.record(
						SecurityEventType::KeychainPasswordCreated,
						json!({"backend": backend.name()}),
					);
					let resolved = ResolvedPassword {
						password,
						source: PasswordSource::Generated,
					};
					*cache = Some(resolved.clone());
					return Ok(resolved);
				}
				Err(e) => {
					warn!(backend = backend.name(), error = %e, "failed to store password, trying next backend");
				}
			}
		}

		Err(KeychainError::NoBackendAvailable)
	}

	/// Forget the cached password. The next call re-reads the backends.
	pub async fn clear_cache(&self) {
		let cleared = self.cache.lock().await.take().is_some();
		if cleared {
			self
				.log
				.record(SecurityEventType::KeychainCacheCleared, json!({}));
		}
	}

	/// Remove the password from every backend. Native keyring failures are
	/// logged and ignored; any other failure is returned after all backends
	/// have been attempted.
	#[instrument(skip(self))]
	pub async fn delete_password(&self) -> KeychainResult<()> {
		self.cache.lock().await.take();

		let mut first_error = None;
		let mut removed_from = Vec::new();
		for backend in &self.backends {
			if !backend.is_available().await {
				continue;
			}
			match backend.delete().await {
				Ok(()) => removed_from.push(backend.name()),
				Err(e) if backend.best_effort_delete() => {
					warn!(backend = backend.name(), error = %e, "best-effort password delete failed");
				}
				Err(e) => {
					warn!(backend = backend.name(), error = %e, "password delete failed");
					first_error.get_or_insert(e);
				}
			}
		}

		self.log.record(
			SecurityEventType::KeychainPasswordDeleted,
			json!({"backends": removed_from}),
		);

		match first_error {
			Some(e) => Err(e),
			None => Ok(()),
		}
	}

	/// Delete the current password everywhere and create a fresh one.
	#[instrument(skip(self))]
	pub async fn rotate_password(&self) -> KeychainResult<ResolvedPassword> {
		self.delete_password().await?;
		let resolved = self.get_or_create_password().await?;
		self.log.record(
			SecurityEventType::KeychainPasswordRotated,
			json!({"source": resolved.source.to_string()}),
		);
		Ok(resolved)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::backend::MemoryBackend;
	use harbor_security_log::MemorySink;

	fn log_with_sink() -> (SecurityLog, MemorySink) {
		let sink = MemorySink::new();
		(
			SecurityLog::new(Severity::Debug, vec![Arc::new(sink.clone())]),
			sink,
		)
	}

	#[test]
	fn generated_password_has_256_bits() {
		let a = generate_password();
		let b = generate_password();
		assert_eq!(a.expose().len(), PASSWORD_BYTES * 2);
		assert!(a.expose().chars().all(|c| c.is_ascii_hexdigit()));
		assert_ne!(a, b);
	}

	#[tokio::test]
	async fn native_hit_is_returned_and_cached() {
		let (log, _sink) = log_with_sink();
		let native = Arc::new(MemoryBackend::new(PasswordSource::Keychain));
		native
			.store(&SecretString::new("from-native".to_string()))
			.await
			.unwrap();
		let store = KeychainStore::new(vec![native.clone()], log);

		let first = store.get_or_create_password().await.unwrap();
		assert_eq!(first.password.expose(), "from-native");
		assert_eq!(first.source, PasswordSource::Keychain);

		native.delete().await.unwrap();
		let second = store.get_or_create_password().await.unwrap();
		assert_eq!(second.password.expose(), "from-native");

		store.clear_cache().await;
		let third = store.get_or_create_password().await.unwrap();
		assert_eq!(third.source, PasswordSource::Generated);
	}

	#[tokio::test]
	async fn empty_reachable_native_gets_new_password() {
		let (log, sink) = log_with_sink();
		let native = Arc::new(MemoryBackend::new(PasswordSource::Keychain));
		let file = Arc::new(MemoryBackend::new(PasswordSource::File));
		let store = KeychainStore::new(vec![native.clone(), file.clone()], log.clone());

		let resolved = store.get_or_create_password().await.unwrap();
		assert_eq!(resolved.source, PasswordSource::Generated);
		assert_eq!(native.peek().await, Some(resolved.password.clone()));
		assert!(file.peek().await.is_none());

		log.flush().await.unwrap();
		assert_eq!(
			sink
				.of_type(SecurityEventType::KeychainPasswordCreated)
				.await
				.len(),
			1
		);
	}

	#[tokio::test]
	async fn unavailable_native_falls_back_to_file() {
		let (log, _sink) = log_with_sink();
		let native = Arc::new(MemoryBackend::new(PasswordSource::Keychain));
		native.set_available(false);
		let dir = tempfile::tempdir().unwrap();
		let file = Arc::new(FileBackend::new(dir.path().join("keystore.json")));
		let store = KeychainStore::new(vec![native.clone(), file.clone()], log);

		let created = store.get_or_create_password().await.unwrap();
		assert_eq!(created.source, PasswordSource::Generated);
		assert!(native.peek().await.is_none());

		store.clear_cache().await;
		let reloaded = store.get_or_create_password().await.unwrap();
		assert_eq!(reloaded.source, PasswordSource::File);
		assert_eq!(reloaded.password, created.password);
	}

	#[tokio::test]
	async fn tampered_keystore_is_treated_as_absent() {
		let (log, sink) = log_with_sink();
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("keystore.json");
		let file = Arc::new(FileBackend::new(&path));
		file
			.store(&SecretString::new("original".to_string()))
			.await
			.unwrap();
		let raw = std::fs::read_to_string(&path).unwrap();
		std::fs::write(&path, raw.replace("original", "swapped!")).unwrap();

		let store = KeychainStore::new(vec![file], log.clone());
		let resolved = store.get_or_create_password().await.unwrap();
		assert_eq!(resolved.source, PasswordSource::Generated);
		assert_ne!(resolved.password.expose(), "swapped!");

		log.flush().await.unwrap();
		let tamper = sink.of_type(SecurityEventType::TamperDetected).await;
		assert_eq!(tamper.len(), 1);
		assert_eq!(tamper[0].severity, Severity::Critical);
	}

	#[cfg(unix)]
	#[tokio::test]
	async fn loose_keystore_permissions_emit_warning() {
		use std::os::unix::fs::PermissionsExt;

		let (log, sink) = log_with_sink();
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("keystore.json");
		let file = Arc::new(FileBackend::new(&path));
		file
			.store(&SecretString::new("pw".to_string()))
			.await
			.unwrap();
		std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

		let store = KeychainStore::new(vec![file], log.clone());
		let resolved = store.get_or_create_password().await.unwrap();
		assert_eq!(resolved.source, PasswordSource::File);

		log.flush().await.unwrap();
		let warnings = sink.of_type(SecurityEventType::InsecurePermissions).await;
		assert_eq!(warnings.len(), 1);
		assert_eq!(warnings[0].severity, Severity::Warning);
	}

	#[tokio::test]
	async fn rotate_replaces_password_everywhere() {
		let (log, _sink) = log_with_sink();
		let native = Arc::new(MemoryBackend::new(PasswordSource::Keychain));
		let store = KeychainStore::new(vec![native.clone()], log);

		let before = store.get_or_create_password().await.unwrap();
		let after = store.rotate_password().await.unwrap();
		assert_ne!(before.password, after.password);
		assert_eq!(native.peek().await, Some(after.password));
	}

	#[derive(Debug)]
	struct LockedBackend {
		inner: MemoryBackend,
	}

	#[async_trait::async_trait]
	impl PasswordBackend for LockedBackend {
		fn name(&self) -> &'static str {
			"locked"
		}

		fn source(&self) -> PasswordSource {
			PasswordSource::Keychain
		}

		async fn is_available(&self) -> bool {
			true
		}

		async fn load(&self) -> KeychainResult<Option<SecretString>> {
			Err(KeychainError::Backend("temporarily locked".to_string()))
		}

		async fn store(&self, password: &SecretString) -> KeychainResult<()> {
			self.inner.store(password).await
		}

		async fn delete(&self) -> KeychainResult<()> {
			self.inner.delete().await
		}
	}

	#[tokio::test]
	async fn failed_load_never_overwrites_existing_password() {
		let (log, sink) = log_with_sink();
		let locked = Arc::new(LockedBackend {
			inner: MemoryBackend::new(PasswordSource::Keychain),
		});
		locked
			.inner
			.store(&SecretString::new("existing-wallet-password".to_string()))
			.await
			.unwrap();
		let file = Arc::new(MemoryBackend::new(PasswordSource::File));
		let store = KeychainStore::new(vec![locked.clone(), file.clone()], log.clone());

		let resolved = store.get_or_create_password().await.unwrap();
		assert_eq!(resolved.source, PasswordSource::Generated);
		assert_eq!(
			locked.inner.peek().await.unwrap().expose(),
			"existing-wallet-password"
		);
		assert_eq!(file.peek().await, Some(resolved.password));

		log.flush().await.unwrap();
		let unavailable = sink
			.of_type(SecurityEventType::KeychainBackendUnavailable)
			.await;
		assert_eq!(unavailable.len(), 1);
		assert_eq!(unavailable[0].severity, Severity::Warning);
	}

	#[tokio::test]
	async fn only_failing_backend_is_an_error() {
		let (log, _sink) = log_with_sink();
		let locked = Arc::new(LockedBackend {
			inner: MemoryBackend::new(PasswordSource::Keychain),
		});
		locked
			.inner
			.store(&SecretString::new("existing-wallet-password".to_string()))
			.await
			.unwrap();
		let store = KeychainStore::new(vec![locked.clone()], log);

		assert!(matches!(
			store.get_or_create_password().await,
			Err(KeychainError::NoBackendAvailable)
		));
		assert_eq!(
			locked.inner.peek().await.unwrap().expose(),
			"existing-wallet-password"
		);
	}

	#[tokio::test]
	async fn no_reachable_backend_is_an_error() {
		let (log, _sink) = log_with_sink();
		let native = Arc::new(MemoryBackend::new(PasswordSource::Keychain));
		native.set_available(false);
		let store = KeychainStore::new(vec![native], log);

		assert!(matches!(
			store.get_or_create_password().await,
			Err(KeychainError::NoBackendAvailable)
		));
	}
}
