// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Checksummed keystore file used when the OS keyring is unavailable.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use harbor_common_secret::{remove_if_exists, write_private_file, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::debug;
use zeroize::Zeroize;

use crate::backend::{PasswordBackend, PasswordSource};
use crate::error::{KeychainError, KeychainResult};

pub const KEYSTORE_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct KeystoreFile {
	password: String,
	checksum: String,
	version: u32,
}

impl Drop for KeystoreFile {
	fn drop(&mut self) {
		self.password.zeroize();
	}
}

pub fn checksum(password: &str) -> String {
	hex::encode(Sha256::digest(password.as_bytes()))
}

#[derive(Debug, Clone)]
pub struct FileBackend {
	path: PathBuf,
}

impl FileBackend {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	fn tampered(&self, reason: impl Into<String>) -> KeychainError {
		KeychainError::TamperDetected {
			path: self.path.clone(),
			reason: reason.into(),
		}
	}
}

#[async_trait]
impl PasswordBackend for FileBackend {
	fn name(&self) -> &'static str {
		"file"
	}

	fn source(&self) -> PasswordSource {
		PasswordSource::File
	}

	async fn is_available(&self) -> bool {
		match self.path.parent() {
			Some(parent) => fs::create_dir_all(parent).await.is_ok(),
			None => false,
		}
	}

	async fn load(&self) -> KeychainResult<Option<SecretString>> {
		if !fs::try_exists(&self.path).await? {
			return Ok(None);
		}

		let mut contents = fs::read_to_string(&self.path).await?;
		let parsed: Result<KeystoreFile, _> = serde_json::from_str(&contents);
		contents.zeroize();

		let file = parsed.map_err(|e| self.tampered(format!("unreadable keystore: {e}")))?;
		if file.version != KEYSTORE_VERSION {
			return Err(self.tampered(format!("unsupported version {}", file.version)));
		}
		if checksum(&file.password) != file.checksum {
			return Err(self.tampered("checksum mismatch"));
		}

		debug!(path = %self.path.display(), "loaded password from keystore file");
		Ok(Some(SecretString::new(file.password.clone())))
	}

	async fn store(&self, password: &SecretString) -> KeychainResult<()> {
		let file = KeystoreFile {
			password: password.expose().clone(),
			checksum: checksum(password.expose()),
			version: KEYSTORE_VERSION,
		};
		let mut contents = serde_json::to_string_pretty(&file)?;
		let written = write_private_file(&self.path, contents.as_bytes()).await;
		contents.zeroize();
		written?;

		debug!(path = ?self.path, "keystore written");
		Ok(())
	}

	async fn delete(&self) -> KeychainResult<()> {
		remove_if_exists(&self.path).await?;
		Ok(())
	}

	async fn insecure_reason(&self) -> Option<String> {
		#[cfg(unix)]
		{
			use std::os::unix::fs::PermissionsExt;
			let mode = fs::metadata(&self.path).await.ok()?.permissions().mode();
			if mode & 0o077 != 0 {
				return Some(format!(
					"keystore mode {:o} is readable by group or others",
					mode & 0o777
				));
			}
		}
		None
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn backend() -> (tempfile::TempDir, FileBackend) {
		let dir = tempfile::tempdir().unwrap();
		let backend = FileBackend::new(dir.path().join("keystore.json"));
		(dir, backend)
	}

	#[tokio::test]
	async fn roundtrip() {
		let (_dir, backend) = backend();
		assert!(backend.is_available().await);
		assert!(backend.load().await.unwrap().is_none());

		backend
			.store(&SecretString::new("abc123".to_string()))
			.await
			.unwrap();
		let loaded = backend.load().await.unwrap().unwrap();
		assert_eq!(loaded.expose(), "abc123");

		backend.delete().await.unwrap();
		assert!(backend.load().await.unwrap().is_none());
		backend.delete().await.unwrap();
	}

	#[tokio::test]
	async fn altered_password_is_tamper() {
		let (_dir, backend) = backend();
		backend
			.store(&SecretString::new("original".to_string()))
			.await
			.unwrap();

		let raw = std::fs::read_to_string(backend.path()).unwrap();
		std::fs::write(backend.path(), raw.replace("original", "attacker")).unwrap();

		let err = backend.load().await.unwrap_err();
		assert!(matches!(err, KeychainError::TamperDetected { .. }));
	}

	#[tokio::test]
	async fn garbage_file_is_tamper() {
		let (_dir, backend) = backend();
		std::fs::write(backend.path(), "not json").unwrap();
		assert!(matches!(
			backend.load().await,
			Err(KeychainError::TamperDetected { .. })
		));
	}

	#[cfg(unix)]
	#[tokio::test]
	async fn written_file_is_owner_only_and_loosening_is_reported() {
		use std::os::unix::fs::PermissionsExt;

		let (_dir, backend) = backend();
		backend
			.store(&SecretString::new("pw".to_string()))
			.await
			.unwrap();
		let mode = std::fs::metadata(backend.path()).unwrap().permissions().mode();
		assert_eq!(mode & 0o777, 0o600);
		assert!(backend.insecure_reason().await.is_none());

		std::fs::set_permissions(backend.path(), std::fs::Permissions::from_mode(0o644)).unwrap();
		assert!(backend.insecure_reason().await.is_some());
	}
}
