// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use harbor_common_secret::{remove_if_exists, write_private_file, SecretBytes};
use harbor_keychain::KeychainStore;
use harbor_security_log::{SecurityEventType, SecurityLog, Severity};
use rand::rngs::OsRng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use zeroize::Zeroizing;

use crate::address::derive_address;
use crate::crypto::{self, EncryptedData, KdfParams, NONCE_SIZE};
use crate::error::{WalletError, WalletResult};
use crate::types::{
	ephemeral_key_ttl, BalanceQuery, Balances, EphemeralKey, EphemeralKeyMetadata,
	EphemeralPermission, SystemClock, TxSignature, UnsignedTx, WallClock, WalletData, WalletInfo,
};

/// Where the wallet keeps its files and which network it belongs to.
#[derive(Debug, Clone)]
pub struct WalletSettings {
	pub wallet_file: PathBuf,
	pub ephemeral_key_file: PathBuf,
	pub address_prefix: String,
	pub network_id: String,
	pub kdf: KdfParams,
}

impl WalletSettings {
	pub fn from_config(config: &harbor_config::HarborConfig) -> Self {
		Self {
			wallet_file: config.paths.wallet_file(),
			ephemeral_key_file: config.paths.ephemeral_key_file(),
			address_prefix: config.network.address_prefix.clone(),
			network_id: config.network.chain_id.clone(),
			kdf: KdfParams::default(),
		}
	}
}

/// Owns the durable signing key and any in-memory ephemeral key.
///
/// The durable private key is decrypted only for the duration of a single
/// signing call and lives in a [`SecretBytes`] while it is plaintext.
pub struct WalletManager {
	settings: WalletSettings,
	keychain: Arc<KeychainStore>,
	log: SecurityLog,
	clock: Arc<dyn WallClock>,
	balances: Option<Arc<dyn BalanceQuery>>,
	ephemeral: Mutex<Option<EphemeralKey>>,
}

impl WalletManager {
	pub fn new(settings: WalletSettings, keychain: Arc<KeychainStore>, log: SecurityLog) -> Self {
		Self {
			settings,
			keychain,
			log,
			clock: Arc::new(SystemClock),
			balances: None,
			ephemeral: Mutex::new(None),
		}
	}

	pub fn with_clock(mut self, clock: Arc<dyn WallClock>) -> Self {
		self.clock = clock;
		self
	}

	pub fn with_balance_query(mut self, query: Arc<dyn BalanceQuery>) -> Self {
		self.balances = Some(query);
		self
	}

	pub fn settings(&self) -> &WalletSettings {
		&self.settings
	}

	pub async fn exists(&self) -> bool {
		fs::try_exists(&self.settings.wallet_file)
			.await
			.unwrap_or(false)
	}

	/// Generate and persist a new wallet. Refuses to overwrite an existing one.
	#[instrument(skip(self))]
	pub async fn create(&self) -> WalletResult<WalletInfo> {
		if self.exists().await {
			return Err(WalletError::WalletAlreadyExists {
				path: self.settings.wallet_file.clone(),
			});
		}

		let signing_key = SigningKey::generate(&mut OsRng);
		let public_key = signing_key.verifying_key().to_bytes();
		let secret = Zeroizing::new(signing_key.to_bytes());

		let resolved = self.keychain.get_or_create_password().await?;
		let salt = crypto::generate_salt();
		let sealed = crypto::seal(&resolved.password, &salt, self.settings.kdf, secret.as_ref())?;

		let data = WalletData {
			address: derive_address(&self.settings.address_prefix, &public_key),
			public_key: hex::encode(public_key),
			encrypted_private_key: hex::encode(&sealed.ciphertext),
			salt: hex::encode(salt),
			iv: hex::encode(sealed.nonce),
			network_id: self.settings.network_id.clone(),
			created_at: self.clock.now(),
			kdf: self.settings.kdf,
		};
		write_private_json(&self.settings.wallet_file, &data).await?;

		info!(address = %data.address, "wallet created");
		self.log.record(
			SecurityEventType::WalletCreated,
			json!({
				"address": data.address,
				"network_id": data.network_id,
				"source": resolved.source.to_string(),
			}),
		);
		Ok(data.info())
	}

	#[instrument(skip(self))]
	pub async fn load(&self) -> WalletResult<WalletInfo> {
		let data = self.read_wallet().await?;
		self.log.record(
			SecurityEventType::WalletLoaded,
			json!({"address": data.address}),
		);
		Ok(data.info())
	}

	/// Sign the canonical bytes of `tx` with the durable key.
	#[instrument(skip(self, tx), fields(chain_id = %tx.chain_id, sequence = tx.sequence))]
	pub async fn sign_transaction(&self, tx: &UnsignedTx) -> WalletResult<TxSignature> {
		let data = self.read_wallet().await?;
		let message = tx.canonical_bytes()?;

		let private_key = self.decrypt_private_key(&data).await?;
		let signature = sign_with_secret(&private_key, &data.public_key, &message)?;
		drop(private_key);

		self.log.record(
			SecurityEventType::TransactionSigned,
			json!({
				"address": data.address,
				"chain_id": tx.chain_id,
				"sequence": tx.sequence,
			}),
		);
		Ok(TxSignature {
			address: data.address,
			public_key: data.public_key,
			signature: hex::encode(signature.to_bytes()),
		})
	}

	/// Create a fresh key valid for 24 hours. Only its metadata is persisted.
	#[instrument(skip(self))]
	pub async fn create_ephemeral_key(
		&self,
		permissions: Vec<EphemeralPermission>,
	) -> WalletResult<EphemeralKey> {
		let mut permissions = permissions;
		permissions.sort();
		permissions.dedup();

		let signing_key = SigningKey::generate(&mut OsRng);
		let public_key = signing_key.verifying_key().to_bytes();
		let secret = Zeroizing::new(signing_key.to_bytes());

		let created_at = self.clock.now();
		let metadata = EphemeralKeyMetadata {
			address: derive_address(&self.settings.address_prefix, &public_key),
			public_key: hex::encode(public_key),
			permissions,
			created_at,
			expires_at: created_at + ephemeral_key_ttl(),
		};
		write_private_json(&self.settings.ephemeral_key_file, &metadata).await?;

		*self.ephemeral.lock().await = Some(EphemeralKey {
			metadata: metadata.clone(),
			private_key: SecretBytes::from_slice(secret.as_ref()),
		});

		self.log.record(
			SecurityEventType::EphemeralKeyCreated,
			json!({
				"address": metadata.address,
				"permissions": metadata.permissions,
				"expires_at": metadata.expires_at.to_rfc3339(),
			}),
		);
		Ok(EphemeralKey {
			metadata,
			private_key: SecretBytes::from_slice(secret.as_ref()),
		})
	}

	/// Current ephemeral key metadata, or `None` once it has expired.
	///
	/// An expired key is removed from disk and memory rather than extended.
	pub async fn get_ephemeral_key(&self) -> WalletResult<Option<EphemeralKeyMetadata>> {
		let Some(metadata) =
			read_json::<EphemeralKeyMetadata>(&self.settings.ephemeral_key_file).await?
		else {
			*self.ephemeral.lock().await = None;
			return Ok(None);
		};

		if metadata.is_expired_at(self.clock.now()) {
			debug!(address = %metadata.address, "ephemeral key expired");
			self.discard_ephemeral().await?;
			self.log.record(
				SecurityEventType::EphemeralKeyExpired,
				json!({
					"address": metadata.address,
					"expired_at": metadata.expires_at.to_rfc3339(),
				}),
			);
			return Ok(None);
		}
		Ok(Some(metadata))
	}

	/// Sign with the in-memory ephemeral key if it is unexpired and carries
	/// `permission`.
	pub async fn sign_with_ephemeral(
		&self,
		permission: EphemeralPermission,
		tx: &UnsignedTx,
	) -> WalletResult<TxSignature> {
		let Some(on_disk) = self.get_ephemeral_key().await? else {
			return Err(WalletError::EphemeralKeyUnavailable);
		};

		let guard = self.ephemeral.lock().await;
		let key = guard
			.as_ref()
			.filter(|key| key.metadata == on_disk)
			.ok_or(WalletError::EphemeralKeyUnavailable)?;
		if !key.metadata.allows(permission) {
			return Err(WalletError::PermissionDenied(permission.to_string()));
		}

		let message = tx.canonical_bytes()?;
		let signature = sign_with_secret(&key.private_key, &key.metadata.public_key, &message)?;
		self.log.record(
			SecurityEventType::TransactionSigned,
			json!({
				"address": key.metadata.address,
				"ephemeral": true,
				"permission": permission.as_str(),
				"sequence": tx.sequence,
			}),
		);
		Ok(TxSignature {
			address: key.metadata.address.clone(),
			public_key: key.metadata.public_key.clone(),
			signature: hex::encode(signature.to_bytes()),
		})
	}

	#[instrument(skip(self))]
	pub async fn revoke_ephemeral_key(&self) -> WalletResult<()> {
		let metadata = read_json::<EphemeralKeyMetadata>(&self.settings.ephemeral_key_file)
			.await
			.ok()
			.flatten();
		self.discard_ephemeral().await?;
		self.log.record(
			SecurityEventType::EphemeralKeyRevoked,
			json!({"address": metadata.map(|m| m.address)}),
		);
		Ok(())
	}

	pub async fn get_balance(&self) -> WalletResult<Balances> {
		let query = self
			.balances
			.as_ref()
			.ok_or_else(|| WalletError::Balance("no balance source configured".to_string()))?;
		let data = self.read_wallet().await?;
		query.balances(&data.address).await
	}

	#[instrument(skip(self))]
	pub async fn delete(&self) -> WalletResult<()> {
		let data = self.read_wallet().await?;
		fs::remove_file(&self.settings.wallet_file).await?;
		warn!(address = %data.address, "wallet deleted");
		self.log.record(
			SecurityEventType::WalletDeleted,
			json!({"address": data.address}),
		);
		Ok(())
	}

	/// Rotate the keychain password and re-encrypt the wallet under it.
	#[instrument(skip(self))]
	pub async fn rotate_encryption(&self) -> WalletResult<()> {
		let mut data = self.read_wallet().await?;
		let private_key = self.decrypt_private_key(&data).await?;

		let resolved = self.keychain.rotate_password().await?;
		let salt = crypto::generate_salt();
		let sealed = crypto::seal(
			&resolved.password,
			&salt,
			self.settings.kdf,
			private_key.expose(),
		)?;
		drop(private_key);

		data.encrypted_private_key = hex::encode(&sealed.ciphertext);
		data.salt = hex::encode(salt);
		data.iv = hex::encode(sealed.nonce);
		data.kdf = self.settings.kdf;
		write_private_json(&self.settings.wallet_file, &data).await?;

		info!(address = %data.address, "wallet re-encrypted under rotated password");
		Ok(())
	}

	async fn read_wallet(&self) -> WalletResult<WalletData> {
		read_json(&self.settings.wallet_file)
			.await?
			.ok_or_else(|| WalletError::WalletNotFound {
				path: self.settings.wallet_file.clone(),
			})
	}

	async fn decrypt_private_key(&self, data: &WalletData) -> WalletResult<SecretBytes> {
		let resolved = self.keychain.get_or_create_password().await?;
		let salt = decode_hex("salt", &data.salt)?;
		let nonce: [u8; NONCE_SIZE] = decode_hex("iv", &data.iv)?
			.try_into()
			.map_err(|_| WalletError::InvalidKey("iv must be 12 bytes".to_string()))?;
		let encrypted = EncryptedData {
			ciphertext: decode_hex("encrypted_private_key", &data.encrypted_private_key)?,
			nonce,
		};

		match crypto::open(&resolved.password, &salt, data.kdf, &encrypted) {
			Ok(plaintext) => Ok(plaintext),
			Err(WalletError::DecryptionFailed) => {
				self.log.log(
					SecurityEventType::DecryptionFailed,
					json!({
						"address": data.address,
						"source": resolved.source.to_string(),
					}),
					Severity::Error,
				);
				Err(WalletError::DecryptionFailed)
			}
			Err(e) => Err(e),
		}
	}

	async fn discard_ephemeral(&self) -> WalletResult<()> {
		*self.ephemeral.lock().await = None;
		remove_if_exists(&self.settings.ephemeral_key_file).await?;
		Ok(())
	}
}

/// Sign `message` with a 32-byte Ed25519 secret and check it matches the
/// recorded public key.
fn sign_with_secret(
	private_key: &SecretBytes,
	expected_public_key: &str,
	message: &[u8],
) -> WalletResult<Signature> {
	let key_bytes = private_key
		.to_array::<32>()
		.ok_or_else(|| WalletError::InvalidKey("private key must be 32 bytes".to_string()))?;
	let signing_key = SigningKey::from_bytes(&key_bytes);
	if hex::encode(signing_key.verifying_key().to_bytes()) != expected_public_key {
		return Err(WalletError::InvalidKey(
			"decrypted key does not match stored public key".to_string(),
		));
	}
	Ok(signing_key.sign(message))
}

/// Check a signature produced by [`WalletManager::sign_transaction`].
pub fn verify_signature(tx: &UnsignedTx, signature: &TxSignature) -> WalletResult<bool> {
	let public_key: [u8; 32] = decode_hex("public_key", &signature.public_key)?
		.try_into()
		.map_err(|_| WalletError::InvalidKey("public key must be 32 bytes".to_string()))?;
	let verifying_key = VerifyingKey::from_bytes(&public_key)
		.map_err(|e| WalletError::InvalidKey(e.to_string()))?;
	let sig_bytes = decode_hex("signature", &signature.signature)?;
	let sig = Signature::from_slice(&sig_bytes).map_err(|e| WalletError::InvalidKey(e.to_string()))?;
	Ok(verifying_key.verify(&tx.canonical_bytes()?, &sig).is_ok())
}

fn decode_hex(field: &str, value: &str) -> WalletResult<Vec<u8>> {
	hex::decode(value).map_err(|e| WalletError::InvalidKey(format!("{field}: {e}")))
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> WalletResult<Option<T>> {
	match fs::read(path).await {
		Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
		Err(e) => Err(e.into()),
	}
}

/// Replace `path` with `value` as pretty JSON, owner-only.
async fn write_private_json<T: Serialize>(path: &Path, value: &T) -> WalletResult<()> {
	let contents = serde_json::to_vec_pretty(value)?;
	write_private_file(path, &contents).await?;
	debug!(path = ?path, "wrote wallet state");
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::FixedClock;
	use async_trait::async_trait;
	use chrono::{Duration, Utc};
	use harbor_keychain::{MemoryBackend, PasswordBackend, PasswordSource};
	use harbor_security_log::MemorySink;
	use std::collections::BTreeMap;

	struct Fixture {
		_dir: tempfile::TempDir,
		manager: WalletManager,
		backend: Arc<MemoryBackend>,
		sink: MemorySink,
		log: SecurityLog,
		clock: Arc<FixedClock>,
	}

	fn fixture() -> Fixture {
		let dir = tempfile::tempdir().unwrap();
		let sink = MemorySink::new();
		let log = SecurityLog::new(Severity::Debug, vec![Arc::new(sink.clone())]);
		let backend = Arc::new(MemoryBackend::new(PasswordSource::Keychain));
		let keychain = Arc::new(KeychainStore::new(vec![backend.clone()], log.clone()));
		let clock = Arc::new(FixedClock::new(Utc::now()));
		let settings = WalletSettings {
			wallet_file: dir.path().join("wallet.json"),
			ephemeral_key_file: dir.path().join("ephemeral-key.json"),
			address_prefix: "akash".to_string(),
			network_id: "akashnet-2".to_string(),
			kdf: KdfParams::insecure_fast(),
		};
		let manager = WalletManager::new(settings, keychain, log.clone()).with_clock(clock.clone());
		Fixture {
			_dir: dir,
			manager,
			backend,
			sink,
			log,
			clock,
		}
	}

	fn tx() -> UnsignedTx {
		UnsignedTx {
			chain_id: "akashnet-2".to_string(),
			account_number: 1,
			sequence: 4,
			body: json!({"messages": [{"type": "create-deployment", "dseq": 42}]}),
			memo: String::new(),
		}
	}

	#[tokio::test]
	async fn create_then_load_and_refuse_overwrite() {
		let f = fixture();
		assert!(!f.manager.exists().await);
		assert!(matches!(
			f.manager.load().await,
			Err(WalletError::WalletNotFound { .. })
		));

		let created = f.manager.create().await.unwrap();
		assert!(created.address.starts_with("akash1"));
		assert!(f.manager.exists().await);
		assert_eq!(f.manager.load().await.unwrap(), created);

		assert!(matches!(
			f.manager.create().await,
			Err(WalletError::WalletAlreadyExists { .. })
		));
	}

	#[tokio::test]
	async fn wallet_file_holds_no_plaintext_key() {
		let f = fixture();
		f.manager.create().await.unwrap();
		let raw = std::fs::read_to_string(&f.manager.settings().wallet_file).unwrap();
		let data: WalletData = serde_json::from_str(&raw).unwrap();
		assert_eq!(hex::decode(&data.encrypted_private_key).unwrap().len(), 32 + 16);
		assert_eq!(hex::decode(&data.salt).unwrap().len(), 16);
		assert_eq!(hex::decode(&data.iv).unwrap().len(), 12);
		assert_eq!(data.network_id, "akashnet-2");

		#[cfg(unix)]
		{
			use std::os::unix::fs::PermissionsExt;
			let mode = std::fs::metadata(&f.manager.settings().wallet_file)
				.unwrap()
				.permissions()
				.mode();
			assert_eq!(mode & 0o777, 0o600);
		}
	}

	#[tokio::test]
	async fn signature_verifies_against_wallet_key() {
		let f = fixture();
		let info = f.manager.create().await.unwrap();
		let sig = f.manager.sign_transaction(&tx()).await.unwrap();
		assert_eq!(sig.address, info.address);
		assert!(verify_signature(&tx(), &sig).unwrap());

		let mut other = tx();
		other.sequence = 5;
		assert!(!verify_signature(&other, &sig).unwrap());
	}

	#[tokio::test]
	async fn signing_with_wrong_password_is_decryption_failed() {
		let f = fixture();
		f.manager.create().await.unwrap();

		f.backend
			.store(&harbor_common_secret::SecretString::new("not-it".to_string()))
			.await
			.unwrap();
		f.manager.keychain.clear_cache().await;

		assert!(matches!(
			f.manager.sign_transaction(&tx()).await,
			Err(WalletError::DecryptionFailed)
		));
		f.log.flush().await.unwrap();
		let failures = f.sink.of_type(SecurityEventType::DecryptionFailed).await;
		assert_eq!(failures.len(), 1);
		assert_eq!(failures[0].data["source"], "keychain");

		let created = f.sink.of_type(SecurityEventType::WalletCreated).await;
		assert_eq!(created[0].data["source"], "generated");
	}

	#[tokio::test]
	async fn ephemeral_metadata_is_persisted_without_private_key() {
		let f = fixture();
		let key = f
			.manager
			.create_ephemeral_key(vec![EphemeralPermission::Deploy, EphemeralPermission::Deploy])
			.await
			.unwrap();
		assert_eq!(key.private_key.len(), 32);
		assert_eq!(key.metadata.permissions, vec![EphemeralPermission::Deploy]);
		assert_eq!(
			key.metadata.expires_at - key.metadata.created_at,
			Duration::hours(24)
		);

		let raw = std::fs::read_to_string(&f.manager.settings().ephemeral_key_file).unwrap();
		assert!(!raw.contains(&hex::encode(key.private_key.expose())));
		assert_eq!(
			f.manager.get_ephemeral_key().await.unwrap(),
			Some(key.metadata.clone())
		);
	}

	#[tokio::test]
	async fn expired_ephemeral_key_is_never_returned() {
		let f = fixture();
		f.manager
			.create_ephemeral_key(vec![EphemeralPermission::Query])
			.await
			.unwrap();

		f.clock.advance(Duration::hours(24));
		assert_eq!(f.manager.get_ephemeral_key().await.unwrap(), None);
		assert!(!f.manager.settings().ephemeral_key_file.exists());
		assert!(matches!(
			f.manager
				.sign_with_ephemeral(EphemeralPermission::Query, &tx())
				.await,
			Err(WalletError::EphemeralKeyUnavailable)
		));

		f.log.flush().await.unwrap();
		assert_eq!(
			f.sink
				.of_type(SecurityEventType::EphemeralKeyExpired)
				.await
				.len(),
			1
		);
	}

	#[tokio::test]
	async fn metadata_with_past_expiry_is_absent() {
		let f = fixture();
		let past = f.clock.now() - Duration::hours(1);
		let meta = EphemeralKeyMetadata {
			address: "akash1stale".to_string(),
			public_key: "00".repeat(32),
			permissions: vec![EphemeralPermission::Deploy],
			created_at: past - Duration::hours(24),
			expires_at: past,
		};
		write_private_json(&f.manager.settings().ephemeral_key_file, &meta)
			.await
			.unwrap();
		assert_eq!(f.manager.get_ephemeral_key().await.unwrap(), None);
	}

	#[tokio::test]
	async fn ephemeral_signing_honours_permissions() {
		let f = fixture();
		let key = f
			.manager
			.create_ephemeral_key(vec![EphemeralPermission::Deposit])
			.await
			.unwrap();

		let sig = f
			.manager
			.sign_with_ephemeral(EphemeralPermission::Deposit, &tx())
			.await
			.unwrap();
		assert_eq!(sig.address, key.metadata.address);
		assert!(verify_signature(&tx(), &sig).unwrap());

		assert!(matches!(
			f.manager
				.sign_with_ephemeral(EphemeralPermission::Close, &tx())
				.await,
			Err(WalletError::PermissionDenied(_))
		));
	}

	#[tokio::test]
	async fn revoke_removes_metadata_and_memory() {
		let f = fixture();
		f.manager
			.create_ephemeral_key(vec![EphemeralPermission::Deploy])
			.await
			.unwrap();
		f.manager.revoke_ephemeral_key().await.unwrap();
		assert_eq!(f.manager.get_ephemeral_key().await.unwrap(), None);
		assert!(matches!(
			f.manager
				.sign_with_ephemeral(EphemeralPermission::Deploy, &tx())
				.await,
			Err(WalletError::EphemeralKeyUnavailable)
		));
	}

	#[tokio::test]
	async fn rotate_encryption_keeps_the_same_identity() {
		let f = fixture();
		let info = f.manager.create().await.unwrap();
		let before = f.backend.peek().await.unwrap();

		f.manager.rotate_encryption().await.unwrap();
		assert_ne!(f.backend.peek().await.unwrap(), before);

		let sig = f.manager.sign_transaction(&tx()).await.unwrap();
		assert_eq!(sig.public_key, info.public_key);
		assert!(verify_signature(&tx(), &sig).unwrap());
	}

	#[tokio::test]
	async fn delete_removes_wallet_and_logs() {
		let f = fixture();
		f.manager.create().await.unwrap();
		f.manager.delete().await.unwrap();
		assert!(!f.manager.exists().await);

		f.log.flush().await.unwrap();
		assert_eq!(f.sink.of_type(SecurityEventType::WalletDeleted).await.len(), 1);
	}

	struct FixedBalances;

	#[async_trait]
	impl BalanceQuery for FixedBalances {
		async fn balances(&self, address: &str) -> WalletResult<Balances> {
			assert!(address.starts_with("akash1"));
			Ok(Balances {
				amounts: BTreeMap::from([("uakt".to_string(), 12_000_000)]),
			})
		}
	}

	#[tokio::test]
	async fn balance_is_delegated() {
		let f = fixture();
		f.manager.create().await.unwrap();
		assert!(matches!(
			f.manager.get_balance().await,
			Err(WalletError::Balance(_))
		));

		let manager = f.manager.with_balance_query(Arc::new(FixedBalances));
		assert_eq!(manager.get_balance().await.unwrap().get("uakt"), 12_000_000);
	}
}
