// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Password-based encryption of private key material.
//!
//! Argon2id stretches the keychain password with a per-wallet 16-byte salt
//! into an AES-256-GCM key. Ciphertext is stored with its tag appended, as
//! produced by `aes-gcm`.

use aes_gcm::{
	aead::{Aead, KeyInit, OsRng},
	Aes256Gcm, Key, Nonce,
};
use argon2::{Algorithm, Argon2, Params, Version};
use harbor_common_secret::{SecretBytes, SecretString};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{WalletError, WalletResult};

/// Size of the derived AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;

/// Size of AES-GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;

pub const SALT_SIZE: usize = 16;

/// Argon2id cost parameters, persisted next to the ciphertext so they can be
/// raised without breaking existing wallets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
	/// Memory cost in KiB.
	pub m_cost: u32,
	pub t_cost: u32,
	pub p_cost: u32,
}

impl Default for KdfParams {
	fn default() -> Self {
		Self {
			m_cost: Params::DEFAULT_M_COST,
			t_cost: Params::DEFAULT_T_COST,
			p_cost: Params::DEFAULT_P_COST,
		}
	}
}

impl KdfParams {
	/// Minimal parameters for tests. Never use for real wallets.
	pub fn insecure_fast() -> Self {
		Self {
			m_cost: Params::MIN_M_COST.max(8),
			t_cost: 1,
			p_cost: 1,
		}
	}
}

#[derive(Debug, Clone)]
pub struct EncryptedData {
	/// Ciphertext followed by the 16-byte GCM tag.
	pub ciphertext: Vec<u8>,
	pub nonce: [u8; NONCE_SIZE],
}

pub fn generate_salt() -> [u8; SALT_SIZE] {
	let mut salt = [0u8; SALT_SIZE];
	OsRng.fill_bytes(&mut salt);
	salt
}

pub fn generate_nonce() -> [u8; NONCE_SIZE] {
	let mut nonce = [0u8; NONCE_SIZE];
	OsRng.fill_bytes(&mut nonce);
	nonce
}

pub fn derive_key(
	password: &SecretString,
	salt: &[u8],
	params: KdfParams,
) -> WalletResult<Zeroizing<[u8; KEY_SIZE]>> {
	let params = Params::new(params.m_cost, params.t_cost, params.p_cost, Some(KEY_SIZE))
		.map_err(|e| WalletError::Kdf(e.to_string()))?;
	let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

	let mut key = Zeroizing::new([0u8; KEY_SIZE]);
	argon2
		.hash_password_into(password.expose().as_bytes(), salt, key.as_mut())
		.map_err(|e| WalletError::Kdf(e.to_string()))?;
	Ok(key)
}

pub fn encrypt(key: &[u8; KEY_SIZE], plaintext: &[u8]) -> WalletResult<EncryptedData> {
	let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

	let nonce_bytes = generate_nonce();
	let ciphertext = cipher
		.encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
		.map_err(|e| WalletError::Encryption(e.to_string()))?;

	Ok(EncryptedData {
		ciphertext,
		nonce: nonce_bytes,
	})
}

/// Any tag mismatch is reported as [`WalletError::DecryptionFailed`].
pub fn decrypt(key: &[u8; KEY_SIZE], encrypted: &EncryptedData) -> WalletResult<SecretBytes> {
	let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
	let plaintext = cipher
		.decrypt(
			Nonce::from_slice(&encrypted.nonce),
			encrypted.ciphertext.as_slice(),
		)
		.map_err(|_| WalletError::DecryptionFailed)?;
	Ok(SecretBytes::new(plaintext))
}

/// Derive the key from `password` and encrypt in one step.
pub fn seal(
	password: &SecretString,
	salt: &[u8],
	params: KdfParams,
	plaintext: &[u8],
) -> WalletResult<EncryptedData> {
	let key = derive_key(password, salt, params)?;
	encrypt(&key, plaintext)
}

pub fn open(
	password: &SecretString,
	salt: &[u8],
	params: KdfParams,
	encrypted: &EncryptedData,
) -> WalletResult<SecretBytes> {
	let key = derive_key(password, salt, params)?;
	decrypt(&key, encrypted)
}
