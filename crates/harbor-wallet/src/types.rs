// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use harbor_common_secret::SecretBytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::crypto::KdfParams;
use crate::error::{WalletError, WalletResult};

/// Validity window of a freshly created ephemeral key.
pub const EPHEMERAL_KEY_TTL_HOURS: i64 = 24;

pub fn ephemeral_key_ttl() -> Duration {
	Duration::hours(EPHEMERAL_KEY_TTL_HOURS)
}

/// On-disk wallet record. Binary fields are hex encoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletData {
	pub address: String,
	pub public_key: String,
	/// AES-256-GCM ciphertext with the tag appended.
	pub encrypted_private_key: String,
	pub salt: String,
	pub iv: String,
	pub network_id: String,
	pub created_at: DateTime<Utc>,
	#[serde(default)]
	pub kdf: KdfParams,
}

impl WalletData {
	pub fn info(&self) -> WalletInfo {
		WalletInfo {
			address: self.address.clone(),
			public_key: self.public_key.clone(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletInfo {
	pub address: String,
	pub public_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedTx {
	pub chain_id: String,
	pub account_number: u64,
	pub sequence: u64,
	pub body: Value,
	#[serde(default)]
	pub memo: String,
}

impl UnsignedTx {
	/// Compact JSON with object keys sorted at every depth. This is the exact
	/// byte string that gets signed.
	pub fn canonical_bytes(&self) -> WalletResult<Vec<u8>> {
		let mut value = serde_json::to_value(self)?;
		sort_keys(&mut value);
		Ok(serde_json::to_vec(&value)?)
	}
}

fn sort_keys(value: &mut Value) {
	match value {
		Value::Object(map) => {
			let mut entries: Vec<(String, Value)> = std::mem::take(map).into_iter().collect();
			entries.sort_by(|a, b| a.0.cmp(&b.0));
			for (key, mut child) in entries {
				sort_keys(&mut child);
				map.insert(key, child);
			}
		}
		Value::Array(items) => items.iter_mut().for_each(sort_keys),
		_ => {}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxSignature {
	pub address: String,
	pub public_key: String,
	/// Hex encoded 64-byte Ed25519 signature.
	pub signature: String,
}

/// What an ephemeral key may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EphemeralPermission {
	Deploy,
	Close,
	Deposit,
	Query,
}

impl EphemeralPermission {
	pub fn as_str(&self) -> &'static str {
		match self {
			EphemeralPermission::Deploy => "deploy",
			EphemeralPermission::Close => "close",
			EphemeralPermission::Deposit => "deposit",
			EphemeralPermission::Query => "query",
		}
	}
}

impl fmt::Display for EphemeralPermission {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for EphemeralPermission {
	type Err = WalletError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"deploy" => Ok(EphemeralPermission::Deploy),
			"close" => Ok(EphemeralPermission::Close),
			"deposit" => Ok(EphemeralPermission::Deposit),
			"query" => Ok(EphemeralPermission::Query),
			_ => Err(WalletError::UnknownPermission(s.to_string())),
		}
	}
}

/// The persisted, non-secret half of an ephemeral key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EphemeralKeyMetadata {
	pub address: String,
	pub public_key: String,
	pub permissions: Vec<EphemeralPermission>,
	pub created_at: DateTime<Utc>,
	pub expires_at: DateTime<Utc>,
}

impl EphemeralKeyMetadata {
	pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
		now >= self.expires_at
	}

	pub fn allows(&self, permission: EphemeralPermission) -> bool {
		self.permissions.contains(&permission)
	}
}

/// An ephemeral key including its private half. Never serialized.
pub struct EphemeralKey {
	pub metadata: EphemeralKeyMetadata,
	pub private_key: SecretBytes,
}

impl fmt::Debug for EphemeralKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("EphemeralKey")
			.field("metadata", &self.metadata)
			.field("private_key", &self.private_key)
			.finish()
	}
}

/// Spendable amounts keyed by denom.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balances {
	pub amounts: BTreeMap<String, u64>,
}

impl Balances {
	pub fn get(&self, denom: &str) -> u64 {
		self.amounts.get(denom).copied().unwrap_or(0)
	}
}

/// Chain-side balance lookup.
#[async_trait]
pub trait BalanceQuery: Send + Sync {
	async fn balances(&self, address: &str) -> WalletResult<Balances>;
}

/// Wall-clock source for key expiry.
pub trait WallClock: Send + Sync {
	fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
	fn now(&self) -> DateTime<Utc> {
		Utc::now()
	}
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
	now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
	pub fn new(now: DateTime<Utc>) -> Self {
		Self {
			now: Mutex::new(now),
		}
	}

	pub fn advance(&self, by: Duration) {
		if let Ok(mut now) = self.now.lock() {
			*now += by;
		}
	}
}

impl WallClock for FixedClock {
	fn now(&self) -> DateTime<Utc> {
		match self.now.lock() {
			Ok(now) => *now,
			Err(poisoned) => *poisoned.into_inner(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn canonical_bytes_sort_nested_keys() {
		let tx = UnsignedTx {
			chain_id: "akashnet-2".to_string(),
			account_number: 7,
			sequence: 1,
			body: json!({"zeta": 1, "alpha": {"y": 2, "b": 3}}),
			memo: String::new(),
		};
		let text = String::from_utf8(tx.canonical_bytes().unwrap()).unwrap();
		assert_eq!(
			text,
			r#"{"account_number":7,"body":{"alpha":{"b":3,"y":2},"zeta":1},"chain_id":"akashnet-2","memo":"","sequence":1}"#
		);
	}

	#[test]
	fn permission_parses_case_insensitively() {
		assert_eq!(
			"Deploy".parse::<EphemeralPermission>().unwrap(),
			EphemeralPermission::Deploy
		);
		assert!(matches!(
			"launch".parse::<EphemeralPermission>(),
			Err(WalletError::UnknownPermission(_))
		));
	}

	#[test]
	fn expiry_is_inclusive_of_the_deadline() {
		let created = Utc::now();
		let meta = EphemeralKeyMetadata {
			address: "akash1x".to_string(),
			public_key: "00".to_string(),
			permissions: vec![EphemeralPermission::Query],
			created_at: created,
			expires_at: created + ephemeral_key_ttl(),
		};
		assert!(!meta.is_expired_at(created));
		assert!(meta.is_expired_at(meta.expires_at));
		assert!(meta.allows(EphemeralPermission::Query));
		assert!(!meta.allows(EphemeralPermission::Deploy));
	}

	#[test]
	fn ephemeral_key_debug_redacts_private_half() {
		let key = EphemeralKey {
			metadata: EphemeralKeyMetadata {
				address: "akash1x".to_string(),
				public_key: "00".to_string(),
				permissions: vec![],
				created_at: Utc::now(),
				expires_at: Utc::now(),
			},
			private_key: SecretBytes::new(vec![0xAB; 32]),
		};
		let debug = format!("{key:?}");
		assert!(debug.contains("SecretBytes([REDACTED; 32])"));
		assert!(!debug.to_lowercase().contains("abab"));
	}

	#[test]
	fn fixed_clock_advances() {
		let start = Utc::now();
		let clock = FixedClock::new(start);
		clock.advance(Duration::hours(2));
		assert_eq!(clock.now(), start + Duration::hours(2));
	}
}
